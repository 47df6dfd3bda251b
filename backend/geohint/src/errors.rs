//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Panorama provider error: {0}")]
    Provider(String),

    /// The provider refused the request outright (bad or revoked key,
    /// malformed query). Retrying cannot help.
    #[error("Panorama provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("No outdoor panorama found after {attempts} attempts")]
    SamplingExhausted { attempts: u32 },

    #[error("Still-image request failed with status {0}")]
    CaptureStatus(u16),

    #[error("Analyzer returned status {0}")]
    AnalyzerStatus(u16),

    #[error("Analyzer response malformed: {0}")]
    AnalyzerBadResponse(String),

    #[error("Coordinate out of range: ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

pub type Result<T> = std::result::Result<T, GameError>;
