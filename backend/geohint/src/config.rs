//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use crate::errors::{GameError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Maps platform key used for panorama metadata and still images
    pub maps_api_key: String,
    /// Street View still-image endpoint; metadata lives at `<base>/metadata`
    pub streetview_base_url: String,
    /// Base URL of the vision-analysis service
    pub analyzer_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Radius (meters) searched around each random candidate
    pub search_radius_m: u32,
    /// Candidates drawn before a round start gives up
    pub max_sampling_attempts: u32,
    /// Where captured views are written
    pub screenshot_dir: PathBuf,
    /// Also write every hint capture to `screenshot_dir`. Files are never
    /// pruned, so this is off unless asked for.
    pub save_hint_captures: bool,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            maps_api_key: env_var("GOOGLE_MAPS_API_KEY")
                .or_else(|_| env_var("NEXT_PUBLIC_GOOGLE_MAPS_API_KEY"))
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    GameError::Config(
                        "GOOGLE_MAPS_API_KEY environment variable is required".to_string(),
                    )
                })?,
            streetview_base_url: env_var("STREETVIEW_BASE_URL").unwrap_or_else(|_| {
                "https://maps.googleapis.com/maps/api/streetview".to_string()
            }),
            analyzer_url: env_var("ANALYZER_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            api_port: parse_var("API_PORT", "3001")?,
            search_radius_m: parse_var("SEARCH_RADIUS_METERS", "50000")?,
            max_sampling_attempts: parse_var("SAMPLING_MAX_ATTEMPTS", "30")?,
            screenshot_dir: env_var("SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public/screenshots")),
            save_hint_captures: parse_var("SAVE_HINT_CAPTURES", "false")?,
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", "30")?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| GameError::Config(format!("Missing env var: {key}")))
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| GameError::Config(format!("Invalid {key}")))
}
