//! Client for the vision-analysis service (`POST /analyze-image`).

use std::future::Future;

use reqwest::{multipart, Client};
use serde_json::Value;
use tracing::debug;

use crate::capture::CapturedView;
use crate::errors::{GameError, Result};
use crate::hints::ContextTag;

/// Reply the service uses when nothing of the requested context is visible.
pub const INVALID_SENTINEL: &str = "INVALID";

const UPLOAD_FILENAME: &str = "streetview.jpg";

/// Interpreted analyzer reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analysis {
    /// A usable description.
    Described(String),
    /// The sentinel: no features of the requested context were visible.
    NoFeatures,
    /// Blank text; nothing to show.
    Empty,
}

/// Interpret the `description` field of a reply. `None` stands for a JSON
/// `null`, which the service returns in place of the sentinel.
pub fn interpret(description: Option<&str>) -> Analysis {
    match description.map(str::trim) {
        None => Analysis::NoFeatures,
        Some(text) if text.to_uppercase() == INVALID_SENTINEL => Analysis::NoFeatures,
        Some("") => Analysis::Empty,
        Some(text) => Analysis::Described(text.to_string()),
    }
}

pub trait HintAnalyzer: Send + Sync {
    fn analyze(
        &self,
        image: &CapturedView,
        context: ContextTag,
    ) -> impl Future<Output = Result<Analysis>> + Send;
}

pub struct AnalyzerClient {
    client: Client,
    endpoint: String,
}

impl AnalyzerClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/analyze-image", base_url.trim_end_matches('/')),
        }
    }
}

impl HintAnalyzer for AnalyzerClient {
    async fn analyze(&self, image: &CapturedView, context: ContextTag) -> Result<Analysis> {
        let file = multipart::Part::bytes(image.bytes.clone())
            .file_name(UPLOAD_FILENAME)
            .mime_str(&image.mime)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("context", context.as_str());

        let resp = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GameError::AnalyzerStatus(status.as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GameError::AnalyzerBadResponse(e.to_string()))?;

        let analysis = match body.get("description") {
            Some(Value::Null) => interpret(None),
            Some(Value::String(text)) => interpret(Some(text)),
            Some(other) => {
                return Err(GameError::AnalyzerBadResponse(format!(
                    "description is not a string: {other}"
                )))
            }
            None => {
                return Err(GameError::AnalyzerBadResponse(
                    "missing description field".to_string(),
                ))
            }
        };

        debug!("Analyzer reply for {context}: {analysis:?}");
        Ok(analysis)
    }
}
