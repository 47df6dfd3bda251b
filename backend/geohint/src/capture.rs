//! View capture — turns the viewer's current pose into a still image via the
//! Street View still-image endpoint.

use std::future::Future;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use tracing::debug;

use crate::errors::{GameError, Result};
use crate::panorama::{ViewerState, DEFAULT_ZOOM};

pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

/// A captured still: raw bytes for upload plus an inline data URL.
#[derive(Debug, Clone)]
pub struct CapturedView {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub data_url: String,
}

impl CapturedView {
    pub fn new(bytes: Vec<u8>, mime: &str) -> Self {
        let data_url = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
        Self {
            bytes,
            mime: mime.to_string(),
            data_url,
        }
    }
}

/// Horizontal field of view for a panorama zoom level: `180 / 2^zoom`.
/// A missing zoom counts as 1.
pub fn fov_for_zoom(zoom: Option<f64>) -> f64 {
    let zoom = zoom.filter(|z| z.is_finite()).unwrap_or(DEFAULT_ZOOM);
    180.0 / 2f64.powf(zoom)
}

pub trait ViewCapture: Send + Sync {
    fn capture(&self, view: &ViewerState) -> impl Future<Output = Result<CapturedView>> + Send;
}

pub struct StaticViewCapture {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StaticViewCapture {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Query parameters for the still-image request, in request order.
    pub fn query_for(&self, view: &ViewerState) -> Vec<(&'static str, String)> {
        vec![
            ("size", format!("{CAPTURE_WIDTH}x{CAPTURE_HEIGHT}")),
            ("location", format!("{},{}", view.position.lat, view.position.lng)),
            ("heading", view.heading.to_string()),
            ("pitch", view.pitch.to_string()),
            ("fov", fov_for_zoom(view.zoom).to_string()),
            ("key", self.api_key.clone()),
        ]
    }
}

impl ViewCapture for StaticViewCapture {
    async fn capture(&self, view: &ViewerState) -> Result<CapturedView> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.query_for(view))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GameError::CaptureStatus(status.as_u16()));
        }

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = resp.bytes().await?.to_vec();

        debug!(
            "Captured {} bytes at heading={} pitch={} fov={}",
            bytes.len(),
            view.heading,
            view.pitch,
            fov_for_zoom(view.zoom)
        );
        Ok(CapturedView::new(bytes, &mime))
    }
}
