//! Panorama source — finds outdoor Street View coverage and tracks the
//! interactive viewer's pose.
//!
//! ## Resilience
//!
//! * `ZERO_RESULTS` / `NOT_FOUND` come back as `Ok(None)` so the sampling
//!   loop can simply draw another candidate.
//! * Quota and transient provider failures are retried with exponential
//!   back-off, up to [`MAX_PROVIDER_RETRIES`] times.
//! * `REQUEST_DENIED` / `INVALID_REQUEST` and HTTP 401/403 are hard
//!   failures ([`GameError::ProviderRejected`]); everything else is soft.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{GameError, Result};
use crate::geo::GeoPoint;

const MAX_PROVIDER_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 4_000;

/// Zoom the viewer opens with.
pub const DEFAULT_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 5.0;

/// The interactive viewer's pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub position: GeoPoint,
    /// Degrees clockwise from north, in [0, 360).
    pub heading: f64,
    /// Degrees, in [-90, 90].
    pub pitch: f64,
    /// `None` when the widget has not reported a zoom yet.
    pub zoom: Option<f64>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            position: GeoPoint::new(0.0, 0.0),
            heading: 0.0,
            pitch: 0.0,
            zoom: Some(DEFAULT_ZOOM),
        }
    }
}

/// Pose reported by the page after the user pans or zooms.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PoseUpdate {
    pub heading: Option<f64>,
    pub pitch: Option<f64>,
    pub zoom: Option<f64>,
}

impl ViewerState {
    /// Apply a reported pose, wrapping heading and clamping pitch and zoom.
    pub fn apply(&mut self, update: PoseUpdate) {
        if let Some(heading) = update.heading.filter(|h| h.is_finite()) {
            self.heading = normalize_heading(heading);
        }
        if let Some(pitch) = update.pitch.filter(|p| p.is_finite()) {
            self.pitch = pitch.clamp(-90.0, 90.0);
        }
        if let Some(zoom) = update.zoom.filter(|z| z.is_finite()) {
            self.zoom = Some(zoom.clamp(0.0, MAX_ZOOM));
        }
    }
}

pub fn normalize_heading(heading: f64) -> f64 {
    let wrapped = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Capability over the external panorama provider.
pub trait PanoramaSource: Send + Sync {
    /// Nearest outdoor panorama within `radius_m` of `candidate`, or `None`
    /// when the provider has no coverage there.
    fn find_outdoor_near(
        &self,
        candidate: GeoPoint,
        radius_m: u32,
    ) -> impl Future<Output = Result<Option<GeoPoint>>> + Send;

    /// Reset the viewer to a known pose. Zoom is left alone.
    fn set_viewer(&self, position: GeoPoint, heading: f64, pitch: f64);

    /// Current pose, including any panning since the last `set_viewer`.
    fn viewer(&self) -> ViewerState;

    /// Record user interaction with the viewer.
    fn update_pose(&self, update: PoseUpdate);
}

// ─────────────────────────────────────────────────────────
// Metadata response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MetadataResponse {
    pub status: String,
    pub location: Option<MetadataLocation>,
    pub pano_id: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Street View metadata client plus the session's viewer pose.
pub struct StreetViewSource {
    client: Client,
    base_url: String,
    api_key: String,
    viewer: Mutex<ViewerState>,
}

impl StreetViewSource {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            viewer: Mutex::new(ViewerState::default()),
        }
    }

    fn with_viewer<T>(&self, f: impl FnOnce(&mut ViewerState) -> T) -> T {
        let mut guard = self.viewer.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    async fn fetch_metadata(&self, candidate: GeoPoint, radius_m: u32) -> Result<MetadataResponse> {
        let location = format!("{},{}", candidate.lat, candidate.lng);
        let radius = radius_m.to_string();
        let resp = self
            .client
            .get(format!("{}/metadata", self.base_url))
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("source", "outdoor"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(MetadataResponse {
                status: "OVER_QUERY_LIMIT".to_string(),
                location: None,
                pano_id: None,
                error_message: None,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GameError::ProviderRejected(format!(
                "metadata request returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(GameError::Provider(format!("metadata request returned {status}")));
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl PanoramaSource for StreetViewSource {
    async fn find_outdoor_near(&self, candidate: GeoPoint, radius_m: u32) -> Result<Option<GeoPoint>> {
        let mut backoff = INITIAL_BACKOFF_MS;
        let mut retries = 0;

        loop {
            let body = self.fetch_metadata(candidate, radius_m).await?;

            match body.status.as_str() {
                "OK" => {
                    let location = body.location.ok_or_else(|| {
                        GameError::Provider("OK metadata without a location".to_string())
                    })?;
                    debug!(
                        "Panorama {:?} found near ({:.4}, {:.4})",
                        body.pano_id, candidate.lat, candidate.lng
                    );
                    return Ok(Some(GeoPoint::new(location.lat, location.lng)));
                }
                "ZERO_RESULTS" | "NOT_FOUND" => return Ok(None),
                "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" if retries < MAX_PROVIDER_RETRIES => {
                    warn!("Panorama provider returned {} (will retry in {backoff}ms)", body.status);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_MS);
                    retries += 1;
                }
                other => {
                    let detail = match body.error_message {
                        Some(msg) => format!("{other}: {msg}"),
                        None => other.to_string(),
                    };
                    return Err(match other {
                        "REQUEST_DENIED" | "INVALID_REQUEST" => GameError::ProviderRejected(detail),
                        _ => GameError::Provider(detail),
                    });
                }
            }
        }
    }

    fn set_viewer(&self, position: GeoPoint, heading: f64, pitch: f64) {
        self.with_viewer(|v| {
            v.position = position;
            v.heading = normalize_heading(heading);
            v.pitch = pitch.clamp(-90.0, 90.0);
        });
    }

    fn viewer(&self) -> ViewerState {
        self.with_viewer(|v| *v)
    }

    fn update_pose(&self, update: PoseUpdate) {
        self.with_viewer(|v| v.apply(update));
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
