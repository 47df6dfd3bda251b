//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::analyzer::HintAnalyzer;
use crate::capture::ViewCapture;
use crate::controller::{GameController, HintOutcome, RoundSnapshot, ANALYZE_FAILED_MESSAGE};
use crate::errors::GameError;
use crate::geo::GeoPoint;
use crate::hints::{ContextTag, Hint};
use crate::notifications::Notification;
use crate::panorama::{PanoramaSource, PoseUpdate};
use crate::screenshots::ScreenshotStore;

pub struct ApiState<P, C, A> {
    pub controller: GameController<P, C, A>,
    pub screenshots: ScreenshotStore,
}

type Shared<P, C, A> = State<Arc<ApiState<P, C, A>>>;

pub fn router<P, C, A>(state: Arc<ApiState<P, C, A>>) -> Router
where
    P: PanoramaSource + 'static,
    C: ViewCapture + 'static,
    A: HintAnalyzer + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/contexts", get(contexts))
        .route("/round", get(get_round::<P, C, A>))
        .route("/round/start", post(start_round::<P, C, A>))
        .route("/round/next", post(next_round::<P, C, A>))
        .route("/viewer", put(update_viewer::<P, C, A>))
        .route("/hints", post(request_hint::<P, C, A>))
        .route("/map/expanded", put(set_map_expanded::<P, C, A>))
        .route("/guess", post(place_guess::<P, C, A>))
        .route("/guess/submit", post(submit_guess::<P, C, A>))
        .route("/notifications", get(notifications::<P, C, A>))
        .route("/api/screenshot", post(save_screenshot::<P, C, A>))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct HintRequest {
    pub context: String,
}

#[derive(Serialize)]
pub struct HintResponse {
    pub outcome: &'static str,
    pub hint: Option<Hint>,
    pub message: Option<String>,
    pub round: RoundSnapshot,
}

#[derive(Deserialize)]
pub struct ExpandRequest {
    pub expanded: bool,
}

#[derive(Deserialize)]
pub struct NotificationsQuery {
    pub after: Option<u64>,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub count: usize,
    pub notifications: Vec<Notification>,
}

#[derive(Deserialize)]
pub struct ScreenshotRequest {
    #[serde(rename = "base64Data")]
    pub base64_data: String,
}

#[derive(Serialize)]
pub struct ScreenshotResponse {
    pub path: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn game_error_response(e: GameError) -> Response {
    let status = match e {
        GameError::SamplingExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        GameError::InvalidCoordinate { .. } | GameError::Base64(_) => StatusCode::BAD_REQUEST,
        GameError::Http(_)
        | GameError::Json(_)
        | GameError::Provider(_)
        | GameError::ProviderRejected(_)
        | GameError::CaptureStatus(_)
        | GameError::AnalyzerStatus(_)
        | GameError::AnalyzerBadResponse(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /contexts`
pub async fn contexts() -> impl IntoResponse {
    Json(ContextTag::ALL.map(|tag| tag.as_str()))
}

/// `GET /round`
pub async fn get_round<P, C, A>(State(state): Shared<P, C, A>) -> impl IntoResponse
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    Json(state.controller.snapshot().await)
}

/// `POST /round/start`
///
/// Called once the page's widgets are ready; samples the first location.
pub async fn start_round<P, C, A>(State(state): Shared<P, C, A>) -> Response
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    match state.controller.start_round().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => game_error_response(e),
    }
}

/// `POST /round/next`
pub async fn next_round<P, C, A>(State(state): Shared<P, C, A>) -> Response
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    match state.controller.next_round().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => game_error_response(e),
    }
}

/// `PUT /viewer`
pub async fn update_viewer<P, C, A>(
    State(state): Shared<P, C, A>,
    Json(update): Json<PoseUpdate>,
) -> impl IntoResponse
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    Json(state.controller.update_pose(update).await)
}

/// `POST /hints`
///
/// Captures the current view and asks the analyzer about one context.
pub async fn request_hint<P, C, A>(
    State(state): Shared<P, C, A>,
    Json(req): Json<HintRequest>,
) -> Response
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    let Some(context) = ContextTag::from_label(&req.context) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown context: {}", req.context),
        );
    };

    let outcome = state.controller.request_hint(context).await;
    let (label, hint, message) = match outcome {
        HintOutcome::Added(hint) => ("added", Some(hint), None),
        HintOutcome::NoFeatures => (
            "no_features",
            None,
            Some(format!("No {context} features detected")),
        ),
        HintOutcome::Empty => ("empty", None, None),
        HintOutcome::Stale => ("stale", None, None),
        HintOutcome::Ignored => ("ignored", None, None),
        HintOutcome::Failed(reason) => {
            error!("Hint for {context} failed: {reason}");
            return error_response(StatusCode::BAD_GATEWAY, ANALYZE_FAILED_MESSAGE);
        }
    };

    Json(HintResponse {
        outcome: label,
        hint,
        message,
        round: state.controller.snapshot().await,
    })
    .into_response()
}

/// `PUT /map/expanded`
pub async fn set_map_expanded<P, C, A>(
    State(state): Shared<P, C, A>,
    Json(req): Json<ExpandRequest>,
) -> impl IntoResponse
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    Json(state.controller.set_map_expanded(req.expanded).await)
}

/// `POST /guess`
pub async fn place_guess<P, C, A>(
    State(state): Shared<P, C, A>,
    Json(guess): Json<GeoPoint>,
) -> Response
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    match state.controller.place_guess(guess).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => game_error_response(e),
    }
}

/// `POST /guess/submit`
pub async fn submit_guess<P, C, A>(State(state): Shared<P, C, A>) -> impl IntoResponse
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    Json(state.controller.submit_guess().await)
}

/// `GET /notifications?after=<seq>`
pub async fn notifications<P, C, A>(
    State(state): Shared<P, C, A>,
    Query(q): Query<NotificationsQuery>,
) -> impl IntoResponse
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    let notifications = state
        .controller
        .notifications_since(q.after.unwrap_or(0))
        .await;
    Json(NotificationsResponse {
        count: notifications.len(),
        notifications,
    })
}

/// `POST /api/screenshot`
///
/// Writes the decoded payload to the screenshot store.
pub async fn save_screenshot<P, C, A>(
    State(state): Shared<P, C, A>,
    Json(req): Json<ScreenshotRequest>,
) -> Response
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    match state.screenshots.save_base64(&req.base64_data).await {
        Ok(path) => Json(ScreenshotResponse { path }).into_response(),
        Err(e) => {
            error!("Error saving screenshot: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save screenshot")
        }
    }
}
