use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

use crate::controller::{ControllerSettings, GameController, HintOutcome, ANALYZE_FAILED_MESSAGE};
use crate::errors::GameError;
use crate::geo::GeoPoint;
use crate::guess_map::MarkerColor;
use crate::hints::ContextTag;
use crate::notifications::Level;
use crate::panorama::{PanoramaSource, PoseUpdate, StreetViewSource};
use crate::screenshots::ScreenshotStore;
use crate::test_support::{spawn_stub, FakeAnalyzer, FakeCapture, FakePanorama, Reply};

type TestController = GameController<FakePanorama, FakeCapture, FakeAnalyzer>;

const PARIS: GeoPoint = GeoPoint::new(48.8566, 2.3522);
const NEW_YORK: GeoPoint = GeoPoint::new(40.7128, -74.0060);
const LONDON: GeoPoint = GeoPoint::new(51.5074, -0.1278);

fn controller_with(script: Vec<Option<GeoPoint>>, analyzer: FakeAnalyzer) -> TestController {
    GameController::new(
        FakePanorama::scripted(script),
        FakeCapture::default(),
        analyzer,
        ControllerSettings::default(),
    )
}

async fn playing_at(truth: GeoPoint, analyzer: FakeAnalyzer) -> TestController {
    let ctl = controller_with(vec![Some(truth)], analyzer);
    let snap = ctl.start_round().await.unwrap();
    assert_eq!(snap.phase, "playing");
    ctl
}

#[tokio::test]
async fn test_perfect_guess() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    ctl.place_guess(PARIS).await.unwrap();

    let snap = ctl.submit_guess().await;
    let result = snap.result.unwrap();
    assert_eq!(snap.phase, "revealed");
    assert!(result.distance_km < 1e-6);
    assert_eq!(result.score_percent, 100);
    assert_eq!(result.true_position, PARIS);
}

#[tokio::test]
async fn test_antipodal_guess() {
    let ctl = playing_at(GeoPoint::new(0.0, 0.0), FakeAnalyzer::default()).await;
    ctl.place_guess(GeoPoint::new(0.0, 180.0)).await.unwrap();

    let result = ctl.submit_guess().await.result.unwrap();
    assert!((result.distance_km - 20_015.1).abs() < 1.0, "{}", result.distance_km);
    assert_eq!(result.score_percent, 0);
}

#[tokio::test]
async fn test_mid_distance_guess() {
    let ctl = playing_at(NEW_YORK, FakeAnalyzer::default()).await;
    ctl.place_guess(LONDON).await.unwrap();

    let snap = ctl.submit_guess().await;
    let result = snap.result.unwrap();
    assert!((result.distance_km - 5570.0).abs() < 10.0, "{}", result.distance_km);
    assert_eq!(result.score_percent, 44);

    // Guess and truth markers plus the connector are on the map.
    assert!(snap.map.frozen);
    let colors: Vec<_> = snap.map.markers.iter().map(|m| m.color).collect();
    assert_eq!(colors, vec![MarkerColor::Blue, MarkerColor::Red]);
    assert_eq!(snap.map.connector.first(), Some(&LONDON));
    assert_eq!(snap.map.connector.last(), Some(&NEW_YORK));
}

#[tokio::test]
async fn test_sampling_retries_until_found() {
    let third = GeoPoint::new(35.6762, 139.6503);
    let ctl = controller_with(vec![None, None, Some(third)], FakeAnalyzer::default());

    let snap = ctl.start_round().await.unwrap();
    assert_eq!(snap.phase, "playing");
    assert_eq!(snap.sampling_attempts, 3);
    assert_eq!(ctl.panorama().calls(), 3);

    let viewer = ctl.panorama().viewer();
    assert_eq!(viewer.position, third);
    assert_eq!(viewer.heading, 0.0);
    assert_eq!(viewer.pitch, 0.0);
}

#[tokio::test]
async fn test_sampling_gives_up_after_cap() {
    let ctl = GameController::new(
        FakePanorama::default(),
        FakeCapture::default(),
        FakeAnalyzer::default(),
        ControllerSettings {
            search_radius_m: 50_000,
            max_sampling_attempts: 5,
        },
    );

    let err = ctl.start_round().await.unwrap_err();
    assert!(matches!(err, GameError::SamplingExhausted { attempts: 5 }));
    assert_eq!(ctl.panorama().calls(), 5);
    assert_eq!(ctl.snapshot().await.phase, "idle");

    let notes = ctl.notifications_since(0).await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Error);

    // A later start can still succeed.
    ctl.panorama().push(Some(PARIS));
    assert_eq!(ctl.start_round().await.unwrap().phase, "playing");
}

#[tokio::test]
async fn test_denied_key_stops_sampling_at_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stub = Router::new()
        .route(
            "/metadata",
            get(|State(calls): State<Arc<AtomicUsize>>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "status": "REQUEST_DENIED", "error_message": "key revoked" }))
            }),
        )
        .with_state(calls.clone());
    let base = spawn_stub(stub).await;

    let ctl = GameController::new(
        StreetViewSource::new(reqwest::Client::new(), &base, "revoked-key"),
        FakeCapture::default(),
        FakeAnalyzer::default(),
        ControllerSettings::default(),
    );

    let err = ctl.start_round().await.unwrap_err();
    assert!(matches!(err, GameError::ProviderRejected(ref m) if m.contains("REQUEST_DENIED")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snap = ctl.snapshot().await;
    assert_eq!(snap.phase, "idle");
    assert_eq!(snap.sampling_attempts, 1);

    let notes = ctl.notifications_since(0).await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Error);
    assert!(notes[0].message.contains("rejected"));
}

#[tokio::test]
async fn test_sentinel_hint_notifies_and_adds_nothing() {
    let analyzer = FakeAnalyzer::default().reply(ContextTag::Vehicles, 0, Reply::Sentinel);
    let ctl = playing_at(PARIS, analyzer).await;

    let outcome = ctl.request_hint(ContextTag::Vehicles).await;
    assert!(matches!(outcome, HintOutcome::NoFeatures));
    assert!(ctl.snapshot().await.hints.is_empty());

    let notes = ctl.notifications_since(0).await;
    assert_eq!(notes.len(), 1);
    assert!(notes[0].message.contains("vehicles"));
    assert_eq!(notes[0].context, Some(ContextTag::Vehicles));
}

#[tokio::test]
async fn test_analyzer_failure_leaves_round_unchanged() {
    let analyzer = FakeAnalyzer::default().reply(ContextTag::Climate, 0, Reply::Fail);
    let ctl = playing_at(PARIS, analyzer).await;
    ctl.place_guess(LONDON).await.unwrap();

    let outcome = ctl.request_hint(ContextTag::Climate).await;
    assert!(matches!(outcome, HintOutcome::Failed(_)));

    let snap = ctl.snapshot().await;
    assert_eq!(snap.phase, "awaiting_guess");
    assert_eq!(snap.pending_guess, Some(LONDON));
    assert!(snap.hints.is_empty());
    assert!(snap.loading.is_empty());

    let notes = ctl.notifications_since(0).await;
    assert_eq!(notes[0].message, ANALYZE_FAILED_MESSAGE);
}

#[tokio::test]
async fn test_capture_failure_is_reported_like_analyzer_failure() {
    let ctl = GameController::new(
        FakePanorama::scripted([Some(PARIS)]),
        FakeCapture { fail: true },
        FakeAnalyzer::default(),
        ControllerSettings::default(),
    );
    ctl.start_round().await.unwrap();

    let outcome = ctl.request_hint(ContextTag::Architecture).await;
    assert!(matches!(outcome, HintOutcome::Failed(_)));
    assert_eq!(ctl.notifications_since(0).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_contexts_land_in_completion_order() {
    let analyzer = FakeAnalyzer::default()
        .reply(ContextTag::Architecture, 50, Reply::Text("Alpine Europe"))
        .reply(ContextTag::Vegetation, 5, Reply::Text("Temperate forest"));
    let ctl = playing_at(PARIS, analyzer).await;

    let architecture = ctl.request_hint(ContextTag::Architecture);
    let vegetation = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Architecture is still waiting on the analyzer here.
        let loading = ctl.snapshot().await.loading;
        assert_eq!(loading.len(), 1);
        assert_eq!(loading[0].context, ContextTag::Architecture);
        ctl.request_hint(ContextTag::Vegetation).await
    };
    let (a, v) = tokio::join!(architecture, vegetation);
    assert!(matches!(a, HintOutcome::Added(_)));
    assert!(matches!(v, HintOutcome::Added(_)));

    // Vegetation resolved first; architecture, the newest arrival, is prepended.
    let snap = ctl.snapshot().await;
    let order: Vec<_> = snap.hints.iter().map(|h| h.context).collect();
    assert_eq!(order, vec![ContextTag::Architecture, ContextTag::Vegetation]);
    assert!(snap.loading.is_empty());
    assert!(snap.hints[0].image_url.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test(start_paused = true)]
async fn test_late_hint_from_previous_round_is_discarded() {
    let analyzer = FakeAnalyzer::default().reply(ContextTag::RoadSigns, 100, Reply::Text("Cyrillic signs"));
    let ctl = controller_with(vec![Some(PARIS), Some(LONDON)], analyzer);
    ctl.start_round().await.unwrap();

    let hint = ctl.request_hint(ContextTag::RoadSigns);
    let moves = async {
        ctl.place_guess(PARIS).await.unwrap();
        ctl.submit_guess().await;
        let snap = ctl.next_round().await.unwrap();
        assert_eq!(snap.phase, "playing");
        assert!(snap.hints.is_empty());
    };
    let (outcome, ()) = tokio::join!(hint, moves);

    assert!(matches!(outcome, HintOutcome::Stale));
    assert!(ctl.snapshot().await.hints.is_empty());
}

#[tokio::test]
async fn test_hint_after_reveal_is_ignored() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    ctl.place_guess(PARIS).await.unwrap();
    ctl.submit_guess().await;
    assert!(matches!(ctl.request_hint(ContextTag::Population).await, HintOutcome::Ignored));
}

#[tokio::test]
async fn test_only_one_pending_guess() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    ctl.place_guess(NEW_YORK).await.unwrap();
    let snap = ctl.place_guess(LONDON).await.unwrap();

    assert_eq!(snap.phase, "awaiting_guess");
    assert_eq!(snap.pending_guess, Some(LONDON));
    assert_eq!(snap.map.markers.len(), 1);
    assert_eq!(snap.map.markers[0].position, LONDON);
}

#[tokio::test]
async fn test_invalid_guess_is_rejected() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    let err = ctl.place_guess(GeoPoint::new(95.0, 0.0)).await.unwrap_err();
    assert!(matches!(err, GameError::InvalidCoordinate { .. }));
    assert_eq!(ctl.snapshot().await.pending_guess, None);
}

#[tokio::test]
async fn test_antimeridian_guess_is_stored_as_positive() {
    let ctl = playing_at(GeoPoint::new(0.0, 179.0), FakeAnalyzer::default()).await;
    let snap = ctl.place_guess(GeoPoint::new(0.0, -180.0)).await.unwrap();
    assert_eq!(snap.pending_guess, Some(GeoPoint::new(0.0, 180.0)));
    assert_eq!(snap.map.markers[0].position, GeoPoint::new(0.0, 180.0));
}

#[tokio::test]
async fn test_submit_without_guess_and_double_submit_are_noops() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    assert_eq!(ctl.submit_guess().await.phase, "playing");

    ctl.place_guess(LONDON).await.unwrap();
    let first = ctl.submit_guess().await;
    let second = ctl.submit_guess().await;
    assert_eq!(first.result, second.result);
    assert_eq!(second.phase, "revealed");

    // Clicks after the reveal do not move the guess.
    let snap = ctl.place_guess(NEW_YORK).await.unwrap();
    assert_eq!(snap.pending_guess, Some(LONDON));
}

#[tokio::test]
async fn test_next_round_resets_once() {
    let ctl = controller_with(vec![Some(PARIS), Some(LONDON), Some(NEW_YORK)], FakeAnalyzer::default());
    ctl.start_round().await.unwrap();
    ctl.request_hint(ContextTag::Architecture).await;
    ctl.place_guess(NEW_YORK).await.unwrap();
    ctl.submit_guess().await;

    let first = ctl.next_round().await.unwrap();
    let second = ctl.next_round().await.unwrap();
    assert_eq!(first.round_id, second.round_id);
    assert_eq!(second.phase, "playing");
    assert!(second.hints.is_empty());
    assert!(second.result.is_none());
    assert!(second.pending_guess.is_none());
    assert!(second.map.markers.is_empty());
    assert!(second.map.connector.is_empty());
    assert!(!second.map.frozen);
    assert_eq!(ctl.panorama().calls(), 2);
    assert_eq!(ctl.panorama().viewer().position, LONDON);
}

#[tokio::test]
async fn test_start_round_is_noop_while_playing() {
    let ctl = controller_with(vec![Some(PARIS), Some(LONDON)], FakeAnalyzer::default());
    let first = ctl.start_round().await.unwrap();
    let again = ctl.start_round().await.unwrap();
    assert_eq!(first.round_id, again.round_id);
    assert_eq!(ctl.panorama().calls(), 1);
}

#[tokio::test]
async fn test_map_resize_keeps_pending_marker() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    ctl.place_guess(LONDON).await.unwrap();
    ctl.set_map_expanded(true).await;
    let snap = ctl.set_map_expanded(false).await;
    assert!(!snap.map.expanded);
    assert_eq!(snap.map.markers.len(), 1);
}

#[tokio::test]
async fn test_pose_updates_reach_the_viewer() {
    let ctl = playing_at(PARIS, FakeAnalyzer::default()).await;
    let snap = ctl
        .update_pose(PoseUpdate {
            heading: Some(400.0),
            pitch: Some(15.0),
            zoom: Some(2.0),
        })
        .await;
    let viewer = snap.viewer.unwrap();
    assert_eq!(viewer.heading, 40.0);
    assert_eq!(viewer.pitch, 15.0);
    assert_eq!(viewer.zoom, Some(2.0));
}

#[tokio::test]
async fn test_hints_keep_a_saved_copy_when_store_configured() {
    let tmp = tempfile::tempdir().unwrap();
    let ctl = controller_with(vec![Some(PARIS)], FakeAnalyzer::default())
        .with_screenshots(ScreenshotStore::new(tmp.path()));
    ctl.start_round().await.unwrap();

    let HintOutcome::Added(hint) = ctl.request_hint(ContextTag::Architecture).await else {
        panic!("expected a hint");
    };
    let saved = hint.saved_path.unwrap();
    assert!(saved.starts_with("/screenshots/screenshot_"));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
}
