//! Round controller — drives sampling, hint requests, guessing and reveal
//! against the panorama, capture and analyzer adapters.
//!
//! All round state sits behind one async mutex. The lock is never held
//! across provider or analyzer I/O, so hint requests for different contexts
//! run concurrently and replies land in completion order.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::analyzer::{Analysis, HintAnalyzer};
use crate::capture::{CapturedView, ViewCapture};
use crate::errors::{GameError, Result};
use crate::geo::{sample_point, GeoPoint};
use crate::guess_map::{BoardSnapshot, GuessBoard};
use crate::hints::{ContextTag, Hint};
use crate::notifications::{Level, Notification, NotificationFeed};
use crate::panorama::{PanoramaSource, PoseUpdate, ViewerState};
use crate::round::{Completion, Phase, Round, RoundResult};
use crate::screenshots::ScreenshotStore;

pub const ANALYZE_FAILED_MESSAGE: &str = "Failed to analyze view. Please try again.";

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub search_radius_m: u32,
    pub max_sampling_attempts: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            search_radius_m: 50_000,
            max_sampling_attempts: 30,
        }
    }
}

/// Per-context count of requests still waiting on the analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct Loading {
    pub context: ContextTag,
    pub requests: u32,
}

/// What the page needs to render the round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub phase: &'static str,
    pub hints: Vec<Hint>,
    pub loading: Vec<Loading>,
    pub pending_guess: Option<GeoPoint>,
    pub result: Option<RoundResult>,
    pub sampling_attempts: u32,
    pub viewer: Option<ViewerState>,
    pub map: BoardSnapshot,
    pub latest_notification: u64,
}

/// Result of one hint request.
#[derive(Debug, Clone)]
pub enum HintOutcome {
    Added(Hint),
    /// The analyzer saw nothing of the requested context.
    NoFeatures,
    /// The analyzer replied with blank text.
    Empty,
    /// Capture or analysis failed; the round is unchanged.
    Failed(String),
    /// The round moved on while the request was in flight.
    Stale,
    /// No round is being played.
    Ignored,
}

struct Session {
    round: Round,
    board: GuessBoard,
    notifications: NotificationFeed,
}

pub struct GameController<P, C, A> {
    panorama: P,
    capture: C,
    analyzer: A,
    screenshots: Option<ScreenshotStore>,
    settings: ControllerSettings,
    session: Mutex<Session>,
}

impl<P, C, A> GameController<P, C, A>
where
    P: PanoramaSource,
    C: ViewCapture,
    A: HintAnalyzer,
{
    pub fn new(panorama: P, capture: C, analyzer: A, settings: ControllerSettings) -> Self {
        Self {
            panorama,
            capture,
            analyzer,
            screenshots: None,
            settings,
            session: Mutex::new(Session {
                round: Round::new(),
                board: GuessBoard::new(),
                notifications: NotificationFeed::new(),
            }),
        }
    }

    /// Keep a copy of every captured view in `store`.
    pub fn with_screenshots(mut self, store: ScreenshotStore) -> Self {
        self.screenshots = Some(store);
        self
    }

    pub fn panorama(&self) -> &P {
        &self.panorama
    }

    // ─────────────────────────────────────────────────────
    // Round lifecycle
    // ─────────────────────────────────────────────────────

    /// First round, once the page's widgets are ready. No-op unless idle.
    pub async fn start_round(&self) -> Result<RoundSnapshot> {
        self.sample_round(|phase| matches!(phase, Phase::Idle)).await
    }

    /// Next round after a reveal. No-op in any other phase, which also makes
    /// repeated "next" clicks collapse into one reset.
    pub async fn next_round(&self) -> Result<RoundSnapshot> {
        self.sample_round(|phase| matches!(phase, Phase::Revealed { .. })).await
    }

    async fn sample_round(&self, allowed: fn(&Phase) -> bool) -> Result<RoundSnapshot> {
        let round_id = {
            let mut session = self.session.lock().await;
            if !allowed(session.round.phase()) {
                return Ok(self.snapshot_of(&session));
            }
            let Some(id) = session.round.begin_sampling() else {
                return Ok(self.snapshot_of(&session));
            };
            session.board.reset();
            id
        };
        info!("Round {round_id}: sampling");

        let max_attempts = self.settings.max_sampling_attempts.max(1);
        for attempt in 1..=max_attempts {
            let candidate = sample_point(&mut rand::thread_rng());
            self.session.lock().await.round.record_attempt(round_id);

            match self
                .panorama
                .find_outdoor_near(candidate, self.settings.search_radius_m)
                .await
            {
                Ok(Some(position)) => {
                    let mut session = self.session.lock().await;
                    if session.round.finish_sampling(round_id, position) {
                        self.panorama.set_viewer(position, 0.0, 0.0);
                        info!("Round {round_id}: playing after {attempt} attempt(s)");
                    }
                    return Ok(self.snapshot_of(&session));
                }
                Ok(None) => {
                    debug!(
                        "Attempt {attempt}: no outdoor panorama near ({:.3}, {:.3})",
                        candidate.lat, candidate.lng
                    );
                }
                Err(e @ GameError::ProviderRejected(_)) => {
                    return Err(self.fail_sampling(round_id, e).await);
                }
                Err(e) => {
                    warn!("Attempt {attempt}: panorama lookup failed: {e}");
                }
            }
        }

        let err = GameError::SamplingExhausted {
            attempts: max_attempts,
        };
        Err(self.fail_sampling(round_id, err).await)
    }

    /// Back to idle with an error notice; hands `err` back for the caller.
    async fn fail_sampling(&self, round_id: u64, err: GameError) -> GameError {
        let mut session = self.session.lock().await;
        session.round.abort_sampling(round_id);
        error!("Round {round_id}: {err}");
        session.notifications.push(Level::Error, err.to_string(), None);
        err
    }

    // ─────────────────────────────────────────────────────
    // Hints
    // ─────────────────────────────────────────────────────

    /// Capture the current view and ask the analyzer about `context`.
    pub async fn request_hint(&self, context: ContextTag) -> HintOutcome {
        let (round_id, view) = {
            let mut session = self.session.lock().await;
            match session.round.hint_started(context) {
                Some(id) => (id, self.panorama.viewer()),
                None => return HintOutcome::Ignored,
            }
        };
        debug!("Round {round_id}: hint requested for {context}");

        let reply = self.capture_and_analyze(&view, context).await;

        let mut session = self.session.lock().await;
        let (hint, outcome) = match reply {
            Ok((shot, saved_path, Analysis::Described(description))) => {
                let hint = Hint {
                    context,
                    image_url: shot.data_url,
                    saved_path,
                    description,
                    created_at: Utc::now(),
                };
                (Some(hint.clone()), HintOutcome::Added(hint))
            }
            Ok((_, _, Analysis::NoFeatures)) => (None, HintOutcome::NoFeatures),
            Ok((_, _, Analysis::Empty)) => (None, HintOutcome::Empty),
            Err(e) => {
                warn!("Round {round_id}: analysis for {context} failed: {e}");
                (None, HintOutcome::Failed(e.to_string()))
            }
        };

        if session.round.hint_finished(round_id, context, hint) == Completion::Stale {
            debug!("Round {round_id}: dropping late {context} reply");
            return HintOutcome::Stale;
        }

        match &outcome {
            HintOutcome::NoFeatures => {
                session
                    .notifications
                    .push(Level::Info, format!("No {context} features detected"), Some(context));
            }
            HintOutcome::Failed(_) => {
                session
                    .notifications
                    .push(Level::Error, ANALYZE_FAILED_MESSAGE, Some(context));
            }
            _ => {}
        }
        outcome
    }

    async fn capture_and_analyze(
        &self,
        view: &ViewerState,
        context: ContextTag,
    ) -> Result<(CapturedView, Option<String>, Analysis)> {
        let shot = self.capture.capture(view).await?;

        let saved_path = match &self.screenshots {
            Some(store) => match store.save_bytes(&shot.bytes).await {
                Ok(path) => Some(path),
                Err(e) => {
                    error!("Error saving screenshot: {e}");
                    None
                }
            },
            None => None,
        };

        let analysis = self.analyzer.analyze(&shot, context).await?;
        Ok((shot, saved_path, analysis))
    }

    // ─────────────────────────────────────────────────────
    // Guessing
    // ─────────────────────────────────────────────────────

    /// Place or move the pending guess marker.
    pub async fn place_guess(&self, guess: GeoPoint) -> Result<RoundSnapshot> {
        if !guess.is_valid() {
            return Err(GameError::InvalidCoordinate {
                lat: guess.lat,
                lng: guess.lng,
            });
        }
        let guess = guess.canonical();
        let mut session = self.session.lock().await;
        if !session.board.is_frozen() && session.round.place_guess(guess) {
            session.board.place_pending(guess);
        }
        Ok(self.snapshot_of(&session))
    }

    /// Score the pending guess and reveal the truth on the map.
    pub async fn submit_guess(&self) -> RoundSnapshot {
        let mut session = self.session.lock().await;
        if let Some(result) = session.round.submit() {
            session.board.reveal(result.true_position);
            info!(
                "Round {}: revealed, {:.1} km off, score {}%",
                session.round.id(),
                result.distance_km,
                result.score_percent
            );
        }
        self.snapshot_of(&session)
    }

    // ─────────────────────────────────────────────────────
    // Widgets and reads
    // ─────────────────────────────────────────────────────

    pub async fn update_pose(&self, update: PoseUpdate) -> RoundSnapshot {
        let session = self.session.lock().await;
        if matches!(session.round.phase(), Phase::Playing { .. } | Phase::Revealed { .. }) {
            self.panorama.update_pose(update);
        }
        self.snapshot_of(&session)
    }

    pub async fn set_map_expanded(&self, expanded: bool) -> RoundSnapshot {
        let mut session = self.session.lock().await;
        session.board.set_expanded(expanded);
        self.snapshot_of(&session)
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        let session = self.session.lock().await;
        self.snapshot_of(&session)
    }

    pub async fn notifications_since(&self, after: u64) -> Vec<Notification> {
        self.session.lock().await.notifications.since(after)
    }

    fn snapshot_of(&self, session: &Session) -> RoundSnapshot {
        let round = &session.round;
        let pending_guess = match round.phase() {
            Phase::Playing { pending_guess, .. } => *pending_guess,
            Phase::Revealed { result, .. } => Some(result.guess_position),
            _ => None,
        };
        RoundSnapshot {
            round_id: round.id(),
            phase: round.phase().label(),
            hints: round.hints().to_vec(),
            loading: round
                .in_flight()
                .iter()
                .map(|(context, requests)| Loading {
                    context: *context,
                    requests: *requests,
                })
                .collect(),
            pending_guess,
            result: round.result().copied(),
            sampling_attempts: round.sampling_attempts(),
            viewer: round.true_position().map(|_| self.panorama.viewer()),
            map: session.board.snapshot(),
            latest_notification: session.notifications.latest_seq(),
        }
    }
}
