//! Stub servers and adapter fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;

use crate::analyzer::{Analysis, HintAnalyzer};
use crate::capture::{CapturedView, ViewCapture};
use crate::errors::{GameError, Result};
use crate::geo::GeoPoint;
use crate::hints::ContextTag;
use crate::panorama::{PanoramaSource, PoseUpdate, ViewerState};

/// Serve `router` on an ephemeral localhost port; returns its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Panorama source that replays scripted lookups, then reports no coverage.
#[derive(Default)]
pub struct FakePanorama {
    script: Mutex<VecDeque<Option<GeoPoint>>>,
    calls: AtomicU32,
    viewer: Mutex<ViewerState>,
}

impl FakePanorama {
    pub fn scripted(script: impl IntoIterator<Item = Option<GeoPoint>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn push(&self, next: Option<GeoPoint>) {
        self.script.lock().unwrap().push_back(next);
    }
}

impl PanoramaSource for FakePanorama {
    async fn find_outdoor_near(&self, _candidate: GeoPoint, _radius_m: u32) -> Result<Option<GeoPoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().pop_front().flatten())
    }

    fn set_viewer(&self, position: GeoPoint, heading: f64, pitch: f64) {
        let mut v = self.viewer.lock().unwrap();
        v.position = position;
        v.heading = heading;
        v.pitch = pitch;
    }

    fn viewer(&self) -> ViewerState {
        *self.viewer.lock().unwrap()
    }

    fn update_pose(&self, update: PoseUpdate) {
        self.viewer.lock().unwrap().apply(update);
    }
}

/// Capture that returns a fixed tiny JPEG header.
#[derive(Default)]
pub struct FakeCapture {
    pub fail: bool,
}

impl ViewCapture for FakeCapture {
    async fn capture(&self, _view: &ViewerState) -> Result<CapturedView> {
        if self.fail {
            return Err(GameError::CaptureStatus(500));
        }
        Ok(CapturedView::new(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg"))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Text(&'static str),
    Sentinel,
    Fail,
}

/// Analyzer with a scripted reply and delay per context.
#[derive(Default)]
pub struct FakeAnalyzer {
    replies: HashMap<ContextTag, (Duration, Reply)>,
}

impl FakeAnalyzer {
    pub fn reply(mut self, context: ContextTag, delay_ms: u64, reply: Reply) -> Self {
        self.replies
            .insert(context, (Duration::from_millis(delay_ms), reply));
        self
    }
}

impl HintAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _image: &CapturedView, context: ContextTag) -> Result<Analysis> {
        let (delay, reply) = self
            .replies
            .get(&context)
            .copied()
            .unwrap_or((Duration::ZERO, Reply::Text("somewhere")));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Text(text) => Ok(crate::analyzer::interpret(Some(text))),
            Reply::Sentinel => Ok(crate::analyzer::interpret(Some("invalid"))),
            Reply::Fail => Err(GameError::AnalyzerStatus(500)),
        }
    }
}
