//! Guess map model — the markers and connector the page draws on its 2-D
//! map. One board lives for the whole session; rounds reset it rather than
//! replace it, so resizing the widget never loses markers.

use serde::Serialize;

use crate::geo::{geodesic_path, GeoPoint};

/// Segments used to approximate the geodesic connector.
pub const CONNECTOR_SEGMENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerColor {
    Blue,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Guess,
    Truth,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub color: MarkerColor,
    pub position: GeoPoint,
}

/// Static widget options: plain roadmap, no chrome.
#[derive(Debug, Clone, Serialize)]
pub struct MapOptions {
    pub map_type: &'static str,
    pub disable_default_ui: bool,
    pub clickable_icons: bool,
    pub center: GeoPoint,
    pub zoom: u8,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            map_type: "roadmap",
            disable_default_ui: true,
            clickable_icons: false,
            center: GeoPoint::new(0.0, 0.0),
            zoom: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub options: MapOptions,
    pub expanded: bool,
    pub frozen: bool,
    pub markers: Vec<Marker>,
    pub connector: Vec<GeoPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct GuessBoard {
    pending: Option<GeoPoint>,
    truth: Option<GeoPoint>,
    connector: Vec<GeoPoint>,
    frozen: bool,
    expanded: bool,
}

impl GuessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending marker. Ignored once the board is frozen.
    pub fn place_pending(&mut self, position: GeoPoint) -> bool {
        if self.frozen {
            return false;
        }
        self.pending = Some(position);
        true
    }

    pub fn pending(&self) -> Option<GeoPoint> {
        self.pending
    }

    /// Drop the truth marker at `truth`, draw the connector from the pending
    /// marker and freeze clicks. Returns the frozen guess, or `None` when
    /// there is nothing to reveal.
    pub fn reveal(&mut self, truth: GeoPoint) -> Option<GeoPoint> {
        if self.frozen {
            return None;
        }
        let guess = self.pending?;
        self.truth = Some(truth);
        self.connector = geodesic_path(guess, truth, CONNECTOR_SEGMENTS);
        self.frozen = true;
        Some(guess)
    }

    /// Remove every marker and the connector, and accept clicks again.
    pub fn reset(&mut self) {
        self.pending = None;
        self.truth = None;
        self.connector.clear();
        self.frozen = false;
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn markers(&self) -> Vec<Marker> {
        let guess = self.pending.map(|position| Marker {
            kind: MarkerKind::Guess,
            color: MarkerColor::Blue,
            position,
        });
        let truth = self.truth.map(|position| Marker {
            kind: MarkerKind::Truth,
            color: MarkerColor::Red,
            position,
        });
        guess.into_iter().chain(truth).collect()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            options: MapOptions::default(),
            expanded: self.expanded,
            frozen: self.frozen,
            markers: self.markers(),
            connector: self.connector.clone(),
        }
    }
}
