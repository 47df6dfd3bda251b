use std::collections::BTreeMap;

use serde::Serialize;

use crate::geo::{haversine_km, score_for_distance, GeoPoint};
use crate::hints::{ContextTag, Hint};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoundResult {
    pub true_position: GeoPoint,
    pub guess_position: GeoPoint,
    pub distance_km: f64,
    pub score_percent: u8,
}

impl RoundResult {
    pub fn score(true_position: GeoPoint, guess_position: GeoPoint) -> Self {
        let distance_km = haversine_km(true_position, guess_position);
        Self {
            true_position,
            guess_position,
            distance_km,
            score_percent: score_for_distance(distance_km),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Sampling,
    Playing {
        true_position: GeoPoint,
        pending_guess: Option<GeoPoint>,
    },
    Revealed {
        true_position: GeoPoint,
        result: RoundResult,
    },
}

impl Phase {
    /// Wire label. A playing round with a pending guess reads as
    /// `awaiting_guess`.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Sampling => "sampling",
            Phase::Playing {
                pending_guess: None,
                ..
            } => "playing",
            Phase::Playing {
                pending_guess: Some(_),
                ..
            } => "awaiting_guess",
            Phase::Revealed { .. } => "revealed",
        }
    }
}

/// What happened to a hint reply when it came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Counted against the live round.
    Applied,
    /// The round it was issued for is gone; dropped.
    Stale,
}

/// The single live round.
#[derive(Debug)]
pub struct Round {
    id: u64,
    phase: Phase,
    /// Newest first.
    hints: Vec<Hint>,
    in_flight: BTreeMap<ContextTag, u32>,
    sampling_attempts: u32,
}

impl Default for Round {
    fn default() -> Self {
        Self::new()
    }
}

impl Round {
    pub fn new() -> Self {
        Self {
            id: 0,
            phase: Phase::Idle,
            hints: Vec::new(),
            in_flight: BTreeMap::new(),
            sampling_attempts: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn hints(&self) -> &[Hint] {
        &self.hints
    }

    pub fn in_flight(&self) -> &BTreeMap<ContextTag, u32> {
        &self.in_flight
    }

    pub fn sampling_attempts(&self) -> u32 {
        self.sampling_attempts
    }

    pub fn result(&self) -> Option<&RoundResult> {
        match &self.phase {
            Phase::Revealed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Enter `Sampling` from `Idle` or `Revealed`, clearing everything the
    /// previous round owned. Returns the new round id, or `None` when a
    /// round is already being sampled or played.
    pub fn begin_sampling(&mut self) -> Option<u64> {
        if !matches!(self.phase, Phase::Idle | Phase::Revealed { .. }) {
            return None;
        }
        self.id += 1;
        self.phase = Phase::Sampling;
        self.hints.clear();
        self.in_flight.clear();
        self.sampling_attempts = 0;
        Some(self.id)
    }

    pub fn record_attempt(&mut self, round_id: u64) {
        if round_id == self.id {
            self.sampling_attempts += 1;
        }
    }

    /// `Sampling` → `Playing` at a confirmed panorama location.
    pub fn finish_sampling(&mut self, round_id: u64, true_position: GeoPoint) -> bool {
        if round_id != self.id || self.phase != Phase::Sampling {
            return false;
        }
        self.phase = Phase::Playing {
            true_position,
            pending_guess: None,
        };
        true
    }

    /// Give up on sampling and fall back to `Idle`.
    pub fn abort_sampling(&mut self, round_id: u64) -> bool {
        if round_id != self.id || self.phase != Phase::Sampling {
            return false;
        }
        self.phase = Phase::Idle;
        true
    }

    /// Set (or replace) the pending guess while playing.
    pub fn place_guess(&mut self, guess: GeoPoint) -> bool {
        match &mut self.phase {
            Phase::Playing { pending_guess, .. } => {
                *pending_guess = Some(guess);
                true
            }
            _ => false,
        }
    }

    /// Score the pending guess and move to `Revealed`. No-op without a
    /// pending guess or outside `Playing`.
    pub fn submit(&mut self) -> Option<RoundResult> {
        let Phase::Playing {
            true_position,
            pending_guess: Some(guess),
        } = self.phase
        else {
            return None;
        };
        let result = RoundResult::score(true_position, guess);
        self.phase = Phase::Revealed {
            true_position,
            result,
        };
        Some(result)
    }

    /// Register an outgoing hint request. Only a playing round accepts them.
    pub fn hint_started(&mut self, context: ContextTag) -> Option<u64> {
        if !matches!(self.phase, Phase::Playing { .. }) {
            return None;
        }
        *self.in_flight.entry(context).or_insert(0) += 1;
        Some(self.id)
    }

    /// Settle a hint request. A hint is prepended only when the reply
    /// belongs to the live round; replies that land after submission are
    /// still kept.
    pub fn hint_finished(&mut self, round_id: u64, context: ContextTag, hint: Option<Hint>) -> Completion {
        if round_id != self.id {
            return Completion::Stale;
        }
        if let Some(count) = self.in_flight.get_mut(&context) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(&context);
            }
        }
        if let Some(hint) = hint {
            self.hints.insert(0, hint);
        }
        Completion::Applied
    }

    pub fn true_position(&self) -> Option<GeoPoint> {
        match self.phase {
            Phase::Playing { true_position, .. } | Phase::Revealed { true_position, .. } => {
                Some(true_position)
            }
            _ => None,
        }
    }
}
