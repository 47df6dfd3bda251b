//! Bounded feed of user-facing notices (analyzer failures, empty contexts,
//! sampling give-ups). Clients poll it by sequence number.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hints::ContextTag;

pub const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub seq: u64,
    pub level: Level,
    pub message: String,
    pub context: Option<ContextTag>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct NotificationFeed {
    next_seq: u64,
    items: VecDeque<Notification>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>, context: Option<ContextTag>) -> u64 {
        self.next_seq += 1;
        if self.items.len() == FEED_CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(Notification {
            seq: self.next_seq,
            level,
            message: message.into(),
            context,
            at: Utc::now(),
        });
        self.next_seq
    }

    /// Notifications with `seq > after`, oldest first.
    pub fn since(&self, after: u64) -> Vec<Notification> {
        self.items.iter().filter(|n| n.seq > after).cloned().collect()
    }

    pub fn latest_seq(&self) -> u64 {
        self.next_seq
    }
}
