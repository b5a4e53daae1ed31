//! Transient notification banner with a fixed auto-dismiss window.
//!
//! Every recoverable error and the completion banner go through this
//! channel; the runtime's tick events drive expiry.

use std::time::{Duration, Instant};

pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    shown_at: Instant,
}

/// Holds at most one notice; a newer one replaces the current.
#[derive(Debug)]
pub struct Notifier {
    current: Option<Notice>,
    ttl: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(NOTICE_TTL)
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    pub fn show(&mut self, message: impl Into<String>) {
        self.current = Some(Notice {
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    /// Drop the notice once its display window has passed. Called on ticks.
    pub fn sweep(&mut self, now: Instant) {
        if let Some(notice) = &self.current {
            if now.duration_since(notice.shown_at) >= self.ttl {
                self.current = None;
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.message.as_str())
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
