//! The typing-session engine: owns the current passage, the typed-so-far
//! buffer, and the timing state, and reclassifies every character on each
//! input event.
//!
//! The engine is synchronous and single-owner; asynchronous collaborators
//! (passage fetch, stats writes) live outside and re-enter through the event
//! loop, which checks [`Session::generation`] before applying a fetched
//! passage so a stale completion can never clobber a newer session.

use crate::metrics::SessionMetrics;
use std::time::SystemTime;

/// Classification of one passage index for display purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharState {
    Untyped,
    Correct,
    Incorrect,
    /// Marks the next index expected to be typed. Always an otherwise
    /// untyped cell, so it never overrides a settled correctness flag.
    Cursor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No passage loaded.
    Idle,
    /// Passage loaded, timer unset.
    AwaitingFirstKeystroke,
    /// Timer running, partial match.
    InProgress,
    /// Full exact match; input is ignored until the next passage loads.
    Completed,
}

#[derive(Debug)]
pub struct Session {
    passage: Vec<char>,
    typed: Vec<char>,
    started_at: Option<SystemTime>,
    phase: Phase,
    generation: u64,
    metrics: SessionMetrics,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            passage: Vec::new(),
            typed: Vec::new(),
            started_at: None,
            phase: Phase::Idle,
            generation: 0,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn with_passage(text: &str) -> Self {
        let mut session = Self::new();
        session.load_passage(text);
        session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn passage(&self) -> &[char] {
        &self.passage
    }

    pub fn passage_str(&self) -> String {
        self.passage.iter().collect()
    }

    pub fn typed(&self) -> &[char] {
        &self.typed
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at
            .and_then(|t| t.elapsed().ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Replace the passage wholesale and start a fresh session over it.
    /// Bumps the generation so in-flight work keyed to the old passage is
    /// recognizably stale.
    pub fn load_passage(&mut self, text: &str) {
        self.passage = text.chars().collect();
        self.generation += 1;
        self.clear_progress();
    }

    /// Forces `AwaitingFirstKeystroke` with empty typed state and unset
    /// timer, keeping the current passage. Also bumps the generation so a
    /// pending next-passage load is superseded.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.clear_progress();
    }

    fn clear_progress(&mut self) {
        self.typed.clear();
        self.started_at = None;
        self.metrics = SessionMetrics::default();
        self.phase = if self.passage.is_empty() {
            Phase::Idle
        } else {
            Phase::AwaitingFirstKeystroke
        };
    }

    /// One keystroke: append `c` to the typed buffer and reclassify.
    pub fn push_char(&mut self, c: char) {
        if self.phase == Phase::Completed || self.phase == Phase::Idle {
            return;
        }
        self.typed.push(c);
        self.refresh();
    }

    /// Backspace: drop the last typed char and reclassify.
    pub fn pop_char(&mut self) {
        if self.phase == Phase::Completed || self.phase == Phase::Idle {
            return;
        }
        if self.typed.pop().is_some() {
            self.refresh();
        }
    }

    /// Replace the whole typed buffer in one event (equivalent to the same
    /// chars arriving as individual keystrokes) and reclassify.
    pub fn set_typed(&mut self, typed: &str) {
        if self.phase == Phase::Completed || self.phase == Phase::Idle {
            return;
        }
        self.typed = typed.chars().collect();
        self.refresh();
    }

    /// Settle timing, metrics, and phase after any typed-buffer mutation.
    fn refresh(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(SystemTime::now());
        }
        self.phase = Phase::InProgress;

        let correct_count = self
            .typed
            .iter()
            .zip(self.passage.iter())
            .filter(|(t, p)| t == p)
            .count();

        self.metrics = SessionMetrics::compute(correct_count, self.typed.len(), self.elapsed_ms());

        // Exact full-sequence equality, not cursor-reached-end: a trailing
        // incorrect char must not complete the session.
        if self.typed == self.passage {
            self.phase = Phase::Completed;
        }
    }

    /// Per-index classification of the passage. Indices before the typed
    /// length are Correct/Incorrect by exact char equality; the index at the
    /// typed length carries the cursor; everything beyond is Untyped. Typed
    /// input past the passage end produces no extra cells.
    pub fn char_states(&self) -> Vec<CharState> {
        let mut states: Vec<CharState> = self
            .passage
            .iter()
            .enumerate()
            .map(|(i, p)| match self.typed.get(i) {
                None => CharState::Untyped,
                Some(t) if t == p => CharState::Correct,
                Some(_) => CharState::Incorrect,
            })
            .collect();

        if self.typed.len() < self.passage.len() {
            states[self.typed.len()] = CharState::Cursor;
        }

        states
    }
}
