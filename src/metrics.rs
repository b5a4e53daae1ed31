//! Pure wpm/accuracy math, recomputed on every input event.
//!
//! Both figures are defined as 0 whenever their denominator is zero; the
//! raw division never leaks a NaN or infinity to callers.

/// Derived per-keystroke figures. Never persisted mid-session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub typed_count: usize,
    pub correct_count: usize,
    pub wpm: u16,
    pub accuracy: u16,
}

impl SessionMetrics {
    pub fn compute(correct_count: usize, typed_count: usize, elapsed_ms: u64) -> Self {
        Self {
            typed_count,
            correct_count,
            wpm: wpm(correct_count, elapsed_ms),
            accuracy: accuracy(correct_count, typed_count),
        }
    }
}

/// Words per minute: correct chars / 5, over elapsed minutes.
pub fn wpm(correct_count: usize, elapsed_ms: u64) -> u16 {
    let elapsed_mins = elapsed_ms as f64 / 60_000.0;
    let raw = (correct_count as f64 / 5.0 / elapsed_mins).round();
    if raw.is_finite() {
        raw as u16
    } else {
        0
    }
}

/// Percentage of typed chars matching the passage, 0-100.
pub fn accuracy(correct_count: usize, typed_count: usize) -> u16 {
    if typed_count == 0 {
        return 0;
    }
    ((correct_count as f64 / typed_count as f64) * 100.0).round() as u16
}
