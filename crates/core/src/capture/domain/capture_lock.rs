use std::time::{Duration, Instant};

/// Time-expiring mutex guarding capture admission.
///
/// Once acquired it stays held for exactly `duration`, whatever happens to
/// the capture it admitted. Expiry is evaluated against the caller's clock,
/// so no timer thread is involved.
#[derive(Clone, Debug)]
pub struct CaptureLock {
    acquired_at: Option<Instant>,
    duration: Duration,
}

impl CaptureLock {
    pub fn new(duration: Duration) -> Self {
        Self {
            acquired_at: None,
            duration,
        }
    }

    pub fn is_held(&self, now: Instant) -> bool {
        self.acquired_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.duration)
    }

    pub fn acquired_at(&self) -> Option<Instant> {
        self.acquired_at
    }

    /// Takes the lock unless it is still held.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_held(now) {
            return false;
        }
        self.acquired_at = Some(now);
        true
    }

    /// Time left before the lock releases itself.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.acquired_at
            .map(|at| self.duration.saturating_sub(now.saturating_duration_since(at)))
            .unwrap_or(Duration::ZERO)
    }

    pub fn clear(&mut self) {
        self.acquired_at = None;
    }
}
