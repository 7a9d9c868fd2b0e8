use std::time::{Duration, Instant};

/// Last-send throttle for live recognition.
///
/// Owned by one [`RecognitionLoop`](super::recognition_loop::RecognitionLoop),
/// so separate loops never share a window. A refused send is dropped by
/// the caller, never queued.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.interval,
        }
    }

    /// Records a send at `now` if the interval has elapsed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.last_sent = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
