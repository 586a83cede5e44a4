//! Rolling one-second byte counter used for bandwidth accounting.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the rolling bandwidth window.
pub const WINDOW: Duration = Duration::from_secs(1);

/// Rolling one-second byte counter.
#[derive(Debug, Default)]
pub struct BandwidthWindow {
    events: VecDeque<(Instant, usize)>,
    total: usize,
}

impl BandwidthWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now: Instant, bytes: usize) {
        if bytes == 0 {
            return;
        }
        self.expire(now);
        self.events.push_back((now, bytes));
        self.total += bytes;
    }

    /// Bytes recorded within the last [`WINDOW`].
    pub fn used(&mut self, now: Instant) -> usize {
        self.expire(now);
        self.total
    }

    /// Bytes that may still go out under `limit` right now.
    pub fn available(&mut self, now: Instant, limit: usize) -> usize {
        limit.saturating_sub(self.used(now))
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&(t, n)) = self.events.front() {
            if now.saturating_duration_since(t) < WINDOW {
                break;
            }
            self.events.pop_front();
            self.total -= n;
        }
    }
}
