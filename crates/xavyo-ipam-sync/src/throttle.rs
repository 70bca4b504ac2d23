//! Request pacing shared by every call of one client.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::trace;

/// Enforces a minimum interval between consecutive requests.
///
/// Clones share the same gate, so every request issued through one client
/// during a cycle is paced together.
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RequestThrottle {
    /// Create a throttle with the given minimum interval in milliseconds.
    /// `0` disables pacing.
    #[must_use]
    pub fn new(rate_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(rate_ms),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// A throttle that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Whether the throttle ever waits.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Wait until the next request may be sent.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }

        // Held across the sleep so concurrent callers queue up behind each other.
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                trace!(wait_ms = wait.as_millis(), "Throttling IPAM request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::disabled()
    }
}
