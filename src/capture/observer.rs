//! Capture-side instrumentation hooks.

use std::sync::Mutex;

use chrono::Utc;
use log::info;

/// Observer attached to the dispatcher.
///
/// Keeps display/metrics concerns out of the capture path itself: the
/// dispatcher reports events, implementations decide what to do with them.
/// `batch_discarded` fires for every batch that is not archived, so no loss
/// is ever silent.
pub trait CaptureObserver: Send + Sync {
    /// An exchange was transcoded and accepted by the archive queue.
    fn exchange_archived(&self, target_uri: &str);
    /// A batch was dropped (transcoding failure or queue closed on submit).
    fn batch_discarded(&self, target_uri: &str);
}

/// Logs the archived-exchange rate once per second.
pub struct RateCounter {
    window: Mutex<(i64, u64)>,
}

impl RateCounter {
    pub fn new() -> Self {
        Self {
            window: Mutex::new((Utc::now().timestamp(), 0)),
        }
    }
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureObserver for RateCounter {
    fn exchange_archived(&self, _target_uri: &str) {
        let now = Utc::now().timestamp();
        // A poisoned window only holds a stale counter; keep counting rather
        // than cascading a panic into capture tasks.
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.0 == now {
            window.1 += 1;
        } else {
            info!("{} req/s", window.1);
            *window = (now, 1);
        }
    }

    fn batch_discarded(&self, _target_uri: &str) {}
}
