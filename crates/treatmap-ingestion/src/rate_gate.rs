//! Minimum-interval gate shared by every outbound PubTator call.
//!
//! A call that starts within `min_interval` of the previous call's completion
//! sleeps for the remainder (plus optional jitter). The lock is held from the
//! wait through the completion stamp, so callers are strictly serialized.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

pub struct RateGate {
    min_interval: Duration,
    max_jitter: Duration,
    last_completed: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration, max_jitter: Duration) -> Self {
        Self {
            min_interval,
            max_jitter,
            last_completed: Mutex::new(None),
        }
    }

    /// Run `call` once the gate opens and stamp its completion time.
    pub async fn run<F, Fut, T>(&self, call: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last = self.last_completed.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval + self.jitter();
            if ready_at > Instant::now() {
                trace!(wait_ms = (ready_at - Instant::now()).as_millis() as u64, "Rate gate throttling");
                sleep_until(ready_at).await;
            }
        }

        let out = call().await;
        *last = Some(Instant::now());
        out
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
