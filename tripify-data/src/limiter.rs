use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Window {
    count: i64,
    started_at: Instant,
}

/// In-process fixed-window rate limiter keyed by caller identity (client IP).
/// The window resets when its span elapses; within a window the first `max`
/// requests pass and the rest are rejected.
pub struct FixedWindowLimiter {
    max: i64,
    window: Duration,
    hits: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max: i64, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        let mut hits = self.hits.lock().await;
        let now = Instant::now();
        let entry = hits.entry(key.to_string()).or_insert(Window {
            count: 0,
            started_at: now,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        entry.count += 1;
        entry.count <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_max_then_rejects() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);

        // other clients have their own window
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn window_reset_readmits_the_client() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("c").await);
        assert!(!limiter.check("c").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.check("c").await);
    }
}
