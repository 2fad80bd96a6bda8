//! Wall-clock sources for the deferred scheduler.

use chrono::{DateTime, Utc};

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock driven by tokio's timer.
///
/// Starts at `origin` and advances with `tokio::time::Instant`, so under a
/// paused runtime it only moves when sleeps are auto-advanced.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().duration_since(self.start);
        self.origin + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let origin = Utc::now();
        let clock = TokioClock::new(origin);
        assert_eq!(clock.now(), origin);
        tokio::time::sleep(std::time::Duration::from_secs(90)).await;
        let elapsed = clock.now() - origin;
        assert!(elapsed >= chrono::Duration::seconds(90));
        assert!(elapsed < chrono::Duration::seconds(91));
    }
}
