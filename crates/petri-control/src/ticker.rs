//! Elapsed-time ticker.
//!
//! Counts wall time while the engine is running, at a fixed resolution
//! (one second by default). At most one ticker task exists at a time:
//! starting aborts any previous task first, and dropping the ticker aborts
//! the running one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Background counter of elapsed run time.
#[derive(Debug)]
pub struct ElapsedTicker {
    resolution: Duration,
    elapsed_ms: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl ElapsedTicker {
    /// Create a stopped ticker with the given resolution.
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution: resolution.max(Duration::from_millis(1)),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            task: None,
        }
    }

    /// Restart counting from zero. Must be called within a Tokio runtime.
    pub fn start(&mut self) {
        self.stop();
        self.elapsed_ms.store(0, Ordering::Release);

        let elapsed = Arc::clone(&self.elapsed_ms);
        let resolution = self.resolution;
        let step_ms = u64::try_from(resolution.as_millis()).unwrap_or(u64::MAX);
        self.task = Some(tokio::spawn(async move {
            let first = Instant::now()
                .checked_add(resolution)
                .unwrap_or_else(Instant::now);
            let mut interval = tokio::time::interval_at(first, resolution);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let _ = elapsed.fetch_update(Ordering::AcqRel, Ordering::Acquire, |ms| {
                    Some(ms.saturating_add(step_ms))
                });
            }
        }));
    }

    /// Stop counting; the elapsed value is kept.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Stop counting and zero the elapsed value.
    pub fn clear(&mut self) {
        self.stop();
        self.elapsed_ms.store(0, Ordering::Release);
    }

    /// Whether a ticker task is live.
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Whole seconds counted so far.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_ms.load(Ordering::Acquire) / 1_000
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Format seconds as `MM:SS`. Minutes keep growing past 99.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(6_000), "100:00");
    }

    #[tokio::test(start_paused = true)]
    async fn counts_only_while_running() {
        let mut ticker = ElapsedTicker::new(Duration::from_secs(1));
        ticker.start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(ticker.elapsed_seconds(), 3);

        ticker.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticker.elapsed_seconds(), 3);
        assert!(!ticker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_previous_task() {
        let mut ticker = ElapsedTicker::new(Duration::from_secs(1));
        ticker.start();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        ticker.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        // Only the new task counts; a leaked task would have added more.
        assert_eq!(ticker.elapsed_seconds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_zeroes() {
        let mut ticker = ElapsedTicker::new(Duration::from_secs(1));
        ticker.start();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        ticker.clear();
        assert_eq!(ticker.elapsed_seconds(), 0);
    }
}
