//! Run-completion stage counter
//!
//! A monotonically increasing counter shared between the driver thread
//! and the operation tasks. Waiters re-validate the value after every
//! wake, so a wait never returns without a real change and concurrent
//! bumps cannot be lost.

use tokio::sync::watch;

/// Monotonic counter with change notification.
pub struct StageCounter {
    tx: watch::Sender<u64>,
}

impl StageCounter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Non-blocking read of the current stage.
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Increments the stage and wakes all waiters.
    pub fn bump(&self) {
        self.tx.send_modify(|stage| *stage += 1);
    }

    /// Suspends until the stage differs from `last_observed`, then
    /// returns the new value. Returns immediately if it already
    /// differs.
    pub async fn wait_for_change(&self, last_observed: u64) -> u64 {
        let mut rx = self.tx.subscribe();
        let changed = rx
            .wait_for(|stage| *stage != last_observed)
            .await
            .expect("stage sender alive for the lifetime of the counter");
        *changed
    }
}

impl Default for StageCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn starts_at_zero_and_bumps_monotonically() {
        let stage = StageCounter::new();
        assert_eq!(stage.current(), 0);

        stage.bump();
        stage.bump();
        assert_eq!(stage.current(), 2);
    }

    #[tokio::test]
    async fn wait_returns_only_after_a_real_change() {
        let stage = Arc::new(StageCounter::new());
        let last = stage.current();

        let bumper = Arc::clone(&stage);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            bumper.bump();
        });

        let new_stage = stage.wait_for_change(last).await;
        assert_ne!(new_stage, last);
        assert_eq!(new_stage, 1);
    }

    #[tokio::test]
    async fn wait_observes_change_that_raced_ahead_of_it() {
        let stage = StageCounter::new();
        let last = stage.current();
        stage.bump();

        // The change happened before the wait started; it must still
        // be observed rather than lost.
        let new_stage = stage.wait_for_change(last).await;
        assert_eq!(new_stage, 1);
    }

    #[tokio::test]
    async fn concurrent_bumps_are_not_lost() {
        let stage = Arc::new(StageCounter::new());
        const BUMPERS: u64 = 16;

        let mut handles = Vec::new();
        for _ in 0..BUMPERS {
            let bumper = Arc::clone(&stage);
            handles.push(tokio::spawn(async move {
                bumper.bump();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(stage.current(), BUMPERS);

        let mut observed = 0;
        while observed < BUMPERS {
            observed = stage.wait_for_change(observed).await;
        }
        assert_eq!(observed, BUMPERS);
    }
}
