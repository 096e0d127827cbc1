//! Time source used by the governor and the cache
//!
//! Production code runs on [`TokioClock`], which honours tokio's paused test
//! time. Unit tests that need to observe every suspension use `ManualClock`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Injectable clock
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspends the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
