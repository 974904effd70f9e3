//! Production implementation of MediaClock using Tokio.

use crate::MediaClock;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production clock backed by Tokio timers.
///
/// Time comes from the monotonic system clock.
pub struct TokioClock {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioClock {
    /// Creates a new TokioClock.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    
    /// Creates an Arc-wrapped clock for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaClock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
