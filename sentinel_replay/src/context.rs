//! Virtual media clock for deterministic replays.

use async_trait::async_trait;
use sentinel_env::MediaClock;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A media clock that only moves when someone sleeps on it.
///
/// `sleep` advances virtual time immediately, so a replay of a two-minute
/// asset completes in milliseconds. Yielding alone does not order the
/// producer against a consumer on another worker; replays pair this clock
/// with a lockstep tick feed (`TickPublisher::wait_consumed`).
#[derive(Debug, Default)]
pub struct VirtualClock {
    /// Nanoseconds since replay start
    virtual_time_ns: Arc<Mutex<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped clock for sharing with the tick producer.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.lock();
        *time = time.saturating_add(duration.as_nanos() as u64);
    }

    pub fn set_time(&self, time_ns: u64) {
        *self.lock() = time_ns;
    }

    pub fn time_ns(&self) -> u64 {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        // A plain integer cannot be left half-written
        self.virtual_time_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for VirtualClock {
    fn clone(&self) -> Self {
        Self {
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl MediaClock for VirtualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }
}
