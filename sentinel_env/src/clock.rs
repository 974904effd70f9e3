//! Media clock abstraction for the playback engine.

use async_trait::async_trait;
use crate::error::EnvError;
use std::time::Duration;

/// The source of "native" media-clock updates.
///
/// This trait abstracts the real player clock so that the playback engine
/// can run against wall-clock time in production and against a virtual
/// clock in deterministic replays.
///
/// # Implementations
///
/// - **Production**: `TokioClock` - wraps `tokio::time`
/// - **Replay**: `VirtualClock` in `sentinel_replay` - advances on `sleep`
#[async_trait]
pub trait MediaClock: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In replay: advances the virtual clock immediately
    async fn sleep(&self, duration: Duration);
}

/// Converts a tick frequency into the interval between clock updates.
pub fn tick_interval(rate_hz: f64) -> Result<Duration, EnvError> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        return Err(EnvError::InvalidTickRate(rate_hz));
    }
    Ok(Duration::from_secs_f64(1.0 / rate_hz))
}
