//! Common types for the Sentinel environment abstraction.

use serde::{Deserialize, Serialize};

/// One native media-clock update.
///
/// `seq` increases by one for every published tick, which lets a consumer
/// that only ever sees the latest value count how many were superseded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Publication sequence number (starts at 0)
    pub seq: u64,
    
    /// Media position in seconds
    pub media_time: f64,
}

impl Tick {
    /// Creates a tick.
    pub fn new(seq: u64, media_time: f64) -> Self {
        Self { seq, media_time }
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{:.3}s", self.seq, self.media_time)
    }
}
