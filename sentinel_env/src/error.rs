//! Error types for the Sentinel environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, PartialEq)]
pub enum EnvError {
    /// Every subscriber of a tick feed has been dropped
    #[error("Tick feed closed")]
    FeedClosed,
    
    /// Tick rate must be a positive, finite frequency
    #[error("Invalid tick rate: {0} Hz")]
    InvalidTickRate(f64),
}
