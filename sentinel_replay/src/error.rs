use sentinel_core::{ConfigError, PlaybackError, ProjectionError, TimelineError};
use sentinel_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Replay speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),

    #[error("Replay duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Invalid position noise: {0}")]
    Noise(#[from] rand_distr::NormalError),

    #[error("Clock task panicked or was cancelled: {0}")]
    Producer(#[from] tokio::task::JoinError),
}
