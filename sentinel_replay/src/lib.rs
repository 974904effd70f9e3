//! Sentinel Deterministic Replay Harness
//!
//! Runs the playback engine against a controlled media clock so a whole
//! asset can be replayed, inspected and exported without a player.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  publish(t)  ┌──────────────┐  follow()  ┌─────────────────────┐
//! │ VirtualClock  │─────────────►│  tick feed   │───────────►│ PlaybackCoordinator │
//! │ (or Tokio)    │              │ latest wins  │            │  + TemporalResolver │
//! └───────────────┘              └──────────────┘            └──────────┬──────────┘
//!                                                                       │ updates
//!                       ┌──────────────────┐                 ┌──────────▼──────────┐
//!                       │ SyntheticSource  │── payload ──►   │ OverlayScene        │
//!                       │ (seeded ChaCha8) │   (load)        │ → ReplayExport      │
//!                       └──────────────────┘                 └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sentinel_replay::{ReplayConfig, ReplayRunner, ReplaySource};
//!
//! let config = ReplayConfig {
//!     seed: 42,
//!     duration_override: Some(30.0),
//!     ..Default::default()
//! };
//!
//! let outcome = ReplayRunner::new(config).run(ReplaySource::Synthetic).await?;
//! outcome.export.write_to_file("replay.json")?;
//! ```

mod context;
mod error;
mod exporter;
mod runner;
mod synthetic;

pub use context::VirtualClock;
pub use error::ReplayError;
pub use exporter::{ReplayExport, ReplayFrame};
pub use runner::{ReplayConfig, ReplayOutcome, ReplayReport, ReplayRunner, ReplaySource};
pub use synthetic::{SyntheticConfig, SyntheticSource};
