//! Sentinel Core - Temporal Annotation Sync & Overlay Projection
//!
//! Keeps machine-generated annotations locked to a media playhead:
//! 1. **Timeline**: validated, time-sorted telemetry, detections and fused segments per asset
//! 2. **Resolution**: nearest-sample lookup with a staleness tolerance
//! 3. **Projection**: normalized boxes to video pixels, lat/lon to map pixels
//! 4. **Playback**: one coordinator owning the playhead and fanning out updates

pub mod error;
pub mod ingest;
pub mod overlay;
pub mod sentinel_playback;
pub mod sentinel_space;
pub mod sentinel_time;
pub mod sentinel_timeline;

// Re-export key types for convenience
pub use error::{ConfigError, PlaybackError, ProjectionError, StreamKind, TimelineError};
pub use ingest::{timeline_from_json, AnalysisPayload};
pub use overlay::{format_clock, OverlayScene, PanelReadout, ThreatLevel};
pub use sentinel_playback::{
    LoadTicket, PlaybackCoordinator, PlaybackMode, PlaybackObserver, PlaybackState, PlaybackUpdate,
    SeekOutcome, SubscriptionId, UpdateCause,
};
pub use sentinel_space::{denormalize_box, BoxOverlay, MapExtent, MapProjection, MapView, PixelRect, Viewport};
pub use sentinel_time::{ResolvedAnnotation, ResolverConfig, TemporalResolver};
pub use sentinel_timeline::{
    AssetTimeline, DetectionSample, FusedSegment, MediaMetadata, NormalizedBox, PayloadShape,
    TelemetrySample, TimelineStore,
};
