//! Error types for the Sentinel engines.
//!
//! Only loading and configuration can fail. Resolution never does: a query
//! with nothing nearby yields `None`, which is data, not an error.

use thiserror::Error;

/// Which time-indexed stream an input error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Telemetry,
    Detection,
    Segment,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamKind::Telemetry => "telemetry",
            StreamKind::Detection => "detection",
            StreamKind::Segment => "segment",
        };
        f.write_str(name)
    }
}

/// Load-time validation failures. Fatal to the load that produced them,
/// never to a previously loaded timeline.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("{stream} #{index}: time {time} is not a finite number")]
    NonFiniteTime {
        stream: StreamKind,
        index: usize,
        time: f64,
    },

    #[error("{stream} #{index}: time {time} is negative")]
    NegativeTime {
        stream: StreamKind,
        index: usize,
        time: f64,
    },

    #[error("segment '{id}': end {end} precedes start {start}")]
    InvalidInterval { id: String, start: f64, end: f64 },

    #[error("segment id '{0}' appears more than once")]
    DuplicateSegmentId(String),

    #[error("{stream} #{index}: confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange {
        stream: StreamKind,
        index: usize,
        value: f64,
    },

    #[error("detection #{index}: box component {field}={value} outside [0, 1]")]
    BoxOutOfRange {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("telemetry #{index}: invalid coordinate lat={lat}, lon={lon}")]
    InvalidCoordinate { index: usize, lat: f64, lon: f64 },

    #[error("detection #{index}: box must have exactly 4 components, got {len}")]
    MalformedBox { index: usize, len: usize },

    #[error("malformed analysis payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Invalid viewport or map extent descriptions.
#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("viewport {width}x{height} must have positive, finite dimensions")]
    InvalidViewport { width: f64, height: f64 },

    #[error("map extent lat [{lat_min}, {lat_max}] lon [{lon_min}, {lon_max}] is empty, inverted or off the globe")]
    InvalidExtent {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },

    #[error("map extent spans {span_deg:.2} degrees; equirectangular projection is limited to {limit_deg} degrees")]
    ExtentTooLarge { span_deg: f64, limit_deg: f64 },
}

/// Failures surfaced by the playback coordinator's API.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("load ticket for generation {ticket} is stale (current generation {current})")]
    StaleLoad { ticket: u64, current: u64 },

    #[error("no segment with id '{0}' in the loaded timeline")]
    UnknownSegment(String),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Invalid engine configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("staleness tolerance {0} must be finite and non-negative")]
    InvalidTolerance(f64),
}
