//! The "TIME" Engine - Temporal Resolution
//!
//! Maps a playback time onto the most relevant record of each stream:
//! - Point samples (telemetry, detections): nearest sample, gated by a
//!   staleness tolerance. Nothing is ever extrapolated past that gate.
//! - Fused segments: the containing interval, with a fixed tie-break for
//!   overlapping input.
//!
//! Resolution is a pure function of (timeline, time, config). It never
//! fails; absence is reported as `None`.

use crate::error::ConfigError;
use crate::sentinel_timeline::{AssetTimeline, DetectionSample, FusedSegment, TelemetrySample, Timestamped};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the TemporalResolver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum distance (seconds) between the query time and the nearest
    /// sample for that sample to count as current (default: 0.5, one
    /// keyframe interval at typical encoder settings)
    pub staleness_tolerance: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            staleness_tolerance: 0.5,
        }
    }
}

impl ResolverConfig {
    pub fn with_staleness_tolerance(tolerance: f64) -> Result<Self, ConfigError> {
        let config = Self {
            staleness_tolerance: tolerance,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.staleness_tolerance.is_finite() || self.staleness_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.staleness_tolerance));
        }
        Ok(())
    }
}

// ============================================================================
// RESOLVED ANNOTATION (Output)
// ============================================================================

/// The records current at one instant. Recomputed on every time change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnnotation {
    pub telemetry: Option<TelemetrySample>,
    pub detection: Option<DetectionSample>,
    pub segment: Option<FusedSegment>,
}

impl ResolvedAnnotation {
    /// True when no stream had anything current.
    pub fn is_empty(&self) -> bool {
        self.telemetry.is_none() && self.detection.is_none() && self.segment.is_none()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Stateless resolver parameterized by its tolerance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalResolver {
    config: ResolverConfig,
}

impl TemporalResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve all three streams at `time`.
    pub fn resolve(&self, timeline: &AssetTimeline, time: f64) -> ResolvedAnnotation {
        ResolvedAnnotation {
            telemetry: self.resolve_telemetry(timeline, time).cloned(),
            detection: self.resolve_detection(timeline, time).cloned(),
            segment: resolve_segment(timeline, time).cloned(),
        }
    }

    pub fn resolve_telemetry<'a>(&self, timeline: &'a AssetTimeline, time: f64) -> Option<&'a TelemetrySample> {
        resolve_nearest(timeline.telemetry(), time, self.config.staleness_tolerance)
    }

    pub fn resolve_detection<'a>(&self, timeline: &'a AssetTimeline, time: f64) -> Option<&'a DetectionSample> {
        resolve_nearest(timeline.detections(), time, self.config.staleness_tolerance)
    }
}

/// Nearest-sample lookup over a time-sorted slice.
///
/// Binary-searches for the samples bracketing `time` and returns the
/// closer one if it lies within `tolerance`. Equidistant brackets resolve
/// to the earlier sample; among samples sharing one timestamp the first
/// in slice order is returned.
pub fn resolve_nearest<T: Timestamped>(samples: &[T], time: f64, tolerance: f64) -> Option<&T> {
    if !time.is_finite() || samples.is_empty() {
        return None;
    }

    // First sample at or after `time`
    let idx = samples.partition_point(|s| s.time() < time);

    let after = samples.get(idx);
    let before = idx.checked_sub(1).map(|last_before| {
        // Rewind to the first sample of a run sharing this timestamp
        let t = samples[last_before].time();
        &samples[samples.partition_point(|s| s.time() < t)]
    });

    let nearest = match (before, after) {
        (Some(b), Some(a)) => {
            if time - b.time() <= a.time() - time {
                b
            } else {
                a
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    ((nearest.time() - time).abs() <= tolerance).then_some(nearest)
}

/// Containing-segment lookup.
///
/// With overlapping segments the highest confidence wins; equal confidence
/// falls back to the earliest start, then to load order. This is a fixed
/// policy so the same time always highlights the same segment.
pub fn resolve_segment(timeline: &AssetTimeline, time: f64) -> Option<&FusedSegment> {
    // Candidates arrive in (start, load order), so keeping the first
    // maximum implements both secondary tie-breaks.
    timeline
        .segments_overlapping(time)
        .into_iter()
        .fold(None, |best: Option<&FusedSegment>, candidate| match best {
            Some(current) if compare_priority(candidate, current) != Ordering::Greater => Some(current),
            _ => Some(candidate),
        })
}

fn compare_priority(a: &FusedSegment, b: &FusedSegment) -> Ordering {
    a.confidence
        .partial_cmp(&b.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.start.partial_cmp(&a.start).unwrap_or(Ordering::Equal))
}
