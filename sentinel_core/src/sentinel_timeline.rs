//! The "TIMELINE" Store - time-indexed annotation streams per media asset
//!
//! Holds the three streams produced upstream for one asset:
//! - Telemetry point samples (platform position, altitude, speed)
//! - Detection point samples (label + normalized bounding box)
//! - Fused interval segments (possibly overlapping)
//!
//! Every stream is validated and stable-sorted exactly once, at load time.
//! All later queries rely on that order and binary-search instead of
//! scanning.

use crate::error::{StreamKind, TimelineError};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info};

// ============================================================================
// RECORD TYPES
// ============================================================================

/// Anything positioned on the asset's timeline at a single instant.
pub trait Timestamped {
    /// Media time in seconds.
    fn time(&self) -> f64;
}

/// A timestamped platform sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Media time in seconds (≥ 0)
    pub time: f64,

    /// Latitude in degrees
    pub lat: f64,

    /// Longitude in degrees
    pub lon: f64,

    /// Altitude as reported by the HUD (feet), if read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Ground speed as reported by the HUD, if read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Heading in degrees, if read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl TelemetrySample {
    /// Create a position-only sample.
    pub fn new(time: f64, lat: f64, lon: f64) -> Self {
        Self {
            time,
            lat,
            lon,
            altitude: None,
            speed: None,
            heading: None,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }

    /// Geographic position as a `geo` point (x = lon, y = lat).
    #[inline]
    pub fn position(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl Timestamped for TelemetrySample {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Bounding box in frame-relative units: center and size, all in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }

    /// Build from the upstream `[cx, cy, w, h]` array layout.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [cx, cy, w, h] => Some(Self::new(*cx, *cy, *w, *h)),
            _ => None,
        }
    }

    fn components(&self) -> [(&'static str, f64); 4] {
        [("cx", self.cx), ("cy", self.cy), ("w", self.w), ("h", self.h)]
    }
}

/// A timestamped object detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSample {
    /// Media time in seconds (≥ 0)
    pub time: f64,

    /// Object class label (e.g. "airplane", "ship")
    pub label: String,

    /// Detector confidence [0.0 - 1.0]
    pub confidence: f64,

    /// Normalized bounding box
    #[serde(rename = "box")]
    pub bbox: NormalizedBox,
}

impl DetectionSample {
    pub fn new(time: f64, label: impl Into<String>, confidence: f64, bbox: NormalizedBox) -> Self {
        Self {
            time,
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

impl Timestamped for DetectionSample {
    fn time(&self) -> f64 {
        self.time
    }
}

/// A merged, higher-confidence activity interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSegment {
    /// Unique within the asset
    pub id: String,

    /// Interval start in seconds
    pub start: f64,

    /// Interval end in seconds (≥ start)
    pub end: f64,

    /// Fusion confidence [0.0 - 1.0]
    pub confidence: f64,

    /// Opaque reference to the derived artefact (e.g. a clip path)
    pub payload: String,
}

impl FusedSegment {
    pub fn new(
        id: impl Into<String>,
        start: f64,
        end: f64,
        confidence: f64,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            confidence,
            payload: payload.into(),
        }
    }

    /// Closed-interval containment: `start <= time <= end`.
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Container-level facts about the media asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub frame_count: Option<u64>,
    /// "WIDTHxHEIGHT"
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<f64>,
}

impl MediaMetadata {
    /// Parse `resolution` ("1920x1080") into pixel dimensions.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self.resolution.as_deref()?.split_once('x')?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

/// Which upstream payload shape(s) a timeline was built from.
///
/// The analysis backend emits two unreconciled shapes; both are accepted
/// and the timeline records which one was actually present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// Point samples from `visual_telemetry`
    VisualTelemetry,
    /// Intervals from `fused_frames`
    FusedFrames,
    /// Both arrays were present
    Both,
    /// Neither array was present (or the timeline was built directly)
    #[default]
    Empty,
}

// ============================================================================
// ASSET TIMELINE
// ============================================================================

/// The validated, sorted streams of one media asset.
///
/// Built once per load and never mutated afterwards; a new asset replaces
/// the whole timeline.
#[derive(Debug, Clone, Default)]
pub struct AssetTimeline {
    asset_id: String,
    metadata: MediaMetadata,
    shape: PayloadShape,
    telemetry: Vec<TelemetrySample>,
    detections: Vec<DetectionSample>,
    /// Sorted by `start`
    segments: Vec<FusedSegment>,
    /// `segment_reach[i]` is the latest `end` among `segments[..=i]`
    segment_reach: Vec<f64>,
}

impl AssetTimeline {
    /// Validate and sort the three streams.
    ///
    /// Samples sharing a timestamp keep their input order.
    pub fn new(
        asset_id: impl Into<String>,
        mut telemetry: Vec<TelemetrySample>,
        mut detections: Vec<DetectionSample>,
        mut segments: Vec<FusedSegment>,
    ) -> Result<Self, TimelineError> {
        validate_telemetry(&telemetry)?;
        validate_detections(&detections)?;
        validate_segments(&segments)?;

        telemetry.sort_by(|a, b| cmp_time(a.time, b.time));
        detections.sort_by(|a, b| cmp_time(a.time, b.time));
        segments.sort_by(|a, b| cmp_time(a.start, b.start));
        let segment_reach = segments
            .iter()
            .scan(f64::NEG_INFINITY, |reach, s| {
                *reach = reach.max(s.end);
                Some(*reach)
            })
            .collect();

        Ok(Self {
            asset_id: asset_id.into(),
            metadata: MediaMetadata::default(),
            shape: PayloadShape::Empty,
            telemetry,
            detections,
            segments,
            segment_reach,
        })
    }

    /// An asset with no annotations at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> PayloadShape {
        self.shape
    }

    pub fn telemetry(&self) -> &[TelemetrySample] {
        &self.telemetry
    }

    pub fn detections(&self) -> &[DetectionSample] {
        &self.detections
    }

    /// All segments, ordered by start time.
    pub fn segments(&self) -> &[FusedSegment] {
        &self.segments
    }

    pub fn telemetry_at(&self, index: usize) -> Option<&TelemetrySample> {
        self.telemetry.get(index)
    }

    pub fn detection_at(&self, index: usize) -> Option<&DetectionSample> {
        self.detections.get(index)
    }

    /// Segments whose closed interval contains `time`, in start order.
    ///
    /// Both ends of the candidate window are binary searches: segments
    /// past `upto` start too late, and every segment before `from` ended
    /// before `time` because the running maximum of their ends did.
    pub fn segments_overlapping(&self, time: f64) -> Vec<&FusedSegment> {
        let upto = self.segments.partition_point(|s| s.start <= time);
        let from = self.segment_reach[..upto].partition_point(|&reach| reach < time);
        self.segments[from..upto]
            .iter()
            .filter(|s| s.end >= time)
            .collect()
    }

    pub fn segment(&self, id: &str) -> Option<&FusedSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.telemetry.is_empty() && self.detections.is_empty() && self.segments.is_empty()
    }

    /// Playable length in seconds.
    ///
    /// The container's `duration_sec` when it is usable, otherwise the
    /// latest instant any stream reaches.
    pub fn duration(&self) -> f64 {
        match self.metadata.duration_sec {
            Some(d) if d.is_finite() && d > 0.0 => d,
            _ => self.annotated_span(),
        }
    }

    fn annotated_span(&self) -> f64 {
        let last_telemetry = self.telemetry.last().map(|s| s.time);
        let last_detection = self.detections.last().map(|s| s.time);
        let last_segment = self.segments.iter().map(|s| s.end).reduce(f64::max);

        [last_telemetry, last_detection, last_segment]
            .into_iter()
            .flatten()
            .fold(0.0, f64::max)
    }
}

// ============================================================================
// TIMELINE STORE
// ============================================================================

/// Owner of the currently loaded asset timeline.
///
/// `generation` increases on every successful load or unload so consumers
/// can tell results computed against an older asset apart.
#[derive(Debug, Default)]
pub struct TimelineStore {
    current: AssetTimeline,
    generation: u64,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current content with three raw streams.
    ///
    /// On error the previously loaded timeline is left untouched.
    pub fn load(
        &mut self,
        telemetry: Vec<TelemetrySample>,
        detections: Vec<DetectionSample>,
        segments: Vec<FusedSegment>,
    ) -> Result<u64, TimelineError> {
        let timeline = AssetTimeline::new("", telemetry, detections, segments)?;
        Ok(self.install(timeline))
    }

    /// Swap in an already validated timeline. Returns the new generation.
    pub fn install(&mut self, timeline: AssetTimeline) -> u64 {
        self.generation += 1;
        info!(
            "Loaded asset '{}' ({:?}): {} telemetry, {} detections, {} segments, generation {}",
            timeline.asset_id(),
            timeline.shape(),
            timeline.telemetry().len(),
            timeline.detections().len(),
            timeline.segments().len(),
            self.generation
        );
        self.current = timeline;
        self.generation
    }

    /// Drop the current asset, leaving an empty timeline.
    pub fn unload(&mut self) -> u64 {
        self.generation += 1;
        debug!("Unloaded asset '{}'", self.current.asset_id());
        self.current = AssetTimeline::empty();
        self.generation
    }

    pub fn timeline(&self) -> &AssetTimeline {
        &self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn telemetry_at(&self, index: usize) -> Option<&TelemetrySample> {
        self.current.telemetry_at(index)
    }

    pub fn detection_at(&self, index: usize) -> Option<&DetectionSample> {
        self.current.detection_at(index)
    }

    pub fn segments_overlapping(&self, time: f64) -> Vec<&FusedSegment> {
        self.current.segments_overlapping(time)
    }
}

// ========== Private Helper Methods ==========

/// Times are validated finite before sorting, so `Equal` is never a NaN
/// stand-in here.
fn cmp_time(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn check_time(stream: StreamKind, index: usize, time: f64) -> Result<(), TimelineError> {
    if !time.is_finite() {
        return Err(TimelineError::NonFiniteTime { stream, index, time });
    }
    if time < 0.0 {
        return Err(TimelineError::NegativeTime { stream, index, time });
    }
    Ok(())
}

fn check_unit(stream: StreamKind, index: usize, value: f64) -> Result<(), TimelineError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TimelineError::ConfidenceOutOfRange { stream, index, value });
    }
    Ok(())
}

fn validate_telemetry(samples: &[TelemetrySample]) -> Result<(), TimelineError> {
    for (index, s) in samples.iter().enumerate() {
        check_time(StreamKind::Telemetry, index, s.time)?;
        let lat_ok = (-90.0..=90.0).contains(&s.lat);
        let lon_ok = (-180.0..=180.0).contains(&s.lon);
        if !lat_ok || !lon_ok {
            return Err(TimelineError::InvalidCoordinate {
                index,
                lat: s.lat,
                lon: s.lon,
            });
        }
    }
    Ok(())
}

fn validate_detections(samples: &[DetectionSample]) -> Result<(), TimelineError> {
    for (index, s) in samples.iter().enumerate() {
        check_time(StreamKind::Detection, index, s.time)?;
        check_unit(StreamKind::Detection, index, s.confidence)?;
        for (field, value) in s.bbox.components() {
            if !(0.0..=1.0).contains(&value) {
                return Err(TimelineError::BoxOutOfRange { index, field, value });
            }
        }
    }
    Ok(())
}

fn validate_segments(segments: &[FusedSegment]) -> Result<(), TimelineError> {
    let mut seen = HashSet::with_capacity(segments.len());
    for (index, s) in segments.iter().enumerate() {
        check_time(StreamKind::Segment, index, s.start)?;
        check_time(StreamKind::Segment, index, s.end)?;
        if s.end < s.start {
            return Err(TimelineError::InvalidInterval {
                id: s.id.clone(),
                start: s.start,
                end: s.end,
            });
        }
        check_unit(StreamKind::Segment, index, s.confidence)?;
        if !seen.insert(s.id.as_str()) {
            return Err(TimelineError::DuplicateSegmentId(s.id.clone()));
        }
    }
    Ok(())
}
