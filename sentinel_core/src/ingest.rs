//! Analysis payload adapters.
//!
//! The analysis backend publishes one JSON document per asset, in one of
//! two shapes that were never reconciled upstream:
//!
//! ```text
//! { "video_id": "...", "metadata": { fps, frame_count, resolution, duration_sec },
//!   "visual_telemetry": [ { time, telemetry: {lat, lon, alt, speed}, object?: {label, conf, box} } ],
//!   "fused_frames":     [ { frame_id, start_time, end_time, confidence, path } ] }
//! ```
//!
//! Each array is an independent adapter into the same `AssetTimeline`; the
//! timeline's `PayloadShape` records which of them were present.

use crate::error::TimelineError;
use crate::sentinel_timeline::{
    AssetTimeline, DetectionSample, FusedSegment, MediaMetadata, NormalizedBox, PayloadShape,
    TelemetrySample,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The per-asset analysis document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub video_id: String,

    #[serde(default)]
    pub metadata: MediaMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_telemetry: Option<Vec<VisualTelemetryEntry>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fused_frames: Option<Vec<FusedFrameEntry>>,
}

/// One sampled frame of HUD telemetry, optionally with a detected target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualTelemetryEntry {
    pub time: f64,

    #[serde(default)]
    pub telemetry: HudTelemetry,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<DetectedObject>,
}

/// Values read off the video HUD. Any of them may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HudTelemetry {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub alt: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub conf: f64,
    /// `[cx, cy, w, h]`, normalized
    #[serde(rename = "box")]
    pub bbox: Vec<f64>,
}

/// Frame ids arrive as numbers or strings depending on the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameId::Number(n) => write!(f, "{}", n),
            FrameId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedFrameEntry {
    pub frame_id: FrameId,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f64,
    #[serde(default)]
    pub path: String,
}

impl AnalysisPayload {
    pub fn from_json(json: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Which adapter(s) this payload will exercise.
    pub fn shape(&self) -> PayloadShape {
        match (self.visual_telemetry.is_some(), self.fused_frames.is_some()) {
            (true, true) => PayloadShape::Both,
            (true, false) => PayloadShape::VisualTelemetry,
            (false, true) => PayloadShape::FusedFrames,
            (false, false) => PayloadShape::Empty,
        }
    }

    /// Run both adapters and build a validated timeline.
    ///
    /// A `visual_telemetry` entry yields a telemetry sample only when both
    /// `lat` and `lon` were read, and a detection only when `object` is
    /// present.
    pub fn into_timeline(self) -> Result<AssetTimeline, TimelineError> {
        let shape = self.shape();
        let entries = self.visual_telemetry.unwrap_or_default();

        let mut telemetry = Vec::with_capacity(entries.len());
        let mut detections = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let hud = &entry.telemetry;
            if let (Some(lat), Some(lon)) = (hud.lat, hud.lon) {
                telemetry.push(TelemetrySample {
                    time: entry.time,
                    lat,
                    lon,
                    altitude: hud.alt,
                    speed: hud.speed,
                    heading: hud.heading,
                });
            }
            if let Some(object) = entry.object {
                let bbox = NormalizedBox::from_slice(&object.bbox).ok_or(TimelineError::MalformedBox {
                    index,
                    len: object.bbox.len(),
                })?;
                detections.push(DetectionSample::new(entry.time, object.label, object.conf, bbox));
            }
        }

        let segments: Vec<FusedSegment> = self
            .fused_frames
            .unwrap_or_default()
            .into_iter()
            .map(|f| FusedSegment::new(f.frame_id.to_string(), f.start_time, f.end_time, f.confidence, f.path))
            .collect();

        debug!(
            "Adapted payload '{}' ({:?}) into {} telemetry, {} detections, {} segments",
            self.video_id,
            shape,
            telemetry.len(),
            detections.len(),
            segments.len()
        );

        Ok(AssetTimeline::new(self.video_id, telemetry, detections, segments)?
            .with_metadata(self.metadata)
            .with_shape(shape))
    }
}

/// Parse and adapt a payload in one step.
pub fn timeline_from_json(json: &str) -> Result<AssetTimeline, TimelineError> {
    AnalysisPayload::from_json(json)?.into_timeline()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VISUAL: &str = r#"{
        "video_id": "3f1c",
        "metadata": { "fps": 29.97, "frame_count": 3596, "resolution": "1280x720", "duration_sec": 120.0 },
        "embedded_telemetry": { "container": { "filename": "uav.mp4" } },
        "visual_telemetry": [
            { "time": 1, "telemetry": { "lat": 35.851, "lon": 14.512, "speed": 800, "alt": 20000 },
              "object": { "label": "airplane", "conf": 0.91, "box": [0.5, 0.4, 0.2, 0.1] } },
            { "time": 0, "telemetry": { "lat": 35.850, "lon": 14.510 }, "target_detected": false },
            { "time": 2, "telemetry": { "speed": 790 } }
        ]
    }"#;

    const FUSED: &str = r#"{
        "video_id": "9a2e",
        "metadata": { "fps": 25, "frame_count": 250, "resolution": "640x480", "duration_sec": 10 },
        "fused_frames": [
            { "frame_id": 2, "start_time": 4.0, "end_time": 8.0, "confidence": 0.7, "path": "clips/2.mp4" },
            { "frame_id": "intro", "start_time": 0.0, "end_time": 3.0, "confidence": 0.6, "path": "clips/intro.mp4" }
        ]
    }"#;

    #[test]
    fn test_visual_telemetry_adapter() {
        let timeline = timeline_from_json(VISUAL).unwrap();
        assert_eq!(timeline.shape(), PayloadShape::VisualTelemetry);
        assert_eq!(timeline.asset_id(), "3f1c");
        assert_eq!(timeline.duration(), 120.0);

        // Entry at t=2 has no position
        assert_eq!(timeline.telemetry().len(), 2);
        assert_eq!(timeline.telemetry()[0].time, 0.0);
        assert_eq!(timeline.telemetry()[1].altitude, Some(20000.0));

        assert_eq!(timeline.detections().len(), 1);
        let detection = &timeline.detections()[0];
        assert_eq!(detection.label, "airplane");
        assert_eq!(detection.bbox, NormalizedBox::new(0.5, 0.4, 0.2, 0.1));
        assert!(timeline.segments().is_empty());
    }

    #[test]
    fn test_fused_frames_adapter() {
        let timeline = timeline_from_json(FUSED).unwrap();
        assert_eq!(timeline.shape(), PayloadShape::FusedFrames);
        assert!(timeline.telemetry().is_empty());

        let ids: Vec<&str> = timeline.segments().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "2"]);
        assert_eq!(timeline.segment("2").map(|s| s.payload.as_str()), Some("clips/2.mp4"));
        assert_eq!(timeline.metadata().frame_size(), Some((640, 480)));
    }

    #[test]
    fn test_both_shapes_flagged() {
        let json = r#"{
            "video_id": "both",
            "visual_telemetry": [ { "time": 0, "telemetry": { "lat": 35.85, "lon": 14.5 } } ],
            "fused_frames": [ { "frame_id": 1, "start_time": 0, "end_time": 1, "confidence": 0.5, "path": "" } ]
        }"#;
        let payload = AnalysisPayload::from_json(json).unwrap();
        assert_eq!(payload.shape(), PayloadShape::Both);
        let timeline = payload.into_timeline().unwrap();
        assert_eq!(timeline.shape(), PayloadShape::Both);
        // No metadata duration: falls back to the annotated span
        assert_eq!(timeline.duration(), 1.0);
    }

    #[test]
    fn test_neither_shape() {
        let timeline = timeline_from_json(r#"{ "video_id": "bare" }"#).unwrap();
        assert_eq!(timeline.shape(), PayloadShape::Empty);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            timeline_from_json("{ not json"),
            Err(TimelineError::MalformedPayload(_))
        ));

        let short_box = r#"{ "video_id": "x", "visual_telemetry": [
            { "time": 0, "object": { "label": "ship", "conf": 0.5, "box": [0.5, 0.5] } } ] }"#;
        assert!(matches!(
            timeline_from_json(short_box),
            Err(TimelineError::MalformedBox { index: 0, len: 2 })
        ));

        let inverted = r#"{ "video_id": "x", "fused_frames": [
            { "frame_id": 1, "start_time": 5, "end_time": 2, "confidence": 0.5 } ] }"#;
        assert!(matches!(
            timeline_from_json(inverted),
            Err(TimelineError::InvalidInterval { .. })
        ));
    }
}
