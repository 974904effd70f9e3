//! Per-render overlay bundle for the consuming views.
//!
//! Composes one `PlaybackUpdate` into everything the three views draw:
//! the video box, the map marker, the highlighted segment row and the
//! side-panel readout. Missing data stays missing all the way to the
//! panel text, where it is spelled out as "N/A".

use crate::sentinel_playback::{PlaybackMode, PlaybackUpdate};
use crate::sentinel_space::{denormalize_box, BoxOverlay, MapProjection, MapView, Viewport};
use crate::sentinel_time::ResolvedAnnotation;
use crate::sentinel_timeline::DetectionSample;
use serde::{Deserialize, Serialize};
use std::fmt;

const NO_DATA: &str = "N/A";

/// Coarse threat classification shown next to the primary object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    /// No detection is current
    Scanning,
    Low,
    Medium,
}

impl ThreatLevel {
    pub fn classify(detection: Option<&DetectionSample>) -> Self {
        match detection {
            None => ThreatLevel::Scanning,
            Some(d) if d.label == "airplane" => ThreatLevel::Medium,
            Some(_) => ThreatLevel::Low,
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ThreatLevel::Scanning => "SCANNING",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
        };
        f.write_str(text)
    }
}

/// `mm:ss`, truncating fractional seconds. Invalid times render as `--:--`.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Side-panel text values. `None` means "no data", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelReadout {
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub target: Option<String>,
    pub confidence: Option<f64>,
    pub threat: ThreatLevel,
    pub segment_id: Option<String>,
}

impl PanelReadout {
    pub fn from_annotation(annotation: &ResolvedAnnotation) -> Self {
        let telemetry = annotation.telemetry.as_ref();
        let detection = annotation.detection.as_ref();
        Self {
            speed: telemetry.and_then(|t| t.speed),
            altitude: telemetry.and_then(|t| t.altitude),
            lat: telemetry.map(|t| t.lat),
            lon: telemetry.map(|t| t.lon),
            target: detection.map(|d| d.label.clone()),
            confidence: detection.map(|d| d.confidence),
            threat: ThreatLevel::classify(detection),
            segment_id: annotation.segment.as_ref().map(|s| s.id.clone()),
        }
    }

    /// Label/value rows in panel order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let number = |v: Option<f64>, decimals: usize| match v {
            Some(v) => format!("{:.*}", decimals, v),
            None => NO_DATA.to_string(),
        };
        vec![
            ("Speed", number(self.speed, 0)),
            ("Altitude", number(self.altitude, 0)),
            ("Latitude", number(self.lat, 4)),
            ("Longitude", number(self.lon, 4)),
            ("Target", self.target.clone().unwrap_or_else(|| NO_DATA.to_string())),
            (
                "Confidence",
                self.confidence
                    .map(|c| format!("{:.1}%", c * 100.0))
                    .unwrap_or_else(|| NO_DATA.to_string()),
            ),
            ("Threat", self.threat.to_string()),
            ("Segment", self.segment_id.clone().unwrap_or_else(|| NO_DATA.to_string())),
        ]
    }
}

impl fmt::Display for PanelReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        for (i, (label, value)) in rows.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}: {}", label, value)?;
        }
        Ok(())
    }
}

/// Pixel overlay for the current detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOverlay {
    pub label: String,
    pub confidence: f64,
    pub rect: BoxOverlay,
}

/// Highlighted row in the segment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentHighlight {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

/// Everything the views need to render one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayScene {
    pub generation: u64,
    pub time: f64,
    pub mode: PlaybackMode,
    /// "mm:ss / mm:ss"
    pub clock: String,
    /// Fraction of the asset played, `None` for a zero-length asset
    pub progress: Option<f64>,
    pub detection: Option<DetectionOverlay>,
    pub marker: Option<MapProjection>,
    pub segment: Option<SegmentHighlight>,
    pub panel: PanelReadout,
}

impl OverlayScene {
    pub fn compose(update: &PlaybackUpdate, video: &Viewport, map: &MapView) -> Self {
        let annotation = &update.annotation;
        let time = update.state.current_time;
        let progress = (update.duration > 0.0).then(|| (time / update.duration).clamp(0.0, 1.0));

        Self {
            generation: update.generation,
            time,
            mode: update.state.mode,
            clock: format!("{} / {}", format_clock(time), format_clock(update.duration)),
            progress,
            detection: annotation.detection.as_ref().map(|d| DetectionOverlay {
                label: d.label.clone(),
                confidence: d.confidence,
                rect: denormalize_box(&d.bbox, video),
            }),
            marker: annotation.telemetry.as_ref().map(|t| map.project_telemetry(t)),
            segment: annotation.segment.as_ref().map(|s| SegmentHighlight {
                id: s.id.clone(),
                start: s.start,
                end: s.end,
                confidence: s.confidence,
            }),
            panel: PanelReadout::from_annotation(annotation),
        }
    }
}
