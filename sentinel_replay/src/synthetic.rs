//! Seeded synthetic analysis payloads.
//!
//! Stands in for the analysis backend when no payload file is given:
//! - A platform flying a straight track across the Malta extent
//! - Gaussian noise on every reported position
//! - A detection roughly once per second with a drifting box
//! - A handful of overlapping fused segments
//!
//! The same seed always yields the same payload.

use crate::error::ReplayError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use sentinel_core::ingest::{
    DetectedObject, FrameId, FusedFrameEntry, HudTelemetry, VisualTelemetryEntry,
};
use sentinel_core::{AnalysisPayload, MediaMetadata};
use serde::{Deserialize, Serialize};

const LABELS: [&str; 3] = ["airplane", "helicopter", "drone"];
const FPS: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub seed: u64,

    /// Asset length in seconds (default: 60)
    pub duration_sec: f64,

    /// HUD telemetry samples per second (default: 2)
    pub telemetry_rate_hz: f64,

    /// Position noise standard deviation in degrees (default: 0.0002, ~20 m)
    pub position_noise_deg: f64,

    /// Chance that a one-second slot carries a detection (default: 0.8)
    pub detection_probability: f64,

    /// Number of fused segments (default: 4)
    pub segment_count: usize,

    /// Track start as (lat, lon)
    pub origin: (f64, f64),

    /// Track end as (lat, lon)
    pub destination: (f64, f64),
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            duration_sec: 60.0,
            telemetry_rate_hz: 2.0,
            position_noise_deg: 0.0002,
            detection_probability: 0.8,
            segment_count: 4,
            origin: (35.83, 14.49),
            destination: (35.89, 14.53),
        }
    }
}

/// Deterministic payload generator.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: ChaCha8Rng,
    noise: Normal<f64>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self, ReplayError> {
        if !config.duration_sec.is_finite() || config.duration_sec < 0.0 {
            return Err(ReplayError::InvalidDuration(config.duration_sec));
        }
        sentinel_env::tick_interval(config.telemetry_rate_hz)?;
        let noise = Normal::new(0.0, config.position_noise_deg)?;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            noise,
            config,
        })
    }

    pub fn generate(&mut self) -> AnalysisPayload {
        let duration = self.config.duration_sec;
        let samples = (duration * self.config.telemetry_rate_hz).floor() as u64;
        let per_second = self.config.telemetry_rate_hz.round().max(1.0) as u64;

        let mut entries = Vec::with_capacity(samples as usize + 1);
        for k in 0..=samples {
            let time = k as f64 / self.config.telemetry_rate_hz;
            let object = if k % per_second == 0 {
                self.detection(time)
            } else {
                None
            };
            entries.push(VisualTelemetryEntry {
                time,
                telemetry: self.telemetry(time),
                object,
            });
        }

        let fused = self.segments();

        AnalysisPayload {
            video_id: format!("synthetic-{:016x}", self.config.seed),
            metadata: MediaMetadata {
                fps: Some(FPS),
                frame_count: Some((duration * FPS).round() as u64),
                resolution: Some("1280x720".to_string()),
                duration_sec: Some(duration),
            },
            visual_telemetry: Some(entries),
            fused_frames: Some(fused),
        }
    }

    fn telemetry(&mut self, time: f64) -> HudTelemetry {
        let (lat0, lon0) = self.config.origin;
        let (lat1, lon1) = self.config.destination;
        let progress = if self.config.duration_sec > 0.0 {
            time / self.config.duration_sec
        } else {
            0.0
        };

        let lat = lat0 + (lat1 - lat0) * progress + self.noise.sample(&mut self.rng);
        let lon = lon0 + (lon1 - lon0) * progress + self.noise.sample(&mut self.rng);
        let heading = (lon1 - lon0).atan2(lat1 - lat0).to_degrees().rem_euclid(360.0);

        HudTelemetry {
            lat: Some(lat.clamp(-90.0, 90.0)),
            lon: Some(lon.clamp(-180.0, 180.0)),
            alt: Some(18_000.0 + 2_000.0 * (time * 0.05).sin()),
            speed: Some(780.0 + self.rng.gen_range(-20.0..20.0)),
            heading: Some(heading),
        }
    }

    fn detection(&mut self, time: f64) -> Option<DetectedObject> {
        if !self.rng.gen_bool(self.config.detection_probability.clamp(0.0, 1.0)) {
            return None;
        }
        let label = LABELS[self.rng.gen_range(0..LABELS.len())];
        let w = self.rng.gen_range(0.08..0.2);
        Some(DetectedObject {
            label: label.to_string(),
            conf: self.rng.gen_range(0.55..0.99),
            bbox: vec![
                0.5 + 0.25 * (time * 0.3).sin(),
                0.45 + 0.1 * (time * 0.2).cos(),
                w,
                w * 0.6,
            ],
        })
    }

    fn segments(&mut self) -> Vec<FusedFrameEntry> {
        let count = self.config.segment_count;
        let duration = self.config.duration_sec;
        let span = if count > 0 { duration / count as f64 } else { 0.0 };

        (0..count)
            .map(|i| {
                let start = i as f64 * span;
                FusedFrameEntry {
                    frame_id: FrameId::Number(i as u64),
                    start_time: start,
                    // Each segment runs a quarter into the next one
                    end_time: (start + span * 1.25).min(duration),
                    confidence: self.rng.gen_range(0.5..0.95),
                    path: format!("clips/segment_{:03}.mp4", i),
                }
            })
            .collect()
    }
}
