//! Replay runner - drives a playback coordinator from a media clock.
//!
//! A producer task reads the clock and publishes media times into a
//! latest-wins tick feed; the coordinator follows the feed and every
//! update it publishes is composed into an overlay scene and recorded.
//!
//! On a virtual clock the producer waits for each tick to be taken before
//! advancing time, so a replay resolves every tick and the same seed
//! exports the same frames on any runtime. On a wall clock the feed stays
//! latest-wins and slow consumers skip ticks.

use crate::context::VirtualClock;
use crate::error::ReplayError;
use crate::exporter::{ReplayExport, ReplayFrame};
use crate::synthetic::{SyntheticConfig, SyntheticSource};

use sentinel_core::{
    AssetTimeline, MapExtent, MapView, OverlayScene, PlaybackCoordinator, PlaybackUpdate,
    ResolverConfig, UpdateCause, Viewport,
};
use sentinel_env::{tick_channel, tick_interval, EnvError, MediaClock};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};

/// Replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Seed for synthetic payloads (default: 42)
    pub seed: u64,

    /// Clock updates per second (default: 30)
    pub tick_rate_hz: f64,

    /// Media seconds per clock second (default: 1.0)
    pub speed: f64,

    /// Stop after this many media seconds instead of the asset duration
    pub duration_override: Option<f64>,

    /// Resolver staleness tolerance in seconds (default: 0.5)
    pub tolerance: f64,

    /// Video overlay size in pixels (default: 1280x720)
    pub video_width: f64,
    pub video_height: f64,

    /// Map viewport size in pixels (default: 600x400)
    pub map_width: f64,
    pub map_height: f64,

    /// Map extent in degrees (default: Malta, 35.82..35.90 / 14.48..14.54)
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,

    /// Visit every fused segment before playing from the start
    pub jump_segments: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tick_rate_hz: 30.0,
            speed: 1.0,
            duration_override: None,
            tolerance: 0.5,
            video_width: 1280.0,
            video_height: 720.0,
            map_width: 600.0,
            map_height: 400.0,
            lat_min: 35.82,
            lat_max: 35.90,
            lon_min: 14.48,
            lon_max: 14.54,
            jump_segments: false,
        }
    }
}

impl ReplayConfig {
    pub fn resolver_config(&self) -> Result<ResolverConfig, ReplayError> {
        Ok(ResolverConfig::with_staleness_tolerance(self.tolerance)?)
    }

    pub fn video_viewport(&self) -> Result<Viewport, ReplayError> {
        Ok(Viewport::new(self.video_width, self.video_height)?)
    }

    pub fn map_view(&self) -> Result<MapView, ReplayError> {
        let extent = MapExtent::new(self.lat_min, self.lat_max, self.lon_min, self.lon_max)?;
        let viewport = Viewport::new(self.map_width, self.map_height)?;
        Ok(MapView::new(extent, viewport))
    }

    fn validate(&self) -> Result<(), ReplayError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ReplayError::InvalidSpeed(self.speed));
        }
        if let Some(d) = self.duration_override {
            if !d.is_finite() || d < 0.0 {
                return Err(ReplayError::InvalidDuration(d));
            }
        }
        Ok(())
    }
}

/// Where the replayed annotations come from.
#[derive(Debug)]
pub enum ReplaySource {
    /// Generate a payload from `ReplayConfig::seed`
    Synthetic,
    /// An already adapted analysis payload
    Timeline(AssetTimeline),
}

/// Summary of one replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayReport {
    pub asset_id: String,
    pub generation: u64,
    pub duration_sec: f64,
    pub final_time: f64,

    /// Ticks the producer published
    pub published: u64,
    /// Ticks the coordinator resolved
    pub resolved: u64,
    /// Ticks replaced before the coordinator saw them
    pub superseded: u64,

    pub segment_jumps: usize,
    pub frames_with_telemetry: usize,
    pub frames_with_detection: usize,
    pub frames_with_segment: usize,
    pub off_map_markers: usize,
    pub truncated_boxes: usize,
}

#[derive(Debug)]
pub struct ReplayOutcome {
    pub report: ReplayReport,
    pub export: ReplayExport,
}

/// Runs replays against a media clock.
pub struct ReplayRunner {
    config: ReplayConfig,
    clock: Arc<dyn MediaClock>,
    /// Producer waits for every tick to be taken
    lockstep: bool,
}

impl ReplayRunner {
    /// A deterministic runner on a fresh virtual clock.
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            clock: VirtualClock::shared(),
            lockstep: true,
        }
    }

    /// A runner paced by an external clock, with latest-wins ticks.
    pub fn with_clock(config: ReplayConfig, clock: Arc<dyn MediaClock>) -> Self {
        Self {
            config,
            clock,
            lockstep: false,
        }
    }

    pub fn with_lockstep(mut self, lockstep: bool) -> Self {
        self.lockstep = lockstep;
        self
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub async fn run(&self, source: ReplaySource) -> Result<ReplayOutcome, ReplayError> {
        self.config.validate()?;
        let interval = tick_interval(self.config.tick_rate_hz)?;
        let video = self.config.video_viewport()?;
        let map = self.config.map_view()?;

        let (timeline, seed) = match source {
            ReplaySource::Synthetic => {
                let synthetic = SyntheticConfig {
                    seed: self.config.seed,
                    duration_sec: self.config.duration_override.unwrap_or(60.0),
                    ..Default::default()
                };
                let payload = SyntheticSource::new(synthetic)?.generate();
                (payload.into_timeline()?, Some(self.config.seed))
            }
            ReplaySource::Timeline(timeline) => (timeline, None),
        };

        let mut coordinator = PlaybackCoordinator::new(self.config.resolver_config()?)?;
        let export = Rc::new(RefCell::new(ReplayExport::new(timeline.asset_id(), seed)));

        let sink = Rc::clone(&export);
        coordinator.subscribe(move |update: &PlaybackUpdate| {
            if update.cause != UpdateCause::Tick {
                debug!("{:?} update at t={:.3}s", update.cause, update.state.current_time);
            }
            let scene = OverlayScene::compose(update, &video, &map);
            sink.borrow_mut().add_frame(ReplayFrame {
                cause: update.cause,
                scene,
            });
        });

        let ticket = coordinator.begin_load();
        let generation = coordinator.complete_load(ticket, Ok(timeline))?;
        let asset_duration = coordinator.duration();
        let end = self
            .config
            .duration_override
            .map_or(asset_duration, |d| d.min(asset_duration));

        info!(
            "Replaying '{}' (generation {}, {:.1}s of {:.1}s) at {}x",
            coordinator.timeline().asset_id(),
            generation,
            end,
            asset_duration,
            self.config.speed
        );

        let mut segment_jumps = 0;
        if self.config.jump_segments {
            let ids: Vec<String> = coordinator
                .timeline()
                .segments()
                .iter()
                .map(|s| s.id.clone())
                .collect();
            for id in &ids {
                coordinator.jump_to_segment(id)?;
                segment_jumps += 1;
            }
            coordinator.seek(0.0);
        }

        coordinator.play();

        let (mut publisher, mut feed) = tick_channel();
        let clock = Arc::clone(&self.clock);
        let speed = self.config.speed;
        let lockstep = self.lockstep;
        let producer = tokio::spawn(async move {
            let start = clock.now();
            loop {
                let elapsed = clock.now().saturating_sub(start).as_secs_f64();
                let media_time = (elapsed * speed).min(end);
                let seq = publisher.publish(media_time)?;
                if lockstep {
                    publisher.wait_consumed(seq).await?;
                }
                if media_time >= end {
                    break;
                }
                clock.sleep(interval).await;
            }
            Ok::<u64, EnvError>(publisher.published())
        });

        let resolved = coordinator.follow(&mut feed).await;
        let published = producer.await??;
        coordinator.pause();

        let final_time = coordinator.state().current_time;
        drop(coordinator);

        let export = Rc::try_unwrap(export)
            .map(RefCell::into_inner)
            .unwrap_or_else(|shared| shared.borrow().clone());

        let mut report = ReplayReport {
            asset_id: export.asset_id.clone(),
            generation,
            duration_sec: end,
            final_time,
            published,
            resolved,
            superseded: feed.superseded(),
            segment_jumps,
            ..Default::default()
        };
        tally_frames(&mut report, &export);
        info!(
            "Replay finished at t={:.2}s: {} ticks resolved, {} superseded, {} frames",
            report.final_time,
            report.resolved,
            report.superseded,
            export.frames.len()
        );

        Ok(ReplayOutcome { report, export })
    }
}

/// Count what the views showed on clock-driven frames.
fn tally_frames(report: &mut ReplayReport, export: &ReplayExport) {
    for frame in export.frames_by(UpdateCause::Tick) {
        let scene = &frame.scene;
        if let Some(marker) = &scene.marker {
            report.frames_with_telemetry += 1;
            if !marker.is_visible() {
                report.off_map_markers += 1;
            }
        }
        if let Some(detection) = &scene.detection {
            report.frames_with_detection += 1;
            if detection.rect.truncated() {
                report.truncated_boxes += 1;
            }
        }
        if scene.segment.is_some() {
            report.frames_with_segment += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::timeline_from_json;

    #[tokio::test]
    async fn test_synthetic_replay_reaches_the_end() {
        let config = ReplayConfig {
            duration_override: Some(10.0),
            ..Default::default()
        };
        let outcome = ReplayRunner::new(config).run(ReplaySource::Synthetic).await.unwrap();
        let report = &outcome.report;

        assert_eq!(report.published, report.resolved);
        assert_eq!(report.superseded, 0);
        assert!(report.published > 1);
        assert_eq!(report.final_time, 10.0);
        assert_eq!(report.duration_sec, 10.0);
        assert!(report.frames_with_telemetry > 0);
        assert_eq!(report.off_map_markers, 0);
        assert_eq!(outcome.export.seed, Some(42));

        // Load first, paused at the end
        let first = outcome.export.frames.first().unwrap();
        assert_eq!(first.cause, UpdateCause::Load);
        let last = outcome.export.frames.last().unwrap();
        assert_eq!(last.cause, UpdateCause::Transport);
        assert_eq!(last.scene.time, 10.0);
        assert_eq!(last.scene.progress, Some(1.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_seed_same_export_on_multi_thread_runtime() {
        let config = ReplayConfig {
            duration_override: Some(30.0),
            ..Default::default()
        };
        let first = ReplayRunner::new(config.clone()).run(ReplaySource::Synthetic).await.unwrap();
        let second = ReplayRunner::new(config).run(ReplaySource::Synthetic).await.unwrap();

        // Every tick of 30 s at 30 Hz reaches the coordinator
        assert!(first.report.published >= 900);
        assert_eq!(first.report.resolved, first.report.published);
        assert_eq!(first.report.superseded, 0);
        assert_eq!(
            serde_json::to_string(&first.export).unwrap(),
            serde_json::to_string(&second.export).unwrap()
        );
        assert_eq!(
            serde_json::to_value(&first.report).unwrap(),
            serde_json::to_value(&second.report).unwrap()
        );
    }

    #[tokio::test]
    async fn test_jump_segments_visits_each_start() {
        let config = ReplayConfig {
            duration_override: Some(20.0),
            jump_segments: true,
            ..Default::default()
        };
        let outcome = ReplayRunner::new(config).run(ReplaySource::Synthetic).await.unwrap();
        assert_eq!(outcome.report.segment_jumps, 4);

        let seek_times: Vec<f64> = outcome
            .export
            .frames_by(UpdateCause::Seek)
            .map(|f| f.scene.time)
            .collect();
        // Four segment starts, then the rewind
        assert_eq!(seek_times, vec![0.0, 5.0, 10.0, 15.0, 0.0]);
    }

    #[tokio::test]
    async fn test_payload_replay_is_capped_by_override() {
        let json = r#"{
            "video_id": "capped",
            "metadata": { "duration_sec": 30 },
            "visual_telemetry": [
                { "time": 0, "telemetry": { "lat": 35.85, "lon": 14.50 } },
                { "time": 1, "telemetry": { "lat": 36.50, "lon": 14.50 } },
                { "time": 2, "telemetry": { "lat": 36.60, "lon": 14.50 } }
            ]
        }"#;
        let timeline = timeline_from_json(json).unwrap();
        let config = ReplayConfig {
            duration_override: Some(2.0),
            ..Default::default()
        };
        let outcome = ReplayRunner::new(config)
            .run(ReplaySource::Timeline(timeline))
            .await
            .unwrap();

        assert_eq!(outcome.report.asset_id, "capped");
        assert_eq!(outcome.report.final_time, 2.0);
        assert!(outcome.export.seed.is_none());
        // The later fixes are north of the map
        assert!(outcome.report.off_map_markers > 0);
        assert_eq!(outcome.report.frames_with_detection, 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_speed() {
        let config = ReplayConfig {
            speed: 0.0,
            ..Default::default()
        };
        let result = ReplayRunner::new(config).run(ReplaySource::Synthetic).await;
        assert!(matches!(result, Err(ReplayError::InvalidSpeed(_))));
    }

    #[tokio::test]
    async fn test_rejects_invalid_tolerance() {
        let config = ReplayConfig {
            tolerance: -1.0,
            ..Default::default()
        };
        let result = ReplayRunner::new(config).run(ReplaySource::Synthetic).await;
        assert!(matches!(result, Err(ReplayError::Config(_))));
    }
}
