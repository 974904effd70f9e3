//! The "PLAYBACK" Engine - Single Owner of "What Time Is It"
//!
//! The coordinator is the only writer of playback state. Every clock tick,
//! seek, transport change and asset load funnels into one resolution path,
//! and the resulting update is pushed synchronously to every subscriber
//! before the call returns. No two views can observe different "current"
//! annotations for the same update.
//!
//! ```text
//!   tick(t) ──┐
//!   seek(t) ──┼──► state ──► TemporalResolver ──► PlaybackUpdate ──► observers
//!   play() ───┤                    ▲                                (video overlay,
//!   load() ───┘              TimelineStore                           map, panel)
//! ```
//!
//! State machine: `Paused` (initial) ⇄ `Playing`. Seeking is valid in both
//! states and never changes the mode.

use crate::error::{ConfigError, PlaybackError, TimelineError};
use crate::sentinel_time::{ResolvedAnnotation, ResolverConfig, TemporalResolver};
use crate::sentinel_timeline::{AssetTimeline, TimelineStore};
use sentinel_env::{DetachedPlayer, PlayerControl, TickSubscriber};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Paused,
    Playing,
}

/// The authoritative playback position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Media position in seconds
    pub current_time: f64,
    pub mode: PlaybackMode,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.mode == PlaybackMode::Playing
    }
}

/// What triggered an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateCause {
    Tick,
    Seek,
    Transport,
    Load,
}

/// One resolved snapshot, delivered identically to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    /// Store generation the annotation was resolved against
    pub generation: u64,
    pub state: PlaybackState,
    /// Playable length of the loaded asset in seconds
    pub duration: f64,
    pub cause: UpdateCause,
    pub annotation: ResolvedAnnotation,
}

// ============================================================================
// SUBSCRIPTIONS
// ============================================================================

/// A view that wants every resolved update.
pub trait PlaybackObserver {
    fn on_update(&mut self, update: &PlaybackUpdate);
}

impl<F> PlaybackObserver for F
where
    F: FnMut(&PlaybackUpdate),
{
    fn on_update(&mut self, update: &PlaybackUpdate) {
        self(update)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Proof that an asynchronous load was started.
///
/// A ticket goes stale as soon as a newer load is started or any load or
/// unload completes, so a slow load can never overwrite a newer asset.
#[derive(Debug)]
pub struct LoadTicket {
    serial: u64,
    generation: u64,
}

/// Result of a seek. Out-of-range targets are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekOutcome {
    pub requested: f64,
    pub applied: f64,
}

impl SeekOutcome {
    pub fn clamped(&self) -> bool {
        self.requested != self.applied
    }
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct PlaybackCoordinator<P: PlayerControl = DetachedPlayer> {
    store: TimelineStore,
    resolver: TemporalResolver,
    state: PlaybackState,
    player: P,
    observers: Vec<(SubscriptionId, Box<dyn PlaybackObserver>)>,
    next_subscription: u64,
    load_serial: u64,
    last_update: Option<PlaybackUpdate>,
}

impl PlaybackCoordinator<DetachedPlayer> {
    /// A headless coordinator with no native player attached.
    pub fn new(config: ResolverConfig) -> Result<Self, ConfigError> {
        Self::with_player(DetachedPlayer, config)
    }
}

impl<P: PlayerControl> PlaybackCoordinator<P> {
    pub fn with_player(player: P, config: ResolverConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            store: TimelineStore::new(),
            resolver: TemporalResolver::new(config)?,
            state: PlaybackState::default(),
            player,
            observers: Vec::new(),
            next_subscription: 0,
            load_serial: 0,
            last_update: None,
        })
    }

    // ========== Clock & Transport ==========

    /// Native media-clock update.
    ///
    /// Non-finite times are ignored and the current state is re-published.
    pub fn tick(&mut self, media_time: f64) -> &PlaybackUpdate {
        if media_time.is_finite() {
            self.state.current_time = media_time.max(0.0);
        } else {
            warn!("Ignoring non-finite clock tick {}", media_time);
        }
        self.publish(UpdateCause::Tick)
    }

    /// Jump to `target` seconds, clamped into `[0, duration]`.
    ///
    /// Drives the native player to the applied position and resolves on the
    /// same path as `tick`. The play/pause mode is left unchanged.
    pub fn seek(&mut self, target: f64) -> SeekOutcome {
        let applied = if target.is_nan() {
            self.state.current_time
        } else {
            target.clamp(0.0, self.duration())
        };
        let outcome = SeekOutcome {
            requested: target,
            applied,
        };
        if outcome.clamped() {
            debug!("Seek to {} clamped to {}", target, applied);
        }

        self.state.current_time = applied;
        self.player.seek_to(applied);
        self.publish(UpdateCause::Seek);
        outcome
    }

    /// Set the mode. Returns true when the mode actually changed.
    ///
    /// The current time is never altered.
    pub fn set_playing(&mut self, playing: bool) -> bool {
        let mode = if playing {
            PlaybackMode::Playing
        } else {
            PlaybackMode::Paused
        };
        if self.state.mode == mode {
            return false;
        }
        self.state.mode = mode;
        self.player.set_playing(playing);
        self.publish(UpdateCause::Transport);
        true
    }

    /// Paused → Playing.
    pub fn play(&mut self) -> bool {
        self.set_playing(true)
    }

    /// Playing → Paused.
    pub fn pause(&mut self) -> bool {
        self.set_playing(false)
    }

    /// Seek to the start of a fused segment and start playing.
    pub fn jump_to_segment(&mut self, id: &str) -> Result<SeekOutcome, PlaybackError> {
        let start = self
            .store
            .timeline()
            .segment(id)
            .map(|s| s.start)
            .ok_or_else(|| PlaybackError::UnknownSegment(id.to_string()))?;
        let outcome = self.seek(start);
        self.play();
        Ok(outcome)
    }

    /// Follow a latest-wins tick feed until its publisher goes away.
    ///
    /// Returns the number of ticks resolved; superseded ticks are counted by
    /// the subscriber, not resolved.
    pub async fn follow(&mut self, feed: &mut TickSubscriber) -> u64 {
        let mut resolved = 0;
        while let Some(tick) = feed.next().await {
            self.tick(tick.media_time);
            resolved += 1;
        }
        debug!(
            "Tick feed closed after {} resolved, {} superseded",
            resolved,
            feed.superseded()
        );
        resolved
    }

    // ========== Asset Lifecycle ==========

    /// Replace the loaded asset. Time resets to 0 and playback pauses.
    pub fn load_asset(&mut self, timeline: AssetTimeline) -> u64 {
        let generation = self.store.install(timeline);
        self.reset_transport();
        self.publish(UpdateCause::Load);
        generation
    }

    /// Start an asynchronous load, invalidating any load already in flight.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_serial += 1;
        LoadTicket {
            serial: self.load_serial,
            generation: self.store.generation(),
        }
    }

    /// Finish an asynchronous load.
    ///
    /// Stale tickets are rejected without touching the current asset. A
    /// failed load surfaces its error and also leaves the current asset in
    /// place.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<AssetTimeline, TimelineError>,
    ) -> Result<u64, PlaybackError> {
        let current = self.store.generation();
        if ticket.serial != self.load_serial || ticket.generation != current {
            warn!(
                "Discarding stale load (ticket generation {}, current {})",
                ticket.generation, current
            );
            return Err(PlaybackError::StaleLoad {
                ticket: ticket.generation,
                current,
            });
        }

        match result {
            Ok(timeline) => Ok(self.load_asset(timeline)),
            Err(e) => {
                warn!("Asset load failed, keeping generation {}: {}", current, e);
                Err(e.into())
            }
        }
    }

    /// Drop the loaded asset, leaving an empty timeline.
    pub fn unload(&mut self) -> u64 {
        let generation = self.store.unload();
        self.reset_transport();
        self.publish(UpdateCause::Load);
        generation
    }

    // ========== Subscriptions ==========

    pub fn subscribe<O>(&mut self, observer: O) -> SubscriptionId
    where
        O: PlaybackObserver + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false when the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    // ========== Accessors ==========

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn duration(&self) -> f64 {
        self.store.timeline().duration()
    }

    pub fn timeline(&self) -> &AssetTimeline {
        self.store.timeline()
    }

    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    pub fn resolver(&self) -> &TemporalResolver {
        &self.resolver
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// The most recent update pushed to subscribers.
    pub fn last_update(&self) -> Option<&PlaybackUpdate> {
        self.last_update.as_ref()
    }

    // ========== Private Helper Methods ==========

    fn reset_transport(&mut self) {
        self.state = PlaybackState::default();
        self.player.set_playing(false);
        self.player.seek_to(0.0);
    }

    /// Resolve at the current time and fan out to every observer.
    fn publish(&mut self, cause: UpdateCause) -> &PlaybackUpdate {
        let timeline = self.store.timeline();
        let update = PlaybackUpdate {
            generation: self.store.generation(),
            state: self.state,
            duration: timeline.duration(),
            cause,
            annotation: self.resolver.resolve(timeline, self.state.current_time),
        };

        for (_, observer) in self.observers.iter_mut() {
            observer.on_update(&update);
        }
        if cause == UpdateCause::Load {
            info!(
                "Generation {} ready: duration {:.2}s, {} subscriber(s)",
                update.generation,
                update.duration,
                self.observers.len()
            );
        }
        self.last_update.insert(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentinel_timeline::{DetectionSample, FusedSegment, MediaMetadata, NormalizedBox, TelemetrySample};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct RecordingPlayer {
        seeks: Vec<f64>,
        playing: Vec<bool>,
    }

    impl PlayerControl for RecordingPlayer {
        fn seek_to(&mut self, media_time: f64) {
            self.seeks.push(media_time);
        }

        fn set_playing(&mut self, playing: bool) {
            self.playing.push(playing);
        }
    }

    fn sample_timeline(duration: f64) -> AssetTimeline {
        let telemetry = (0..10)
            .map(|i| TelemetrySample::new(i as f64, 35.85, 14.51).with_speed(400.0))
            .collect();
        let detections = vec![DetectionSample::new(
            3.0,
            "airplane",
            0.92,
            NormalizedBox::new(0.5, 0.5, 0.2, 0.1),
        )];
        let segments = vec![
            FusedSegment::new("seg-a", 0.0, 10.0, 0.5, "clips/a.mp4"),
            FusedSegment::new("seg-b", 5.0, 15.0, 0.9, "clips/b.mp4"),
        ];
        AssetTimeline::new("vid-1", telemetry, detections, segments)
            .unwrap()
            .with_metadata(MediaMetadata {
                duration_sec: Some(duration),
                ..Default::default()
            })
    }

    fn recorder<P: PlayerControl>(coordinator: &mut PlaybackCoordinator<P>) -> Rc<RefCell<Vec<PlaybackUpdate>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        coordinator.subscribe(move |update: &PlaybackUpdate| sink.borrow_mut().push(update.clone()));
        log
    }

    #[test]
    fn test_initial_state_is_paused_at_zero() {
        let coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        assert_eq!(coordinator.state().mode, PlaybackMode::Paused);
        assert_eq!(coordinator.state().current_time, 0.0);
        assert!(coordinator.last_update().is_none());
    }

    #[test]
    fn test_seek_clamps_into_duration() {
        let mut coordinator =
            PlaybackCoordinator::with_player(RecordingPlayer::default(), ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));

        let low = coordinator.seek(-5.0);
        assert_eq!(low.applied, 0.0);
        assert!(low.clamped());

        let high = coordinator.seek(200.0);
        assert_eq!(high.applied, 120.0);
        assert_eq!(coordinator.state().current_time, 120.0);

        let inside = coordinator.seek(42.0);
        assert!(!inside.clamped());
        assert_eq!(coordinator.player().seeks.last(), Some(&42.0));
    }

    #[test]
    fn test_seek_preserves_mode() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));

        coordinator.seek(10.0);
        assert_eq!(coordinator.state().mode, PlaybackMode::Paused);

        assert!(coordinator.play());
        coordinator.seek(20.0);
        assert_eq!(coordinator.state().mode, PlaybackMode::Playing);
    }

    #[test]
    fn test_transport_transitions() {
        let mut coordinator =
            PlaybackCoordinator::with_player(RecordingPlayer::default(), ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(60.0));
        coordinator.tick(7.5);

        assert!(coordinator.play());
        assert!(!coordinator.play(), "already playing");
        assert!(coordinator.pause());
        assert!(!coordinator.set_playing(false));
        assert_eq!(coordinator.state().current_time, 7.5);
        assert_eq!(coordinator.player().playing, vec![false, true, false]);
    }

    #[test]
    fn test_tick_and_seek_share_resolution() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));

        let via_tick = coordinator.tick(7.0).annotation.clone();
        let via_seek = {
            coordinator.seek(7.0);
            coordinator.last_update().unwrap().annotation.clone()
        };
        assert_eq!(via_tick, via_seek);
        assert_eq!(via_tick.segment.map(|s| s.id), Some("seg-b".to_string()));
        assert_eq!(via_tick.telemetry.map(|s| s.time), Some(7.0));
        assert!(via_tick.detection.is_none());
    }

    #[test]
    fn test_all_observers_see_the_same_update() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        let video = recorder(&mut coordinator);
        let map = recorder(&mut coordinator);
        let panel = recorder(&mut coordinator);

        coordinator.load_asset(sample_timeline(120.0));
        coordinator.tick(3.2);
        coordinator.seek(50.0);

        assert_eq!(video.borrow().len(), 3);
        assert_eq!(*video.borrow(), *map.borrow());
        assert_eq!(*map.borrow(), *panel.borrow());

        let at_tick = &video.borrow()[1];
        assert_eq!(at_tick.cause, UpdateCause::Tick);
        assert_eq!(at_tick.annotation.detection.as_ref().map(|d| d.label.as_str()), Some("airplane"));
    }

    #[test]
    fn test_unsubscribe() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        let log = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&log);
        let id = coordinator.subscribe(move |_: &PlaybackUpdate| *counter.borrow_mut() += 1);

        coordinator.tick(1.0);
        assert!(coordinator.unsubscribe(id));
        assert!(!coordinator.unsubscribe(id));
        coordinator.tick(2.0);

        assert_eq!(*log.borrow(), 1);
        assert_eq!(coordinator.subscriber_count(), 0);
    }

    #[test]
    fn test_absence_is_reported_not_zeroed() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));
        let update = coordinator.tick(60.0);
        assert!(update.annotation.is_empty());
    }

    #[test]
    fn test_non_finite_tick_is_ignored() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));
        coordinator.tick(4.0);
        let update = coordinator.tick(f64::NAN);
        assert_eq!(update.state.current_time, 4.0);
    }

    #[test]
    fn test_jump_to_segment_seeks_and_plays() {
        let mut coordinator =
            PlaybackCoordinator::with_player(RecordingPlayer::default(), ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));

        let outcome = coordinator.jump_to_segment("seg-b").unwrap();
        assert_eq!(outcome.applied, 5.0);
        assert!(coordinator.state().is_playing());
        assert_eq!(coordinator.player().seeks.last(), Some(&5.0));

        assert!(matches!(
            coordinator.jump_to_segment("missing"),
            Err(PlaybackError::UnknownSegment(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_load_resets_transport() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));
        coordinator.seek(30.0);
        coordinator.play();

        let generation = coordinator.load_asset(sample_timeline(90.0));
        assert_eq!(generation, 2);
        assert_eq!(coordinator.state(), PlaybackState::default());
        assert_eq!(coordinator.duration(), 90.0);
    }

    #[test]
    fn test_stale_load_is_rejected() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        let slow = coordinator.begin_load();
        let fast = coordinator.begin_load();

        let generation = coordinator.complete_load(fast, Ok(sample_timeline(90.0))).unwrap();
        assert_eq!(generation, 1);

        let result = coordinator.complete_load(slow, Ok(sample_timeline(30.0)));
        assert!(matches!(result, Err(PlaybackError::StaleLoad { ticket: 0, current: 1 })));
        assert_eq!(coordinator.duration(), 90.0);
    }

    #[test]
    fn test_ticket_goes_stale_after_direct_load() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        let ticket = coordinator.begin_load();
        coordinator.load_asset(sample_timeline(60.0));

        assert!(matches!(
            coordinator.complete_load(ticket, Ok(sample_timeline(10.0))),
            Err(PlaybackError::StaleLoad { .. })
        ));
    }

    #[test]
    fn test_failed_load_keeps_previous_asset() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        coordinator.load_asset(sample_timeline(120.0));

        let ticket = coordinator.begin_load();
        let broken = AssetTimeline::new("bad", vec![TelemetrySample::new(-1.0, 0.0, 0.0)], vec![], vec![]);
        let result = coordinator.complete_load(ticket, broken);

        assert!(matches!(result, Err(PlaybackError::Timeline(_))));
        assert_eq!(coordinator.generation(), 1);
        assert_eq!(coordinator.timeline().asset_id(), "vid-1");
    }

    #[test]
    fn test_unload_empties_timeline() {
        let mut coordinator = PlaybackCoordinator::new(ResolverConfig::default()).unwrap();
        let log = recorder(&mut coordinator);
        coordinator.load_asset(sample_timeline(120.0));
        coordinator.unload();

        assert!(coordinator.timeline().is_empty());
        assert_eq!(coordinator.duration(), 0.0);
        let last = log.borrow().last().cloned().unwrap();
        assert_eq!(last.generation, 2);
        assert!(last.annotation.is_empty());
    }
}
