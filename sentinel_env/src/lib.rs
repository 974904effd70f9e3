//! Sentinel Environment Abstraction Layer
//!
//! This crate provides the seams between the playback engine and the
//! outside world, so the same engine runs against a **real player**
//! (tokio timers, a native media element) and a **deterministic replay**
//! (virtual clock, headless player).
//!
//! # Seams
//!
//! - Time (`MediaClock::now()`, `MediaClock::sleep()`)
//! - Clock updates (`tick_channel()`, latest-wins)
//! - Native player commands (`PlayerControl`)
//!
//! # Example
//!
//! ```ignore
//! use sentinel_env::{tick_channel, MediaClock, TokioClock};
//!
//! let (mut publisher, mut subscriber) = tick_channel();
//! tokio::spawn(async move {
//!     let clock = TokioClock::new();
//!     loop {
//!         clock.sleep(Duration::from_millis(33)).await;
//!         if publisher.publish(clock.now().as_secs_f64()).is_err() { break; }
//!     }
//! });
//! while let Some(tick) = subscriber.next().await {
//!     coordinator.tick(tick.media_time);
//! }
//! ```

mod clock;
mod error;
mod feed;
mod player;
mod tokio_impl;
mod types;

pub use clock::{tick_interval, MediaClock};
pub use error::EnvError;
pub use feed::{tick_channel, TickPublisher, TickSubscriber};
pub use player::{DetachedPlayer, PlayerControl};
pub use tokio_impl::TokioClock;
pub use types::Tick;
