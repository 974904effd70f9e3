//! Latest-wins tick feed between a media clock and the playback engine.
//!
//! Clock updates may arrive faster than the engine consumes them. Rather
//! than queueing, the feed keeps only the newest tick: a slow consumer
//! always resolves against the most recent media time and the skipped
//! ticks are simply counted.
//!
//! ```text
//! MediaClock ──publish(t)──► [ watch slot: latest Tick ] ──next()──► Coordinator
//!                 t0 t1 t2              (t2 wins)                  superseded += 2
//!      ▲                                                               │
//!      └──────────── wait_consumed(seq) ◄── [ last taken seq ] ◄───────┘
//! ```
//!
//! A producer that must not lose ticks (a virtual clock in a replay) waits
//! on `wait_consumed` after each publish, which runs the two sides in
//! lockstep on any runtime flavor.

use crate::error::EnvError;
use crate::types::Tick;
use tokio::sync::watch;
use tracing::debug;

/// Creates a connected publisher/subscriber pair.
pub fn tick_channel() -> (TickPublisher, TickSubscriber) {
    let (tx, rx) = watch::channel(None);
    let (taken_tx, taken_rx) = watch::channel(None);
    (
        TickPublisher {
            tx,
            taken: taken_rx,
            next_seq: 0,
        },
        TickSubscriber {
            rx,
            taken: taken_tx,
            last_seq: None,
            superseded: 0,
        },
    )
}

/// Producer side, owned by whatever drives the media clock.
#[derive(Debug)]
pub struct TickPublisher {
    tx: watch::Sender<Option<Tick>>,
    taken: watch::Receiver<Option<u64>>,
    next_seq: u64,
}

impl TickPublisher {
    /// Publishes a new media time, replacing any tick not yet consumed.
    ///
    /// Returns the sequence number assigned to the tick.
    pub fn publish(&mut self, media_time: f64) -> Result<u64, EnvError> {
        let seq = self.next_seq;
        self.tx
            .send(Some(Tick::new(seq, media_time)))
            .map_err(|_| EnvError::FeedClosed)?;
        self.next_seq += 1;
        Ok(seq)
    }
    
    /// Waits until the subscriber has taken tick `seq` or a later one.
    pub async fn wait_consumed(&mut self, seq: u64) -> Result<(), EnvError> {
        self.taken
            .wait_for(|taken| taken.is_some_and(|t| t >= seq))
            .await
            .map(|_| ())
            .map_err(|_| EnvError::FeedClosed)
    }

    /// Number of ticks published so far.
    pub fn published(&self) -> u64 {
        self.next_seq
    }
}

/// Consumer side, owned by the playback engine's event loop.
#[derive(Debug)]
pub struct TickSubscriber {
    rx: watch::Receiver<Option<Tick>>,
    taken: watch::Sender<Option<u64>>,
    last_seq: Option<u64>,
    superseded: u64,
}

impl TickSubscriber {
    /// Waits for the newest unseen tick.
    ///
    /// Returns `None` once the publisher is dropped and its final tick has
    /// been consumed.
    pub async fn next(&mut self) -> Option<Tick> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let latest = *self.rx.borrow_and_update();
            if let Some(tick) = latest {
                self.account(tick);
                return Some(tick);
            }
        }
    }
    
    /// Total ticks that were replaced before this subscriber saw them.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
    
    fn account(&mut self, tick: Tick) {
        let skipped = match self.last_seq {
            Some(last) => tick.seq.saturating_sub(last + 1),
            None => tick.seq,
        };
        if skipped > 0 {
            debug!("Dropped {} superseded tick(s) before {}", skipped, tick);
        }
        self.superseded += skipped;
        self.last_seq = Some(tick.seq);
        self.taken.send_replace(Some(tick.seq));
    }
}
