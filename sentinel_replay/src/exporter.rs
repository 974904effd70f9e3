//! JSON exporter for offline inspection of a replay.
//!
//! Every update the coordinator publishes becomes one frame carrying the
//! composed overlay scene, so the exported file shows exactly what each
//! view would have drawn.

use sentinel_core::{OverlayScene, UpdateCause};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single published update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub cause: UpdateCause,

    #[serde(flatten)]
    pub scene: OverlayScene,
}

/// Complete replay export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayExport {
    pub asset_id: String,

    /// Seed of the synthetic payload, if one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Media time reached by the last frame
    pub duration_sec: f64,

    pub frames: Vec<ReplayFrame>,
}

impl ReplayExport {
    pub fn new(asset_id: &str, seed: Option<u64>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
        }
    }

    pub fn add_frame(&mut self, frame: ReplayFrame) {
        self.duration_sec = self.duration_sec.max(frame.scene.time);
        self.frames.push(frame);
    }

    /// Frames published for a given cause.
    pub fn frames_by(&self, cause: UpdateCause) -> impl Iterator<Item = &ReplayFrame> {
        self.frames.iter().filter(move |f| f.cause == cause)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
