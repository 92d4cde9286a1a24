//! JSON Lines capture feed: one captured frame per line.
//!
//! ```text
//! {"at_ms": 0, "faces": [[0.12, -0.03, ...]]}
//! {"at_ms": 40, "faces": []}
//! ```

use gatewatch_core::FeatureVector;
use serde::Deserialize;
use std::io::BufRead;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    /// Capture offset from the start of the feed.
    pub at_ms: u64,
    #[serde(default)]
    pub faces: Vec<FeatureVector>,
}

impl Frame {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.at_ms)
    }
}

/// Parse a feed. Malformed lines are logged and skipped; I/O errors abort.
pub fn read_frames<R: BufRead>(reader: R) -> std::io::Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(&line) {
            Ok(frame) => frames.push(frame),
            Err(e) => tracing::warn!(line = i + 1, error = %e, "skipping malformed frame"),
        }
    }
    Ok(frames)
}
