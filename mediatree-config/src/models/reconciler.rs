use anyhow::bail;
use mediatree_core::library::fs::DEFAULT_SHORTCUT_EXTENSIONS;
use mediatree_core::library::resolver::{DEFAULT_AUDIO_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};
use serde::{Deserialize, Serialize};

fn owned(extensions: &[&str]) -> Vec<String> {
    extensions.iter().map(|ext| ext.to_string()).collect()
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// File extensions resolved as video items.
    pub video_extensions: Vec<String>,
    /// File extensions resolved as audio items.
    pub audio_extensions: Vec<String>,
    /// File extensions read as shortcuts to media stored elsewhere.
    pub shortcut_extensions: Vec<String>,
    /// Libraries reconciled at the same time. Raising this helps when
    /// libraries live on different disks.
    pub max_concurrent_roots: usize,
    /// Percentage step between progress log lines.
    pub progress_log_interval: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            video_extensions: owned(DEFAULT_VIDEO_EXTENSIONS),
            audio_extensions: owned(DEFAULT_AUDIO_EXTENSIONS),
            shortcut_extensions: owned(DEFAULT_SHORTCUT_EXTENSIONS),
            max_concurrent_roots: 2,
            progress_log_interval: 10.0,
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_roots == 0 {
            bail!("reconciler.max_concurrent_roots must be greater than zero");
        }
        if !(self.progress_log_interval > 0.0 && self.progress_log_interval <= 100.0) {
            bail!(
                "reconciler.progress_log_interval must be in (0, 100], got {}",
                self.progress_log_interval
            );
        }
        if self.video_extensions.is_empty() && self.audio_extensions.is_empty() {
            bail!("reconciler needs at least one video or audio extension");
        }
        Ok(())
    }
}
