use std::sync::Mutex;
use tracing::info;

/// Receives reconciliation progress as a percentage, 0..=100.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64) {}
}

/// Maps a child's 0..=100 onto `[start, end]` of a parent sink.
pub struct ScaledProgress<'a> {
    parent: &'a dyn ProgressSink,
    start: f64,
    end: f64,
}

impl std::fmt::Debug for ScaledProgress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaledProgress")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl<'a> ScaledProgress<'a> {
    pub fn new(parent: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        Self { parent, start, end }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, percent: f64) {
        let fraction = percent.clamp(0.0, 100.0) / 100.0;
        self.parent
            .report(self.start + (self.end - self.start) * fraction);
    }
}

/// Logs progress every `interval` percentage points.
#[derive(Debug)]
pub struct LoggingProgress {
    label: String,
    interval: f64,
    last: Mutex<f64>,
}

impl LoggingProgress {
    pub fn new(label: impl Into<String>, interval: f64) -> Self {
        Self {
            label: label.into(),
            interval: interval.max(1.0),
            last: Mutex::new(f64::NEG_INFINITY),
        }
    }
}

impl ProgressSink for LoggingProgress {
    fn report(&self, percent: f64) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if percent >= 100.0 || percent - *last >= self.interval {
            *last = percent;
            info!(library = %self.label, percent = format!("{percent:.1}"), "reconcile progress");
        }
    }
}

/// Keeps every report; for tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<f64>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<f64> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: f64) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(percent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_progress_maps_into_range() {
        let recorder = RecordingProgress::new();
        let scaled = ScaledProgress::new(&recorder, 10.0, 20.0);
        scaled.report(0.0);
        scaled.report(50.0);
        scaled.report(100.0);
        assert_eq!(recorder.reports(), vec![10.0, 15.0, 20.0]);
    }
}
