use futures::stream::{self, StreamExt};
use mediatree_model::ItemId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::progress::LoggingProgress;
use super::reconciler::{ReconcileSummary, TreeReconciler, ValidateOptions};
use crate::error::Result;

/// Runs reconciliation over several library roots at once.
///
/// Roots are independent: one failing or being cancelled does not stop the
/// others from finishing their current folder.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    reconciler: Arc<TreeReconciler>,
    max_concurrent_roots: usize,
    progress_log_interval: f64,
}

impl LibraryScanner {
    /// Two roots at a time, logging progress every 10%.
    pub fn new(reconciler: Arc<TreeReconciler>) -> Self {
        Self {
            reconciler,
            max_concurrent_roots: 2,
            progress_log_interval: 10.0,
        }
    }

    /// Clamped to at least one.
    pub fn with_max_concurrent_roots(mut self, max: usize) -> Self {
        self.max_concurrent_roots = max.max(1);
        self
    }

    pub fn with_progress_log_interval(mut self, interval: f64) -> Self {
        self.progress_log_interval = interval;
        self
    }

    pub fn reconciler(&self) -> &Arc<TreeReconciler> {
        &self.reconciler
    }

    /// Validates every root, at most `max_concurrent_roots` at a time.
    /// Results come back in completion order.
    pub async fn scan_all(
        &self,
        roots: &[ItemId],
        options: ValidateOptions,
        cancel: &CancellationToken,
    ) -> Vec<(ItemId, Result<ReconcileSummary>)> {
        info!(
            "Scanning {} libraries with concurrency {}",
            roots.len(),
            self.max_concurrent_roots
        );
        let results: Vec<(ItemId, Result<ReconcileSummary>)> = stream::iter(roots.iter().copied())
            .map(|root| {
                let reconciler = Arc::clone(&self.reconciler);
                let cancel = cancel.clone();
                let interval = self.progress_log_interval;
                async move {
                    let progress = LoggingProgress::new(format!("library {root}"), interval);
                    let outcome = reconciler
                        .validate_children(root, options, &progress, &cancel)
                        .await;
                    if let Err(err) = &outcome {
                        warn!(library = %root, "Library scan failed: {}", err);
                    }
                    (root, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent_roots)
            .collect()
            .await;

        let failed = results.iter().filter(|(_, outcome)| outcome.is_err()).count();
        info!(
            "Library scan finished: {} succeeded, {} failed",
            results.len() - failed,
            failed
        );
        results
    }
}
