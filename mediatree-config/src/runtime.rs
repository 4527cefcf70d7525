//! Wires a [`MediaTreeConfig`] into a running engine.

use anyhow::Context;
use mediatree_core::library::{
    ExtensionResolver, InProcLibraryEventBus, LibraryDefinition, LibraryEvent, LibraryRoots,
    LibraryScanner, RealFs, ReconcileSummary, TreeReconciler, ValidateOptions,
};
use mediatree_core::query::QueryPlanner;
use mediatree_core::store::{DurableEntityStore, EntityStore, InMemoryEntityStore};
use mediatree_core::users::InMemoryUserDataStore;
use mediatree_model::ItemId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::MediaTreeConfig;

/// Store, library roots, scanner and planner built from one configuration.
#[derive(Debug)]
pub struct Engine {
    store: Arc<dyn EntityStore>,
    definitions: Vec<LibraryDefinition>,
    roots: LibraryRoots,
    scanner: LibraryScanner,
    planner: QueryPlanner,
    events: Arc<InProcLibraryEventBus>,
    durable: bool,
}

impl Engine {
    /// Opens the configured store and bootstraps library folders.
    pub async fn build(config: &MediaTreeConfig) -> anyhow::Result<Self> {
        config.validate().context("configuration is invalid")?;

        let (store, durable): (Arc<dyn EntityStore>, bool) = match &config.store.root {
            Some(root) => {
                let store = DurableEntityStore::open(root.clone())
                    .await
                    .with_context(|| format!("failed to open store at {}", root.display()))?;
                info!("Opened durable store at {}", root.display());
                (Arc::new(store), true)
            }
            None => (Arc::new(InMemoryEntityStore::new()), false),
        };

        let definitions = config
            .libraries
            .iter()
            .map(|library| library.definition())
            .collect::<anyhow::Result<Vec<_>>>()?;
        let roots = LibraryRoots::bootstrap(store.as_ref(), &definitions)
            .await
            .context("failed to bootstrap library folders")?;

        let reconciler_config = &config.reconciler;
        let events = Arc::new(InProcLibraryEventBus::default());
        let fs = RealFs::new().with_shortcut_extensions(&reconciler_config.shortcut_extensions);
        let resolver = ExtensionResolver::new(
            &reconciler_config.video_extensions,
            &reconciler_config.audio_extensions,
        );
        let reconciler = TreeReconciler::new(store.clone(), Arc::new(fs), Arc::new(resolver))
            .with_events(events.clone())
            .with_library_locations(definitions.iter().map(|d| d.path.clone()));
        let scanner = LibraryScanner::new(Arc::new(reconciler))
            .with_max_concurrent_roots(reconciler_config.max_concurrent_roots)
            .with_progress_log_interval(reconciler_config.progress_log_interval);

        let planner = QueryPlanner::new(
            store.clone(),
            Arc::new(InMemoryUserDataStore::new()),
            roots.physical_root,
        )
        .with_max_limit(config.query.max_limit);

        Ok(Self {
            store,
            definitions,
            roots,
            scanner,
            planner,
            events,
            durable,
        })
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn roots(&self) -> &LibraryRoots {
        &self.roots
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Library folder ids whose name matches one of `names`
    /// (case-insensitive). An empty filter selects every library.
    pub fn select_libraries(&self, names: &[String]) -> anyhow::Result<Vec<ItemId>> {
        if names.is_empty() {
            return Ok(self.roots.libraries.clone());
        }
        names
            .iter()
            .map(|name| {
                self.definitions
                    .iter()
                    .zip(&self.roots.libraries)
                    .find(|(definition, _)| definition.name.eq_ignore_ascii_case(name))
                    .map(|(_, id)| *id)
                    .with_context(|| format!("no library named {name}"))
            })
            .collect()
    }

    /// Reconciles the given libraries and sums their summaries. A failing
    /// library is logged and skipped; the scan fails only when all do.
    pub async fn scan(
        &self,
        libraries: &[ItemId],
        options: ValidateOptions,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ReconcileSummary> {
        let results = self.scanner.scan_all(libraries, options, cancel).await;
        let mut total = ReconcileSummary::default();
        let mut failures = 0usize;
        for (library, outcome) in results {
            match outcome {
                Ok(summary) => {
                    debug!(library = %library, ?summary, "library reconciled");
                    total += summary;
                }
                Err(err) => {
                    warn!(library = %library, "Library failed: {}", err);
                    failures += 1;
                }
            }
        }
        if failures > 0 && failures == libraries.len() {
            anyhow::bail!("all {} libraries failed to scan", failures);
        }
        Ok(total)
    }
}
