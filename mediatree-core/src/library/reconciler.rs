//! Keeps stored folders in step with the file system.
//!
//! One pass over a folder lists its entries, resolves them to typed stubs,
//! diffs them against the stored children, applies creates, updates and
//! removals under the folder's lock, then optionally recurses and hands
//! off to the metadata collaborator. Running a pass twice over an
//! unchanged file system changes nothing the second time.

use futures::FutureExt;
use futures::future::BoxFuture;
use mediatree_model::{
    CollectionType, Entity, ItemId, LinkedChild, LinkedChildKind, LocationType,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::events::{LibraryEvent, LibraryEventPublisher};
use super::fs::{FileSystem, FsEntry};
use super::locks::FolderLocks;
use super::offline::OfflineDetector;
use super::progress::{ProgressSink, ScaledProgress};
use super::refresh::{MetadataRefresher, NoopRefresher, RefreshOptions};
use super::resolver::{ItemResolver, Resolution, ResolveContext};
use crate::error::{MediaError, Result};
use crate::store::EntityStore;

/// Where a folder pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    /// Listing the folder on disk.
    Scanning,
    /// Matching the listing against stored children.
    Diffing,
    /// Writing creates, updates and removals.
    Applying,
    /// Descending into child folders.
    Recursing,
    /// Handing children to the metadata collaborator.
    RefreshingMetadata,
    Done,
}

/// What one `validate_children` call covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidateOptions {
    /// Descend into child folders after the folder itself is applied.
    pub recursive: bool,
    /// Hand new and existing children to the metadata collaborator.
    pub refresh: Option<RefreshOptions>,
}

impl ValidateOptions {
    /// Whole-subtree pass without metadata refresh.
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            refresh: None,
        }
    }

    /// Also refresh metadata once the tree is reconciled.
    pub fn with_refresh(mut self, options: RefreshOptions) -> Self {
        self.refresh = Some(options);
        self
    }
}

/// Counts across every folder a pass touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileSummary {
    pub folders_visited: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Missing children kept because their volume is unreachable.
    pub retained_offline: usize,
    /// Missing children kept because they are virtual, remote or pathless.
    pub retained_unvalidatable: usize,
    /// Folders whose listing failed.
    pub skipped_folders: usize,
    pub refresh_failures: usize,
}

impl ReconcileSummary {
    /// No entity was created, updated or removed.
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }
}

impl std::ops::AddAssign for ReconcileSummary {
    fn add_assign(&mut self, other: Self) {
        self.folders_visited += other.folders_visited;
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.retained_offline += other.retained_offline;
        self.retained_unvalidatable += other.retained_unvalidatable;
        self.skipped_folders += other.skipped_folders;
        self.refresh_failures += other.refresh_failures;
    }
}

/// Outcome of diffing one folder's listing against its stored children.
#[derive(Debug, Default)]
struct FolderDiff {
    created: Vec<Entity>,
    updated: Vec<Entity>,
    removed: Vec<Entity>,
    /// Every child that stays, in listing order, retained ones last.
    current: Vec<Entity>,
    retained_offline: usize,
    retained_unvalidatable: usize,
}

/// Keeps stored folders in step with the file system.
///
/// Collaborators are injected: the store is written through, the resolver
/// types new entries, the refresher (a no-op by default) fetches metadata
/// and the optional publisher receives add, update and remove events.
#[derive(Debug, Clone)]
pub struct TreeReconciler {
    store: Arc<dyn EntityStore>,
    fs: Arc<dyn FileSystem>,
    resolver: Arc<dyn ItemResolver>,
    refresher: Arc<dyn MetadataRefresher>,
    events: Option<Arc<dyn LibraryEventPublisher>>,
    locks: FolderLocks,
    offline: OfflineDetector,
}

impl TreeReconciler {
    /// A reconciler with no metadata refresh, no events and no library
    /// locations, so nothing is ever judged offline.
    pub fn new(
        store: Arc<dyn EntityStore>,
        fs: Arc<dyn FileSystem>,
        resolver: Arc<dyn ItemResolver>,
    ) -> Self {
        Self {
            store,
            fs,
            resolver,
            refresher: Arc::new(NoopRefresher),
            events: None,
            locks: FolderLocks::new(),
            offline: OfflineDetector::default(),
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn MetadataRefresher>) -> Self {
        self.refresher = refresher;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn LibraryEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share locks with other reconcilers writing to the same store.
    pub fn with_locks(mut self, locks: FolderLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Library roots used to tell an unreachable volume from a deleted path.
    pub fn with_library_locations<I, P>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for location in locations {
            self.offline.add_location(location);
        }
        self
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Reconciles `folder_id` against the file system.
    ///
    /// Enumeration failures skip the affected folder and are only logged.
    /// Cancellation stops at the next folder or phase boundary with
    /// [`MediaError::Cancelled`]; changes already applied stay applied.
    pub async fn validate_children(
        &self,
        folder_id: ItemId,
        options: ValidateOptions,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ReconcileSummary> {
        let folder = self
            .store
            .get(folder_id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("folder {folder_id}")))?;
        let collection_type = self.library_type(&folder).await?;

        let mut summary = ReconcileSummary::default();
        let (progress_end, refresh) = match options.refresh {
            Some(refresh) => (20.0, Some(refresh)),
            None => (100.0, None),
        };
        {
            let scaled = ScaledProgress::new(progress, 0.0, progress_end);
            self.validate_folder(
                folder.clone(),
                collection_type,
                options.recursive,
                &scaled,
                cancel,
                &mut summary,
            )
            .await?;
        }

        if let Some(refresh) = refresh {
            check_cancelled(cancel, folder_id)?;
            trace_phase(folder_id, ReconcilePhase::RefreshingMetadata);
            let scaled = ScaledProgress::new(progress, 20.0, 100.0);
            self.refresh_children(
                &folder,
                options.recursive,
                &refresh,
                &scaled,
                cancel,
                &mut summary,
            )
            .await?;
        }

        progress.report(100.0);
        trace_phase(folder_id, ReconcilePhase::Done);
        Ok(summary)
    }

    /// Content type of the library `folder` sits in.
    async fn library_type(&self, folder: &Entity) -> Result<Option<CollectionType>> {
        let mut current = Some(folder.clone());
        let mut hops = 0;
        while let Some(entity) = current {
            if entity.is_collection_folder() {
                return Ok(entity.collection_type());
            }
            hops += 1;
            if hops > 256 {
                warn!(folder = %folder.id, "parent chain too deep; assuming no library type");
                return Ok(None);
            }
            current = match entity.parent_id {
                Some(parent) => self.store.get(parent).await?,
                None => None,
            };
        }
        Ok(None)
    }

    fn validate_folder<'a>(
        &'a self,
        folder: Entity,
        collection_type: Option<CollectionType>,
        recursive: bool,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
        summary: &'a mut ReconcileSummary,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            check_cancelled(cancel, folder.id)?;
            summary.folders_visited += 1;

            trace_phase(folder.id, ReconcilePhase::Scanning);
            let Some(listing) = self.scan(&folder, summary).await else {
                return Ok(());
            };
            progress.report(5.0);

            check_cancelled(cancel, folder.id)?;
            trace_phase(folder.id, ReconcilePhase::Diffing);
            let (folder, diff, folder_changed) = match listing {
                Some(entries) => self.diff(folder, collection_type, entries).await?,
                // Not enumerable: keep what is stored and walk into it.
                None => {
                    let ids = self.store.list_child_ids(folder.id).await?;
                    let current = self.store.get_many(&ids).await?;
                    let diff = FolderDiff {
                        current,
                        ..FolderDiff::default()
                    };
                    (folder, diff, false)
                }
            };

            check_cancelled(cancel, folder.id)?;
            trace_phase(folder.id, ReconcilePhase::Applying);
            self.apply(&folder, &diff, folder_changed).await?;
            progress.report(10.0);

            summary.created += diff.created.len();
            summary.updated += diff.updated.len() + usize::from(folder_changed);
            summary.removed += diff.removed.len();
            summary.retained_offline += diff.retained_offline;
            summary.retained_unvalidatable += diff.retained_unvalidatable;
            info!(
                folder = %folder.id,
                created = diff.created.len(),
                updated = diff.updated.len(),
                removed = diff.removed.len(),
                "Validated {}",
                folder.name
            );

            if recursive {
                trace_phase(folder.id, ReconcilePhase::Recursing);
                let subfolders: Vec<Entity> = diff
                    .current
                    .into_iter()
                    .filter(|child| child.is_folder() && !child.is_offline)
                    .collect();
                let count = subfolders.len() as f64;
                for (index, child) in subfolders.into_iter().enumerate() {
                    check_cancelled(cancel, folder.id)?;
                    let start = 10.0 + 10.0 * index as f64 / count;
                    let end = 10.0 + 10.0 * (index + 1) as f64 / count;
                    let scaled = ScaledProgress::new(progress, start, end);
                    let child_type = if child.is_collection_folder() {
                        child.collection_type()
                    } else {
                        collection_type
                    };
                    self.validate_folder(child, child_type, true, &scaled, cancel, summary)
                        .await?;
                }
            }
            progress.report(20.0);
            Ok(())
        }
        .boxed()
    }

    /// Directory listing for `folder`. `Some(None)` means the folder is not
    /// enumerable and is walked from its stored children; `None` means the
    /// listing failed and the folder is skipped.
    async fn scan(
        &self,
        folder: &Entity,
        summary: &mut ReconcileSummary,
    ) -> Option<Option<Vec<FsEntry>>> {
        let path = match &folder.path {
            Some(path) if !folder.location.is_unvalidatable() && !folder.is_root() => path,
            _ => return Some(None),
        };
        match self.fs.list_dir(path).await {
            Ok(entries) => Some(Some(entries)),
            Err(err) => {
                error!(
                    folder = %folder.id,
                    path = %path.display(),
                    "Enumeration failed, skipping folder: {}",
                    err
                );
                summary.skipped_folders += 1;
                None
            }
        }
    }

    async fn diff(
        &self,
        mut folder: Entity,
        collection_type: Option<CollectionType>,
        entries: Vec<FsEntry>,
    ) -> Result<(Entity, FolderDiff, bool)> {
        let (shortcuts, media): (Vec<FsEntry>, Vec<FsEntry>) = entries
            .into_iter()
            .partition(|entry| !entry.is_dir && self.fs.is_shortcut(&entry.path));

        let modified_at: HashMap<PathBuf, _> = media
            .iter()
            .filter_map(|entry| entry.modified.map(|m| (entry.path.clone(), m)))
            .collect();

        let context = ResolveContext::new(folder.clone(), collection_type);
        let resolutions = self.resolver.resolve(&context, &media);

        let mut stored: HashMap<ItemId, Entity> = HashMap::new();
        let mut stored_order = Vec::new();
        for child in self
            .store
            .get_many(&self.store.list_child_ids(folder.id).await?)
            .await?
        {
            if stored.contains_key(&child.id) {
                warn!(
                    folder = %folder.id,
                    child = %child.id,
                    "Duplicate child id, keeping the first"
                );
                continue;
            }
            stored_order.push(child.id);
            stored.insert(child.id, child);
        }
        let stored_by_path: HashMap<PathBuf, ItemId> = stored
            .values()
            .filter_map(|child| child.path.clone().map(|path| (path, child.id)))
            .collect();

        let mut diff = FolderDiff::default();
        let mut seen: HashSet<ItemId> = HashSet::new();

        for resolution in resolutions {
            let stub = match resolution {
                Resolution::Resolved(stub) => stub,
                Resolution::Failed { path, reason } => {
                    warn!(
                        folder = %folder.id,
                        path = %path.display(),
                        "Resolver failed: {}",
                        reason
                    );
                    // Keep whatever is stored there until it resolves again.
                    if let Some(id) = stored_by_path.get(&path)
                        && seen.insert(*id)
                        && let Some(existing) = stored.get(id)
                    {
                        diff.current.push(existing.clone());
                    }
                    continue;
                }
            };
            if !seen.insert(stub.id) {
                warn!(
                    folder = %folder.id,
                    child = %stub.id,
                    "Two entries resolved to one id, keeping the first"
                );
                continue;
            }

            match stored.get(&stub.id) {
                Some(existing) if existing.is_valid_from_resolver(&stub) => {
                    let mut kept = existing.clone();
                    let mut changed = false;
                    if let Some(path) = &kept.path
                        && let Some(modified) = modified_at.get(path)
                        && kept.date_modified != *modified
                    {
                        kept.date_modified = *modified;
                        changed = true;
                    }
                    if kept.is_offline || kept.location == LocationType::Offline {
                        kept.is_offline = false;
                        if kept.location == LocationType::Offline {
                            kept.location = LocationType::FileSystem;
                        }
                        changed = true;
                    }
                    if changed {
                        diff.updated.push(kept.clone());
                    }
                    diff.current.push(kept);
                }
                Some(existing) => {
                    debug!(
                        child = %stub.id,
                        from = ?existing.item_kind(),
                        to = ?stub.item_kind(),
                        "Replacing child in place"
                    );
                    let mut replacement = stub;
                    replacement.date_created = existing.date_created;
                    diff.updated.push(replacement.clone());
                    diff.current.push(replacement);
                }
                None => {
                    diff.created.push(stub.clone());
                    diff.current.push(stub);
                }
            }
        }

        for id in stored_order {
            if seen.contains(&id) {
                continue;
            }
            let Some(child) = stored.remove(&id) else {
                continue;
            };
            if child.location.is_unvalidatable() || child.path.is_none() {
                diff.retained_unvalidatable += 1;
                diff.current.push(child);
                continue;
            }
            let offline = match &child.path {
                Some(path) => self.offline.is_offline(self.fs.as_ref(), path).await,
                None => false,
            };
            if offline {
                diff.retained_offline += 1;
                let mut child = child;
                if !child.is_offline {
                    child.is_offline = true;
                    diff.updated.push(child.clone());
                }
                diff.current.push(child);
            } else {
                diff.removed.push(child);
            }
        }

        let folder_changed = if folder.supports_shortcut_children() {
            self.refresh_shortcut_links(&mut folder, &shortcuts).await
        } else {
            false
        };

        Ok((folder, diff, folder_changed))
    }

    /// Replaces the folder's shortcut links with the shortcuts currently on
    /// disk. Manual links are left alone. Returns whether anything changed.
    async fn refresh_shortcut_links(&self, folder: &mut Entity, shortcuts: &[FsEntry]) -> bool {
        let mut found = Vec::new();
        for shortcut in shortcuts {
            match self.fs.resolve_shortcut(&shortcut.path).await {
                Ok(target) => found.push(LinkedChild::shortcut(target)),
                Err(err) => warn!(
                    path = %shortcut.path.display(),
                    "Unreadable shortcut: {}",
                    err
                ),
            }
        }

        let Some(data) = folder.folder_data_mut() else {
            return false;
        };
        let existing: Vec<LinkedChild> = data
            .linked_children
            .iter()
            .filter(|link| link.kind == LinkedChildKind::Shortcut)
            .cloned()
            .collect();
        if existing == found {
            return false;
        }
        data.linked_children.retain(|link| link.kind == LinkedChildKind::Manual);
        data.linked_children.extend(found);
        true
    }

    async fn apply(&self, folder: &Entity, diff: &FolderDiff, folder_changed: bool) -> Result<()> {
        let _guard = self.locks.lock(folder.id).await;

        if !diff.removed.is_empty() {
            let direct: Vec<ItemId> = diff.removed.iter().map(|child| child.id).collect();
            let mut doomed = direct.clone();
            for child in diff.removed.iter().filter(|child| child.is_folder()) {
                doomed.extend(self.owned_descendants(child.id).await?);
            }
            self.store.delete_items(&doomed).await?;
            self.store.remove_child_ids(folder.id, &direct).await?;
            for child in &diff.removed {
                debug!(folder = %folder.id, child = %child.id, path = ?child.path, "Removed");
                self.publish(LibraryEvent::ItemRemoved {
                    item_id: child.id,
                    parent_id: folder.id,
                })
                .await;
            }
        }

        let mut batch: Vec<Entity> = diff
            .created
            .iter()
            .chain(diff.updated.iter())
            .cloned()
            .collect();
        if folder_changed {
            let mut folder = folder.clone();
            folder.date_modified = chrono::Utc::now();
            batch.push(folder);
        }
        if !batch.is_empty() {
            self.store.save_items(&batch).await?;
        }

        // Re-adding every current child also repairs a child list that lost
        // ids in an interrupted pass.
        let current: Vec<ItemId> = diff.current.iter().map(|child| child.id).collect();
        if !current.is_empty() {
            self.store.add_child_ids(folder.id, &current).await?;
        }

        for child in &diff.created {
            self.publish(LibraryEvent::ItemAdded {
                item_id: child.id,
                parent_id: folder.id,
            })
            .await;
        }
        for child in &diff.updated {
            self.publish(LibraryEvent::ItemUpdated { item_id: child.id }).await;
        }
        if folder_changed {
            self.publish(LibraryEvent::ItemUpdated { item_id: folder.id }).await;
        }
        Ok(())
    }

    async fn owned_descendants(&self, root: ItemId) -> Result<Vec<ItemId>> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.store.list_child_ids(id).await? {
                if seen.insert(child) {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
        Ok(out)
    }

    async fn publish(&self, event: LibraryEvent) {
        if let Some(events) = &self.events
            && let Err(err) = events.publish(event).await
        {
            warn!("Failed to publish library event: {}", err);
        }
    }

    /// Refreshes every child of `folder`. Containers that refresh their own
    /// subtree get one call; other folders are walked when `recursive`.
    fn refresh_children<'a>(
        &'a self,
        folder: &'a Entity,
        recursive: bool,
        options: &'a RefreshOptions,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
        summary: &'a mut ReconcileSummary,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if folder.is_metadata_container() {
                if let Err(err) = self.refresher.refresh_all(folder, options).await {
                    warn!(folder = %folder.id, "Metadata refresh failed: {}", err);
                    summary.refresh_failures += 1;
                }
                return Ok(());
            }

            let ids = self.store.list_child_ids(folder.id).await?;
            let children = self.store.get_many(&ids).await?;
            let count = children.len().max(1) as f64;
            for (index, child) in children.iter().enumerate() {
                check_cancelled(cancel, folder.id)?;
                let outcome = if child.is_metadata_container() {
                    self.refresher.refresh_all(child, options).await
                } else {
                    self.refresher.refresh(child, options).await
                };
                if let Err(err) = outcome {
                    warn!(child = %child.id, "Metadata refresh failed: {}", err);
                    summary.refresh_failures += 1;
                }
                if recursive && child.is_folder() && !child.is_metadata_container() {
                    self.refresh_children(
                        child,
                        true,
                        options,
                        &super::progress::NoProgress,
                        cancel,
                        summary,
                    )
                    .await?;
                }
                progress.report(100.0 * (index + 1) as f64 / count);
            }
            Ok(())
        }
        .boxed()
    }
}

fn check_cancelled(cancel: &CancellationToken, folder: ItemId) -> Result<()> {
    if cancel.is_cancelled() {
        info!(folder = %folder, "Reconciliation cancelled");
        return Err(MediaError::Cancelled(format!("reconciliation of folder {folder}")));
    }
    Ok(())
}

fn trace_phase(folder: ItemId, phase: ReconcilePhase) {
    debug!(folder = %folder, ?phase, "reconcile phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fs::InMemoryFs;
    use crate::library::progress::{NoProgress, RecordingProgress};
    use crate::library::resolver::ExtensionResolver;
    use crate::store::InMemoryEntityStore;
    use mediatree_model::{EntityKind, FolderData};

    async fn setup(fs: InMemoryFs) -> (TreeReconciler, Entity) {
        let store = Arc::new(InMemoryEntityStore::new());
        let library = Entity::at_path(
            "/media/movies",
            "Movies",
            EntityKind::Folder(FolderData::collection(Some(CollectionType::Movies))),
        );
        store.save_items(std::slice::from_ref(&library)).await.unwrap();
        let reconciler = TreeReconciler::new(
            store,
            Arc::new(fs),
            Arc::new(ExtensionResolver::default()),
        )
        .with_library_locations(["/media/movies"]);
        (reconciler, library)
    }

    #[tokio::test]
    async fn first_pass_creates_second_pass_is_quiet() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/media/movies/A.mkv", 1);
        fs.add_file("/media/movies/Sub/B.mkv", 1);
        let (reconciler, library) = setup(fs).await;
        let cancel = CancellationToken::new();

        let first = reconciler
            .validate_children(library.id, ValidateOptions::recursive(), &NoProgress, &cancel)
            .await
            .unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.folders_visited, 2);

        let second = reconciler
            .validate_children(library.id, ValidateOptions::recursive(), &NoProgress, &cancel)
            .await
            .unwrap();
        assert!(second.is_unchanged(), "{second:?}");
    }

    #[tokio::test]
    async fn progress_ends_at_one_hundred() {
        let mut fs = InMemoryFs::new();
        fs.add_file("/media/movies/A.mkv", 1);
        let (reconciler, library) = setup(fs).await;
        let progress = RecordingProgress::new();
        reconciler
            .validate_children(
                library.id,
                ValidateOptions::default(),
                &progress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let reports = progress.reports();
        assert_eq!(reports.last().copied(), Some(100.0));
        assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{reports:?}");
    }

    #[tokio::test]
    async fn unknown_folder_is_not_found() {
        let (reconciler, _) = setup(InMemoryFs::new()).await;
        let err = reconciler
            .validate_children(
                ItemId::new(),
                ValidateOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
    }
}
