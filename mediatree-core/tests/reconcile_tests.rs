mod support;

use async_trait::async_trait;
use mediatree_core::MediaError;
use mediatree_core::library::{
    ExtensionResolver, FsEntry, InMemoryFs, ItemResolver, LibraryDefinition, LibraryEvent,
    LibraryRoots, LibraryScanner, MetadataRefresher, NoProgress, ReconcileSummary, RefreshOptions,
    Resolution, ResolveContext, TreeReconciler, ValidateOptions,
};
use mediatree_core::store::{EntityStore, InMemoryEntityStore};
use mediatree_model::{
    CollectionType, Entity, EntityKind, ItemId, ItemKind, LinkedChild, LinkedChildKind,
    LocationType, VideoData,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use support::Harness;
use tokio_util::sync::CancellationToken;

const MOVIES: &str = "/media/movies";

fn movie_id(path: &str) -> ItemId {
    ItemId::from_path(ItemKind::Movie, Path::new(path))
}

async fn validate(reconciler: &TreeReconciler, folder: ItemId) -> ReconcileSummary {
    reconciler
        .validate_children(
            folder,
            ValidateOptions::recursive(),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await
        .expect("reconcile")
}

#[tokio::test]
async fn deleted_file_is_removed_with_one_event() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    for name in ["A", "B", "C"] {
        fs.add_file(format!("{MOVIES}/{name}.mkv"), 10);
    }
    let first = validate(&harness.reconciler(fs.clone(), &[MOVIES]), library).await;
    assert_eq!(first.created, 3);
    assert_eq!(harness.child_names(library).await, ["A", "B", "C"]);

    fs.remove(format!("{MOVIES}/B.mkv"));
    let second = validate(&harness.reconciler(fs, &[MOVIES]), library).await;
    assert_eq!(second.removed, 1);
    assert_eq!(second.created, 0);

    let gone = movie_id("/media/movies/B.mkv");
    assert_eq!(harness.events.removed(), vec![gone]);
    assert!(harness.store.get(gone).await.unwrap().is_none());
    assert_eq!(harness.child_names(library).await, ["A", "C"]);
}

#[tokio::test]
async fn unchanged_tree_is_a_no_op() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);
    fs.add_file("/media/movies/Extras/B.mkv", 1);
    let reconciler = harness.reconciler(fs, &[MOVIES]);

    validate(&reconciler, library).await;
    let events_after_first = harness.events.events().len();
    let snapshot = harness.children(library).await;

    let second = validate(&reconciler, library).await;
    assert!(second.is_unchanged(), "{second:?}");
    assert_eq!(harness.events.events().len(), events_after_first);
    assert_eq!(harness.children(library).await, snapshot);
}

#[tokio::test]
async fn unreachable_volume_keeps_children_offline() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let on_usb = Entity::at_path(
        "/mnt/usb/Film.mkv",
        "Film",
        EntityKind::Movie(VideoData::default()),
    )
    .with_parent(library);
    let deleted = Entity::at_path(
        "/media/movies/Gone.mkv",
        "Gone",
        EntityKind::Movie(VideoData::default()),
    )
    .with_parent(library);
    harness
        .store
        .save_items(&[on_usb.clone(), deleted.clone()])
        .await
        .unwrap();
    harness
        .store
        .add_child_ids(library, &[on_usb.id, deleted.id])
        .await
        .unwrap();

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);
    let reconciler = harness.reconciler(fs, &[MOVIES, "/mnt/usb"]);
    let summary = validate(&reconciler, library).await;

    assert_eq!(summary.retained_offline, 1);
    assert_eq!(summary.removed, 1);
    let kept = harness.store.get(on_usb.id).await.unwrap().expect("kept");
    assert!(kept.is_offline);
    assert_eq!(kept.location_type(), LocationType::Offline);
    assert!(harness.store.get(deleted.id).await.unwrap().is_none());

    // Still unreachable: nothing new to write.
    let again = validate(&reconciler, library).await;
    assert!(again.is_unchanged(), "{again:?}");
}

#[tokio::test]
async fn virtual_children_are_never_validated_away() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut placeholder = Entity::at_path(
        "/media/movies/Upcoming.mkv",
        "Upcoming",
        EntityKind::Movie(VideoData::default()),
    )
    .with_parent(library);
    placeholder.location = LocationType::Virtual;
    harness.store.save_items(std::slice::from_ref(&placeholder)).await.unwrap();
    harness.store.add_child_ids(library, &[placeholder.id]).await.unwrap();

    let mut fs = InMemoryFs::new();
    fs.add_dir(MOVIES);
    let summary = validate(&harness.reconciler(fs, &[MOVIES]), library).await;
    assert_eq!(summary.retained_unvalidatable, 1);
    assert_eq!(summary.removed, 0);
    assert!(harness.store.get(placeholder.id).await.unwrap().is_some());
}

#[tokio::test]
async fn unreadable_folder_is_skipped_not_emptied() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);
    fs.add_file("/media/movies/Sub/B.mkv", 1);
    validate(&harness.reconciler(fs.clone(), &[MOVIES]), library).await;
    let sub = harness.find("/media/movies/Sub").await.expect("sub folder");

    fs.fail_dir("/media/movies/Sub");
    let summary = validate(&harness.reconciler(fs, &[MOVIES]), library).await;
    assert_eq!(summary.skipped_folders, 1);
    assert_eq!(summary.removed, 0);
    assert_eq!(harness.child_names(sub.id).await, ["B"]);
}

#[tokio::test]
async fn cancelled_pass_stops_before_writing() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);
    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = harness
        .reconciler(fs, &[MOVIES])
        .validate_children(library, ValidateOptions::recursive(), &NoProgress, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Cancelled(_)));
    assert!(harness.children(library).await.is_empty());
}

#[tokio::test]
async fn tv_layout_is_built_recursively() {
    let harness = Harness::new(&[("Shows", "/media/tv", CollectionType::TvShows)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/tv/Andor/Season 1/Andor S01E01.mkv", 1);
    fs.add_file("/media/tv/Andor/Season 1/Andor S01E02.mkv", 1);
    fs.add_file("/media/tv/Andor/Season 2/Andor S02E01.mkv", 1);
    let summary = validate(&harness.reconciler(fs, &["/media/tv"]), library).await;
    assert_eq!(summary.created, 6);
    assert_eq!(summary.folders_visited, 4);

    let series = harness.find("/media/tv/Andor").await.expect("series");
    assert!(matches!(series.kind, EntityKind::Series(_)));
    let season = harness.find("/media/tv/Andor/Season 1").await.expect("season");
    assert!(matches!(season.kind, EntityKind::Season(_)));
    assert_eq!(season.index_number, Some(1));

    let episode = harness
        .find("/media/tv/Andor/Season 2/Andor S02E01.mkv")
        .await
        .expect("episode");
    assert_eq!(episode.parent_index_number, Some(2));
    assert_eq!(episode.index_number, Some(1));
    assert_eq!(episode.series_id(), Some(series.id));
}

/// Fails one path on demand, resolving everything else normally.
#[derive(Debug)]
struct FlakyResolver {
    inner: ExtensionResolver,
    broken: PathBuf,
    failing: AtomicBool,
}

impl ItemResolver for FlakyResolver {
    fn resolve(&self, context: &ResolveContext, entries: &[FsEntry]) -> Vec<Resolution> {
        self.inner
            .resolve(context, entries)
            .into_iter()
            .map(|resolution| match resolution {
                Resolution::Resolved(entity)
                    if self.failing.load(Ordering::SeqCst)
                        && entity.path.as_deref() == Some(self.broken.as_path()) =>
                {
                    Resolution::Failed {
                        path: self.broken.clone(),
                        reason: "probe failed".into(),
                    }
                }
                other => other,
            })
            .collect()
    }
}

#[tokio::test]
async fn resolver_failure_keeps_existing_child() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);
    fs.add_file("/media/movies/B.mkv", 1);
    fs.add_file("/media/movies/C.mkv", 1);
    let resolver = Arc::new(FlakyResolver {
        inner: ExtensionResolver::default(),
        broken: PathBuf::from("/media/movies/B.mkv"),
        failing: AtomicBool::new(false),
    });
    let reconciler = TreeReconciler::new(harness.store.clone(), Arc::new(fs), resolver.clone());
    validate(&reconciler, library).await;

    resolver.failing.store(true, Ordering::SeqCst);
    let summary = validate(&reconciler, library).await;
    assert_eq!(summary.removed, 0);
    assert_eq!(harness.child_names(library).await, ["A", "B", "C"]);
}

#[tokio::test]
async fn shortcuts_become_linked_children() {
    let harness = Harness::new(&[("Movies", MOVIES, CollectionType::Movies)]).await;
    let library = harness.library(0);

    let mut stored = harness.store.get(library).await.unwrap().unwrap();
    let manual = LinkedChild::manual(ItemId::new());
    stored
        .folder_data_mut()
        .expect("library folder")
        .linked_children
        .push(manual.clone());
    harness.store.save_items(&[stored]).await.unwrap();

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/A.mkv", 1);
    fs.add_shortcut("/media/movies/Elsewhere.lnk", "/archive/Film.mkv");
    let reconciler = harness.reconciler(fs.clone(), &[MOVIES]);
    let first = validate(&reconciler, library).await;
    assert_eq!(first.created, 1, "shortcut is not a child");

    let folder = harness.store.get(library).await.unwrap().unwrap();
    assert_eq!(
        folder.linked_children(),
        &[manual.clone(), LinkedChild::shortcut("/archive/Film.mkv")]
    );
    assert!(
        harness
            .events
            .events()
            .contains(&LibraryEvent::ItemUpdated { item_id: library })
    );

    let second = validate(&reconciler, library).await;
    assert!(second.is_unchanged(), "{second:?}");

    fs.remove("/media/movies/Elsewhere.lnk");
    validate(&harness.reconciler(fs, &[MOVIES]), library).await;
    let folder = harness.store.get(library).await.unwrap().unwrap();
    assert_eq!(folder.linked_children(), &[manual]);
    assert!(
        folder
            .linked_children()
            .iter()
            .all(|link| link.kind == LinkedChildKind::Manual)
    );
}

#[derive(Debug, Default)]
struct CountingRefresher {
    refreshed: Mutex<Vec<ItemId>>,
    containers: AtomicUsize,
}

#[async_trait]
impl MetadataRefresher for CountingRefresher {
    async fn refresh(
        &self,
        item: &Entity,
        _options: &RefreshOptions,
    ) -> mediatree_core::Result<()> {
        if item.name == "Broken" {
            return Err(MediaError::Internal("provider timeout".into()));
        }
        if let Ok(mut refreshed) = self.refreshed.lock() {
            refreshed.push(item.id);
        }
        Ok(())
    }

    async fn refresh_all(
        &self,
        container: &Entity,
        options: &RefreshOptions,
    ) -> mediatree_core::Result<()> {
        self.containers.fetch_add(1, Ordering::SeqCst);
        self.refresh(container, options).await
    }
}

#[tokio::test]
async fn refresh_hands_children_to_metadata_collaborator() {
    let harness = Harness::new(&[("Shows", "/media/tv", CollectionType::TvShows)]).await;
    let library = harness.library(0);

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/tv/Andor/Season 1/Andor S01E01.mkv", 1);
    fs.add_file("/media/tv/Broken/Season 1/Broken S01E01.mkv", 1);
    let refresher = Arc::new(CountingRefresher::default());
    let reconciler = harness
        .reconciler(fs, &["/media/tv"])
        .with_refresher(refresher.clone());

    let summary = reconciler
        .validate_children(
            library,
            ValidateOptions::recursive().with_refresh(RefreshOptions::default()),
            &NoProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    // Each series is refreshed once as a whole.
    assert_eq!(refresher.containers.load(Ordering::SeqCst), 2);
    assert_eq!(summary.refresh_failures, 1);
    let andor = harness.find("/media/tv/Andor").await.unwrap();
    assert_eq!(*refresher.refreshed.lock().unwrap(), vec![andor.id]);
}

#[tokio::test]
async fn bootstrap_is_idempotent() {
    let store = InMemoryEntityStore::new();
    let definitions = [
        LibraryDefinition::new("Movies", MOVIES, Some(CollectionType::Movies)),
        LibraryDefinition::new("Shows", "/media/tv", Some(CollectionType::TvShows)),
    ];
    let first = LibraryRoots::bootstrap(&store, &definitions).await.unwrap();
    let entities = store.len();
    let second = LibraryRoots::bootstrap(&store, &definitions).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.len(), entities);
    assert_eq!(
        store.list_child_ids(first.physical_root).await.unwrap(),
        first.libraries
    );
    let movies = store.get(first.libraries[0]).await.unwrap().unwrap();
    assert!(movies.is_collection_folder());
    assert_eq!(movies.collection_type(), Some(CollectionType::Movies));
}

#[tokio::test]
async fn scanner_reconciles_every_library() {
    let harness = Harness::new(&[
        ("Movies", MOVIES, CollectionType::Movies),
        ("Home", "/media/home", CollectionType::HomeVideos),
        ("Music", "/media/music", CollectionType::Music),
    ])
    .await;

    let mut fs = InMemoryFs::new();
    fs.add_file("/media/movies/Heat (1995).mkv", 1);
    fs.add_file("/media/home/Birthday.mp4", 1);
    fs.add_file("/media/music/Artist/Album/01 Track.flac", 1);
    fs.fail_dir("/media/home");
    let reconciler = Arc::new(harness.reconciler(fs, &[MOVIES, "/media/home", "/media/music"]));
    let scanner = LibraryScanner::new(reconciler).with_max_concurrent_roots(2);

    let results = scanner
        .scan_all(
            &harness.roots.libraries,
            ValidateOptions::recursive(),
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(results.len(), 3);
    for (library, outcome) in &results {
        let summary = outcome.as_ref().expect("scan succeeds");
        if *library == harness.library(1) {
            assert_eq!(summary.skipped_folders, 1);
        } else {
            assert!(summary.created > 0);
        }
    }

    let heat = harness.find("/media/movies/Heat (1995).mkv").await.unwrap();
    assert_eq!(heat.name, "Heat");
    assert_eq!(heat.production_year, Some(1995));
    let album = harness.find("/media/music/Artist/Album").await.unwrap();
    assert!(matches!(album.kind, EntityKind::MusicAlbum(_)));
}
