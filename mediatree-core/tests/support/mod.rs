#![allow(dead_code)]

use mediatree_core::library::{
    ExtensionResolver, InMemoryFs, LibraryDefinition, LibraryRoots, RecordingPublisher,
    TreeReconciler,
};
use mediatree_core::store::{EntityStore, InMemoryEntityStore};
use mediatree_model::{CollectionType, Entity, ItemId};
use std::path::Path;
use std::sync::Arc;

pub struct Harness {
    pub store: Arc<InMemoryEntityStore>,
    pub events: Arc<RecordingPublisher>,
    pub roots: LibraryRoots,
}

impl Harness {
    pub async fn new(libraries: &[(&str, &str, CollectionType)]) -> Self {
        let store = Arc::new(InMemoryEntityStore::new());
        let definitions: Vec<LibraryDefinition> = libraries
            .iter()
            .map(|(name, path, collection)| LibraryDefinition::new(*name, *path, Some(*collection)))
            .collect();
        let roots = LibraryRoots::bootstrap(store.as_ref(), &definitions)
            .await
            .expect("bootstrap libraries");
        Self {
            store,
            events: Arc::new(RecordingPublisher::new()),
            roots,
        }
    }

    pub fn library(&self, index: usize) -> ItemId {
        self.roots.libraries[index]
    }

    /// A reconciler over `fs` sharing this harness' store and event log.
    pub fn reconciler(&self, fs: InMemoryFs, locations: &[&str]) -> TreeReconciler {
        TreeReconciler::new(
            self.store.clone(),
            Arc::new(fs),
            Arc::new(ExtensionResolver::default()),
        )
        .with_events(self.events.clone())
        .with_library_locations(locations.iter().copied())
    }

    pub async fn children(&self, folder: ItemId) -> Vec<Entity> {
        let ids = self.store.list_child_ids(folder).await.expect("child ids");
        self.store.get_many(&ids).await.expect("children")
    }

    pub async fn child_names(&self, folder: ItemId) -> Vec<String> {
        let mut names: Vec<String> = self
            .children(folder)
            .await
            .into_iter()
            .map(|child| child.name)
            .collect();
        names.sort();
        names
    }

    pub async fn find(&self, path: &str) -> Option<Entity> {
        self.store
            .find_by_path(Path::new(path))
            .await
            .expect("path lookup")
    }
}
