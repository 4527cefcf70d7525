use mediatree_model::{
    CollectionType, Entity, EntityKind, FolderData, FolderVariant, ItemId, ItemKind, User,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::store::EntityStore;

/// A configured library: a named folder on disk with a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDefinition {
    pub name: String,
    pub path: PathBuf,
    pub collection_type: Option<CollectionType>,
}

impl LibraryDefinition {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        collection_type: Option<CollectionType>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            collection_type,
        }
    }

    fn to_entity(&self, root: ItemId) -> Entity {
        let mut library = Entity::at_path(
            self.path.clone(),
            self.name.clone(),
            EntityKind::Folder(FolderData::collection(self.collection_type)),
        )
        .with_parent(root);
        library.is_locked = true;
        library
    }
}

/// Fixed id of the aggregate folder every library hangs off.
pub fn physical_root_id() -> ItemId {
    ItemId::from_name(ItemKind::AggregateFolder, "root")
}

/// The physical root and the library folders beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRoots {
    pub physical_root: ItemId,
    pub libraries: Vec<ItemId>,
}

impl LibraryRoots {
    /// Creates or refreshes the physical root and one collection folder per
    /// definition. Libraries no longer configured are removed along with
    /// their subtrees. Running it twice with the same definitions writes
    /// nothing the second time.
    pub async fn bootstrap(
        store: &dyn EntityStore,
        definitions: &[LibraryDefinition],
    ) -> Result<LibraryRoots> {
        let root_id = physical_root_id();
        if store.get(root_id).await?.is_none() {
            let mut root = Entity::new(
                root_id,
                "root",
                EntityKind::Folder(FolderData {
                    variant: FolderVariant::PhysicalRoot,
                    ..FolderData::regular()
                }),
            );
            root.is_locked = true;
            store.save_items(&[root]).await?;
            info!("Created physical root {}", root_id);
        }

        let mut libraries = Vec::with_capacity(definitions.len());
        let mut changed = Vec::new();
        for definition in definitions {
            let wanted = definition.to_entity(root_id);
            match store.get(wanted.id).await? {
                Some(existing)
                    if existing.name == wanted.name
                        && existing.collection_type() == wanted.collection_type()
                        && existing.parent_id == wanted.parent_id => {}
                Some(existing) => {
                    let mut updated = existing;
                    updated.name = wanted.name.clone();
                    updated.parent_id = wanted.parent_id;
                    if let Some(data) = updated.folder_data_mut() {
                        data.collection_type = definition.collection_type;
                    }
                    changed.push(updated);
                }
                None => {
                    info!("Adding library {} at {}", definition.name, definition.path.display());
                    changed.push(wanted.clone());
                }
            }
            if !libraries.contains(&wanted.id) {
                libraries.push(wanted.id);
            }
        }
        if !changed.is_empty() {
            store.save_items(&changed).await?;
        }

        let configured: HashSet<ItemId> = libraries.iter().copied().collect();
        let stale: Vec<ItemId> = store
            .list_child_ids(root_id)
            .await?
            .into_iter()
            .filter(|id| !configured.contains(id))
            .collect();
        if !stale.is_empty() {
            let mut doomed = stale.clone();
            let mut stack = stale.clone();
            while let Some(id) = stack.pop() {
                for child in store.list_child_ids(id).await? {
                    doomed.push(child);
                    stack.push(child);
                }
            }
            info!("Removing {} unconfigured libraries", stale.len());
            store.delete_items(&doomed).await?;
            store.remove_child_ids(root_id, &stale).await?;
        }
        store.add_child_ids(root_id, &libraries).await?;

        Ok(LibraryRoots {
            physical_root: root_id,
            libraries,
        })
    }
}

/// Returns the user's root folder, creating it on first use. The user's
/// `root_folder_id` is updated to point at it.
pub async fn ensure_user_root(store: &dyn EntityStore, user: &mut User) -> Result<Entity> {
    let id = ItemId::from_name(ItemKind::UserRootFolder, &user.id.to_string());
    let root = match store.get(id).await? {
        Some(existing) => existing,
        None => {
            let mut root = Entity::new(
                id,
                user.name.clone(),
                EntityKind::Folder(FolderData {
                    variant: FolderVariant::UserRoot,
                    ..FolderData::regular()
                }),
            );
            root.is_locked = true;
            store.save_items(std::slice::from_ref(&root)).await?;
            root
        }
    };
    user.root_folder_id = Some(root.id);
    Ok(root)
}
