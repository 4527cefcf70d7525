use async_trait::async_trait;
use mediatree_model::{Entity, ItemId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{EntityStore, InMemoryEntityStore, QueryResult, StoreQuery};
use crate::error::{MediaError, Result};

const ENTITY_PREFIX: &str = "entity/";
const CHILDREN_PREFIX: &str = "children/";

/// Entity store persisted in a `cacache` directory.
///
/// Every mutation is written through to disk. Reads are served from an
/// in-memory index rebuilt on [`DurableEntityStore::open`].
#[derive(Debug, Clone)]
pub struct DurableEntityStore {
    root: PathBuf,
    index: Arc<InMemoryEntityStore>,
}

impl DurableEntityStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            MediaError::StoreUnavailable(format!(
                "failed to create store directory {}: {e}",
                root.display()
            ))
        })?;

        let store = Self {
            root,
            index: Arc::new(InMemoryEntityStore::new()),
        };
        store.load().await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn load(&self) -> Result<()> {
        let mut keys = Vec::new();
        for entry in cacache::list_sync(&self.root) {
            match entry {
                Ok(meta) => keys.push(meta.key),
                Err(cacache::Error::IoError(err, _))
                    if err.kind() == std::io::ErrorKind::NotFound =>
                {
                    continue;
                }
                Err(e) => {
                    return Err(MediaError::StoreUnavailable(format!(
                        "cacache index listing failed: {e}"
                    )));
                }
            }
        }

        let mut entities = 0usize;
        for key in &keys {
            if let Some(raw_id) = key.strip_prefix(ENTITY_PREFIX) {
                match self.read_json::<Entity>(key).await? {
                    Some(entity) => {
                        self.index.insert_entity(entity);
                        entities += 1;
                    }
                    None => warn!(id = raw_id, "skipping unreadable entity record"),
                }
            }
        }
        for key in &keys {
            if let Some(raw_id) = key.strip_prefix(CHILDREN_PREFIX) {
                let Ok(parent) = raw_id.parse::<ItemId>() else {
                    warn!(key = %key, "skipping child list with malformed key");
                    continue;
                };
                if let Some(ids) = self.read_json::<Vec<ItemId>>(key).await? {
                    self.index.set_children(parent, ids);
                }
            }
        }

        info!(root = %self.root.display(), entities, "entity store opened");
        Ok(())
    }

    fn entity_key(id: ItemId) -> String {
        format!("{ENTITY_PREFIX}{id}")
    }

    fn children_key(id: ItemId) -> String {
        format!("{CHILDREN_PREFIX}{id}")
    }

    /// `Ok(None)` for a record that exists but no longer decodes.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let bytes = cacache::read(&self.root, key).await.map_err(|e| match e {
            cacache::Error::EntryNotFound(_, _) => {
                MediaError::StoreUnavailable(format!("store record vanished: {key}"))
            }
            cacache::Error::IntegrityError(err) => MediaError::StoreUnavailable(
                format!("store record failed integrity check: {key} ({err})"),
            ),
            cacache::Error::SizeMismatch(wanted, actual) => {
                MediaError::StoreUnavailable(format!(
                    "store record size mismatch: key={key}, wanted={wanted}, actual={actual}"
                ))
            }
            cacache::Error::IoError(_, msg) => {
                MediaError::StoreUnavailable(format!("cacache read I/O error: {msg}"))
            }
            cacache::Error::SerdeError(_, msg) => {
                MediaError::StoreUnavailable(format!("cacache read serde error: {msg}"))
            }
        })?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "store record does not decode");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        cacache::write(&self.root, key, bytes).await.map_err(|e| {
            MediaError::StoreUnavailable(format!("cacache write failed: {e}"))
        })?;
        Ok(())
    }

    async fn remove_key(&self, key: &str) -> Result<()> {
        let r_opts = cacache::index::RemoveOpts::new().remove_fully(true);
        r_opts.remove(&self.root, key).await.map_err(|e| {
            MediaError::StoreUnavailable(format!("cacache remove failed: {e}"))
        })
    }
}

#[async_trait]
impl EntityStore for DurableEntityStore {
    async fn get(&self, id: ItemId) -> Result<Option<Entity>> {
        self.index.get(id).await
    }

    async fn get_many(&self, ids: &[ItemId]) -> Result<Vec<Entity>> {
        self.index.get_many(ids).await
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Entity>> {
        self.index.find_by_path(path).await
    }

    async fn list_child_ids(&self, parent: ItemId) -> Result<Vec<ItemId>> {
        self.index.list_child_ids(parent).await
    }

    async fn query(&self, query: &StoreQuery) -> Result<QueryResult<Entity>> {
        Ok(self.index.run_query(query))
    }

    async fn save_items(&self, items: &[Entity]) -> Result<()> {
        for entity in items {
            self.write_json(&Self::entity_key(entity.id), entity).await?;
            self.index.insert_entity(entity.clone());
        }
        debug!(count = items.len(), "persisted entities");
        Ok(())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<()> {
        for id in ids {
            self.remove_key(&Self::entity_key(*id)).await?;
            if !self.index.child_ids(*id).is_empty() {
                self.remove_key(&Self::children_key(*id)).await?;
            }
            self.index.remove_entity(*id);
        }
        Ok(())
    }

    async fn add_child_ids(&self, parent: ItemId, ids: &[ItemId]) -> Result<()> {
        let updated = self.index.append_children(parent, ids);
        self.write_json(&Self::children_key(parent), &updated).await
    }

    async fn remove_child_ids(
        &self,
        parent: ItemId,
        ids: &[ItemId],
    ) -> Result<()> {
        let updated = self.index.drop_children(parent, ids);
        self.write_json(&Self::children_key(parent), &updated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::QueryScope;
    use mediatree_model::{EntityKind, FolderData, VideoData};

    #[tokio::test]
    async fn reopen_restores_entities_and_child_lists() {
        let dir = tempfile::tempdir().unwrap();
        let folder = Entity::at_path("/lib", "lib", EntityKind::Folder(FolderData::regular()));
        let movie = Entity::at_path("/lib/a.mkv", "A", EntityKind::Movie(VideoData::default()))
            .with_parent(folder.id);

        {
            let store = DurableEntityStore::open(dir.path()).await.unwrap();
            store.save_items(&[folder.clone(), movie.clone()]).await.unwrap();
            store.add_child_ids(folder.id, &[movie.id]).await.unwrap();
        }

        let reopened = DurableEntityStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.get(movie.id).await.unwrap(), Some(movie.clone()));
        assert_eq!(reopened.list_child_ids(folder.id).await.unwrap(), vec![movie.id]);
        let children = reopened
            .query(&StoreQuery::scope(QueryScope::Children(folder.id)))
            .await
            .unwrap();
        assert_eq!(children.total_record_count, 1);
    }

    #[tokio::test]
    async fn deletes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let movie = Entity::at_path("/lib/a.mkv", "A", EntityKind::Movie(VideoData::default()));
        {
            let store = DurableEntityStore::open(dir.path()).await.unwrap();
            store.save_items(std::slice::from_ref(&movie)).await.unwrap();
            store.delete_items(&[movie.id]).await.unwrap();
        }
        let reopened = DurableEntityStore::open(dir.path()).await.unwrap();
        assert!(reopened.get(movie.id).await.unwrap().is_none());
        assert!(reopened.index.is_empty());
    }
}
