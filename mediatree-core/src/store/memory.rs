use async_trait::async_trait;
use dashmap::DashMap;
use mediatree_model::{Entity, ItemId, LinkedChild};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{EntityStore, QueryResult, QueryScope, StoreQuery};
use crate::error::Result;
use crate::query::context::EvaluationContext;
use crate::query::{filtering, paging, sorting};

/// Arena of entities keyed by id with one child-id list per folder.
///
/// Each child-list mutation runs under that list's shard lock only, so
/// writers on different folders never contend on a global lock.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    items: DashMap<ItemId, Entity>,
    children: DashMap<ItemId, Vec<ItemId>>,
    paths: DashMap<PathBuf, ItemId>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn insert_entity(&self, entity: Entity) {
        let id = entity.id;
        let new_path = entity.path.clone();
        if let Some(previous) = self.items.insert(id, entity)
            && let Some(old_path) = previous.path
            && Some(&old_path) != new_path.as_ref()
        {
            self.paths.remove_if(&old_path, |_, owner| *owner == id);
        }
        if let Some(path) = new_path {
            self.paths.insert(path, id);
        }
    }

    pub(crate) fn remove_entity(&self, id: ItemId) {
        if let Some((_, removed)) = self.items.remove(&id)
            && let Some(path) = removed.path
        {
            self.paths.remove_if(&path, |_, owner| *owner == id);
        }
        self.children.remove(&id);
    }

    pub(crate) fn set_children(&self, parent: ItemId, ids: Vec<ItemId>) {
        self.children.insert(parent, ids);
    }

    pub(crate) fn child_ids(&self, parent: ItemId) -> Vec<ItemId> {
        self.children
            .get(&parent)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }

    /// Appends unseen ids and returns the resulting list.
    pub(crate) fn append_children(
        &self,
        parent: ItemId,
        ids: &[ItemId],
    ) -> Vec<ItemId> {
        let mut entry = self.children.entry(parent).or_default();
        for id in ids {
            if !entry.contains(id) {
                entry.push(*id);
            }
        }
        entry.value().clone()
    }

    /// Drops ids and returns the resulting list.
    pub(crate) fn drop_children(
        &self,
        parent: ItemId,
        ids: &[ItemId],
    ) -> Vec<ItemId> {
        let mut entry = self.children.entry(parent).or_default();
        entry.retain(|child| !ids.contains(child));
        entry.value().clone()
    }

    /// Depth-first, pre-order walk of owned children. Resolvable linked
    /// children of non-library folders follow the owned ones and are never
    /// walked into. `seen` is shared so an item reached twice is listed once.
    fn collect_descendants(
        &self,
        root: ItemId,
        seen: &mut HashSet<ItemId>,
        out: &mut Vec<ItemId>,
    ) {
        let mut stack: Vec<(ItemId, bool)> = self.walk_children(root).into_iter().rev().collect();
        while let Some((id, walk)) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            if walk {
                stack.extend(self.walk_children(id).into_iter().rev());
            }
        }
    }

    /// Children of `folder` paired with whether the walk descends into them.
    fn walk_children(&self, folder: ItemId) -> Vec<(ItemId, bool)> {
        let mut children = self.child_ids(folder);
        let links = self
            .items
            .get(&folder)
            .filter(|entity| !entity.is_collection_folder())
            .map(|entity| entity.linked_children().to_vec())
            .unwrap_or_default();
        children.extend(links.iter().filter_map(|link| self.resolve_link(link)));
        children
            .into_iter()
            .map(|id| {
                let owned = self
                    .items
                    .get(&id)
                    .is_some_and(|child| child.parent_id == Some(folder));
                (id, owned)
            })
            .collect()
    }

    fn resolve_link(&self, link: &LinkedChild) -> Option<ItemId> {
        match (link.item_id, &link.path) {
            (Some(id), _) => self.items.contains_key(&id).then_some(id),
            (None, Some(path)) => self
                .paths
                .get(path)
                .map(|entry| *entry.value())
                .filter(|id| self.items.contains_key(id)),
            (None, None) => None,
        }
    }

    fn scope_ids(&self, scope: &QueryScope) -> Vec<ItemId> {
        match scope {
            QueryScope::Children(parent) => self.child_ids(*parent),
            QueryScope::Descendants(root) => {
                let mut out = Vec::new();
                self.collect_descendants(*root, &mut HashSet::new(), &mut out);
                out
            }
            QueryScope::Subtrees(roots) => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for root in roots {
                    if seen.insert(*root) {
                        out.push(*root);
                        self.collect_descendants(*root, &mut seen, &mut out);
                    }
                }
                out
            }
            QueryScope::Items(ids) => ids.clone(),
            QueryScope::Library => self.items.iter().map(|entry| *entry.key()).collect(),
        }
    }

    pub(crate) fn run_query(&self, query: &StoreQuery) -> QueryResult<Entity> {
        let mut matched: Vec<Entity> = self
            .scope_ids(&query.scope)
            .into_iter()
            .filter_map(|id| self.items.get(&id).map(|entry| entry.value().clone()))
            .filter(|entity| {
                filtering::matches_indexed(entity, &query.query, &query.excluded_tags)
            })
            .collect();

        sorting::sort_entities(
            &mut matched,
            &query.query.sort,
            &EvaluationContext::empty(),
        );
        paging::paginate(matched, query.query.start_index, query.query.limit)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get(&self, id: ItemId) -> Result<Option<Entity>> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_many(&self, ids: &[ItemId]) -> Result<Vec<Entity>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Entity>> {
        let id = self.paths.get(path).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.items.get(&id).map(|entry| entry.value().clone())))
    }

    async fn list_child_ids(&self, parent: ItemId) -> Result<Vec<ItemId>> {
        Ok(self.child_ids(parent))
    }

    async fn query(&self, query: &StoreQuery) -> Result<QueryResult<Entity>> {
        Ok(self.run_query(query))
    }

    async fn save_items(&self, items: &[Entity]) -> Result<()> {
        for entity in items {
            self.insert_entity(entity.clone());
        }
        Ok(())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<()> {
        for id in ids {
            self.remove_entity(*id);
        }
        Ok(())
    }

    async fn add_child_ids(&self, parent: ItemId, ids: &[ItemId]) -> Result<()> {
        self.append_children(parent, ids);
        Ok(())
    }

    async fn remove_child_ids(
        &self,
        parent: ItemId,
        ids: &[ItemId],
    ) -> Result<()> {
        self.drop_children(parent, ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ItemQuery;
    use mediatree_model::{EntityKind, FolderData, SortBy, SortOrder, VideoData};

    fn folder(path: &str) -> Entity {
        let name = path.rsplit('/').next().unwrap_or(path);
        Entity::at_path(path, name, EntityKind::Folder(FolderData::regular()))
    }

    fn movie(path: &str, name: &str) -> Entity {
        Entity::at_path(path, name, EntityKind::Movie(VideoData::default()))
    }

    async fn seeded() -> (InMemoryEntityStore, Entity, Vec<Entity>) {
        let store = InMemoryEntityStore::new();
        let root = folder("/lib");
        let sub = folder("/lib/sub").with_parent(root.id);
        let a = movie("/lib/b.mkv", "Beta").with_parent(root.id);
        let b = movie("/lib/sub/a.mkv", "Alpha").with_parent(sub.id);
        store
            .save_items(&[root.clone(), sub.clone(), a.clone(), b.clone()])
            .await
            .unwrap();
        store.add_child_ids(root.id, &[sub.id, a.id]).await.unwrap();
        store.add_child_ids(sub.id, &[b.id]).await.unwrap();
        (store, root, vec![sub, a, b])
    }

    #[tokio::test]
    async fn unknown_id_is_absent_not_error() {
        let store = InMemoryEntityStore::new();
        assert!(store.get(ItemId::new()).await.unwrap().is_none());
        assert!(store.list_child_ids(ItemId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn descendants_are_pre_order() {
        let (store, root, items) = seeded().await;
        let result = store
            .query(&StoreQuery::scope(QueryScope::Descendants(root.id)))
            .await
            .unwrap();
        let ids: Vec<_> = result.items.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![items[0].id, items[2].id, items[1].id]);
        assert_eq!(result.total_record_count, 3);
    }

    #[tokio::test]
    async fn descendants_list_linked_children_without_walking_them() {
        let (store, root, items) = seeded().await;
        let elsewhere = folder("/other");
        let nested = movie("/other/deep/c.mkv", "Charlie").with_parent(elsewhere.id);
        let set = Entity::new(
            ItemId::new(),
            "Set",
            EntityKind::BoxSet(FolderData {
                linked_children: vec![
                    LinkedChild::manual(elsewhere.id),
                    LinkedChild::manual_path("/lib/sub/a.mkv"),
                    LinkedChild::manual(ItemId::new()),
                ],
                ..FolderData::regular()
            }),
        )
        .with_parent(root.id);
        store
            .save_items(&[elsewhere.clone(), nested.clone(), set.clone()])
            .await
            .unwrap();
        store.add_child_ids(elsewhere.id, &[nested.id]).await.unwrap();
        store.add_child_ids(root.id, &[set.id]).await.unwrap();

        let result = store
            .query(&StoreQuery::scope(QueryScope::Descendants(root.id)))
            .await
            .unwrap();
        let ids: Vec<_> = result.items.iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec![items[0].id, items[2].id, items[1].id, set.id, elsewhere.id]
        );
    }

    #[tokio::test]
    async fn child_ids_never_duplicate() {
        let (store, root, items) = seeded().await;
        store.add_child_ids(root.id, &[items[1].id, items[1].id]).await.unwrap();
        assert_eq!(store.list_child_ids(root.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sorted_page_reports_full_total() {
        let (store, root, _) = seeded().await;
        let query = ItemQuery::builder()
            .recursive(true)
            .include_kinds([mediatree_model::ItemKind::Movie])
            .sort_by(SortBy::SortName, SortOrder::Ascending)
            .limit(1)
            .build()
            .unwrap();
        let result = store
            .query(&StoreQuery::new(QueryScope::Descendants(root.id), query))
            .await
            .unwrap();
        assert_eq!(result.total_record_count, 2);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name, "Alpha");
    }

    #[tokio::test]
    async fn path_index_follows_renames_and_deletes() {
        let (store, _, items) = seeded().await;
        let mut moved = items[1].clone();
        moved.path = Some("/lib/c.mkv".into());
        store.save_items(std::slice::from_ref(&moved)).await.unwrap();
        assert!(store.find_by_path(Path::new("/lib/b.mkv")).await.unwrap().is_none());
        assert!(store.find_by_path(Path::new("/lib/c.mkv")).await.unwrap().is_some());

        store.delete_items(&[moved.id]).await.unwrap();
        assert!(store.find_by_path(Path::new("/lib/c.mkv")).await.unwrap().is_none());
    }
}
