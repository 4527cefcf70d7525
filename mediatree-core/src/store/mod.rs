//! Entity store: keyed persistence of media entities plus per-folder child
//! lists, with an indexed query path.

pub mod durable;
pub mod memory;

use async_trait::async_trait;
use mediatree_model::{Entity, ItemId};
use std::path::Path;

use crate::error::Result;
use crate::query::ItemQuery;

pub use durable::DurableEntityStore;
pub use memory::InMemoryEntityStore;

/// Which part of the tree an indexed query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// Direct owned children of a folder.
    Children(ItemId),
    /// Every owned descendant of a folder, excluding the folder itself.
    Descendants(ItemId),
    /// Each listed folder together with its owned descendants.
    Subtrees(Vec<ItemId>),
    /// Exactly the listed items, in the listed order.
    Items(Vec<ItemId>),
    /// Every stored entity.
    Library,
}

/// An indexed query: scope, the indexable predicate subset of the query,
/// and tags hidden from the requesting user.
#[derive(Debug, Clone)]
pub struct StoreQuery {
    pub scope: QueryScope,
    pub query: ItemQuery,
    pub excluded_tags: Vec<String>,
}

impl StoreQuery {
    pub fn new(scope: QueryScope, query: ItemQuery) -> Self {
        Self {
            scope,
            query,
            excluded_tags: Vec::new(),
        }
    }

    /// Scope with no predicates, sorting or paging.
    pub fn scope(scope: QueryScope) -> Self {
        Self::new(scope, ItemQuery::default())
    }

    pub fn with_excluded_tags(mut self, tags: Vec<String>) -> Self {
        self.excluded_tags = tags;
        self
    }
}

/// A page of results with the pre-pagination match count.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub total_record_count: usize,
    pub items: Vec<T>,
}

impl<T> QueryResult<T> {
    pub fn empty() -> Self {
        Self {
            total_record_count: 0,
            items: Vec::new(),
        }
    }
}

/// Source of truth for entities and child lists.
///
/// Unknown ids are absent results, never errors. Backend failures surface
/// as [`crate::error::MediaError::StoreUnavailable`].
#[async_trait]
pub trait EntityStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, id: ItemId) -> Result<Option<Entity>>;

    /// Entities for the ids that exist, in request order.
    async fn get_many(&self, ids: &[ItemId]) -> Result<Vec<Entity>>;

    async fn find_by_path(&self, path: &Path) -> Result<Option<Entity>>;

    /// Snapshot of a folder's owned child ids.
    async fn list_child_ids(&self, parent: ItemId) -> Result<Vec<ItemId>>;

    async fn query(&self, query: &StoreQuery) -> Result<QueryResult<Entity>>;

    /// Batch create-or-replace.
    async fn save_items(&self, items: &[Entity]) -> Result<()>;

    /// Deletes entities and drops their own child lists.
    async fn delete_items(&self, ids: &[ItemId]) -> Result<()>;

    /// Appends ids missing from the parent's child list, as one mutation.
    async fn add_child_ids(&self, parent: ItemId, ids: &[ItemId]) -> Result<()>;

    /// Removes ids from the parent's child list, as one mutation.
    async fn remove_child_ids(
        &self,
        parent: ItemId,
        ids: &[ItemId],
    ) -> Result<()>;
}
