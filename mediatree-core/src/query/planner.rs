//! Query resolution.
//!
//! A request is answered either by the entity store's indexed query or by
//! materializing candidates and evaluating the full predicate set in
//! memory. [`requires_post_filtering`] decides which; both paths apply the
//! same predicate and sort functions, so they agree on shared data.

use chrono::{DateTime, Utc};
use mediatree_model::{Entity, EntityKind, ItemId, ItemKind, SortBy, User};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::capability::{PostFilterReason, collapse_box_sets, requires_post_filtering};
use super::context::EvaluationContext;
use super::types::ItemQuery;
use super::{filtering, paging, sorting};
use crate::error::{MediaError, Result};
use crate::store::{EntityStore, QueryResult, QueryScope, StoreQuery};
use crate::users::{UserDataOverlay, UserDataStore, excluded_tags, is_visible};

/// How a plan is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    /// The store evaluates predicates, sorts and pages.
    Indexed,
    /// Candidates are materialized and evaluated here.
    InMemory,
}

/// A resolved scope folder plus the decision taken for it.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Scope folder the query runs under.
    pub folder: Entity,
    pub path: ExecutionPath,
    /// Why the store cannot answer alone. Empty for the indexed path.
    pub reasons: Vec<PostFilterReason>,
    /// Box-set members are replaced by their box set.
    pub collapse: bool,
}

impl QueryPlan {
    /// Same plan on a different path; used to compare both strategies.
    pub fn with_path(mut self, path: ExecutionPath) -> Self {
        self.path = path;
        self
    }
}

/// Answers item queries over a subtree, choosing between the store's
/// indexed query and an in-memory walk.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    store: Arc<dyn EntityStore>,
    overlay: UserDataOverlay,
    user_data: Arc<dyn UserDataStore>,
    physical_root: ItemId,
    max_limit: Option<usize>,
}

impl QueryPlanner {
    /// `physical_root` is the scope used when neither a parent nor a user
    /// root is given.
    pub fn new(
        store: Arc<dyn EntityStore>,
        user_data: Arc<dyn UserDataStore>,
        physical_root: ItemId,
    ) -> Self {
        Self {
            overlay: UserDataOverlay::new(store.clone(), user_data.clone()),
            store,
            user_data,
            physical_root,
            max_limit: None,
        }
    }

    /// Rejects queries whose `limit` is above `max_limit`.
    pub fn with_max_limit(mut self, max_limit: Option<usize>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn overlay(&self) -> &UserDataOverlay {
        &self.overlay
    }

    /// Answers `query` under `parent` for `user`.
    ///
    /// Without a parent the user's root (or the physical root when there is
    /// no user root) is used. Explicit item ids bypass the scope folder.
    pub async fn resolve(
        &self,
        parent: Option<ItemId>,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<QueryResult<Entity>> {
        query.validate(self.max_limit)?;

        if !query.item_ids.is_empty() {
            return self.resolve_ids(query, user).await;
        }

        let folder = self.scope_folder(parent, user).await?;
        let plan = self.plan(folder, query, user);
        self.execute(&plan, query, user).await
    }

    /// Picks the execution path for `query` under `folder`. Every reason
    /// that rules out the indexed path is logged at debug level.
    pub fn plan(&self, folder: Entity, query: &ItemQuery, user: Option<&User>) -> QueryPlan {
        let reasons = requires_post_filtering(&folder, query, user);
        let collapse = collapse_box_sets(&folder, query, user);
        for reason in &reasons {
            debug!(folder = %folder.id, ?reason, "post-filter required");
        }
        let path = if reasons.is_empty() {
            ExecutionPath::Indexed
        } else {
            ExecutionPath::InMemory
        };
        QueryPlan {
            folder,
            path,
            reasons,
            collapse,
        }
    }

    /// Runs `plan` on its path. Both paths return the same items for the
    /// same data, so a plan may be forced onto either one.
    pub async fn execute(
        &self,
        plan: &QueryPlan,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<QueryResult<Entity>> {
        match plan.path {
            ExecutionPath::Indexed => self.execute_indexed(plan, query, user).await,
            ExecutionPath::InMemory => {
                let candidates = self.materialize(&plan.folder, query.recursive, user).await?;
                self.evaluate(candidates, plan.collapse, query, user).await
            }
        }
    }

    async fn scope_folder(&self, parent: Option<ItemId>, user: Option<&User>) -> Result<Entity> {
        if let Some(id) = parent {
            return self
                .store
                .get(id)
                .await?
                .ok_or_else(|| MediaError::NotFound(format!("folder {id}")));
        }
        if let Some(root) = user.and_then(|u| u.root_folder_id)
            && let Some(folder) = self.store.get(root).await?
        {
            return Ok(folder);
        }
        self.store
            .get(self.physical_root)
            .await?
            .ok_or_else(|| MediaError::NotFound("physical root folder".into()))
    }

    /// Library folders under the physical root that `user` may see.
    async fn visible_libraries(&self, user: Option<&User>) -> Result<Vec<Entity>> {
        let ids = self.store.list_child_ids(self.physical_root).await?;
        let mut libraries = self.store.get_many(&ids).await?;
        libraries.retain(|library| user.is_none_or(|u| is_visible(library, u)));
        Ok(libraries)
    }

    async fn execute_indexed(
        &self,
        plan: &QueryPlan,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<QueryResult<Entity>> {
        let scope = if plan.folder.is_root() {
            let libraries = self
                .visible_libraries(user)
                .await?
                .into_iter()
                .map(|library| library.id)
                .collect();
            if query.recursive {
                QueryScope::Subtrees(libraries)
            } else {
                QueryScope::Items(libraries)
            }
        } else if query.recursive {
            QueryScope::Descendants(plan.folder.id)
        } else {
            QueryScope::Children(plan.folder.id)
        };

        let excluded = excluded_tags(user);
        if plan.reasons.is_empty() && !plan.collapse {
            let store_query = StoreQuery::new(scope, query.clone()).with_excluded_tags(excluded);
            return self.store.query(&store_query).await;
        }

        // Forced onto the indexed path with work the store cannot do: fetch
        // every indexed match and finish here.
        let store_query =
            StoreQuery::new(scope, query.without_paging()).with_excluded_tags(excluded);
        let candidates = self.store.query(&store_query).await?.items;
        self.evaluate(candidates, plan.collapse, query, user).await
    }

    /// Candidates in discovery order: owned children (or the whole visible
    /// subtree), plus resolvable linked children of non-library folders.
    /// Linked children are never walked into.
    async fn materialize(
        &self,
        folder: &Entity,
        recursive: bool,
        user: Option<&User>,
    ) -> Result<Vec<Entity>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        let top: Vec<(Entity, bool)> = if folder.is_root() {
            self.visible_libraries(user)
                .await?
                .into_iter()
                .map(|library| (library, true))
                .collect()
        } else {
            self.children_of(folder, user)
                .await?
                .into_iter()
                .map(|child| {
                    let owned = child.parent_id == Some(folder.id);
                    (child, owned)
                })
                .collect()
        };

        let mut stack: Vec<(Entity, bool)> = top.into_iter().rev().collect();
        while let Some((entity, walk)) = stack.pop() {
            if !seen.insert(entity.id) {
                continue;
            }
            if recursive && walk && entity.is_folder() {
                let children = self.children_of(&entity, user).await?;
                stack.extend(children.into_iter().rev().map(|child| {
                    let owned = child.parent_id == Some(entity.id);
                    (child, owned)
                }));
            }
            out.push(entity);
        }
        Ok(out)
    }

    /// Visible owned children followed by visible linked children.
    async fn children_of(&self, folder: &Entity, user: Option<&User>) -> Result<Vec<Entity>> {
        let ids = self.store.list_child_ids(folder.id).await?;
        let mut children = self.store.get_many(&ids).await?;
        if !folder.is_collection_folder() {
            children.extend(self.linked_children(folder).await?);
        }
        children.retain(|child| user.is_none_or(|u| is_visible(child, u)));
        Ok(children)
    }

    async fn linked_children(&self, folder: &Entity) -> Result<Vec<Entity>> {
        let mut linked = Vec::new();
        for link in folder.linked_children() {
            let found = match (link.item_id, &link.path) {
                (Some(id), _) => self.store.get(id).await?,
                (None, Some(path)) => self.store.find_by_path(path).await?,
                (None, None) => None,
            };
            match found {
                Some(entity) => linked.push(entity),
                None => debug!(folder = %folder.id, ?link, "linked child not found"),
            }
        }
        Ok(linked)
    }

    /// Full predicate set, collapse, sort, adjacency and paging over
    /// already-materialized candidates.
    async fn evaluate(
        &self,
        candidates: Vec<Entity>,
        collapse: bool,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<QueryResult<Entity>> {
        let prepared = self.prepare(&candidates, collapse, query, user).await?;
        let excluded = excluded_tags(user);

        let mut matched: Vec<Entity> = candidates
            .into_iter()
            .filter(|entity| filtering::matches_all(entity, query, &excluded, &prepared.ctx))
            .collect();

        if collapse {
            matched = collapse_members(matched, &prepared.ctx, &prepared.box_sets);
        }
        sorting::sort_entities(&mut matched, &query.sort, &prepared.ctx);
        if let Some(target) = query.adjacent_to {
            matched = adjacent_window(matched, target);
        }
        Ok(paging::paginate(matched, query.start_index, query.limit))
    }

    /// Explicit ids: the listed items, filtered, in request order unless a
    /// sort is given.
    async fn resolve_ids(
        &self,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<QueryResult<Entity>> {
        let mut candidates = self.store.get_many(&query.item_ids).await?;
        candidates.retain(|item| user.is_none_or(|u| is_visible(item, u)));
        let mut seen = HashSet::new();
        candidates.retain(|item| seen.insert(item.id));
        let collapse = query.collapse_box_set_items.unwrap_or(false);
        self.evaluate(candidates, collapse, query, user).await
    }

    /// Gathers the derived data the predicates and sort keys need, and only
    /// that.
    async fn prepare(
        &self,
        candidates: &[Entity],
        collapse: bool,
        query: &ItemQuery,
        user: Option<&User>,
    ) -> Result<Prepared> {
        let mut ctx = EvaluationContext::empty();
        let mut box_sets = HashMap::new();
        let sorts_by = |by: SortBy| query.sort.iter().any(|spec| spec.by == by);

        if let Some(user) = user {
            for entity in candidates {
                if let Some(data) = self.overlay.data_for(entity, user).await? {
                    ctx.user_data.insert(entity.id, data);
                }
            }
            let needs_folder_play = query.is_played.is_some()
                || sorts_by(SortBy::IsPlayed)
                || sorts_by(SortBy::IsUnplayed);
            if needs_folder_play {
                for folder in candidates.iter().filter(|e| e.is_folder()) {
                    let aggregate = self.overlay.play_aggregate(folder, user).await?;
                    ctx.folder_play.insert(folder.id, aggregate);
                }
            }
        }

        if collapse || query.is_in_box_set.is_some() {
            for box_set in self.box_sets().await? {
                for member in self.linked_children(&box_set).await? {
                    ctx.box_set_of.entry(member.id).or_insert(box_set.id);
                }
                box_sets.insert(box_set.id, box_set);
            }
        }

        if sorts_by(SortBy::DateLastContentAdded) {
            for folder in candidates.iter().filter(|e| e.is_folder()) {
                let newest = self.newest_content(folder, user).await?;
                ctx.last_content_added.insert(folder.id, newest);
            }
        }

        ctx.genre_names = self.names_of(&query.genre_ids).await?;
        ctx.studio_names = self.names_of(&query.studio_ids).await?;
        ctx.person_names = self.names_of(&query.person_ids).await?;

        Ok(Prepared { ctx, box_sets })
    }

    async fn box_sets(&self) -> Result<Vec<Entity>> {
        let query = ItemQuery {
            include_item_kinds: vec![ItemKind::BoxSet],
            ..ItemQuery::default()
        };
        let result = self
            .store
            .query(&StoreQuery::new(QueryScope::Library, query))
            .await?;
        Ok(result.items)
    }

    async fn newest_content(&self, folder: &Entity, user: Option<&User>) -> Result<DateTime<Utc>> {
        let descendants =
            crate::users::visible_descendants(self.store.as_ref(), folder, user).await?;
        Ok(descendants
            .iter()
            .map(|item| item.date_created)
            .max()
            .unwrap_or(folder.date_created))
    }

    async fn names_of(&self, ids: &[ItemId]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .get_many(ids)
            .await?
            .into_iter()
            .map(|entity| entity.name)
            .collect())
    }

    /// Records user state in the store the planner reads from.
    pub async fn save_user_data(
        &self,
        user: &User,
        data: mediatree_model::UserItemData,
    ) -> Result<()> {
        self.user_data.save(user.id, data).await
    }
}

struct Prepared {
    ctx: EvaluationContext,
    box_sets: HashMap<ItemId, Entity>,
}

/// Replaces box-set members with their box set at the first member's
/// position; duplicates after replacement are dropped.
fn collapse_members(
    items: Vec<Entity>,
    ctx: &EvaluationContext,
    box_sets: &HashMap<ItemId, Entity>,
) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let replacement = ctx
            .box_set_of(item.id)
            .filter(|_| !matches!(item.kind, EntityKind::BoxSet(_)))
            .and_then(|id| box_sets.get(&id).cloned());
        let item = replacement.unwrap_or(item);
        if seen.insert(item.id) {
            out.push(item);
        }
    }
    out
}

/// The target with its immediate neighbours; empty when the target is not
/// among the results.
fn adjacent_window(items: Vec<Entity>, target: ItemId) -> Vec<Entity> {
    let Some(index) = items.iter().position(|item| item.id == target) else {
        return Vec::new();
    };
    let start = index.saturating_sub(1);
    let end = (index + 2).min(items.len());
    items.into_iter().skip(start).take(end - start).collect()
}
