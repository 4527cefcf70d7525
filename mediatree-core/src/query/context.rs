//! Derived per-request data consulted by in-memory filtering and sorting.
//!
//! Everything here is gathered before evaluation starts, so the filter and
//! sort passes run synchronously over already-materialized entities.

use chrono::{DateTime, NaiveDate, Utc};
use mediatree_model::{Entity, ItemId, UserItemData};
use std::collections::HashMap;

use crate::users::PlayAggregate;

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
    pub(crate) user_data: HashMap<ItemId, UserItemData>,
    pub(crate) folder_play: HashMap<ItemId, PlayAggregate>,
    /// Member id to the box set that links it.
    pub(crate) box_set_of: HashMap<ItemId, ItemId>,
    pub(crate) last_content_added: HashMap<ItemId, DateTime<Utc>>,
    /// Names resolved from `genre_ids`, `studio_ids` and `person_ids`.
    pub(crate) genre_names: Vec<String>,
    pub(crate) studio_names: Vec<String>,
    pub(crate) person_names: Vec<String>,
}

impl EvaluationContext {
    /// Context with no user and no derived data; indexed-only evaluation.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            now,
            today: now.date_naive(),
            user_data: HashMap::new(),
            folder_play: HashMap::new(),
            box_set_of: HashMap::new(),
            last_content_added: HashMap::new(),
            genre_names: Vec::new(),
            studio_names: Vec::new(),
            person_names: Vec::new(),
        }
    }

    pub fn user_data(&self, id: ItemId) -> Option<&UserItemData> {
        self.user_data.get(&id)
    }

    pub fn is_played(&self, entity: &Entity) -> bool {
        if entity.is_folder() {
            self.folder_play
                .get(&entity.id)
                .is_some_and(PlayAggregate::is_played)
        } else {
            self.user_data(entity.id).is_some_and(|data| data.played)
        }
    }

    pub fn is_favorite(&self, entity: &Entity) -> bool {
        self.user_data(entity.id).is_some_and(|data| data.is_favorite)
    }

    pub fn likes(&self, entity: &Entity) -> Option<bool> {
        self.user_data(entity.id).and_then(UserItemData::likes)
    }

    pub fn is_favorite_or_liked(&self, entity: &Entity) -> bool {
        self.is_favorite(entity) || self.likes(entity) == Some(true)
    }

    pub fn is_resumable(&self, entity: &Entity) -> bool {
        !entity.is_folder()
            && self
                .user_data(entity.id)
                .is_some_and(UserItemData::is_resumable)
    }

    pub fn box_set_of(&self, id: ItemId) -> Option<ItemId> {
        self.box_set_of.get(&id).copied()
    }

    /// Newest creation date in a folder's subtree, or the item's own.
    pub fn last_content_added(&self, entity: &Entity) -> DateTime<Utc> {
        self.last_content_added
            .get(&entity.id)
            .copied()
            .unwrap_or(entity.date_created)
    }
}
