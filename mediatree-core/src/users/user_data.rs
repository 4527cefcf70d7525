use async_trait::async_trait;
use dashmap::DashMap;
use mediatree_model::{
    Entity, EntityKind, User, UserId, UserItemData, UserItemDataDto,
};
use std::sync::Arc;

use super::visibility::visible_descendants;
use crate::error::Result;
use crate::store::EntityStore;

/// Per-user playback and preference records, keyed by the entity's
/// [`Entity::user_data_key`].
#[async_trait]
pub trait UserDataStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, user: UserId, key: &str) -> Result<Option<UserItemData>>;

    async fn save(&self, user: UserId, data: UserItemData) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserDataStore {
    records: DashMap<(UserId, String), UserItemData>,
}

impl InMemoryUserDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDataStore for InMemoryUserDataStore {
    async fn get(&self, user: UserId, key: &str) -> Result<Option<UserItemData>> {
        Ok(self
            .records
            .get(&(user, key.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, user: UserId, data: UserItemData) -> Result<()> {
        self.records.insert((user, data.key.clone()), data);
        Ok(())
    }
}

/// Play state aggregated over a folder's playable descendants.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayAggregate {
    pub item_count: u32,
    pub unplayed_count: u32,
    /// Mean of per-item progress, 0..=100.
    pub played_percentage: f64,
}

impl PlayAggregate {
    /// Folds one item: 100 when played, its resume position when partially
    /// watched, else 0.
    fn add(&mut self, item: &Entity, data: Option<&UserItemData>) {
        let progress = match data {
            Some(data) if data.played => 100.0,
            Some(data) if data.is_resumable() => match item.runtime_ticks {
                Some(runtime) if runtime > 0 => {
                    (data.playback_position_ticks as f64 / runtime as f64 * 100.0)
                        .min(100.0)
                }
                _ => 0.0,
            },
            _ => 0.0,
        };
        if !data.is_some_and(|d| d.played) {
            self.unplayed_count += 1;
        }
        // Running mean keeps the sum bounded.
        self.item_count += 1;
        self.played_percentage +=
            (progress - self.played_percentage) / f64::from(self.item_count);
    }

    pub fn is_played(&self) -> bool {
        self.item_count > 0 && self.played_percentage >= 100.0
    }
}

/// Fills per-user state for entities, aggregating over folders.
#[derive(Debug, Clone)]
pub struct UserDataOverlay {
    store: Arc<dyn EntityStore>,
    user_data: Arc<dyn UserDataStore>,
}

impl UserDataOverlay {
    pub fn new(store: Arc<dyn EntityStore>, user_data: Arc<dyn UserDataStore>) -> Self {
        Self { store, user_data }
    }

    pub async fn data_for(&self, entity: &Entity, user: &User) -> Result<Option<UserItemData>> {
        self.user_data.get(user.id, &entity.user_data_key()).await
    }

    /// Items a folder's play state is computed over. Seasons count their own
    /// episodes; every other folder counts visible, non-virtual leaves
    /// anywhere beneath it.
    async fn aggregate_members(&self, folder: &Entity, user: &User) -> Result<Vec<Entity>> {
        let descendants = visible_descendants(self.store.as_ref(), folder, Some(user)).await?;
        let members = match folder.kind {
            EntityKind::Season(_) => descendants
                .into_iter()
                .filter(|item| {
                    matches!(item.kind, EntityKind::Episode(_))
                        && item.parent_id == Some(folder.id)
                })
                .collect(),
            _ => descendants
                .into_iter()
                .filter(|item| !item.is_folder() && !item.is_virtual())
                .collect(),
        };
        Ok(members)
    }

    pub async fn play_aggregate(&self, folder: &Entity, user: &User) -> Result<PlayAggregate> {
        let mut aggregate = PlayAggregate::default();
        for item in self.aggregate_members(folder, user).await? {
            let data = self.data_for(&item, user).await?;
            aggregate.add(&item, data.as_ref());
        }
        Ok(aggregate)
    }

    /// The entity's user state as returned to callers. Folders additionally
    /// carry unplayed count, played percentage and an aggregate played flag.
    pub async fn fill_user_data(&self, entity: &Entity, user: &User) -> Result<UserItemDataDto> {
        let data = self
            .data_for(entity, user)
            .await?
            .unwrap_or_else(|| UserItemData::new(entity.user_data_key()));
        let mut dto = UserItemDataDto::from_data(entity.id, &data);

        if entity.is_folder() {
            let aggregate = self.play_aggregate(entity, user).await?;
            dto.unplayed_item_count = Some(aggregate.unplayed_count);
            if aggregate.item_count > 0 {
                dto.played_percentage = Some(aggregate.played_percentage);
            }
            dto.played = aggregate.is_played();
        }
        Ok(dto)
    }
}
