use crate::ids::{ItemId, UserId};
use chrono::{DateTime, Utc};

/// Rating at or above which an item counts as liked.
pub const LIKES_THRESHOLD: f64 = 6.5;

/// Library access rules for a user.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UserPolicy {
    pub enable_all_folders: bool,
    pub enabled_folders: Vec<ItemId>,
    /// Blocked library folders, by id or (legacy) by name.
    pub blocked_media_folders: Vec<String>,
    pub blocked_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UserConfiguration {
    pub group_movies_into_box_sets: bool,
    pub display_missing_episodes: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub policy: UserPolicy,
    pub configuration: UserConfiguration,
    /// The user's root folder, once one has been created.
    pub root_folder_id: Option<ItemId>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            policy: UserPolicy::default(),
            configuration: UserConfiguration::default(),
            root_folder_id: None,
        }
    }

    pub fn with_all_folders(mut self) -> Self {
        self.policy.enable_all_folders = true;
        self
    }
}

/// Per-(user, item) playback and preference state.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserItemData {
    pub key: String,
    /// 0-10 rating; drives [`UserItemData::likes`].
    pub rating: Option<f64>,
    pub is_favorite: bool,
    pub played: bool,
    pub play_count: u32,
    pub playback_position_ticks: i64,
    pub last_played_date: Option<DateTime<Utc>>,
}

impl UserItemData {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// `Some(true)` when liked, `Some(false)` when disliked, `None` when
    /// never rated.
    pub fn likes(&self) -> Option<bool> {
        self.rating.map(|rating| rating >= LIKES_THRESHOLD)
    }

    pub fn set_likes(&mut self, likes: Option<bool>) {
        self.rating = likes.map(|liked| if liked { 10.0 } else { 1.0 });
    }

    pub fn is_resumable(&self) -> bool {
        self.playback_position_ticks > 0
    }
}

/// User state as returned alongside query results. Folder entries carry
/// aggregate play state over their descendants.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserItemDataDto {
    pub item_id: Option<ItemId>,
    pub key: String,
    pub rating: Option<f64>,
    pub likes: Option<bool>,
    pub is_favorite: bool,
    pub played: bool,
    pub play_count: u32,
    pub playback_position_ticks: i64,
    pub last_played_date: Option<DateTime<Utc>>,
    pub played_percentage: Option<f64>,
    pub unplayed_item_count: Option<u32>,
}

impl UserItemDataDto {
    pub fn from_data(item_id: ItemId, data: &UserItemData) -> Self {
        Self {
            item_id: Some(item_id),
            key: data.key.clone(),
            rating: data.rating,
            likes: data.likes(),
            is_favorite: data.is_favorite,
            played: data.played,
            play_count: data.play_count,
            playback_position_ticks: data.playback_position_ticks,
            last_played_date: data.last_played_date,
            played_percentage: None,
            unplayed_item_count: None,
        }
    }
}
