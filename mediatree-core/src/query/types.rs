use chrono::{DateTime, Utc, Weekday};
use mediatree_model::{
    ImageType, ItemId, ItemKind, LocationType, MediaType, PersonType,
    SeriesStatus, SortBy, SortOrder, VideoType,
};
use thiserror::Error;

/// Rejection of a query specification at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("unknown {field} value: {value}")]
    UnknownValue { field: &'static str, value: String },

    #[error("invalid id in {field}: {value}")]
    InvalidId { field: &'static str, value: String },

    #[error("invalid date in {field}: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid number in {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} range is empty: minimum exceeds maximum")]
    EmptyRange { field: &'static str },

    #[error("limit {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: usize, max: usize },

    #[error("{orders} sort orders given for {keys} sort keys")]
    SortOrderMismatch { keys: usize, orders: usize },
}

/// One sort key and its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub by: SortBy,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(by: SortBy, order: SortOrder) -> Self {
        Self { by, order }
    }

    pub fn ascending(by: SortBy) -> Self {
        Self::new(by, SortOrder::Ascending)
    }

    pub fn is_descending(&self) -> bool {
        self.order == SortOrder::Descending
    }
}

/// Filter, sort and paging specification for one item request.
///
/// Built once (via [`ItemQuery::builder`] or
/// [`crate::query::ItemsRequest`]) and only read afterwards. `None` and
/// empty lists mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub recursive: bool,
    pub item_ids: Vec<ItemId>,
    pub include_item_kinds: Vec<ItemKind>,
    pub exclude_item_kinds: Vec<ItemKind>,
    pub media_types: Vec<MediaType>,
    pub is_folder: Option<bool>,
    pub location_types: Vec<LocationType>,
    pub exclude_location_types: Vec<LocationType>,

    pub is_played: Option<bool>,
    pub is_favorite: Option<bool>,
    pub is_liked: Option<bool>,
    pub is_favorite_or_liked: Option<bool>,
    pub is_resumable: Option<bool>,
    pub is_in_box_set: Option<bool>,

    pub is_3d: Option<bool>,
    pub is_hd: Option<bool>,
    pub is_missing: Option<bool>,
    pub is_unaired: Option<bool>,
    pub is_virtual_unaired: Option<bool>,
    pub is_place_holder: Option<bool>,
    pub is_locked: Option<bool>,
    pub is_year_mismatched: Option<bool>,

    pub has_imdb_id: Option<bool>,
    pub has_tmdb_id: Option<bool>,
    pub has_tvdb_id: Option<bool>,
    pub has_overview: Option<bool>,
    pub has_official_rating: Option<bool>,
    pub has_special_feature: Option<bool>,
    pub has_subtitles: Option<bool>,
    pub has_trailer: Option<bool>,
    pub has_theme_song: Option<bool>,
    pub has_theme_video: Option<bool>,

    pub genres: Vec<String>,
    pub genre_ids: Vec<ItemId>,
    pub studios: Vec<String>,
    pub studio_ids: Vec<ItemId>,
    pub tags: Vec<String>,
    pub official_ratings: Vec<String>,
    pub person: Option<String>,
    pub person_ids: Vec<ItemId>,
    pub person_types: Vec<PersonType>,
    pub years: Vec<i32>,
    pub image_types: Vec<ImageType>,
    pub video_types: Vec<VideoType>,
    pub series_statuses: Vec<SeriesStatus>,
    pub air_days: Vec<Weekday>,

    pub min_premiere_date: Option<DateTime<Utc>>,
    pub max_premiere_date: Option<DateTime<Utc>>,
    pub min_date_created: Option<DateTime<Utc>>,
    pub min_community_rating: Option<f32>,
    pub min_critic_rating: Option<f32>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub parent_index_number: Option<i32>,
    pub aired_during_season: Option<i32>,

    pub name_contains: Option<String>,
    pub name_starts_with: Option<String>,
    pub name_starts_with_or_greater: Option<String>,
    pub name_less_than: Option<String>,
    pub album_artist_starts_with_or_greater: Option<String>,
    pub album_names: Vec<String>,
    pub artist_names: Vec<String>,

    pub adjacent_to: Option<ItemId>,
    /// Explicit box-set collapsing; `None` defers to the user's setting.
    pub collapse_box_set_items: Option<bool>,

    pub sort: Vec<SortSpec>,
    pub start_index: Option<usize>,
    pub limit: Option<usize>,
}

impl ItemQuery {
    pub fn builder() -> super::builder::ItemQueryBuilder {
        super::builder::ItemQueryBuilder::new()
    }

    /// Copy of the query without paging, used when a later stage pages.
    pub fn without_paging(&self) -> Self {
        Self {
            start_index: None,
            limit: None,
            ..self.clone()
        }
    }

    pub fn is_sorted(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Range and limit checks shared by every construction path.
    pub fn validate(&self, max_limit: Option<usize>) -> Result<(), QueryError> {
        if let (Some(min), Some(max)) = (self.min_premiere_date, self.max_premiere_date)
            && min > max
        {
            return Err(QueryError::EmptyRange {
                field: "premiere date",
            });
        }
        if let (Some(min), Some(max)) = (self.min_players, self.max_players)
            && min > max
        {
            return Err(QueryError::EmptyRange { field: "players" });
        }
        if let (Some(limit), Some(max)) = (self.limit, max_limit)
            && limit > max
        {
            return Err(QueryError::LimitTooLarge { limit, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn inverted_ranges_are_rejected() {
        let query = ItemQuery {
            min_players: Some(4),
            max_players: Some(2),
            ..ItemQuery::default()
        };
        assert_eq!(
            query.validate(None),
            Err(QueryError::EmptyRange { field: "players" })
        );

        let query = ItemQuery {
            min_premiere_date: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            max_premiere_date: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            ..ItemQuery::default()
        };
        assert!(query.validate(None).is_err());
    }

    #[test]
    fn limit_is_capped() {
        let query = ItemQuery {
            limit: Some(500),
            ..ItemQuery::default()
        };
        assert!(query.validate(Some(1000)).is_ok());
        assert_eq!(
            query.validate(Some(100)),
            Err(QueryError::LimitTooLarge { limit: 500, max: 100 })
        );
    }
}
