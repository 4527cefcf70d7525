//! Translation of the string-typed items request into an [`ItemQuery`].
//!
//! Every enumerated value is parsed here, so malformed requests fail before
//! the planner touches the tree.

use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use mediatree_model::{ItemFilter, ItemId, ItemKind, SortBy, SortOrder};
use serde::Deserialize;
use std::str::FromStr;

use super::types::{ItemQuery, QueryError, SortSpec};

/// How far back `IsRecentlyAdded` looks.
const RECENTLY_ADDED_DAYS: i64 = 10;

/// Items request as received from the API layer. List values are comma
/// separated, except names (genres, studios, tags, ratings, albums,
/// artists) which are pipe separated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ItemsRequest {
    pub parent_id: Option<String>,
    pub recursive: Option<bool>,
    pub ids: Option<String>,
    pub include_item_types: Option<String>,
    pub exclude_item_types: Option<String>,
    pub media_types: Option<String>,
    pub filters: Option<String>,
    pub location_types: Option<String>,
    pub exclude_location_types: Option<String>,

    pub is_played: Option<bool>,
    pub is_favorite: Option<bool>,
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

    pub genres: Option<String>,
    pub genre_ids: Option<String>,
    pub studios: Option<String>,
    pub studio_ids: Option<String>,
    pub tags: Option<String>,
    pub official_ratings: Option<String>,
    pub person: Option<String>,
    pub person_ids: Option<String>,
    pub person_types: Option<String>,
    pub years: Option<String>,
    pub image_types: Option<String>,
    pub video_types: Option<String>,
    pub series_status: Option<String>,
    pub air_days: Option<String>,

    pub min_premiere_date: Option<String>,
    pub max_premiere_date: Option<String>,
    pub min_community_rating: Option<f32>,
    pub min_critic_rating: Option<f32>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub parent_index_number: Option<i32>,
    pub aired_during_season: Option<i32>,

    pub name_starts_with: Option<String>,
    pub name_starts_with_or_greater: Option<String>,
    pub name_less_than: Option<String>,
    pub search_term: Option<String>,
    pub album_artist_starts_with_or_greater: Option<String>,
    pub albums: Option<String>,
    pub artists: Option<String>,

    pub adjacent_to: Option<String>,
    pub collapse_box_set_items: Option<bool>,

    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub start_index: Option<usize>,
    pub limit: Option<usize>,
}

/// A validated request: the parent scope and the query to run under it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedItemsRequest {
    /// `None` resolves to the user's root (or the physical root).
    pub parent_id: Option<ItemId>,
    pub query: ItemQuery,
}

impl ItemsRequest {
    pub fn parse(self, max_limit: Option<usize>) -> Result<ParsedItemsRequest, QueryError> {
        let mut parent_id = parse_optional_id("ParentId", self.parent_id.as_deref())?;

        let mut query = ItemQuery {
            recursive: self.recursive.unwrap_or(false),
            item_ids: parse_ids("Ids", self.ids.as_deref())?,
            include_item_kinds: parse_list("IncludeItemTypes", self.include_item_types.as_deref())?,
            exclude_item_kinds: parse_list("ExcludeItemTypes", self.exclude_item_types.as_deref())?,
            media_types: parse_list("MediaTypes", self.media_types.as_deref())?,
            location_types: parse_list("LocationTypes", self.location_types.as_deref())?,
            exclude_location_types: parse_list(
                "ExcludeLocationTypes",
                self.exclude_location_types.as_deref(),
            )?,
            is_played: self.is_played,
            is_favorite: self.is_favorite,
            is_in_box_set: self.is_in_box_set,
            is_3d: self.is_3d,
            is_hd: self.is_hd,
            is_missing: self.is_missing,
            is_unaired: self.is_unaired,
            is_virtual_unaired: self.is_virtual_unaired,
            is_place_holder: self.is_place_holder,
            is_locked: self.is_locked,
            is_year_mismatched: self.is_year_mismatched,
            has_imdb_id: self.has_imdb_id,
            has_tmdb_id: self.has_tmdb_id,
            has_tvdb_id: self.has_tvdb_id,
            has_overview: self.has_overview,
            has_official_rating: self.has_official_rating,
            has_special_feature: self.has_special_feature,
            has_subtitles: self.has_subtitles,
            has_trailer: self.has_trailer,
            has_theme_song: self.has_theme_song,
            has_theme_video: self.has_theme_video,
            genres: split_names(self.genres.as_deref()),
            genre_ids: parse_ids("GenreIds", self.genre_ids.as_deref())?,
            studios: split_names(self.studios.as_deref()),
            studio_ids: parse_ids("StudioIds", self.studio_ids.as_deref())?,
            tags: split_names(self.tags.as_deref()),
            official_ratings: split_names(self.official_ratings.as_deref()),
            person: non_empty(self.person),
            person_ids: parse_ids("PersonIds", self.person_ids.as_deref())?,
            person_types: parse_list("PersonTypes", self.person_types.as_deref())?,
            years: parse_numbers("Years", self.years.as_deref())?,
            image_types: parse_list("ImageTypes", self.image_types.as_deref())?,
            video_types: parse_list("VideoTypes", self.video_types.as_deref())?,
            series_statuses: parse_list("SeriesStatus", self.series_status.as_deref())?,
            air_days: parse_air_days(self.air_days.as_deref())?,
            min_premiere_date: parse_date("MinPremiereDate", self.min_premiere_date.as_deref())?,
            max_premiere_date: parse_date("MaxPremiereDate", self.max_premiere_date.as_deref())?,
            min_community_rating: self.min_community_rating,
            min_critic_rating: self.min_critic_rating,
            min_players: self.min_players,
            max_players: self.max_players,
            parent_index_number: self.parent_index_number,
            aired_during_season: self.aired_during_season,
            name_contains: non_empty(self.search_term),
            name_starts_with: non_empty(self.name_starts_with),
            name_starts_with_or_greater: non_empty(self.name_starts_with_or_greater),
            name_less_than: non_empty(self.name_less_than),
            album_artist_starts_with_or_greater: non_empty(
                self.album_artist_starts_with_or_greater,
            ),
            album_names: split_names(self.albums.as_deref()),
            artist_names: split_names(self.artists.as_deref()),
            adjacent_to: parse_optional_id("AdjacentTo", self.adjacent_to.as_deref())?,
            collapse_box_set_items: self.collapse_box_set_items,
            sort: parse_sort(self.sort_by.as_deref(), self.sort_order.as_deref())?,
            start_index: self.start_index,
            limit: self.limit,
            ..ItemQuery::default()
        };

        for filter in parse_list::<ItemFilter>("Filters", self.filters.as_deref())? {
            apply_filter(&mut query, filter);
        }

        // Box sets live outside any one library, so they are always listed
        // from the root.
        if query.include_item_kinds == [ItemKind::BoxSet] {
            parent_id = None;
            query.recursive = true;
        }

        // Explicit ids are searched library-wide and never folded into
        // their box sets.
        if !query.item_ids.is_empty() {
            query.recursive = true;
            query.collapse_box_set_items = Some(false);
        }

        query.validate(max_limit)?;
        Ok(ParsedItemsRequest { parent_id, query })
    }
}

fn apply_filter(query: &mut ItemQuery, filter: ItemFilter) {
    match filter {
        ItemFilter::IsFolder => query.is_folder = Some(true),
        ItemFilter::IsNotFolder => query.is_folder = Some(false),
        ItemFilter::IsPlayed => query.is_played = Some(true),
        ItemFilter::IsUnplayed => query.is_played = Some(false),
        ItemFilter::IsFavorite => query.is_favorite = Some(true),
        ItemFilter::IsResumable => query.is_resumable = Some(true),
        ItemFilter::Likes => query.is_liked = Some(true),
        ItemFilter::Dislikes => query.is_liked = Some(false),
        ItemFilter::IsFavoriteOrLikes => query.is_favorite_or_liked = Some(true),
        ItemFilter::IsRecentlyAdded => {
            query.min_date_created = Some(Utc::now() - Duration::days(RECENTLY_ADDED_DAYS));
        }
    }
}

fn split(raw: Option<&str>, separator: char) -> Vec<&str> {
    raw.map(|value| {
        value
            .split(separator)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn split_names(raw: Option<&str>) -> Vec<String> {
    split(raw, '|').into_iter().map(str::to_string).collect()
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.trim().is_empty())
}

fn parse_list<T: FromStr>(field: &'static str, raw: Option<&str>) -> Result<Vec<T>, QueryError> {
    split(raw, ',')
        .into_iter()
        .map(|part| {
            part.parse().map_err(|_| QueryError::UnknownValue {
                field,
                value: part.to_string(),
            })
        })
        .collect()
}

fn parse_ids(field: &'static str, raw: Option<&str>) -> Result<Vec<ItemId>, QueryError> {
    split(raw, ',')
        .into_iter()
        .map(|part| {
            part.parse().map_err(|_| QueryError::InvalidId {
                field,
                value: part.to_string(),
            })
        })
        .collect()
}

fn parse_optional_id(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<ItemId>, QueryError> {
    Ok(parse_ids(field, raw)?.into_iter().next())
}

fn parse_numbers(field: &'static str, raw: Option<&str>) -> Result<Vec<i32>, QueryError> {
    split(raw, ',')
        .into_iter()
        .map(|part| {
            part.parse().map_err(|_| QueryError::InvalidNumber {
                field,
                value: part.to_string(),
            })
        })
        .collect()
}

fn parse_air_days(raw: Option<&str>) -> Result<Vec<Weekday>, QueryError> {
    split(raw, ',')
        .into_iter()
        .map(|part| {
            part.parse::<Weekday>().map_err(|_| QueryError::UnknownValue {
                field: "AirDays",
                value: part.to_string(),
            })
        })
        .collect()
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, QueryError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| QueryError::InvalidDate {
            field,
            value: raw.to_string(),
        })
}

/// One order applies to every key; otherwise orders pair with keys.
fn parse_sort(
    sort_by: Option<&str>,
    sort_order: Option<&str>,
) -> Result<Vec<SortSpec>, QueryError> {
    let keys: Vec<SortBy> = parse_list("SortBy", sort_by)?;
    let orders: Vec<SortOrder> = parse_list("SortOrder", sort_order)?;

    match orders.len() {
        0 => Ok(keys.into_iter().map(SortSpec::ascending).collect()),
        1 => Ok(keys
            .into_iter()
            .map(|by| SortSpec::new(by, orders[0]))
            .collect()),
        n if n == keys.len() => Ok(keys
            .into_iter()
            .zip(orders)
            .map(|(by, order)| SortSpec::new(by, order))
            .collect()),
        n => Err(QueryError::SortOrderMismatch {
            keys: keys.len(),
            orders: n,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatree_model::{LocationType, SeriesStatus};

    #[test]
    fn filters_translate_to_flags() {
        let parsed = ItemsRequest {
            filters: Some("IsUnplayed,IsFavoriteOrLikes,Dislikes,IsNotFolder".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert_eq!(parsed.query.is_played, Some(false));
        assert_eq!(parsed.query.is_favorite_or_liked, Some(true));
        assert_eq!(parsed.query.is_liked, Some(false));
        assert_eq!(parsed.query.is_folder, Some(false));
    }

    #[test]
    fn unknown_enumerated_values_are_rejected() {
        let err = ItemsRequest {
            series_status: Some("Continuing,Cancelled".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownValue {
                field: "SeriesStatus",
                value: "Cancelled".into()
            }
        );

        assert!(
            ItemsRequest {
                air_days: Some("Funday".into()),
                ..ItemsRequest::default()
            }
            .parse(None)
            .is_err()
        );
        assert!(
            ItemsRequest {
                location_types: Some("Cloud".into()),
                ..ItemsRequest::default()
            }
            .parse(None)
            .is_err()
        );
    }

    #[test]
    fn enumerated_values_parse_case_insensitively() {
        let parsed = ItemsRequest {
            series_status: Some("ended".into()),
            location_types: Some("virtual".into()),
            air_days: Some("Monday,fri".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert_eq!(parsed.query.series_statuses, vec![SeriesStatus::Ended]);
        assert_eq!(parsed.query.location_types, vec![LocationType::Virtual]);
        assert_eq!(parsed.query.air_days, vec![Weekday::Mon, Weekday::Fri]);
    }

    #[test]
    fn single_sort_order_applies_to_all_keys() {
        let parsed = ItemsRequest {
            sort_by: Some("PremiereDate,SortName".into()),
            sort_order: Some("Descending".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert!(parsed.query.sort.iter().all(SortSpec::is_descending));
        assert_eq!(parsed.query.sort.len(), 2);
    }

    #[test]
    fn mismatched_sort_orders_are_rejected() {
        let err = ItemsRequest {
            sort_by: Some("PremiereDate,SortName,Runtime".into()),
            sort_order: Some("Descending,Ascending".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap_err();
        assert_eq!(err, QueryError::SortOrderMismatch { keys: 3, orders: 2 });
    }

    #[test]
    fn explicit_ids_force_recursive_without_collapsing() {
        let id = ItemId::new();
        let parsed = ItemsRequest {
            ids: Some(id.simple()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert!(parsed.query.recursive);
        assert_eq!(parsed.query.item_ids, vec![id]);
        assert_eq!(parsed.query.collapse_box_set_items, Some(false));
    }

    #[test]
    fn box_set_requests_resolve_from_root() {
        let parsed = ItemsRequest {
            parent_id: Some(ItemId::new().to_string()),
            include_item_types: Some("BoxSet".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert_eq!(parsed.parent_id, None);
        assert!(parsed.query.recursive);
    }

    #[test]
    fn dates_accept_plain_days_and_timestamps() {
        let parsed = ItemsRequest {
            min_premiere_date: Some("2001-02-03".into()),
            max_premiere_date: Some("2002-01-01T12:00:00Z".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert!(parsed.query.min_premiere_date < parsed.query.max_premiere_date);

        assert!(
            ItemsRequest {
                min_premiere_date: Some("yesterday".into()),
                ..ItemsRequest::default()
            }
            .parse(None)
            .is_err()
        );
    }

    #[test]
    fn empty_parent_stays_unresolved() {
        let parsed = ItemsRequest {
            parent_id: Some("  ".into()),
            ..ItemsRequest::default()
        }
        .parse(None)
        .unwrap();
        assert_eq!(parsed.parent_id, None);
    }
}
