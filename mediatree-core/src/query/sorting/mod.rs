//! Multi-key, stable sorting of entities.
//!
//! Keys apply in the caller's order, each in its own direction. Missing
//! values sort last regardless of direction, and entities that compare
//! equal keep their discovery order.

pub mod keys;
pub mod traits;

use mediatree_model::{Entity, EntityKind, SortBy, sort_name::derive_sort_name};
use std::cmp::Ordering;

use self::keys::{OptionalDateKey, OptionalFloatKey, OptionalIntKey, StringKey};
use self::traits::SortKey;
use super::context::EvaluationContext;
use super::types::SortSpec;

/// A key extracted for one sort field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortValue {
    Text(StringKey),
    Date(OptionalDateKey),
    Float(OptionalFloatKey),
    Int(OptionalIntKey),
}

impl SortValue {
    fn compare(&self, other: &Self, descending: bool) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.compare_with_order(b, descending),
            (SortValue::Date(a), SortValue::Date(b)) => a.compare_with_order(b, descending),
            (SortValue::Float(a), SortValue::Float(b)) => a.compare_with_order(b, descending),
            (SortValue::Int(a), SortValue::Int(b)) => a.compare_with_order(b, descending),
            // Same field always yields the same variant.
            _ => Ordering::Equal,
        }
    }
}

/// Sort fields the store can order by without per-user or aggregate data.
pub fn is_indexable(by: SortBy) -> bool {
    matches!(
        by,
        SortBy::SortName
            | SortBy::Name
            | SortBy::CommunityRating
            | SortBy::CriticRating
            | SortBy::DateCreated
            | SortBy::IsFolder
            | SortBy::PremiereDate
            | SortBy::ProductionYear
            | SortBy::Runtime
    )
}

fn text(value: Option<&str>) -> SortValue {
    SortValue::Text(StringKey::new(value))
}

fn int(value: Option<i64>) -> SortValue {
    SortValue::Int(OptionalIntKey::new(value))
}

fn float(value: Option<f64>) -> SortValue {
    SortValue::Float(OptionalFloatKey::new(value))
}

fn date(value: Option<chrono::DateTime<chrono::Utc>>) -> SortValue {
    SortValue::Date(OptionalDateKey::new(value))
}

/// Broadcast position of an episode; specials slot in before the season
/// they air ahead of.
fn aired_episode_order(entity: &Entity) -> Option<i64> {
    let EntityKind::Episode(episode) = &entity.kind else {
        return None;
    };
    let season = i64::from(entity.parent_index_number?);
    let number = i64::from(entity.index_number.unwrap_or(0));

    if season == 0
        && let Some(before) = episode.airs_before_season
    {
        let slot = episode
            .airs_before_episode
            .map(|ep| i64::from(ep) * 10 - 5)
            .unwrap_or(-5);
        return Some(i64::from(before) * 100_000 + slot);
    }
    if season == 0
        && let Some(after) = episode.airs_after_season
    {
        return Some(i64::from(after) * 100_000 + 99_990 + number.min(9));
    }
    Some(season * 100_000 + number * 10)
}

pub fn sort_value(entity: &Entity, by: SortBy, ctx: &EvaluationContext) -> SortValue {
    match by {
        SortBy::SortName => text(Some(entity.sort_name().as_str())),
        SortBy::Name => text(Some(entity.name.as_str())),
        SortBy::CommunityRating => float(entity.community_rating.map(f64::from)),
        SortBy::CriticRating => float(entity.critic_rating.map(f64::from)),
        SortBy::DateCreated => date(Some(entity.date_created)),
        SortBy::IsFolder => SortValue::Int(OptionalIntKey::flag(entity.is_folder())),
        SortBy::PremiereDate | SortBy::StartDate => date(entity.premiere_date),
        SortBy::ProductionYear => int(entity.production_year.map(i64::from)),
        SortBy::Runtime => int(entity.runtime_ticks),

        SortBy::Album => text(entity.album()),
        SortBy::AlbumArtist => text(entity.album_artists().first().map(String::as_str)),
        SortBy::Artist => text(entity.artists().first().map(String::as_str)),
        SortBy::AiredEpisodeOrder => int(aired_episode_order(entity)),
        SortBy::Budget => float(entity.budget),
        SortBy::Revenue => float(entity.revenue),
        SortBy::Metascore => float(entity.metascore.map(f64::from)),
        SortBy::GameSystem => {
            text(entity.game_data().and_then(|g| g.game_system.as_deref()))
        }
        SortBy::Players => {
            int(entity.game_data().and_then(|g| g.players).map(i64::from))
        }
        SortBy::OfficialRating => text(entity.official_rating.as_deref()),
        SortBy::Studio => text(entity.studios.first().map(String::as_str)),
        SortBy::SeriesSortName => {
            let name = entity.series_name().map(derive_sort_name);
            text(name.as_deref())
        }
        SortBy::VideoBitRate => {
            int(entity.video_data().and_then(|v| v.bitrate).map(i64::from))
        }
        SortBy::DateLastContentAdded => date(Some(ctx.last_content_added(entity))),
        SortBy::DatePlayed => {
            date(ctx.user_data(entity.id).and_then(|d| d.last_played_date))
        }
        SortBy::PlayCount => int(Some(
            ctx.user_data(entity.id)
                .map(|d| i64::from(d.play_count))
                .unwrap_or(0),
        )),
        SortBy::IsFavoriteOrLiked => {
            SortValue::Int(OptionalIntKey::flag(ctx.is_favorite_or_liked(entity)))
        }
        SortBy::IsPlayed => SortValue::Int(OptionalIntKey::flag(ctx.is_played(entity))),
        SortBy::IsUnplayed => {
            SortValue::Int(OptionalIntKey::flag(!ctx.is_played(entity)))
        }
    }
}

/// Stable in-place sort by `specs`; no-op when `specs` is empty.
pub fn sort_entities(
    items: &mut Vec<Entity>,
    specs: &[SortSpec],
    ctx: &EvaluationContext,
) {
    if specs.is_empty() || items.len() < 2 {
        return;
    }

    let mut keyed: Vec<(Vec<SortValue>, Entity)> = items
        .drain(..)
        .map(|entity| {
            let keys = specs
                .iter()
                .map(|spec| sort_value(&entity, spec.by, ctx))
                .collect();
            (keys, entity)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        for (index, spec) in specs.iter().enumerate() {
            let ordering = a[index].compare(&b[index], spec.is_descending());
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    items.extend(keyed.into_iter().map(|(_, entity)| entity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatree_model::{EpisodeData, SortOrder, VideoData};

    fn movie(name: &str, year: Option<i32>) -> Entity {
        let mut entity = Entity::at_path(
            format!("/m/{name}.mkv"),
            name,
            EntityKind::Movie(VideoData::default()),
        );
        entity.production_year = year;
        entity
    }

    fn names(items: &[Entity]) -> Vec<&str> {
        items.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn keys_apply_in_order_with_independent_directions() {
        let mut items = vec![
            movie("B", Some(2000)),
            movie("A", Some(2000)),
            movie("C", Some(2010)),
        ];
        sort_entities(
            &mut items,
            &[
                SortSpec::new(SortBy::ProductionYear, SortOrder::Descending),
                SortSpec::ascending(SortBy::SortName),
            ],
            &EvaluationContext::empty(),
        );
        assert_eq!(names(&items), vec!["C", "A", "B"]);
    }

    #[test]
    fn missing_years_sort_last_even_descending() {
        let mut items = vec![movie("A", None), movie("B", Some(1990)), movie("C", Some(2000))];
        sort_entities(
            &mut items,
            &[SortSpec::new(SortBy::ProductionYear, SortOrder::Descending)],
            &EvaluationContext::empty(),
        );
        assert_eq!(names(&items), vec!["C", "B", "A"]);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let mut items = vec![
            movie("Z", Some(2000)),
            movie("Y", Some(2000)),
            movie("X", Some(2000)),
        ];
        sort_entities(
            &mut items,
            &[SortSpec::ascending(SortBy::ProductionYear)],
            &EvaluationContext::empty(),
        );
        assert_eq!(names(&items), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn specials_air_before_their_season() {
        let episode = |name: &str, season: i32, number: i32, before: Option<i32>| {
            let mut e = Entity::at_path(
                format!("/tv/{name}.mkv"),
                name,
                EntityKind::Episode(EpisodeData {
                    airs_before_season: before,
                    ..EpisodeData::default()
                }),
            );
            e.parent_index_number = Some(season);
            e.index_number = Some(number);
            e
        };
        let mut items = vec![
            episode("s2e1", 2, 1, None),
            episode("special", 0, 1, Some(2)),
            episode("s1e1", 1, 1, None),
        ];
        sort_entities(
            &mut items,
            &[SortSpec::ascending(SortBy::AiredEpisodeOrder)],
            &EvaluationContext::empty(),
        );
        assert_eq!(names(&items), vec!["s1e1", "special", "s2e1"]);
    }
}
