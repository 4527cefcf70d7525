//! Predicate evaluation.
//!
//! [`matches_indexed`] is the subset the entity store evaluates itself;
//! [`matches_post`] covers everything that needs per-user state, aggregate
//! data or cross-referenced ids. The in-memory path applies both, so the two
//! execution paths agree on every predicate they share.

use mediatree_model::entity::{PROVIDER_IMDB, PROVIDER_TMDB, PROVIDER_TVDB};
use mediatree_model::{Entity, EntityKind};

use super::context::EvaluationContext;
use super::types::ItemQuery;

fn contains_ci(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|value| value.eq_ignore_ascii_case(needle))
}

fn any_ci(values: &[String], wanted: &[String]) -> bool {
    values.iter().any(|value| contains_ci(wanted, value))
}

fn check(expected: Option<bool>, actual: impl FnOnce() -> bool) -> bool {
    expected.is_none_or(|expected| actual() == expected)
}

/// Items exempt from tag-based hiding: library folders and roots.
fn is_tag_exempt(entity: &Entity) -> bool {
    entity.is_collection_folder() || entity.is_root()
}

/// Predicates answerable from the entity alone.
pub fn matches_indexed(
    entity: &Entity,
    query: &ItemQuery,
    excluded_tags: &[String],
) -> bool {
    let kind = entity.item_kind();
    if !query.include_item_kinds.is_empty() && !query.include_item_kinds.contains(&kind) {
        return false;
    }
    if query.exclude_item_kinds.contains(&kind) {
        return false;
    }
    if !query.media_types.is_empty()
        && !entity
            .media_type()
            .is_some_and(|media| query.media_types.contains(&media))
    {
        return false;
    }
    if !check(query.is_folder, || entity.is_folder()) {
        return false;
    }

    let location = entity.location_type();
    if !query.location_types.is_empty() && !query.location_types.contains(&location) {
        return false;
    }
    if query.exclude_location_types.contains(&location) {
        return false;
    }

    if !check(query.is_hd, || entity.video_data().is_some_and(|v| v.is_hd)) {
        return false;
    }
    if !check(query.is_locked, || entity.is_locked) {
        return false;
    }
    if !check(query.has_overview, || {
        entity.overview.as_deref().is_some_and(|o| !o.trim().is_empty())
    }) {
        return false;
    }

    if !query.genres.is_empty() && !any_ci(&entity.genres, &query.genres) {
        return false;
    }
    if !query.studios.is_empty() && !any_ci(&entity.studios, &query.studios) {
        return false;
    }
    if !query.tags.is_empty() && !any_ci(&entity.tags, &query.tags) {
        return false;
    }
    if let Some(person) = &query.person
        && !entity.people.iter().any(|p| {
            p.name.eq_ignore_ascii_case(person)
                && (query.person_types.is_empty()
                    || p.person_type.is_some_and(|t| query.person_types.contains(&t)))
        })
    {
        return false;
    }

    if !query.years.is_empty()
        && !entity
            .production_year
            .is_some_and(|year| query.years.contains(&year))
    {
        return false;
    }
    if let Some(min) = query.min_premiere_date
        && !entity.premiere_date.is_some_and(|d| d >= min)
    {
        return false;
    }
    if let Some(max) = query.max_premiere_date
        && !entity.premiere_date.is_some_and(|d| d <= max)
    {
        return false;
    }
    if let Some(min) = query.min_date_created
        && entity.date_created < min
    {
        return false;
    }
    if let Some(min) = query.min_community_rating
        && !entity.community_rating.is_some_and(|r| r >= min)
    {
        return false;
    }
    if let Some(min) = query.min_critic_rating
        && !entity.critic_rating.is_some_and(|r| r >= min)
    {
        return false;
    }
    if let Some(number) = query.parent_index_number
        && entity.parent_index_number != Some(number)
    {
        return false;
    }

    if !excluded_tags.is_empty()
        && !is_tag_exempt(entity)
        && any_ci(&entity.tags, excluded_tags)
    {
        return false;
    }

    true
}

/// Predicates that need the evaluation context.
pub fn matches_post(entity: &Entity, query: &ItemQuery, ctx: &EvaluationContext) -> bool {
    if !query.item_ids.is_empty() && !query.item_ids.contains(&entity.id) {
        return false;
    }

    // Per-user state.
    if !check(query.is_played, || ctx.is_played(entity)) {
        return false;
    }
    if !check(query.is_favorite, || ctx.is_favorite(entity)) {
        return false;
    }
    if let Some(liked) = query.is_liked
        && ctx.likes(entity) != Some(liked)
    {
        return false;
    }
    if !check(query.is_favorite_or_liked, || ctx.is_favorite_or_liked(entity)) {
        return false;
    }
    if !check(query.is_resumable, || ctx.is_resumable(entity)) {
        return false;
    }
    if !check(query.is_in_box_set, || ctx.box_set_of(entity.id).is_some()) {
        return false;
    }

    // Video attributes; non-video items only satisfy a `false` filter.
    let video = entity.video_data();
    if !check(query.is_3d, || video.is_some_and(|v| v.is_3d)) {
        return false;
    }
    if !check(query.is_place_holder, || video.is_some_and(|v| v.is_placeholder)) {
        return false;
    }
    if !check(query.has_subtitles, || video.is_some_and(|v| v.has_subtitles)) {
        return false;
    }
    if !query.video_types.is_empty()
        && !video.is_some_and(|v| query.video_types.contains(&v.video_type))
    {
        return false;
    }

    // Episode air state; other kinds only satisfy a `false` filter.
    let episode = matches!(entity.kind, EntityKind::Episode(_));
    if !check(query.is_missing, || episode && entity.is_missing_episode(ctx.today)) {
        return false;
    }
    if !check(query.is_unaired, || episode && entity.is_unaired(ctx.today)) {
        return false;
    }
    if !check(query.is_virtual_unaired, || {
        episode && entity.is_virtual_unaired(ctx.today)
    }) {
        return false;
    }

    // Provider ids and presence checks.
    if !check(query.has_imdb_id, || entity.provider_id(PROVIDER_IMDB).is_some()) {
        return false;
    }
    if !check(query.has_tmdb_id, || entity.provider_id(PROVIDER_TMDB).is_some()) {
        return false;
    }
    if !check(query.has_tvdb_id, || entity.provider_id(PROVIDER_TVDB).is_some()) {
        return false;
    }
    if !check(query.is_year_mismatched, || entity.is_year_mismatched()) {
        return false;
    }
    if !check(query.has_official_rating, || {
        entity
            .official_rating
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }) {
        return false;
    }
    if !check(query.has_special_feature, || {
        !entity.extras.special_feature_ids.is_empty()
    }) {
        return false;
    }
    if !check(query.has_trailer, || entity.has_trailer()) {
        return false;
    }
    if !check(query.has_theme_song, || !entity.extras.theme_song_ids.is_empty()) {
        return false;
    }
    if !check(query.has_theme_video, || !entity.extras.theme_video_ids.is_empty()) {
        return false;
    }
    if !query.image_types.is_empty()
        && !query.image_types.iter().any(|image| entity.has_image(*image))
    {
        return false;
    }
    if !query.official_ratings.is_empty()
        && !entity
            .official_rating
            .as_deref()
            .is_some_and(|rating| contains_ci(&query.official_ratings, rating))
    {
        return false;
    }

    // Cross-referenced ids, resolved to names ahead of evaluation.
    if !query.studio_ids.is_empty() && !any_ci(&entity.studios, &ctx.studio_names) {
        return false;
    }
    if !query.genre_ids.is_empty() && !any_ci(&entity.genres, &ctx.genre_names) {
        return false;
    }
    if !query.person_ids.is_empty()
        && !entity.people.iter().any(|p| {
            contains_ci(&ctx.person_names, &p.name)
                && (query.person_types.is_empty()
                    || p.person_type.is_some_and(|t| query.person_types.contains(&t)))
        })
    {
        return false;
    }

    // Games.
    if let Some(min) = query.min_players
        && !entity.game_data().and_then(|g| g.players).is_some_and(|p| p >= min)
    {
        return false;
    }
    if let Some(max) = query.max_players
        && !entity.game_data().and_then(|g| g.players).is_some_and(|p| p <= max)
    {
        return false;
    }

    // Series and episodes.
    if !query.series_statuses.is_empty()
        && !entity
            .series_data()
            .and_then(|s| s.status)
            .is_some_and(|status| query.series_statuses.contains(&status))
    {
        return false;
    }
    if !query.air_days.is_empty()
        && !entity
            .series_data()
            .is_some_and(|s| s.air_days.iter().any(|day| query.air_days.contains(day)))
    {
        return false;
    }
    if let Some(season) = query.aired_during_season
        && !aired_during_season(entity, season)
    {
        return false;
    }

    // Names compare case-insensitively against the sort name.
    if query.name_starts_with.is_some()
        || query.name_starts_with_or_greater.is_some()
        || query.name_less_than.is_some()
    {
        let sort_name = entity.sort_name();
        if let Some(prefix) = &query.name_starts_with
            && !sort_name.starts_with(&prefix.to_lowercase())
        {
            return false;
        }
        if let Some(floor) = &query.name_starts_with_or_greater
            && sort_name.as_str() < floor.to_lowercase().as_str()
        {
            return false;
        }
        if let Some(ceiling) = &query.name_less_than
            && sort_name.as_str() >= ceiling.to_lowercase().as_str()
        {
            return false;
        }
    }
    if let Some(term) = &query.name_contains
        && !entity.name.to_lowercase().contains(&term.to_lowercase())
    {
        return false;
    }

    // Music.
    if let Some(floor) = &query.album_artist_starts_with_or_greater {
        let floor = floor.to_lowercase();
        if !entity
            .album_artists()
            .iter()
            .any(|artist| artist.to_lowercase() >= floor)
        {
            return false;
        }
    }
    if !query.album_names.is_empty()
        && !entity
            .album()
            .is_some_and(|album| contains_ci(&query.album_names, album))
    {
        return false;
    }
    if !query.artist_names.is_empty() && !any_ci(entity.artists(), &query.artist_names) {
        return false;
    }

    true
}

/// Full predicate set.
pub fn matches_all(
    entity: &Entity,
    query: &ItemQuery,
    excluded_tags: &[String],
    ctx: &EvaluationContext,
) -> bool {
    matches_indexed(entity, query, excluded_tags) && matches_post(entity, query, ctx)
}

fn aired_during_season(entity: &Entity, season: i32) -> bool {
    let EntityKind::Episode(episode) = &entity.kind else {
        return false;
    };
    entity.parent_index_number == Some(season)
        || episode.airs_before_season == Some(season)
        || episode.airs_after_season == Some(season)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mediatree_model::{
        FolderData, GameData, ItemId, ItemKind, LocationType, UserItemData, VideoData,
    };

    fn movie(name: &str) -> Entity {
        Entity::at_path(format!("/m/{name}.mkv"), name, EntityKind::Movie(VideoData::default()))
    }

    #[test]
    fn default_query_matches_everything() {
        let query = ItemQuery::default();
        let ctx = EvaluationContext::empty();
        assert!(matches_all(&movie("a"), &query, &[], &ctx));
    }

    #[test]
    fn kinds_and_locations_filter_in_store() {
        let query = ItemQuery {
            include_item_kinds: vec![ItemKind::Episode],
            ..ItemQuery::default()
        };
        assert!(!matches_indexed(&movie("a"), &query, &[]));

        let mut offline = movie("b");
        offline.is_offline = true;
        let query = ItemQuery {
            exclude_location_types: vec![LocationType::Offline],
            ..ItemQuery::default()
        };
        assert!(!matches_indexed(&offline, &query, &[]));
    }

    #[test]
    fn blocked_tags_hide_items_but_not_libraries() {
        let mut tagged = movie("a");
        tagged.tags.push("Kids-NO".into());
        let blocked = vec!["kids-no".to_string()];
        assert!(!matches_indexed(&tagged, &ItemQuery::default(), &blocked));

        let mut library = Entity::at_path(
            "/lib",
            "Library",
            EntityKind::Folder(FolderData::collection(None)),
        );
        library.tags.push("Kids-NO".into());
        assert!(matches_indexed(&library, &ItemQuery::default(), &blocked));
    }

    #[test]
    fn user_state_predicates_read_the_context() {
        let item = movie("a");
        let mut ctx = EvaluationContext::empty();
        let mut data = UserItemData::new(item.user_data_key());
        data.played = true;
        data.rating = Some(2.0);
        ctx.user_data.insert(item.id, data);

        let played = ItemQuery {
            is_played: Some(true),
            ..ItemQuery::default()
        };
        assert!(matches_post(&item, &played, &ctx));

        let liked = ItemQuery {
            is_liked: Some(true),
            ..ItemQuery::default()
        };
        assert!(!matches_post(&item, &liked, &ctx));

        let disliked = ItemQuery {
            is_liked: Some(false),
            ..ItemQuery::default()
        };
        assert!(matches_post(&item, &disliked, &ctx));
    }

    #[test]
    fn non_episodes_only_pass_negative_air_state_filters() {
        let ctx = EvaluationContext::empty();
        let mut upcoming = movie("upcoming");
        upcoming.premiere_date = Some(Utc::now() + Duration::days(30));
        let filters: [fn(bool) -> ItemQuery; 3] = [
            |value| ItemQuery {
                is_missing: Some(value),
                ..ItemQuery::default()
            },
            |value| ItemQuery {
                is_unaired: Some(value),
                ..ItemQuery::default()
            },
            |value| ItemQuery {
                is_virtual_unaired: Some(value),
                ..ItemQuery::default()
            },
        ];
        for entity in [movie("a"), upcoming] {
            for flag in filters {
                assert!(!matches_post(&entity, &flag(true), &ctx));
                assert!(matches_post(&entity, &flag(false), &ctx));
            }
        }
    }

    #[test]
    fn non_video_items_only_pass_negative_video_filters() {
        let game = Entity::at_path(
            "/g/a.rom",
            "A",
            EntityKind::Game(GameData {
                game_system: Some("SNES".into()),
                players: Some(2),
            }),
        );
        let ctx = EvaluationContext::empty();
        let want_3d = ItemQuery {
            is_3d: Some(true),
            ..ItemQuery::default()
        };
        let not_3d = ItemQuery {
            is_3d: Some(false),
            ..ItemQuery::default()
        };
        assert!(!matches_post(&game, &want_3d, &ctx));
        assert!(matches_post(&game, &not_3d, &ctx));

        let players = ItemQuery {
            min_players: Some(1),
            max_players: Some(2),
            ..ItemQuery::default()
        };
        assert!(matches_post(&game, &players, &ctx));
        assert!(!matches_post(&movie("m"), &players, &ctx));
    }

    #[test]
    fn name_range_filters_use_sort_names() {
        let ctx = EvaluationContext::empty();
        let query = ItemQuery {
            name_starts_with_or_greater: Some("M".into()),
            name_less_than: Some("p".into()),
            ..ItemQuery::default()
        };
        assert!(matches_post(&movie("The Matrix"), &query, &ctx));
        assert!(!matches_post(&movie("Alien"), &query, &ctx));
        assert!(!matches_post(&movie("Predator"), &query, &ctx));
    }

    #[test]
    fn cross_referenced_ids_match_resolved_names() {
        let mut item = movie("a");
        item.genres.push("Horror".into());
        let mut ctx = EvaluationContext::empty();
        ctx.genre_names = vec!["horror".into()];
        let query = ItemQuery {
            genre_ids: vec![ItemId::from_name(ItemKind::Genre, "horror")],
            ..ItemQuery::default()
        };
        assert!(matches_post(&item, &query, &ctx));
        ctx.genre_names.clear();
        assert!(!matches_post(&item, &query, &ctx));
    }
}
