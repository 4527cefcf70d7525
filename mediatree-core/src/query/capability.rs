//! The capability matrix deciding whether the entity store can answer a
//! query directly.
//!
//! Anything listed here is outside the indexed predicate subset (see
//! [`super::filtering::matches_indexed`]) and forces the in-memory path.

use mediatree_model::{CollectionType, Entity, SortBy, User};

use super::sorting::is_indexable;
use super::types::ItemQuery;

/// A single reason a query needs in-memory post-filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostFilterReason {
    /// The folder has linked children and is not a library folder.
    LinkedChildren,
    /// A sort key derived from user state or aggregates.
    DerivedSort(SortBy),
    /// Recursive query for a user with blocked tags. The store hides tagged
    /// items one by one; pruning their subtrees needs the tree walk.
    BlockedTagAncestry,
    ItemIds,
    PersonIds,
    IsLiked,
    IsFavoriteOrLiked,
    IsFavorite,
    IsResumable,
    IsPlayed,
    IsInBoxSet,
    Is3d,
    HasImdbId,
    HasTmdbId,
    HasTvdbId,
    IsYearMismatched,
    HasOfficialRating,
    IsPlaceHolder,
    HasSpecialFeature,
    HasSubtitles,
    HasTrailer,
    HasThemeSong,
    HasThemeVideo,
    VideoTypes,
    ImageTypes,
    StudioIds,
    GenreIds,
    MinPlayers,
    MaxPlayers,
    OfficialRatings,
    IsMissing,
    IsUnaired,
    IsVirtualUnaired,
    CollapseBoxSets,
    AdjacentTo,
    NameContains,
    NameLessThan,
    NameStartsWith,
    NameStartsWithOrGreater,
    AirDays,
    SeriesStatuses,
    AiredDuringSeason,
    AlbumArtistStartsWithOrGreater,
    AlbumNames,
    ArtistNames,
}

/// Whether box sets replace their members for this request: an explicit
/// query flag wins, otherwise the user's grouping preference applies to
/// recursive queries over movie and box-set libraries.
pub fn collapse_box_sets(folder: &Entity, query: &ItemQuery, user: Option<&User>) -> bool {
    if let Some(explicit) = query.collapse_box_set_items {
        return explicit;
    }
    if !query.item_ids.is_empty() || !query.recursive {
        return false;
    }
    let grouping = user.is_some_and(|u| u.configuration.group_movies_into_box_sets);
    grouping
        && folder.is_collection_folder()
        && matches!(
            folder.collection_type(),
            Some(CollectionType::Movies | CollectionType::BoxSets)
        )
}

/// Every reason `query` under `folder` cannot be served by the indexed
/// path. Empty means the store can answer directly.
pub fn requires_post_filtering(
    folder: &Entity,
    query: &ItemQuery,
    user: Option<&User>,
) -> Vec<PostFilterReason> {
    use PostFilterReason as R;

    let mut reasons = Vec::new();
    let mut flag = |present: bool, reason: PostFilterReason| {
        if present {
            reasons.push(reason);
        }
    };

    flag(
        !folder.linked_children().is_empty() && !folder.is_collection_folder(),
        R::LinkedChildren,
    );
    for spec in &query.sort {
        flag(!is_indexable(spec.by), R::DerivedSort(spec.by));
    }
    flag(
        query.recursive && user.is_some_and(|u| !u.policy.blocked_tags.is_empty()),
        R::BlockedTagAncestry,
    );

    flag(!query.item_ids.is_empty(), R::ItemIds);
    flag(!query.person_ids.is_empty(), R::PersonIds);
    flag(query.is_liked.is_some(), R::IsLiked);
    flag(query.is_favorite_or_liked.is_some(), R::IsFavoriteOrLiked);
    flag(query.is_favorite.is_some(), R::IsFavorite);
    flag(query.is_resumable.is_some(), R::IsResumable);
    flag(query.is_played.is_some(), R::IsPlayed);
    flag(query.is_in_box_set.is_some(), R::IsInBoxSet);
    flag(query.is_3d.is_some(), R::Is3d);
    flag(query.has_imdb_id.is_some(), R::HasImdbId);
    flag(query.has_tmdb_id.is_some(), R::HasTmdbId);
    flag(query.has_tvdb_id.is_some(), R::HasTvdbId);
    flag(query.is_year_mismatched.is_some(), R::IsYearMismatched);
    flag(query.has_official_rating.is_some(), R::HasOfficialRating);
    flag(query.is_place_holder.is_some(), R::IsPlaceHolder);
    flag(query.has_special_feature.is_some(), R::HasSpecialFeature);
    flag(query.has_subtitles.is_some(), R::HasSubtitles);
    flag(query.has_trailer.is_some(), R::HasTrailer);
    flag(query.has_theme_song.is_some(), R::HasThemeSong);
    flag(query.has_theme_video.is_some(), R::HasThemeVideo);
    flag(!query.video_types.is_empty(), R::VideoTypes);
    flag(!query.image_types.is_empty(), R::ImageTypes);
    flag(!query.studio_ids.is_empty(), R::StudioIds);
    flag(!query.genre_ids.is_empty(), R::GenreIds);
    flag(query.min_players.is_some(), R::MinPlayers);
    flag(query.max_players.is_some(), R::MaxPlayers);
    flag(!query.official_ratings.is_empty(), R::OfficialRatings);
    flag(query.is_missing.is_some(), R::IsMissing);
    flag(query.is_unaired.is_some(), R::IsUnaired);
    flag(query.is_virtual_unaired.is_some(), R::IsVirtualUnaired);
    flag(collapse_box_sets(folder, query, user), R::CollapseBoxSets);
    flag(query.adjacent_to.is_some(), R::AdjacentTo);
    flag(query.name_contains.is_some(), R::NameContains);
    flag(query.name_less_than.is_some(), R::NameLessThan);
    flag(query.name_starts_with.is_some(), R::NameStartsWith);
    flag(query.name_starts_with_or_greater.is_some(), R::NameStartsWithOrGreater);
    flag(!query.air_days.is_empty(), R::AirDays);
    flag(!query.series_statuses.is_empty(), R::SeriesStatuses);
    flag(query.aired_during_season.is_some(), R::AiredDuringSeason);
    flag(
        query.album_artist_starts_with_or_greater.is_some(),
        R::AlbumArtistStartsWithOrGreater,
    );
    flag(!query.album_names.is_empty(), R::AlbumNames);
    flag(!query.artist_names.is_empty(), R::ArtistNames);

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediatree_model::{
        EntityKind, FolderData, ImageType, ItemId, LinkedChild, SortOrder,
    };

    fn folder() -> Entity {
        Entity::at_path("/lib/f", "f", EntityKind::Folder(FolderData::regular()))
    }

    fn movie_library() -> Entity {
        Entity::at_path(
            "/lib",
            "Movies",
            EntityKind::Folder(FolderData::collection(Some(CollectionType::Movies))),
        )
    }

    #[test]
    fn indexable_query_needs_no_post_filter() {
        let query = ItemQuery::builder()
            .recursive(true)
            .genre("Drama")
            .years([1999])
            .sort_by(SortBy::SortName, SortOrder::Ascending)
            .sort_by(SortBy::PremiereDate, SortOrder::Descending)
            .build()
            .unwrap();
        assert!(requires_post_filtering(&folder(), &query, None).is_empty());
    }

    #[test]
    fn each_flag_is_reported() {
        use PostFilterReason as R;

        fn with(edit: fn(&mut ItemQuery)) -> ItemQuery {
            let mut query = ItemQuery::default();
            edit(&mut query);
            query
        }
        let cases: Vec<(ItemQuery, PostFilterReason)> = vec![
            (with(|q| q.is_favorite = Some(true)), R::IsFavorite),
            (with(|q| q.is_played = Some(false)), R::IsPlayed),
            (with(|q| q.item_ids = vec![ItemId::new()]), R::ItemIds),
            (with(|q| q.person_ids = vec![ItemId::new()]), R::PersonIds),
            (with(|q| q.image_types = vec![ImageType::Logo]), R::ImageTypes),
            (with(|q| q.adjacent_to = Some(ItemId::new())), R::AdjacentTo),
            (
                with(|q| q.name_starts_with_or_greater = Some("m".into())),
                R::NameStartsWithOrGreater,
            ),
            (with(|q| q.min_players = Some(2)), R::MinPlayers),
        ];
        for (query, expected) in cases {
            assert_eq!(requires_post_filtering(&folder(), &query, None), vec![expected]);
        }
    }

    #[test]
    fn derived_sort_keys_force_post_filtering() {
        let query = ItemQuery::builder()
            .sort_by(SortBy::SortName, SortOrder::Ascending)
            .sort_by(SortBy::DateLastContentAdded, SortOrder::Descending)
            .build()
            .unwrap();
        assert_eq!(
            requires_post_filtering(&folder(), &query, None),
            vec![PostFilterReason::DerivedSort(SortBy::DateLastContentAdded)]
        );
    }

    #[test]
    fn linked_children_matter_outside_libraries_only() {
        let mut plain = folder();
        if let Some(data) = plain.folder_data_mut() {
            data.linked_children.push(LinkedChild::manual(ItemId::new()));
        }
        assert_eq!(
            requires_post_filtering(&plain, &ItemQuery::default(), None),
            vec![PostFilterReason::LinkedChildren]
        );

        let mut library = movie_library();
        if let Some(data) = library.folder_data_mut() {
            data.linked_children.push(LinkedChild::shortcut("/elsewhere/x.mkv"));
        }
        assert!(requires_post_filtering(&library, &ItemQuery::default(), None).is_empty());
    }

    #[test]
    fn box_set_grouping_follows_user_preference() {
        let mut user = User::new("viewer");
        let recursive = ItemQuery {
            recursive: true,
            ..Default::default()
        };
        assert!(!collapse_box_sets(&movie_library(), &recursive, Some(&user)));

        user.configuration.group_movies_into_box_sets = true;
        assert!(collapse_box_sets(&movie_library(), &recursive, Some(&user)));
        assert!(!collapse_box_sets(&folder(), &recursive, Some(&user)));

        let explicit_off = ItemQuery { collapse_box_set_items: Some(false), ..recursive.clone() };
        assert!(!collapse_box_sets(&movie_library(), &explicit_off, Some(&user)));

        let with_ids = ItemQuery { item_ids: vec![ItemId::new()], ..recursive };
        assert!(!collapse_box_sets(&movie_library(), &with_ids, Some(&user)));
    }
}
