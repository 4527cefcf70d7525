use super::types::*;
use chrono::{DateTime, Utc};
use mediatree_model::{
    ItemId, ItemKind, LocationType, MediaType, SortBy, SortOrder,
};

/// Fluent API for building item queries
#[derive(Debug, Clone, Default)]
pub struct ItemQueryBuilder {
    query: ItemQuery,
    max_limit: Option<usize>,
}

impl ItemQueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Search the whole subtree instead of direct children
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.query.recursive = recursive;
        self
    }

    /// Restrict to explicit items
    pub fn item_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.query.item_ids = ids.into_iter().collect();
        self
    }

    pub fn include_kinds(
        mut self,
        kinds: impl IntoIterator<Item = ItemKind>,
    ) -> Self {
        self.query.include_item_kinds = kinds.into_iter().collect();
        self
    }

    pub fn exclude_kinds(
        mut self,
        kinds: impl IntoIterator<Item = ItemKind>,
    ) -> Self {
        self.query.exclude_item_kinds = kinds.into_iter().collect();
        self
    }

    pub fn media_types(
        mut self,
        types: impl IntoIterator<Item = MediaType>,
    ) -> Self {
        self.query.media_types = types.into_iter().collect();
        self
    }

    pub fn is_folder(mut self, value: bool) -> Self {
        self.query.is_folder = Some(value);
        self
    }

    pub fn location_types(
        mut self,
        types: impl IntoIterator<Item = LocationType>,
    ) -> Self {
        self.query.location_types = types.into_iter().collect();
        self
    }

    pub fn exclude_location_types(
        mut self,
        types: impl IntoIterator<Item = LocationType>,
    ) -> Self {
        self.query.exclude_location_types = types.into_iter().collect();
        self
    }

    // === Per-user state ===

    pub fn is_played(mut self, value: bool) -> Self {
        self.query.is_played = Some(value);
        self
    }

    pub fn is_favorite(mut self, value: bool) -> Self {
        self.query.is_favorite = Some(value);
        self
    }

    pub fn is_liked(mut self, value: bool) -> Self {
        self.query.is_liked = Some(value);
        self
    }

    pub fn is_favorite_or_liked(mut self, value: bool) -> Self {
        self.query.is_favorite_or_liked = Some(value);
        self
    }

    pub fn is_resumable(mut self, value: bool) -> Self {
        self.query.is_resumable = Some(value);
        self
    }

    pub fn is_in_box_set(mut self, value: bool) -> Self {
        self.query.is_in_box_set = Some(value);
        self
    }

    // === Metadata ===

    /// Filter by genre name
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.query.genres.push(genre.into());
        self
    }

    pub fn genre_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.query.genre_ids = ids.into_iter().collect();
        self
    }

    pub fn studio(mut self, studio: impl Into<String>) -> Self {
        self.query.studios.push(studio.into());
        self
    }

    pub fn studio_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.query.studio_ids = ids.into_iter().collect();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.query.tags.push(tag.into());
        self
    }

    pub fn person(mut self, name: impl Into<String>) -> Self {
        self.query.person = Some(name.into());
        self
    }

    pub fn person_ids(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.query.person_ids = ids.into_iter().collect();
        self
    }

    pub fn years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.query.years = years.into_iter().collect();
        self
    }

    pub fn premiered_between(
        mut self,
        min: Option<DateTime<Utc>>,
        max: Option<DateTime<Utc>>,
    ) -> Self {
        self.query.min_premiere_date = min;
        self.query.max_premiere_date = max;
        self
    }

    pub fn min_community_rating(mut self, rating: f32) -> Self {
        self.query.min_community_rating = Some(rating);
        self
    }

    pub fn has_imdb_id(mut self, value: bool) -> Self {
        self.query.has_imdb_id = Some(value);
        self
    }

    pub fn has_tmdb_id(mut self, value: bool) -> Self {
        self.query.has_tmdb_id = Some(value);
        self
    }

    pub fn has_tvdb_id(mut self, value: bool) -> Self {
        self.query.has_tvdb_id = Some(value);
        self
    }

    // === Names ===

    pub fn name_starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.query.name_starts_with = Some(prefix.into());
        self
    }

    pub fn name_starts_with_or_greater(
        mut self,
        value: impl Into<String>,
    ) -> Self {
        self.query.name_starts_with_or_greater = Some(value.into());
        self
    }

    pub fn name_less_than(mut self, value: impl Into<String>) -> Self {
        self.query.name_less_than = Some(value.into());
        self
    }

    pub fn name_contains(mut self, value: impl Into<String>) -> Self {
        self.query.name_contains = Some(value.into());
        self
    }

    // === Shape ===

    pub fn adjacent_to(mut self, id: ItemId) -> Self {
        self.query.adjacent_to = Some(id);
        self
    }

    pub fn collapse_box_sets(mut self, value: bool) -> Self {
        self.query.collapse_box_set_items = Some(value);
        self
    }

    /// Append a sort key; keys apply in the order they are added
    pub fn sort_by(mut self, by: SortBy, order: SortOrder) -> Self {
        self.query.sort.push(SortSpec::new(by, order));
        self
    }

    pub fn start_index(mut self, start: usize) -> Self {
        self.query.start_index = Some(start);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Reject limits above `max` when building
    pub fn max_limit(mut self, max: usize) -> Self {
        self.max_limit = Some(max);
        self
    }

    /// Validate and freeze the query
    pub fn build(self) -> Result<ItemQuery, QueryError> {
        self.query.validate(self.max_limit)?;
        Ok(self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_keep_insertion_order() {
        let query = ItemQuery::builder()
            .sort_by(SortBy::ProductionYear, SortOrder::Descending)
            .sort_by(SortBy::SortName, SortOrder::Ascending)
            .build()
            .unwrap();
        assert_eq!(
            query.sort,
            vec![
                SortSpec::new(SortBy::ProductionYear, SortOrder::Descending),
                SortSpec::ascending(SortBy::SortName),
            ]
        );
    }

    #[test]
    fn build_enforces_max_limit() {
        let err = ItemQuery::builder()
            .limit(10_000)
            .max_limit(500)
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::LimitTooLarge { limit: 10_000, max: 500 });
    }
}
