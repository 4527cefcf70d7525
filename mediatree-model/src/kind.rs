named_enum! {
    /// Flat discriminant of an entity, used by ids, queries and resolvers.
    "item kind",
    pub enum ItemKind {
        Folder => "Folder",
        /// Top-level library folder.
        CollectionFolder => "CollectionFolder",
        /// Per-user root listing the visible libraries.
        UserRootFolder => "UserRootFolder",
        /// Physical root that owns every library folder.
        AggregateFolder => "AggregateFolder",
        Series => "Series",
        Season => "Season",
        BoxSet => "BoxSet",
        MusicAlbum => "MusicAlbum",
        Movie => "Movie",
        Episode => "Episode",
        Video => "Video",
        Trailer => "Trailer",
        Audio => "Audio",
        Game => "Game",
        Person => "Person",
        Genre => "Genre",
        Studio => "Studio",
    }
}

impl ItemKind {
    pub fn is_folder(&self) -> bool {
        matches!(
            self,
            ItemKind::Folder
                | ItemKind::CollectionFolder
                | ItemKind::UserRootFolder
                | ItemKind::AggregateFolder
                | ItemKind::Series
                | ItemKind::Season
                | ItemKind::BoxSet
                | ItemKind::MusicAlbum
        )
    }

    /// Playable leaf kinds that count toward folder play-state aggregates.
    pub fn is_playable(&self) -> bool {
        matches!(
            self,
            ItemKind::Movie
                | ItemKind::Episode
                | ItemKind::Video
                | ItemKind::Trailer
                | ItemKind::Audio
                | ItemKind::Game
        )
    }
}

named_enum! {
    /// Declared content category of a library folder.
    "collection type",
    pub enum CollectionType {
        Movies => "movies",
        TvShows => "tvshows",
        Music => "music",
        BoxSets => "boxsets",
        HomeVideos => "homevideos",
        Games => "games",
        Mixed => "mixed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(ItemKind::from_str("movie").unwrap(), ItemKind::Movie);
        assert_eq!(
            CollectionType::from_str("TvShows").unwrap(),
            CollectionType::TvShows
        );
        assert!(ItemKind::from_str("Podcast").is_err());
    }
}
