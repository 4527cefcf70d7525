//! Enumerations carried by query specifications.

named_enum! {
    "sort key",
    pub enum SortBy {
        SortName => "SortName",
        Name => "Name",
        Album => "Album",
        AlbumArtist => "AlbumArtist",
        Artist => "Artist",
        AiredEpisodeOrder => "AiredEpisodeOrder",
        Budget => "Budget",
        CommunityRating => "CommunityRating",
        CriticRating => "CriticRating",
        DateCreated => "DateCreated",
        DateLastContentAdded => "DateLastContentAdded",
        DatePlayed => "DatePlayed",
        GameSystem => "GameSystem",
        IsFavoriteOrLiked => "IsFavoriteOrLiked",
        IsFolder => "IsFolder",
        IsPlayed => "IsPlayed",
        IsUnplayed => "IsUnplayed",
        Metascore => "Metascore",
        OfficialRating => "OfficialRating",
        PlayCount => "PlayCount",
        Players => "Players",
        PremiereDate => "PremiereDate",
        ProductionYear => "ProductionYear",
        Revenue => "Revenue",
        Runtime => "Runtime",
        SeriesSortName => "SeriesSortName",
        StartDate => "StartDate",
        Studio => "Studio",
        VideoBitRate => "VideoBitRate",
    }
}

named_enum! {
    "sort order",
    pub enum SortOrder {
        Ascending => "Ascending",
        Descending => "Descending",
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Ascending
    }
}

named_enum! {
    /// Shorthand filters accepted by the request surface.
    "item filter",
    pub enum ItemFilter {
        IsFolder => "IsFolder",
        IsNotFolder => "IsNotFolder",
        IsUnplayed => "IsUnplayed",
        IsPlayed => "IsPlayed",
        IsFavorite => "IsFavorite",
        IsResumable => "IsResumable",
        Likes => "Likes",
        Dislikes => "Dislikes",
        IsFavoriteOrLikes => "IsFavoriteOrLikes",
        IsRecentlyAdded => "IsRecentlyAdded",
    }
}

named_enum! {
    "image type",
    pub enum ImageType {
        Primary => "Primary",
        Art => "Art",
        Backdrop => "Backdrop",
        Banner => "Banner",
        Logo => "Logo",
        Thumb => "Thumb",
        Disc => "Disc",
        Box => "Box",
        Screenshot => "Screenshot",
        Menu => "Menu",
        Chapter => "Chapter",
    }
}

named_enum! {
    "video type",
    pub enum VideoType {
        VideoFile => "VideoFile",
        Iso => "Iso",
        Dvd => "Dvd",
        BluRay => "BluRay",
        HdDvd => "HdDvd",
    }
}

impl Default for VideoType {
    fn default() -> Self {
        VideoType::VideoFile
    }
}

named_enum! {
    "media type",
    pub enum MediaType {
        Video => "Video",
        Audio => "Audio",
        Game => "Game",
    }
}

named_enum! {
    "series status",
    pub enum SeriesStatus {
        Continuing => "Continuing",
        Ended => "Ended",
    }
}

named_enum! {
    "person type",
    pub enum PersonType {
        Actor => "Actor",
        Director => "Director",
        Writer => "Writer",
        Producer => "Producer",
        GuestStar => "GuestStar",
        Composer => "Composer",
    }
}
