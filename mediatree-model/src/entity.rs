//! The entity shape shared by every node in the media tree.
//!
//! Kind-specific state lives in [`EntityKind`]; behaviour that differs per
//! kind (sort names, user-data keys, folder-ness) dispatches on it.

use crate::filter_types::{
    ImageType, MediaType, PersonType, SeriesStatus, VideoType,
};
use crate::ids::ItemId;
use crate::kind::{CollectionType, ItemKind};
use crate::linked::LinkedChild;
use crate::sort_name::{derive_sort_name, episode_sort_name};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

static YEAR_IN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\(\[\s\.](19\d{2}|20\d{2})[\)\]\s\.]?")
        .expect("static regex is valid")
});

/// Where an entity's backing data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocationType {
    #[default]
    FileSystem,
    /// Known to exist but not backed by a file (missing episodes, manual
    /// collections).
    Virtual,
    /// Backed by a remote URL.
    Remote,
    /// On-disk entity whose path is currently unreachable.
    Offline,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::FileSystem => "FileSystem",
            LocationType::Virtual => "Virtual",
            LocationType::Remote => "Remote",
            LocationType::Offline => "Offline",
        }
    }

    /// Remote and virtual entities cannot be checked against the file system.
    pub fn is_unvalidatable(&self) -> bool {
        matches!(self, LocationType::Virtual | LocationType::Remote)
    }
}

impl std::str::FromStr for LocationType {
    type Err = crate::error::ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LocationType::FileSystem,
            LocationType::Virtual,
            LocationType::Remote,
            LocationType::Offline,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| crate::error::ModelError::UnknownVariant {
            kind: "location type",
            value: s.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FolderVariant {
    #[default]
    Regular,
    /// The single root owning every library folder.
    PhysicalRoot,
    /// A user's root; its children are the libraries visible to that user.
    UserRoot,
    /// A top-level library folder.
    Collection,
    /// A folder with no on-disk backing that aggregates other items.
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FolderData {
    pub variant: FolderVariant,
    pub collection_type: Option<CollectionType>,
    pub linked_children: Vec<LinkedChild>,
}

impl FolderData {
    pub fn regular() -> Self {
        Self::default()
    }

    pub fn collection(collection_type: Option<CollectionType>) -> Self {
        Self {
            variant: FolderVariant::Collection,
            collection_type,
            linked_children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesData {
    pub status: Option<SeriesStatus>,
    pub air_days: Vec<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeasonData {
    pub series_id: Option<ItemId>,
    pub series_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoData {
    pub video_type: VideoType,
    pub is_3d: bool,
    pub is_hd: bool,
    pub has_subtitles: bool,
    pub bitrate: Option<u32>,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpisodeData {
    pub video: VideoData,
    pub series_id: Option<ItemId>,
    pub series_name: Option<String>,
    pub season_id: Option<ItemId>,
    pub airs_before_season: Option<i32>,
    pub airs_after_season: Option<i32>,
    pub airs_before_episode: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AudioData {
    pub album: Option<String>,
    pub album_artists: Vec<String>,
    pub artists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlbumData {
    pub folder: FolderData,
    pub album_artists: Vec<String>,
    pub artists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameData {
    pub game_system: Option<String>,
    pub players: Option<u32>,
}

/// Kind-specific state. The variant tag doubles as the entity's type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "data"))]
pub enum EntityKind {
    Folder(FolderData),
    Series(SeriesData),
    Season(SeasonData),
    BoxSet(FolderData),
    MusicAlbum(AlbumData),
    Movie(VideoData),
    Episode(EpisodeData),
    Video(VideoData),
    Trailer(VideoData),
    Audio(AudioData),
    Game(GameData),
    Person,
    Genre,
    Studio,
}

impl EntityKind {
    pub fn item_kind(&self) -> ItemKind {
        match self {
            EntityKind::Folder(folder) => match folder.variant {
                FolderVariant::Regular | FolderVariant::Virtual => {
                    ItemKind::Folder
                }
                FolderVariant::PhysicalRoot => ItemKind::AggregateFolder,
                FolderVariant::UserRoot => ItemKind::UserRootFolder,
                FolderVariant::Collection => ItemKind::CollectionFolder,
            },
            EntityKind::Series(_) => ItemKind::Series,
            EntityKind::Season(_) => ItemKind::Season,
            EntityKind::BoxSet(_) => ItemKind::BoxSet,
            EntityKind::MusicAlbum(_) => ItemKind::MusicAlbum,
            EntityKind::Movie(_) => ItemKind::Movie,
            EntityKind::Episode(_) => ItemKind::Episode,
            EntityKind::Video(_) => ItemKind::Video,
            EntityKind::Trailer(_) => ItemKind::Trailer,
            EntityKind::Audio(_) => ItemKind::Audio,
            EntityKind::Game(_) => ItemKind::Game,
            EntityKind::Person => ItemKind::Person,
            EntityKind::Genre => ItemKind::Genre,
            EntityKind::Studio => ItemKind::Studio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersonRef {
    pub name: String,
    pub person_type: Option<PersonType>,
    pub role: Option<String>,
}

/// Extras attached to an item (local trailers, theme media, bonus
/// features), referenced by id.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Extras {
    pub local_trailer_ids: Vec<ItemId>,
    pub remote_trailers: Vec<String>,
    pub theme_song_ids: Vec<ItemId>,
    pub theme_video_ids: Vec<ItemId>,
    pub special_feature_ids: Vec<ItemId>,
}

/// A node in the media tree.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    pub id: ItemId,
    pub parent_id: Option<ItemId>,
    pub name: String,
    pub forced_sort_name: Option<String>,
    pub path: Option<PathBuf>,
    pub location: LocationType,
    pub is_offline: bool,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub premiere_date: Option<DateTime<Utc>>,
    pub production_year: Option<i32>,
    pub community_rating: Option<f32>,
    pub critic_rating: Option<f32>,
    pub metascore: Option<f32>,
    pub official_rating: Option<String>,
    pub runtime_ticks: Option<i64>,
    pub budget: Option<f64>,
    pub revenue: Option<f64>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub tags: Vec<String>,
    pub people: Vec<PersonRef>,
    pub provider_ids: BTreeMap<String, String>,
    pub index_number: Option<i32>,
    pub parent_index_number: Option<i32>,
    pub images: Vec<ImageType>,
    pub extras: Extras,
    pub is_locked: bool,
    pub kind: EntityKind,
}

pub const PROVIDER_IMDB: &str = "Imdb";
pub const PROVIDER_TMDB: &str = "Tmdb";
pub const PROVIDER_TVDB: &str = "Tvdb";

impl Entity {
    /// Bare entity with timestamps set to `now`.
    pub fn new(id: ItemId, name: impl Into<String>, kind: EntityKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            parent_id: None,
            name: name.into(),
            forced_sort_name: None,
            path: None,
            location: LocationType::FileSystem,
            is_offline: false,
            date_created: now,
            date_modified: now,
            premiere_date: None,
            production_year: None,
            community_rating: None,
            critic_rating: None,
            metascore: None,
            official_rating: None,
            runtime_ticks: None,
            budget: None,
            revenue: None,
            overview: None,
            genres: Vec::new(),
            studios: Vec::new(),
            tags: Vec::new(),
            people: Vec::new(),
            provider_ids: BTreeMap::new(),
            index_number: None,
            parent_index_number: None,
            images: Vec::new(),
            extras: Extras::default(),
            is_locked: false,
            kind,
        }
    }

    /// Entity discovered at `path`, with its id derived from kind and path.
    pub fn at_path(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        kind: EntityKind,
    ) -> Self {
        let path = path.into();
        let id = ItemId::from_path(kind.item_kind(), &path);
        let mut entity = Self::new(id, name, kind);
        entity.path = Some(path);
        entity
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn item_kind(&self) -> ItemKind {
        self.kind.item_kind()
    }

    pub fn is_folder(&self) -> bool {
        self.item_kind().is_folder()
    }

    /// Effective location: an offline flag overrides the stored location.
    pub fn location_type(&self) -> LocationType {
        if self.is_offline {
            LocationType::Offline
        } else {
            self.location
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.location == LocationType::Virtual
    }

    pub fn folder_data(&self) -> Option<&FolderData> {
        match &self.kind {
            EntityKind::Folder(data) | EntityKind::BoxSet(data) => Some(data),
            EntityKind::MusicAlbum(album) => Some(&album.folder),
            _ => None,
        }
    }

    pub fn folder_data_mut(&mut self) -> Option<&mut FolderData> {
        match &mut self.kind {
            EntityKind::Folder(data) | EntityKind::BoxSet(data) => Some(data),
            EntityKind::MusicAlbum(album) => Some(&mut album.folder),
            _ => None,
        }
    }

    pub fn folder_variant(&self) -> Option<FolderVariant> {
        match &self.kind {
            EntityKind::Folder(data) => Some(data.variant),
            _ => None,
        }
    }

    pub fn is_collection_folder(&self) -> bool {
        self.folder_variant() == Some(FolderVariant::Collection)
    }

    pub fn is_root(&self) -> bool {
        matches!(
            self.folder_variant(),
            Some(FolderVariant::PhysicalRoot | FolderVariant::UserRoot)
        )
    }

    pub fn collection_type(&self) -> Option<CollectionType> {
        self.folder_data().and_then(|data| data.collection_type)
    }

    pub fn linked_children(&self) -> &[LinkedChild] {
        self.folder_data()
            .map(|data| data.linked_children.as_slice())
            .unwrap_or(&[])
    }

    /// Only library folders pick up shortcut files as linked children.
    pub fn supports_shortcut_children(&self) -> bool {
        self.is_collection_folder()
    }

    /// Containers whose metadata refresh covers their whole subtree in one
    /// call.
    pub fn is_metadata_container(&self) -> bool {
        matches!(self.kind, EntityKind::Series(_) | EntityKind::MusicAlbum(_))
    }

    pub fn media_type(&self) -> Option<MediaType> {
        match &self.kind {
            EntityKind::Movie(_)
            | EntityKind::Episode(_)
            | EntityKind::Video(_)
            | EntityKind::Trailer(_) => Some(MediaType::Video),
            EntityKind::Audio(_) => Some(MediaType::Audio),
            EntityKind::Game(_) => Some(MediaType::Game),
            _ => None,
        }
    }

    pub fn video_data(&self) -> Option<&VideoData> {
        match &self.kind {
            EntityKind::Movie(video)
            | EntityKind::Video(video)
            | EntityKind::Trailer(video) => Some(video),
            EntityKind::Episode(episode) => Some(&episode.video),
            _ => None,
        }
    }

    pub fn episode_data(&self) -> Option<&EpisodeData> {
        match &self.kind {
            EntityKind::Episode(episode) => Some(episode),
            _ => None,
        }
    }

    pub fn series_data(&self) -> Option<&SeriesData> {
        match &self.kind {
            EntityKind::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn game_data(&self) -> Option<&GameData> {
        match &self.kind {
            EntityKind::Game(game) => Some(game),
            _ => None,
        }
    }

    /// Album name for audio, or the album's own name for albums.
    pub fn album(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Audio(audio) => audio.album.as_deref(),
            EntityKind::MusicAlbum(_) => Some(self.name.as_str()),
            _ => None,
        }
    }

    pub fn album_artists(&self) -> &[String] {
        match &self.kind {
            EntityKind::Audio(audio) => &audio.album_artists,
            EntityKind::MusicAlbum(album) => &album.album_artists,
            _ => &[],
        }
    }

    pub fn artists(&self) -> &[String] {
        match &self.kind {
            EntityKind::Audio(audio) => &audio.artists,
            EntityKind::MusicAlbum(album) => &album.artists,
            _ => &[],
        }
    }

    pub fn series_name(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Episode(episode) => episode.series_name.as_deref(),
            EntityKind::Season(season) => season.series_name.as_deref(),
            EntityKind::Series(_) => Some(self.name.as_str()),
            _ => None,
        }
    }

    pub fn series_id(&self) -> Option<ItemId> {
        match &self.kind {
            EntityKind::Episode(episode) => episode.series_id,
            EntityKind::Season(season) => season.series_id,
            EntityKind::Series(_) => Some(self.id),
            _ => None,
        }
    }

    pub fn sort_name(&self) -> String {
        if let Some(forced) = &self.forced_sort_name
            && !forced.trim().is_empty()
        {
            return forced.trim().to_lowercase();
        }
        match &self.kind {
            EntityKind::Episode(_) => episode_sort_name(
                self.parent_index_number,
                self.index_number,
                &self.name,
            ),
            _ => derive_sort_name(&self.name),
        }
    }

    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids
            .get(provider)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Key under which per-user state for this entity is stored. Movies
    /// with provider ids share state across re-imports; episodes key off
    /// their series and numbering.
    pub fn user_data_key(&self) -> String {
        match &self.kind {
            EntityKind::Movie(_) | EntityKind::Trailer(_) => self
                .provider_id(PROVIDER_IMDB)
                .or_else(|| self.provider_id(PROVIDER_TMDB))
                .map(str::to_string)
                .unwrap_or_else(|| self.id.simple()),
            EntityKind::Episode(episode) => {
                match (episode.series_id, self.parent_index_number, self.index_number)
                {
                    (Some(series), Some(season), Some(number)) => format!(
                        "{}{:03}{:03}",
                        series.simple(),
                        season,
                        number
                    ),
                    _ => self.id.simple(),
                }
            }
            _ => self.id.simple(),
        }
    }

    /// Whether a freshly resolved stub describes the same logical item.
    pub fn is_valid_from_resolver(&self, resolved: &Entity) -> bool {
        self.id == resolved.id
            && self.item_kind() == resolved.item_kind()
            && self.path == resolved.path
    }

    pub fn is_unaired(&self, today: NaiveDate) -> bool {
        self.premiere_date
            .is_some_and(|premiere| premiere.date_naive() >= today)
    }

    /// Virtual episode that has already aired, i.e. a gap in the library.
    pub fn is_missing_episode(&self, today: NaiveDate) -> bool {
        matches!(self.kind, EntityKind::Episode(_))
            && self.is_virtual()
            && !self.is_unaired(today)
    }

    pub fn is_virtual_unaired(&self, today: NaiveDate) -> bool {
        self.is_virtual() && self.is_unaired(today)
    }

    /// Production year disagrees with a year embedded in the file name.
    pub fn is_year_mismatched(&self) -> bool {
        let (Some(year), Some(path)) = (self.production_year, &self.path)
        else {
            return false;
        };
        match year_from_path(path) {
            Some(parsed) => parsed != year,
            None => false,
        }
    }

    pub fn has_trailer(&self) -> bool {
        !self.extras.local_trailer_ids.is_empty()
            || !self.extras.remote_trailers.is_empty()
    }

    pub fn has_image(&self, image: ImageType) -> bool {
        self.images.contains(&image)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

fn year_from_path(path: &Path) -> Option<i32> {
    let name = path.file_stem()?.to_string_lossy();
    let padded = format!(" {name} ");
    YEAR_IN_NAME
        .captures_iter(&padded)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn episode(season: i32, number: i32) -> Entity {
        let mut entity = Entity::at_path(
            format!("/tv/Show/Season {season}/Show S{season:02}E{number:02}.mkv"),
            "Pilot",
            EntityKind::Episode(EpisodeData {
                series_id: Some(ItemId::from_name(ItemKind::Series, "show")),
                ..EpisodeData::default()
            }),
        );
        entity.parent_index_number = Some(season);
        entity.index_number = Some(number);
        entity
    }

    #[test]
    fn episode_sort_name_uses_numbering() {
        assert_eq!(episode(1, 3).sort_name(), "001 - 0003 - Pilot");
    }

    #[test]
    fn forced_sort_name_wins() {
        let mut movie = Entity::at_path(
            "/movies/a.mkv",
            "The Thing",
            EntityKind::Movie(VideoData::default()),
        );
        assert_eq!(movie.sort_name(), "thing");
        movie.forced_sort_name = Some("Zzz".into());
        assert_eq!(movie.sort_name(), "zzz");
    }

    #[test]
    fn episode_user_data_key_is_stable_across_reimports() {
        let a = episode(2, 5);
        let mut b = episode(2, 5);
        b.id = ItemId::new();
        assert_eq!(a.user_data_key(), b.user_data_key());
        assert!(a.user_data_key().ends_with("002005"));
    }

    #[test]
    fn movie_user_data_key_prefers_provider_ids() {
        let mut movie = Entity::at_path(
            "/movies/alien.mkv",
            "Alien",
            EntityKind::Movie(VideoData::default()),
        );
        assert_eq!(movie.user_data_key(), movie.id.simple());
        movie
            .provider_ids
            .insert(PROVIDER_TMDB.to_string(), "348".to_string());
        assert_eq!(movie.user_data_key(), "348");
    }

    #[test]
    fn missing_and_unaired_episodes() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut aired = episode(1, 1);
        aired.location = LocationType::Virtual;
        aired.premiere_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(aired.is_missing_episode(today));
        assert!(!aired.is_virtual_unaired(today));

        let mut upcoming = aired.clone();
        upcoming.premiere_date = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert!(!upcoming.is_missing_episode(today));
        assert!(upcoming.is_virtual_unaired(today));
    }

    #[test]
    fn year_mismatch_reads_year_from_file_name() {
        let mut movie = Entity::at_path(
            "/movies/Alien (1979).mkv",
            "Alien",
            EntityKind::Movie(VideoData::default()),
        );
        movie.production_year = Some(1979);
        assert!(!movie.is_year_mismatched());
        movie.production_year = Some(1986);
        assert!(movie.is_year_mismatched());
    }

    #[test]
    fn offline_flag_overrides_location() {
        let mut movie = Entity::at_path(
            "/movies/alien.mkv",
            "Alien",
            EntityKind::Movie(VideoData::default()),
        );
        assert_eq!(movie.location_type(), LocationType::FileSystem);
        movie.is_offline = true;
        assert_eq!(movie.location_type(), LocationType::Offline);
    }
}
