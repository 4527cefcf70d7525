//! Maps raw directory entries to typed entity stubs.

use mediatree_model::{
    AlbumData, AudioData, CollectionType, Entity, EntityKind, EpisodeData, FolderData,
    ItemId, SeasonData, SeriesData, VideoData,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;

use super::fs::FsEntry;

pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "avi", "mov", "wmv", "mpg", "mpeg", "ts", "m2ts", "webm",
    "iso",
];
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "wma"];

/// Where the entries being resolved live.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub parent: Entity,
    /// Content type of the library the parent belongs to.
    pub collection_type: Option<CollectionType>,
    /// Nearest series ancestor, for episodes and seasons.
    pub series: Option<(ItemId, String)>,
}

impl ResolveContext {
    pub fn new(parent: Entity, collection_type: Option<CollectionType>) -> Self {
        let series = match &parent.kind {
            EntityKind::Series(_) => Some((parent.id, parent.name.clone())),
            EntityKind::Season(season) => season
                .series_id
                .map(|id| (id, season.series_name.clone().unwrap_or_default())),
            _ => None,
        };
        Self {
            parent,
            collection_type,
            series,
        }
    }

    fn season_number(&self) -> Option<i32> {
        match self.parent.kind {
            EntityKind::Season(_) => self.parent.index_number,
            _ => None,
        }
    }
}

/// Outcome for one entry the resolver recognized.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Entity),
    /// The entry looked like media but could not be turned into an entity.
    Failed { path: PathBuf, reason: String },
}

/// Pluggable type resolution. Unrecognized entries produce nothing.
pub trait ItemResolver: Send + Sync + std::fmt::Debug {
    fn resolve(&self, context: &ResolveContext, entries: &[FsEntry]) -> Vec<Resolution>;
}

/// Season folder patterns
static SEASON_FOLDER: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^season\s*(\d+)$",
        r"(?i)^s(\d{1,2})$",
        r"(?i)^series\s*(\d+)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static season pattern"))
    .collect()
});

static SPECIALS_FOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^specials?$").expect("static specials pattern"));

/// Episode naming patterns in order of preference
static EPISODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[Ss](\d+)[ ._-]*[Ee](\d+)",
        r"(?:^|\D)(\d{1,2})[xX](\d{2,3})(?:\D|$)",
        r"(?i)season\s*(\d+)\s*episode\s*(\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static episode pattern"))
    .collect()
});

static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)[\s._]*[\(\[]((?:19|20)\d{2})[\)\]]\s*$").expect("static year pattern")
});

/// Season number of a season folder name; specials are season 0.
pub fn parse_season_folder(name: &str) -> Option<i32> {
    let name = name.trim();
    if SPECIALS_FOLDER.is_match(name) {
        return Some(0);
    }
    SEASON_FOLDER
        .iter()
        .find_map(|pattern| pattern.captures(name))
        .and_then(|captures| captures[1].parse().ok())
}

/// `(season, episode)` from a file stem.
pub fn parse_episode_numbers(stem: &str) -> Option<(i32, i32)> {
    EPISODE_PATTERNS.iter().find_map(|pattern| {
        let captures = pattern.captures(stem)?;
        Some((captures[1].parse().ok()?, captures[2].parse().ok()?))
    })
}

/// Splits `"Title (1999)"` into title and year.
fn split_title_year(stem: &str) -> (String, Option<i32>) {
    match TRAILING_YEAR.captures(stem) {
        Some(captures) if !captures[1].trim().is_empty() => (
            captures[1].trim().to_string(),
            captures[2].parse().ok(),
        ),
        _ => (stem.trim().to_string(), None),
    }
}

/// Resolver keyed on directory layout and file extensions.
#[derive(Debug, Clone)]
pub struct ExtensionResolver {
    video_extensions: HashSet<String>,
    audio_extensions: HashSet<String>,
}

impl Default for ExtensionResolver {
    fn default() -> Self {
        Self::new(DEFAULT_VIDEO_EXTENSIONS, DEFAULT_AUDIO_EXTENSIONS)
    }
}

fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> HashSet<String> {
    extensions
        .iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

impl ExtensionResolver {
    pub fn new<S: AsRef<str>>(video: &[S], audio: &[S]) -> Self {
        Self {
            video_extensions: normalize_extensions(video),
            audio_extensions: normalize_extensions(audio),
        }
    }

    fn resolve_dir(&self, context: &ResolveContext, entry: &FsEntry) -> Entity {
        let parent = &context.parent;
        let kind = match context.collection_type {
            Some(CollectionType::TvShows) => {
                match (&parent.kind, parse_season_folder(&entry.name)) {
                    (EntityKind::Series(_), Some(_)) => EntityKind::Season(SeasonData {
                        series_id: context.series.as_ref().map(|(id, _)| *id),
                        series_name: context.series.as_ref().map(|(_, name)| name.clone()),
                    }),
                    _ if parent.is_collection_folder() => {
                        EntityKind::Series(SeriesData::default())
                    }
                    _ => EntityKind::Folder(FolderData::regular()),
                }
            }
            Some(CollectionType::Music) if !parent.is_collection_folder() => {
                EntityKind::MusicAlbum(AlbumData {
                    album_artists: vec![parent.name.clone()],
                    ..AlbumData::default()
                })
            }
            _ => EntityKind::Folder(FolderData::regular()),
        };

        let mut entity = Entity::at_path(entry.path.clone(), entry.name.clone(), kind)
            .with_parent(parent.id);
        if matches!(entity.kind, EntityKind::Season(_)) {
            entity.index_number = parse_season_folder(&entry.name);
        }
        entity
    }

    fn resolve_video(&self, context: &ResolveContext, entry: &FsEntry, stem: &str) -> Entity {
        let parent = &context.parent;
        let in_show = context.series.is_some();
        let numbers = parse_episode_numbers(stem);
        let is_tv = context.collection_type == Some(CollectionType::TvShows);

        if is_tv && (in_show || numbers.is_some()) {
            let (season, episode) = match numbers {
                Some((season, episode)) => (Some(season), Some(episode)),
                None => (context.season_number(), None),
            };
            let episode_data = EpisodeData {
                series_id: context.series.as_ref().map(|(id, _)| *id),
                series_name: context.series.as_ref().map(|(_, name)| name.clone()),
                season_id: matches!(parent.kind, EntityKind::Season(_)).then_some(parent.id),
                ..EpisodeData::default()
            };
            let mut entity = Entity::at_path(
                entry.path.clone(),
                stem.to_string(),
                EntityKind::Episode(episode_data),
            )
            .with_parent(parent.id);
            entity.parent_index_number = season.or(context.season_number());
            entity.index_number = episode;
            return entity;
        }

        let (name, year) = split_title_year(stem);
        let kind = match context.collection_type {
            Some(CollectionType::Movies) | Some(CollectionType::BoxSets) => {
                EntityKind::Movie(VideoData::default())
            }
            _ => EntityKind::Video(VideoData::default()),
        };
        let mut entity = Entity::at_path(entry.path.clone(), name, kind).with_parent(parent.id);
        entity.production_year = year;
        entity
    }

    fn resolve_audio(&self, context: &ResolveContext, entry: &FsEntry, stem: &str) -> Entity {
        let parent = &context.parent;
        let data = match &parent.kind {
            EntityKind::MusicAlbum(album) => AudioData {
                album: Some(parent.name.clone()),
                album_artists: album.album_artists.clone(),
                artists: album.album_artists.clone(),
            },
            _ => AudioData::default(),
        };
        Entity::at_path(entry.path.clone(), stem.to_string(), EntityKind::Audio(data))
            .with_parent(parent.id)
    }

    fn resolve_entry(&self, context: &ResolveContext, entry: &FsEntry) -> Option<Resolution> {
        if entry.is_dir {
            return Some(Resolution::Resolved(self.resolve_dir(context, entry)));
        }

        let extension = entry.extension()?;
        let is_video = self.video_extensions.contains(&extension);
        let is_audio = self.audio_extensions.contains(&extension);
        if !is_video && !is_audio {
            return None;
        }

        let stem = entry
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().trim().to_string())
            .unwrap_or_default();
        if stem.is_empty() || stem.starts_with('.') {
            return Some(Resolution::Failed {
                path: entry.path.clone(),
                reason: "file has no usable name".into(),
            });
        }

        let mut entity = if is_video {
            self.resolve_video(context, entry, &stem)
        } else {
            self.resolve_audio(context, entry, &stem)
        };
        if let Some(modified) = entry.modified {
            entity.date_modified = modified;
        }
        Some(Resolution::Resolved(entity))
    }
}

impl ItemResolver for ExtensionResolver {
    fn resolve(&self, context: &ResolveContext, entries: &[FsEntry]) -> Vec<Resolution> {
        entries
            .iter()
            .filter_map(|entry| self.resolve_entry(context, entry))
            .collect()
    }
}
