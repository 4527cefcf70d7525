//! Core data model definitions shared across mediatree crates.
#![allow(missing_docs)]

pub use ::chrono;

#[macro_use]
mod macros;

pub mod entity;
pub mod error;
pub mod filter_types;
pub mod ids;
pub mod kind;
pub mod linked;
pub mod sort_name;
pub mod user;

// Intentionally curated re-exports for downstream consumers.
pub use entity::{
    AlbumData, AudioData, Entity, EntityKind, EpisodeData, Extras, FolderData,
    FolderVariant, GameData, LocationType, PersonRef, SeasonData, SeriesData,
    VideoData,
};
pub use error::{ModelError, Result as ModelResult};
pub use filter_types::{
    ImageType, ItemFilter, MediaType, PersonType, SeriesStatus, SortBy,
    SortOrder, VideoType,
};
pub use ids::{ItemId, UserId};
pub use kind::{CollectionType, ItemKind};
pub use linked::{LinkedChild, LinkedChildKind};
pub use user::{
    User, UserConfiguration, UserItemData, UserItemDataDto, UserPolicy,
};
