//! Per-user views of the tree: which entities a user may see, and the
//! playback state layered over each entity for that user.

pub mod user_data;
pub mod visibility;

pub use user_data::{
    InMemoryUserDataStore, PlayAggregate, UserDataOverlay, UserDataStore,
};
pub use visibility::{excluded_tags, is_visible, visible_descendants};
