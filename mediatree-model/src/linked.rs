use crate::ids::ItemId;
use std::path::PathBuf;

/// How a linked child was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkedChildKind {
    /// Added explicitly, e.g. a movie placed in a box set.
    Manual,
    /// Discovered from a shortcut file inside a library folder.
    Shortcut,
}

/// Weak, non-owning reference from a folder to an entity elsewhere in the
/// tree. Either pointer may be set; the id wins when both resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkedChild {
    pub kind: LinkedChildKind,
    pub path: Option<PathBuf>,
    pub item_id: Option<ItemId>,
}

impl LinkedChild {
    pub fn manual(item_id: ItemId) -> Self {
        Self {
            kind: LinkedChildKind::Manual,
            path: None,
            item_id: Some(item_id),
        }
    }

    pub fn manual_path(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: LinkedChildKind::Manual,
            path: Some(path.into()),
            item_id: None,
        }
    }

    pub fn shortcut(target: impl Into<PathBuf>) -> Self {
        Self {
            kind: LinkedChildKind::Shortcut,
            path: Some(target.into()),
            item_id: None,
        }
    }

    pub fn is_shortcut(&self) -> bool {
        self.kind == LinkedChildKind::Shortcut
    }
}
