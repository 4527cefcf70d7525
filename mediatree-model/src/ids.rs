use crate::error::ModelError;
use crate::kind::ItemKind;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of an entity in the media tree.
///
/// Ids of discovered items are derived from kind and path, so reconciling
/// the same file twice always lands on the same id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemId(pub Uuid);

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemId {
    pub fn new() -> Self {
        ItemId(Uuid::new_v4())
    }

    /// Deterministic id for an item discovered at `path`.
    pub fn from_path(kind: ItemKind, path: &Path) -> Self {
        let normalized = normalize_path(path);
        let seed = format!("{}:{}", kind.as_str(), normalized);
        ItemId(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    /// Deterministic id for an item that has no backing path (roots,
    /// genres, studios, people).
    pub fn from_name(kind: ItemKind, name: &str) -> Self {
        let seed = format!("{}#{}", kind.as_str(), name.trim().to_lowercase());
        ItemId(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }

    /// Hyphen-less lowercase form, as used in legacy block lists.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }

    /// Whether `raw` names this id in either simple or hyphenated form.
    pub fn matches_str(&self, raw: &str) -> bool {
        Uuid::parse_str(raw.trim()).is_ok_and(|parsed| parsed == self.0)
    }
}

impl AsRef<Uuid> for ItemId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(ItemId)
            .map_err(|_| ModelError::InvalidId(s.to_string()))
    }
}

/// Identifier of a viewing user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserId(pub Uuid);

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl UserId {
    pub fn new() -> Self {
        UserId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(UserId)
            .map_err(|_| ModelError::InvalidId(s.to_string()))
    }
}

fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        raw.into_owned()
    } else {
        trimmed.to_string()
    }
}
