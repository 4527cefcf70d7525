use anyhow::anyhow;
use mediatree_core::library::LibraryDefinition;
use mediatree_model::CollectionType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// One configured library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LibraryConfig {
    pub name: String,
    pub path: PathBuf,
    /// Content type, e.g. `movies`, `tvshows`, `music`. Matched
    /// case-insensitively; unset means mixed content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_type: Option<String>,
}

impl LibraryConfig {
    pub fn definition(&self) -> anyhow::Result<LibraryDefinition> {
        let collection_type = self
            .collection_type
            .as_deref()
            .map(|raw| {
                CollectionType::from_str(raw.trim())
                    .map_err(|err| anyhow!("invalid collection_type: {err}"))
            })
            .transpose()?;
        Ok(LibraryDefinition::new(
            self.name.clone(),
            self.path.clone(),
            collection_type,
        ))
    }
}
