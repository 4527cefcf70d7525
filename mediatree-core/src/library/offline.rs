use std::path::{Path, PathBuf};

use super::fs::FileSystem;

/// Tells "unreachable" apart from "deleted" for stored paths that are no
/// longer listed.
#[derive(Debug, Clone, Default)]
pub struct OfflineDetector {
    library_locations: Vec<PathBuf>,
}

impl OfflineDetector {
    pub fn new(library_locations: Vec<PathBuf>) -> Self {
        Self { library_locations }
    }

    pub fn add_location(&mut self, location: impl Into<PathBuf>) {
        let location = location.into();
        if !self.library_locations.contains(&location) {
            self.library_locations.push(location);
        }
    }

    /// A missing path is offline when none of its ancestors exist either
    /// and it lies under a library location: the volume is gone, not the
    /// file.
    pub async fn is_offline(&self, fs: &dyn FileSystem, path: &Path) -> bool {
        let mut current = Some(path);
        while let Some(candidate) = current {
            if candidate.parent().is_none() {
                break;
            }
            if fs.path_exists(candidate).await {
                return false;
            }
            current = candidate.parent();
        }
        self.library_locations
            .iter()
            .any(|location| path.starts_with(location))
    }
}
