pub mod library;
pub mod reconciler;

use anyhow::{Context, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub use library::LibraryConfig;
pub use reconciler::ReconcilerConfig;

/// Source that produced the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Where entities are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the durable store. Without one the store lives in
    /// memory and every run starts from an empty tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Largest `limit` a query may ask for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_limit: Option<usize>,
}

/// Top-level configuration for the engine and the `mediatree` binary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaTreeConfig {
    pub store: StoreConfig,
    pub libraries: Vec<LibraryConfig>,
    pub reconciler: ReconcilerConfig,
    pub query: QueryConfig,
}

impl MediaTreeConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$MEDIATREE_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$MEDIATREE_CONFIG_JSON` (inline JSON),
    /// 3) `./mediatree.toml` or `./config/mediatree.toml`,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var("MEDIATREE_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("MEDIATREE_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse MEDIATREE_CONFIG_JSON")?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents)
                .with_context(|| format!("invalid config {}", path.display())),
            Some("toml") => toml::from_str(&contents)
                .map_err(|err| anyhow!("invalid config {}: {}", path.display(), err)),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        // Try TOML first, then JSON.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).map_err(|err| anyhow!("invalid config json: {err}"))
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &["mediatree.toml", "config/mediatree.toml"];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }

    /// Rejects configurations the engine cannot run with. Returns
    /// non-fatal warnings.
    pub fn validate(&self) -> anyhow::Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut names = HashSet::new();
        let mut paths = HashSet::new();

        for library in &self.libraries {
            if library.name.trim().is_empty() {
                bail!("library at {} has an empty name", library.path.display());
            }
            if library.path.as_os_str().is_empty() {
                bail!("library {} has an empty path", library.name);
            }
            if !names.insert(library.name.to_lowercase()) {
                bail!("duplicate library name {}", library.name);
            }
            if !paths.insert(library.path.clone()) {
                bail!("duplicate library path {}", library.path.display());
            }
            library
                .definition()
                .with_context(|| format!("library {}", library.name))?;
            if library.path.is_relative() {
                warnings.push(format!(
                    "library {} uses a relative path; ids change if the working directory does",
                    library.name
                ));
            }
        }

        self.reconciler.validate()?;

        if self.query.max_limit == Some(0) {
            bail!("query.max_limit must be greater than zero");
        }
        if self.libraries.is_empty() {
            warnings.push("no libraries configured".to_string());
        }
        if self.store.root.is_none() {
            warnings.push("store.root is unset; entities are kept in memory only".to_string());
        }
        Ok(warnings)
    }
}
