use async_trait::async_trait;
use mediatree_model::Entity;

use crate::error::Result;

/// Options passed through to the metadata collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshOptions {
    pub replace_all_metadata: bool,
    pub replace_all_images: bool,
}

/// Fetches and merges descriptive metadata. Lives outside the core; the
/// reconciler only decides when to call it.
#[async_trait]
pub trait MetadataRefresher: Send + Sync + std::fmt::Debug {
    async fn refresh(&self, item: &Entity, options: &RefreshOptions) -> Result<()>;

    /// Refreshes a container and its whole subtree in one call.
    async fn refresh_all(&self, container: &Entity, options: &RefreshOptions) -> Result<()> {
        self.refresh(container, options).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRefresher;

#[async_trait]
impl MetadataRefresher for NoopRefresher {
    async fn refresh(&self, _item: &Entity, _options: &RefreshOptions) -> Result<()> {
        Ok(())
    }
}
