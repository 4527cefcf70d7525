use dashmap::DashMap;
use mediatree_model::ItemId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per folder. Holding a folder's guard serializes every
/// child-set mutation of that folder; other folders are unaffected.
#[derive(Debug, Default, Clone)]
pub struct FolderLocks {
    locks: Arc<DashMap<ItemId, Arc<Mutex<()>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, folder: ItemId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(folder)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drops locks nobody holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_folder_is_serialized() {
        let locks = FolderLocks::new();
        let folder = ItemId::new();
        let guard = locks.lock(folder).await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock(folder).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn different_folders_do_not_contend() {
        let locks = FolderLocks::new();
        let _a = locks.lock(ItemId::new()).await;
        let _b = locks.lock(ItemId::new()).await;
        locks.prune();
    }
}
