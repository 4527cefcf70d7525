use async_trait::async_trait;
use mediatree_model::ItemId;
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::error::Result;

/// Tree changes made by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    ItemAdded { item_id: ItemId, parent_id: ItemId },
    ItemUpdated { item_id: ItemId },
    ItemRemoved { item_id: ItemId, parent_id: ItemId },
}

impl LibraryEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            LibraryEvent::ItemAdded { item_id, .. }
            | LibraryEvent::ItemUpdated { item_id }
            | LibraryEvent::ItemRemoved { item_id, .. } => *item_id,
        }
    }
}

#[async_trait]
pub trait LibraryEventPublisher: Send + Sync + std::fmt::Debug {
    async fn publish(&self, event: LibraryEvent) -> Result<()>;
}

/// In-process bus fanning library events out to subscribers. Sends with no
/// subscriber are dropped.
#[derive(Debug)]
pub struct InProcLibraryEventBus {
    sender: broadcast::Sender<LibraryEvent>,
}

impl Default for InProcLibraryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl InProcLibraryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl LibraryEventPublisher for InProcLibraryEventBus {
    async fn publish(&self, event: LibraryEvent) -> Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Publisher that keeps every event; for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<LibraryEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LibraryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn removed(&self) -> Vec<ItemId> {
        self.events()
            .into_iter()
            .filter(|event| matches!(event, LibraryEvent::ItemRemoved { .. }))
            .map(|event| event.item_id())
            .collect()
    }
}

#[async_trait]
impl LibraryEventPublisher for RecordingPublisher {
    async fn publish(&self, event: LibraryEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
