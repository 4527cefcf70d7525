//! Library maintenance: mapping the file system onto the stored tree.
//!
//! [`TreeReconciler`] walks folders, asks an [`ItemResolver`] what each
//! directory entry is, and applies the difference to the store.
//! [`LibraryScanner`] runs it over several libraries concurrently.

pub mod events;
pub mod fs;
pub mod locks;
pub mod offline;
pub mod progress;
pub mod reconciler;
pub mod refresh;
pub mod resolver;
pub mod roots;
pub mod scanner;

pub use events::{
    InProcLibraryEventBus, LibraryEvent, LibraryEventPublisher, RecordingPublisher,
};
pub use fs::{FileSystem, FsEntry, FsMetadata, InMemoryFs, RealFs};
pub use locks::FolderLocks;
pub use offline::OfflineDetector;
pub use progress::{LoggingProgress, NoProgress, ProgressSink, RecordingProgress, ScaledProgress};
pub use reconciler::{ReconcilePhase, ReconcileSummary, TreeReconciler, ValidateOptions};
pub use refresh::{MetadataRefresher, NoopRefresher, RefreshOptions};
pub use resolver::{ExtensionResolver, ItemResolver, Resolution, ResolveContext};
pub use roots::{LibraryDefinition, LibraryRoots, ensure_user_root, physical_root_id};
pub use scanner::LibraryScanner;
