//! # Mediatree Core
//!
//! Indexing and query engine for a hierarchical media library.
//!
//! ## Overview
//!
//! - **Entity store**: keyed persistence of entities and per-folder child
//!   lists, in memory or durable on disk ([`store`])
//! - **Tree reconciliation**: keeps stored folders in step with the file
//!   system, tolerating offline volumes and unreadable folders ([`library`])
//! - **Item queries**: a predicate/sort/paging language with a planner that
//!   chooses between the indexed store path and in-memory evaluation
//!   ([`query`])
//! - **Per-user views**: library visibility, tag blocking and play-state
//!   aggregation ([`users`])
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediatree_core::{
//!     library::{ExtensionResolver, LibraryDefinition, LibraryRoots, NoProgress, RealFs,
//!               TreeReconciler, ValidateOptions},
//!     query::{ItemQueryBuilder, QueryPlanner},
//!     store::InMemoryEntityStore,
//!     users::InMemoryUserDataStore,
//! };
//! use mediatree_model::CollectionType;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn index_and_list() -> mediatree_core::Result<()> {
//!     let store = Arc::new(InMemoryEntityStore::new());
//!     let movies =
//!         LibraryDefinition::new("Movies", "/media/movies", Some(CollectionType::Movies));
//!     let roots = LibraryRoots::bootstrap(store.as_ref(), &[movies]).await?;
//!
//!     let reconciler = TreeReconciler::new(
//!         store.clone(),
//!         Arc::new(RealFs::new()),
//!         Arc::new(ExtensionResolver::default()),
//!     );
//!     reconciler
//!         .validate_children(roots.libraries[0], ValidateOptions::recursive(),
//!                            &NoProgress, &CancellationToken::new())
//!         .await?;
//!
//!     let planner = QueryPlanner::new(store, Arc::new(InMemoryUserDataStore::new()),
//!                                     roots.physical_root);
//!     let query = ItemQueryBuilder::new().recursive(true).limit(20).build()?;
//!     let page = planner.resolve(None, &query, None).await?;
//!     println!("{} of {}", page.items.len(), page.total_record_count);
//!     Ok(())
//! }
//! ```
#![allow(missing_docs)]

pub mod error;
pub mod library;
pub mod query;
pub mod store;
pub mod users;

pub use error::{MediaError, Result};
pub use library::{LibraryScanner, TreeReconciler};
pub use query::{ItemQuery, ItemQueryBuilder, QueryPlanner};
pub use store::{DurableEntityStore, EntityStore, InMemoryEntityStore};
