//! Configuration for mediatree.
//!
//! Loads [`MediaTreeConfig`] from TOML or JSON (file, environment, or
//! defaults), validates it, and assembles the store, reconciler and query
//! planner the `mediatree` binary runs against.
#![allow(missing_docs)]

pub mod models;
pub mod runtime;

pub use models::{
    ConfigSource, LibraryConfig, MediaTreeConfig, QueryConfig, ReconcilerConfig, StoreConfig,
};
pub use runtime::Engine;
