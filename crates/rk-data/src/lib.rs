//! Data access for the risk analytics engine.
//!
//! Provides:
//! - [`SourceSnapshot`]: an immutable, as-of snapshot of the source tables
//!   with typed accessors
//! - [`loaders`]: CSV feed loaders that build a validated snapshot
//! - [`OutputStore`]: the append-only store for derived records

pub mod loaders;
pub mod snapshot;
pub mod store;

pub use loaders::load_snapshot;
pub use snapshot::{SnapshotBuilder, SourceSnapshot};
pub use store::OutputStore;
