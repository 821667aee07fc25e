//! File system operations with commit/rollback semantics.
//!
//! Provides a scoped writer whose content either replaces the target in a
//! single atomic step or leaves no trace at all.

pub mod primitives;
pub mod writer;

pub use primitives::{move_atomic, replace_atomic, sync_directory, sync_file};
pub use writer::{AtomicFile, AtomicWriter, WriteMode, atomic_write};
