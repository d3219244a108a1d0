//! `polyglot-store`: scope-partitioned message log on SQLite.
//!
//! # Overview
//!
//! [`store::MessageStore`] appends every observed chat message and answers
//! "the last N messages of this scope before time T". History is bounded by
//! the [`retention::RetentionSweeper`], which deletes rows older than the
//! configured retention horizon on a fixed interval.
//!
//! # Ordering
//!
//! Within a scope, rows are ordered by `created_at` and then by insertion
//! sequence, so two messages sharing a timestamp keep their arrival order.

pub mod db;
pub mod error;
pub mod retention;
pub mod store;

pub use error::{Result, StorageError};
pub use retention::{RetentionSweeper, SweeperHandle};
pub use store::MessageStore;
