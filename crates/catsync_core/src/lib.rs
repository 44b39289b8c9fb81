//! # catsync core
//!
//! Data model and storage contract for the catsync catalog synchronizer.
//!
//! This crate provides:
//! - [`CatalogRecord`] and the four derived index entities
//! - [`Metadata`], the flattened key→value view of a record's attributes
//! - The [`CatalogStore`] trait of point operations
//! - [`MemoryStore`] for tests and [`FileStore`] for durable, journaled storage
//! - [`CatalogQueries`], the read-only lookups served over synced data
//!
//! ## Key Invariants
//!
//! - `external_id` is the merge key for records
//! - `sequence` is assigned once at first insert and never reused
//! - Index entities only grow: sets are appended to, never pruned
//! - A single writer mutates a store at a time

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod query;
mod store;
mod types;

pub use error::{StoreError, StoreResult};
pub use query::CatalogQueries;
pub use store::{CatalogStore, CompactionResult, FileStore, MemoryStore};
pub use types::{
    keys, now_millis, CatalogRecord, MakeEntry, Metadata, MetadataKeySet, OptionEntry, YearEntry,
};
