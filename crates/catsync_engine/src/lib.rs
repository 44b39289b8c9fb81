//! # catsync engine
//!
//! Sync state machine that mirrors a paginated remote catalog into a
//! [`catsync_core::CatalogStore`].
//!
//! This crate provides:
//! - The [`CatalogSource`] abstraction, a Shopify GraphQL implementation and
//!   an in-memory source for tests
//! - Record transformation and upsert by external identifier
//! - Incremental maintenance of the derived year, make, option and key-set
//!   indexes
//! - The run state machine (paginating → processing → completed) with
//!   whole-page retry
//!
//! ## Key Invariants
//!
//! - A run is a full rescan; there is no persisted cursor
//! - Sequence numbers are assigned on first insert and strictly increase
//! - A failing page is retried as a whole, fetch included
//! - At most one run is active per engine

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod indexer;
mod shopify;
mod source;
mod state;
mod transform;
mod writer;

pub use config::{RetryConfig, ShopifyConfig, SyncConfig, MAX_PAGE_SIZE};
pub use error::{SyncError, SyncResult};
pub use indexer::{observe, IndexChanges, KnownKeys};
pub use shopify::{HttpClient, HttpResponse, ShopifySource};
pub use source::{CatalogSource, MemorySource, Page, RawMetafield, RawRecord, RawVariant};
pub use state::{SyncEngine, SyncRunResult, SyncState, SyncStats};
pub use transform::{transform, Transformed};
pub use writer::{upsert, SequenceCounter, UpsertOutcome};
