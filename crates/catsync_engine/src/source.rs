//! Remote catalog abstraction.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;

/// One metadata entry as delivered by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMetafield {
    /// Entry key.
    pub key: String,
    /// Entry value.
    pub value: String,
}

impl RawMetafield {
    /// Creates an entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Pricing of one product variant, as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVariant {
    /// Price.
    pub price: String,
    /// Compare-at price, if any.
    pub compare_at_price: Option<String>,
}

/// A product as delivered by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Stable remote identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// URL-safe slug.
    pub handle: String,
    /// Vendor name.
    pub vendor: String,
    /// Lifecycle status.
    pub status: String,
    /// Featured image URL.
    pub featured_image: Option<String>,
    /// Variants in remote order. Always non-empty from a well-behaved remote.
    pub variants: Vec<RawVariant>,
    /// Metadata entries in remote order.
    pub metafields: Vec<RawMetafield>,
}

/// One page of remote records.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in remote order (creation time, newest first).
    pub records: Vec<RawRecord>,
    /// Whether another page follows.
    pub has_more: bool,
    /// Cursor to resume after this page.
    pub next_cursor: Option<String>,
}

/// A paginated remote catalog.
///
/// Implementations return records newest-first so a full rescan observes
/// new items before old ones.
pub trait CatalogSource: Send + Sync {
    /// Fetches the page following `cursor`, or the first page when `None`.
    fn fetch_page(&self, cursor: Option<&str>, page_size: u32) -> SyncResult<Page>;
}

/// An in-memory catalog for tests and local runs.
///
/// Cursors are record offsets rendered as strings. Failures can be injected
/// to exercise retry handling, and every request is logged.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: Mutex<Vec<RawRecord>>,
    pending_failures: Mutex<u32>,
    requests: Mutex<Vec<Option<String>>>,
}

impl MemorySource {
    /// Creates a source serving `records` in the given order.
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            pending_failures: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the served catalog.
    pub fn set_records(&self, records: Vec<RawRecord>) {
        *self.records.lock() = records;
    }

    /// Makes the next `count` fetches fail with a retryable error.
    pub fn fail_next(&self, count: u32) {
        *self.pending_failures.lock() = count;
    }

    /// Cursors of every fetch attempted, in order.
    pub fn requests(&self) -> Vec<Option<String>> {
        self.requests.lock().clone()
    }

    /// Number of fetches attempted.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl CatalogSource for MemorySource {
    fn fetch_page(&self, cursor: Option<&str>, page_size: u32) -> SyncResult<Page> {
        self.requests.lock().push(cursor.map(str::to_string));

        {
            let mut pending = self.pending_failures.lock();
            if *pending > 0 {
                *pending -= 1;
                return Err(SyncError::source_retryable("injected transient failure"));
            }
        }

        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| SyncError::Protocol(format!("unknown cursor: {c}")))?,
            None => 0,
        };

        let records = self.records.lock();
        let start = start.min(records.len());
        let end = start.saturating_add(page_size as usize).min(records.len());
        let page: Vec<RawRecord> = records[start..end].to_vec();
        let next_cursor = (!page.is_empty()).then(|| end.to_string());

        Ok(Page {
            records: page,
            has_more: end < records.len(),
            next_cursor,
        })
    }
}
