//! Persistence seam for the merge sink.
//!
//! The sink only needs four operations, so storage is a small trait with an
//! in-memory implementation for tests and dry runs and a Postgres one for
//! production.

mod memory;
mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};
use creatordb_core::{ContentItem, HarvestCursor, Platform, ProfileSnapshot};

use crate::error::StoreError;

pub use creatordb_db::UpsertCounts;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persisted state of one account as the sink sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAccount {
    pub id: i64,
    pub profile: ProfileSnapshot,
    pub avatar_source_url: Option<String>,
    pub resolved_id: Option<String>,
    pub pagination_key: Option<String>,
    pub cursor: HarvestCursor,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Reconciled account state to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    pub platform: Platform,
    pub handle: String,
    pub account_ref: Option<String>,
    pub resolved_id: Option<String>,
    pub pagination_key: Option<String>,
    pub profile: ProfileSnapshot,
    pub avatar_source_url: Option<String>,
    pub cursor: HarvestCursor,
    pub synced_at: DateTime<Utc>,
}

/// Point-in-time aggregate row for trend reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub followers: u64,
    pub following: u64,
    pub total_content_count: u64,
    pub total_views: u64,
    pub items_scraped: usize,
}

/// Storage used by [`crate::sink::apply_harvest`].
///
/// One account is single-writer: callers must not harvest the same account
/// concurrently. Different accounts may be written in parallel.
pub trait HarvestStore: Send + Sync {
    fn load_account(
        &self,
        platform: Platform,
        handle: &str,
    ) -> impl Future<Output = Result<Option<StoredAccount>, StoreError>> + Send;

    /// Writes the account and returns its storage id.
    fn save_account(
        &self,
        account: &AccountWrite,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Upserts by `(account_id, item.id)`; never deletes.
    fn upsert_items(
        &self,
        account_id: i64,
        items: &[ContentItem],
    ) -> impl Future<Output = Result<UpsertCounts, StoreError>> + Send;

    fn append_history(
        &self,
        account_id: i64,
        snapshot: &MetricsSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
