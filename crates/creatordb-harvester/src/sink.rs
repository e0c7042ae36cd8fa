//! Merge & upsert: the only writer of per-account harvest state.

use chrono::{DateTime, Utc};
use creatordb_core::{AccountIdentity, HarvestCursor, HarvestResult, ProfileSnapshot};

use crate::error::StoreError;
use crate::merge::{dedupe_items, SafeMergePolicy};
use crate::store::{AccountWrite, HarvestStore, MetricsSnapshot, StoredAccount};

/// Everything the sink needs about one finished harvest.
#[derive(Debug, Clone, Copy)]
pub struct SinkInput<'a> {
    pub identity: &'a AccountIdentity,
    pub account_ref: Option<&'a str>,
    pub result: &'a HarvestResult,
    /// When content was not requested the stored cursor is left alone.
    pub fetch_content: bool,
    /// Upstream URL the profile's (possibly re-hosted) avatar came from.
    pub avatar_source_url: Option<&'a str>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkReport {
    pub account_id: i64,
    pub inserted: usize,
    pub updated: usize,
    /// Profile as persisted after safe-merge.
    pub profile: ProfileSnapshot,
    pub cursor: HarvestCursor,
}

/// The cursor to persist: a fresh one only when it says something.
fn merged_cursor(previous: Option<&StoredAccount>, fresh: &HarvestCursor, fetch_content: bool) -> HarvestCursor {
    let informative = fresh.exhausted || fresh.token.is_some();
    if fetch_content && informative {
        fresh.clone()
    } else {
        previous.map(|p| p.cursor.clone()).unwrap_or_default()
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Reconciles `input.result` with persisted state and writes it.
///
/// Counters pass through the safe-merge `policy`; items are upserted by
/// canonical id; exactly one history row is appended per call. Running the
/// same result twice leaves the same account and item state behind.
///
/// # Errors
///
/// Returns [`StoreError`] if any store operation fails. Earlier writes from
/// the same call are not rolled back; rerunning the call is safe.
pub async fn apply_harvest<S: HarvestStore>(
    store: &S,
    policy: &SafeMergePolicy,
    input: SinkInput<'_>,
) -> Result<SinkReport, StoreError> {
    let identity = input.identity;
    let previous = store
        .load_account(identity.platform, &identity.handle)
        .await?;

    let profile = policy.merge_profile(previous.as_ref().map(|p| &p.profile), &input.result.profile);
    let cursor = merged_cursor(previous.as_ref(), &input.result.cursor, input.fetch_content);

    let write = AccountWrite {
        platform: identity.platform,
        handle: identity.handle.clone(),
        account_ref: input.account_ref.map(str::to_owned),
        resolved_id: non_empty(&identity.resolved_id)
            .or_else(|| previous.as_ref().and_then(|p| p.resolved_id.clone())),
        pagination_key: identity
            .pagination_key
            .clone()
            .or_else(|| previous.as_ref().and_then(|p| p.pagination_key.clone())),
        profile: profile.clone(),
        avatar_source_url: input
            .avatar_source_url
            .map(str::to_owned)
            .or_else(|| previous.as_ref().and_then(|p| p.avatar_source_url.clone())),
        cursor: cursor.clone(),
        synced_at: input.now,
    };
    let account_id = store.save_account(&write).await?;

    let items = dedupe_items(&input.result.items);
    let counts = store.upsert_items(account_id, &items).await?;

    store
        .append_history(
            account_id,
            &MetricsSnapshot {
                captured_at: input.now,
                followers: profile.followers,
                following: profile.following,
                total_content_count: profile.total_content_count,
                total_views: profile.total_views,
                items_scraped: items.len(),
            },
        )
        .await?;

    tracing::info!(
        platform = %identity.platform,
        handle = %identity.handle,
        account_id,
        inserted = counts.inserted,
        updated = counts.updated,
        "harvest persisted"
    );

    Ok(SinkReport {
        account_id,
        inserted: counts.inserted,
        updated: counts.updated,
        profile,
        cursor,
    })
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod tests;
