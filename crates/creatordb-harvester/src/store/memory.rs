use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use creatordb_core::{ContentItem, Platform};
use tokio::sync::Mutex;

use super::{AccountWrite, HarvestStore, MetricsSnapshot, StoredAccount, UpsertCounts};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    accounts: HashMap<(Platform, String), StoredAccount>,
    account_refs: HashMap<i64, String>,
    items: HashMap<i64, BTreeMap<String, ContentItem>>,
    history: HashMap<i64, Vec<MetricsSnapshot>>,
}

/// Process-local store for tests and `--dry-run` harvests.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items stored for an account, ordered by id.
    pub async fn items(&self, account_id: i64) -> Vec<ContentItem> {
        let state = self.state.lock().await;
        state
            .items
            .get(&account_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn history(&self, account_id: i64) -> Vec<MetricsSnapshot> {
        let state = self.state.lock().await;
        state.history.get(&account_id).cloned().unwrap_or_default()
    }

    pub async fn account_ref(&self, account_id: i64) -> Option<String> {
        self.state.lock().await.account_refs.get(&account_id).cloned()
    }

    /// Seeds an account as if an earlier harvest had written it.
    pub async fn insert_account(&self, write: &AccountWrite) -> i64 {
        self.save(write).await
    }

    async fn save(&self, write: &AccountWrite) -> i64 {
        let mut state = self.state.lock().await;
        let key = (write.platform, write.handle.clone());
        let id = if let Some(existing) = state.accounts.get(&key) {
            existing.id
        } else {
            state.next_id += 1;
            state.next_id
        };

        if let Some(account_ref) = &write.account_ref {
            state.account_refs.insert(id, account_ref.clone());
        }
        state.accounts.insert(
            key,
            StoredAccount {
                id,
                profile: write.profile.clone(),
                avatar_source_url: write.avatar_source_url.clone(),
                resolved_id: write.resolved_id.clone(),
                pagination_key: write.pagination_key.clone(),
                cursor: write.cursor.clone(),
                last_synced_at: Some(write.synced_at),
            },
        );
        id
    }
}

impl HarvestStore for MemoryStore {
    async fn load_account(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Option<StoredAccount>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(&(platform, handle.to_owned())).cloned())
    }

    async fn save_account(&self, account: &AccountWrite) -> Result<i64, StoreError> {
        Ok(self.save(account).await)
    }

    async fn upsert_items(
        &self,
        account_id: i64,
        items: &[ContentItem],
    ) -> Result<UpsertCounts, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state.items.entry(account_id).or_default();
        let mut counts = UpsertCounts::default();

        for item in items {
            match stored.get_mut(&item.id) {
                Some(existing) => {
                    let published_at = existing.published_at.or(item.published_at);
                    let caption = item.caption.clone().or_else(|| existing.caption.take());
                    let thumbnail_url = item
                        .thumbnail_url
                        .clone()
                        .or_else(|| existing.thumbnail_url.take());
                    let is_short = item.is_short.or(existing.is_short);
                    let shares = item.metrics.shares.or(existing.metrics.shares);
                    *existing = ContentItem {
                        caption,
                        thumbnail_url,
                        published_at,
                        is_short,
                        ..item.clone()
                    };
                    existing.metrics.shares = shares;
                    counts.updated += 1;
                }
                None => {
                    stored.insert(item.id.clone(), item.clone());
                    counts.inserted += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn append_history(
        &self,
        account_id: i64,
        snapshot: &MetricsSnapshot,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.history.entry(account_id).or_default().push(*snapshot);
        Ok(())
    }
}
