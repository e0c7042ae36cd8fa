use creatordb_core::{ContentItem, HarvestCursor, Platform, ProfileSnapshot};
use creatordb_db::{from_db_count, to_db_count, AccountUpsert, NewMetricsSnapshot, SocialAccountRow};
use sqlx::PgPool;

use super::{AccountWrite, HarvestStore, MetricsSnapshot, StoredAccount, UpsertCounts};
use crate::error::StoreError;

/// `sqlx`-backed store over the `social_accounts`, `content_items` and
/// `account_metrics_history` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn stored_from_row(row: SocialAccountRow) -> StoredAccount {
    StoredAccount {
        id: row.id,
        profile: ProfileSnapshot {
            username: row.username,
            display_name: row.display_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
            banner_url: row.banner_url,
            followers: from_db_count(row.followers),
            following: from_db_count(row.following),
            total_content_count: from_db_count(row.total_content_count),
            total_views: from_db_count(row.total_views),
        },
        avatar_source_url: row.avatar_source_url,
        resolved_id: row.resolved_id,
        pagination_key: row.pagination_key,
        cursor: HarvestCursor {
            token: row.next_cursor,
            exhausted: row.cursor_exhausted,
        },
        last_synced_at: row.last_synced_at,
    }
}

fn upsert_from_write(write: &AccountWrite) -> AccountUpsert {
    let profile = &write.profile;
    AccountUpsert {
        platform: write.platform.as_str().to_owned(),
        handle: write.handle.clone(),
        external_account_id: write.account_ref.clone(),
        resolved_id: write.resolved_id.clone(),
        pagination_key: write.pagination_key.clone(),
        username: profile.username.clone(),
        display_name: profile.display_name.clone(),
        bio: profile.bio.clone(),
        avatar_url: profile.avatar_url.clone(),
        avatar_source_url: write.avatar_source_url.clone(),
        banner_url: profile.banner_url.clone(),
        followers: to_db_count(profile.followers),
        following: to_db_count(profile.following),
        total_content_count: to_db_count(profile.total_content_count),
        total_views: to_db_count(profile.total_views),
        next_cursor: write.cursor.token.clone(),
        cursor_exhausted: write.cursor.exhausted,
        last_synced_at: write.synced_at,
    }
}

impl HarvestStore for PgStore {
    async fn load_account(
        &self,
        platform: Platform,
        handle: &str,
    ) -> Result<Option<StoredAccount>, StoreError> {
        let row = creatordb_db::get_account(&self.pool, platform.as_str(), handle).await?;
        Ok(row.map(stored_from_row))
    }

    async fn save_account(&self, account: &AccountWrite) -> Result<i64, StoreError> {
        let row = creatordb_db::upsert_account(&self.pool, &upsert_from_write(account)).await?;
        Ok(row.id)
    }

    async fn upsert_items(
        &self,
        account_id: i64,
        items: &[ContentItem],
    ) -> Result<UpsertCounts, StoreError> {
        Ok(creatordb_db::upsert_content_items(&self.pool, account_id, items).await?)
    }

    async fn append_history(
        &self,
        account_id: i64,
        snapshot: &MetricsSnapshot,
    ) -> Result<(), StoreError> {
        let row = NewMetricsSnapshot {
            captured_at: snapshot.captured_at,
            followers: to_db_count(snapshot.followers),
            following: to_db_count(snapshot.following),
            total_content_count: to_db_count(snapshot.total_content_count),
            total_views: to_db_count(snapshot.total_views),
            items_scraped: i32::try_from(snapshot.items_scraped).unwrap_or(i32::MAX),
        };
        creatordb_db::insert_metrics_snapshot(&self.pool, account_id, &row).await?;
        Ok(())
    }
}
