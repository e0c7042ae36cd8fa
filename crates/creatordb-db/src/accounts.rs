//! Database operations for `social_accounts`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `social_accounts` table.
///
/// Counters are `BIGINT NOT NULL CHECK (>= 0)`; use [`crate::from_db_count`]
/// to read them as unsigned.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SocialAccountRow {
    pub id: i64,
    pub platform: String,
    pub handle: String,
    pub external_account_id: Option<String>,
    pub resolved_id: Option<String>,
    pub pagination_key: Option<String>,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    /// Owned (re-hosted) avatar URL when re-hosting is enabled.
    pub avatar_url: Option<String>,
    /// Upstream CDN URL the owned avatar was fetched from.
    pub avatar_source_url: Option<String>,
    pub banner_url: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub total_content_count: i64,
    pub total_views: i64,
    pub next_cursor: Option<String>,
    pub cursor_exhausted: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full account state written after a harvest.
#[derive(Debug, Clone)]
pub struct AccountUpsert {
    pub platform: String,
    pub handle: String,
    pub external_account_id: Option<String>,
    pub resolved_id: Option<String>,
    pub pagination_key: Option<String>,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub avatar_source_url: Option<String>,
    pub banner_url: Option<String>,
    pub followers: i64,
    pub following: i64,
    pub total_content_count: i64,
    pub total_views: i64,
    pub next_cursor: Option<String>,
    pub cursor_exhausted: bool,
    pub last_synced_at: DateTime<Utc>,
}

const ACCOUNT_COLUMNS: &str = "id, platform, handle, external_account_id, resolved_id, \
     pagination_key, username, display_name, bio, avatar_url, avatar_source_url, banner_url, \
     followers, following, total_content_count, total_views, next_cursor, cursor_exhausted, \
     last_synced_at, created_at, updated_at";

/// Fetches one account by `(platform, handle)`.
///
/// Returns `None` if the account has never been harvested.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_account(
    pool: &PgPool,
    platform: &str,
    handle: &str,
) -> Result<Option<SocialAccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts WHERE platform = $1 AND handle = $2"
    );
    let row = sqlx::query_as::<_, SocialAccountRow>(&sql)
        .bind(platform)
        .bind(handle)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts or replaces the account state for `(platform, handle)`.
///
/// The caller has already reconciled counters against the previous row, so
/// every column is overwritten. `external_account_id` keeps its old value when
/// the new one is `NULL`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_account(
    pool: &PgPool,
    account: &AccountUpsert,
) -> Result<SocialAccountRow, DbError> {
    let sql = format!(
        "INSERT INTO social_accounts \
             (platform, handle, external_account_id, resolved_id, pagination_key, username, \
              display_name, bio, avatar_url, avatar_source_url, banner_url, followers, \
              following, total_content_count, total_views, next_cursor, cursor_exhausted, \
              last_synced_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (platform, handle) DO UPDATE SET \
             external_account_id = COALESCE(EXCLUDED.external_account_id, \
                                            social_accounts.external_account_id), \
             resolved_id         = EXCLUDED.resolved_id, \
             pagination_key      = EXCLUDED.pagination_key, \
             username            = EXCLUDED.username, \
             display_name        = EXCLUDED.display_name, \
             bio                 = EXCLUDED.bio, \
             avatar_url          = EXCLUDED.avatar_url, \
             avatar_source_url   = EXCLUDED.avatar_source_url, \
             banner_url          = EXCLUDED.banner_url, \
             followers           = EXCLUDED.followers, \
             following           = EXCLUDED.following, \
             total_content_count = EXCLUDED.total_content_count, \
             total_views         = EXCLUDED.total_views, \
             next_cursor         = EXCLUDED.next_cursor, \
             cursor_exhausted    = EXCLUDED.cursor_exhausted, \
             last_synced_at      = EXCLUDED.last_synced_at, \
             updated_at          = NOW() \
         RETURNING {ACCOUNT_COLUMNS}"
    );

    let row = sqlx::query_as::<_, SocialAccountRow>(&sql)
        .bind(&account.platform)
        .bind(&account.handle)
        .bind(&account.external_account_id)
        .bind(&account.resolved_id)
        .bind(&account.pagination_key)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.bio)
        .bind(&account.avatar_url)
        .bind(&account.avatar_source_url)
        .bind(&account.banner_url)
        .bind(account.followers)
        .bind(account.following)
        .bind(account.total_content_count)
        .bind(account.total_views)
        .bind(&account.next_cursor)
        .bind(account.cursor_exhausted)
        .bind(account.last_synced_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Accounts not synced since `synced_before`, never-synced ones first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stale_accounts(
    pool: &PgPool,
    synced_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<SocialAccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM social_accounts \
         WHERE last_synced_at IS NULL OR last_synced_at < $1 \
         ORDER BY last_synced_at NULLS FIRST, id \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, SocialAccountRow>(&sql)
        .bind(synced_before)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
