//! Database operations for `content_items`.

use chrono::{DateTime, Utc};
use creatordb_core::ContentItem;
use sqlx::PgPool;

use crate::{to_db_count, DbError};

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: i64,
    pub account_id: i64,
    /// Platform-validated id; unique per account.
    pub canonical_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub thumbnail_url: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_short: Option<bool>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

/// Upserts every item for `account_id` in one transaction.
///
/// Conflicts on `(account_id, canonical_id)` refresh metrics, caption,
/// thumbnail and `last_seen_at`; `published_at` and `is_short` only fill in
/// when previously unknown. Nothing is ever deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back.
pub async fn upsert_content_items(
    pool: &PgPool,
    account_id: i64,
    items: &[ContentItem],
) -> Result<UpsertCounts, DbError> {
    let mut tx = pool.begin().await?;
    let mut counts = UpsertCounts::default();

    for item in items {
        // `xmax = 0` holds only for rows created by this statement.
        let inserted: bool = sqlx::query_scalar::<_, bool>(
            "INSERT INTO content_items \
                 (account_id, canonical_id, url, caption, thumbnail_url, views, likes, \
                  comments, shares, published_at, is_short) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (account_id, canonical_id) DO UPDATE SET \
                 url           = EXCLUDED.url, \
                 caption       = COALESCE(EXCLUDED.caption, content_items.caption), \
                 thumbnail_url = COALESCE(EXCLUDED.thumbnail_url, content_items.thumbnail_url), \
                 views         = EXCLUDED.views, \
                 likes         = EXCLUDED.likes, \
                 comments      = EXCLUDED.comments, \
                 shares        = COALESCE(EXCLUDED.shares, content_items.shares), \
                 published_at  = COALESCE(content_items.published_at, EXCLUDED.published_at), \
                 is_short      = COALESCE(EXCLUDED.is_short, content_items.is_short), \
                 last_seen_at  = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(account_id)
        .bind(&item.id)
        .bind(&item.url)
        .bind(&item.caption)
        .bind(&item.thumbnail_url)
        .bind(to_db_count(item.metrics.views))
        .bind(to_db_count(item.metrics.likes))
        .bind(to_db_count(item.metrics.comments))
        .bind(item.metrics.shares.map(to_db_count))
        .bind(item.published_at)
        .bind(item.is_short)
        .fetch_one(&mut *tx)
        .await?;

        if inserted {
            counts.inserted += 1;
        } else {
            counts.updated += 1;
        }
    }

    tx.commit().await?;
    Ok(counts)
}

/// Lists an account's items by ascending row id, starting after `after_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_content_items(
    pool: &PgPool,
    account_id: i64,
    after_id: Option<i64>,
    limit: i64,
) -> Result<Vec<ContentItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentItemRow>(
        "SELECT id, account_id, canonical_id, url, caption, thumbnail_url, views, likes, \
                comments, shares, published_at, is_short, first_seen_at, last_seen_at \
         FROM content_items \
         WHERE account_id = $1 AND ($2::BIGINT IS NULL OR id > $2) \
         ORDER BY id \
         LIMIT $3",
    )
    .bind(account_id)
    .bind(after_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
