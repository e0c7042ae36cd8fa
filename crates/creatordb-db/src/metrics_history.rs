//! Append-only `account_metrics_history`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetricsHistoryRow {
    pub id: i64,
    pub account_id: i64,
    pub captured_at: DateTime<Utc>,
    pub followers: i64,
    pub following: i64,
    pub total_content_count: i64,
    pub total_views: i64,
    pub items_scraped: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct NewMetricsSnapshot {
    pub captured_at: DateTime<Utc>,
    pub followers: i64,
    pub following: i64,
    pub total_content_count: i64,
    pub total_views: i64,
    pub items_scraped: i32,
}

/// Appends one snapshot row. Rows are never updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_metrics_snapshot(
    pool: &PgPool,
    account_id: i64,
    snapshot: &NewMetricsSnapshot,
) -> Result<MetricsHistoryRow, DbError> {
    let row = sqlx::query_as::<_, MetricsHistoryRow>(
        "INSERT INTO account_metrics_history \
             (account_id, captured_at, followers, following, total_content_count, \
              total_views, items_scraped) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, account_id, captured_at, followers, following, total_content_count, \
                   total_views, items_scraped",
    )
    .bind(account_id)
    .bind(snapshot.captured_at)
    .bind(snapshot.followers)
    .bind(snapshot.following)
    .bind(snapshot.total_content_count)
    .bind(snapshot.total_views)
    .bind(snapshot.items_scraped)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Most recent snapshots first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_metrics_history(
    pool: &PgPool,
    account_id: i64,
    limit: i64,
) -> Result<Vec<MetricsHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, MetricsHistoryRow>(
        "SELECT id, account_id, captured_at, followers, following, total_content_count, \
                total_views, items_scraped \
         FROM account_metrics_history \
         WHERE account_id = $1 \
         ORDER BY captured_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
