use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use creatordb_core::Platform;
use creatordb_db::{from_db_count, SocialAccountRow};
use creatordb_harvester::parse_target;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ItemsQuery {
    /// Row id of the last item on the previous page.
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ContentItemView {
    id: String,
    url: String,
    caption: Option<String>,
    thumbnail_url: Option<String>,
    views: u64,
    likes: u64,
    comments: u64,
    shares: Option<u64>,
    published_at: Option<DateTime<Utc>>,
    is_short: Option<bool>,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ItemsPage {
    items: Vec<ContentItemView>,
    /// Pass back as `cursor` to get the next page; absent on the last page.
    next_cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct HistoryItem {
    captured_at: DateTime<Utc>,
    followers: u64,
    following: u64,
    total_content_count: u64,
    total_views: u64,
    items_scraped: i32,
}

/// Looks up a stored account by the platform and handle in the URL.
async fn find_account(
    state: &AppState,
    req_id: &str,
    platform: &str,
    handle: &str,
) -> Result<SocialAccountRow, ApiError> {
    let platform: Platform = platform.parse().map_err(|_| {
        ApiError::new(req_id, "bad_request", format!("unknown platform \"{platform}\""))
    })?;
    let target = parse_target(handle).ok_or_else(|| {
        ApiError::new(req_id, "bad_request", format!("\"{handle}\" is not an account handle"))
    })?;

    creatordb_db::get_account(&state.pool, platform.as_str(), target.key())
        .await
        .map_err(|e| map_db_error(req_id.to_string(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id,
                "not_found",
                format!("{platform} account \"{}\" has not been harvested", target.key()),
            )
        })
}

pub(super) async fn list_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((platform, handle)): Path<(String, String)>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<ApiResponse<ItemsPage>>, ApiError> {
    let account = find_account(&state, &req_id.0, &platform, &handle).await?;
    let limit = normalize_limit(query.limit);

    let mut rows = creatordb_db::list_content_items(&state.pool, account.id, query.cursor, limit + 1)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let has_more = rows.len() > usize::try_from(limit).unwrap_or(usize::MAX);
    if has_more {
        rows.pop();
    }
    let next_cursor = if has_more {
        rows.last().map(|row| row.id)
    } else {
        None
    };

    let items = rows
        .into_iter()
        .map(|row| ContentItemView {
            id: row.canonical_id,
            url: row.url,
            caption: row.caption,
            thumbnail_url: row.thumbnail_url,
            views: from_db_count(row.views),
            likes: from_db_count(row.likes),
            comments: from_db_count(row.comments),
            shares: row.shares.map(from_db_count),
            published_at: row.published_at,
            is_short: row.is_short,
            first_seen_at: row.first_seen_at,
            last_seen_at: row.last_seen_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: ItemsPage { items, next_cursor },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((platform, handle)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryItem>>>, ApiError> {
    let account = find_account(&state, &req_id.0, &platform, &handle).await?;

    let rows =
        creatordb_db::list_metrics_history(&state.pool, account.id, normalize_limit(query.limit))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| HistoryItem {
            captured_at: row.captured_at,
            followers: from_db_count(row.followers),
            following: from_db_count(row.following),
            total_content_count: from_db_count(row.total_content_count),
            total_views: from_db_count(row.total_views),
            items_scraped: row.items_scraped,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
