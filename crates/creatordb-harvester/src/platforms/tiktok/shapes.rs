use std::sync::LazyLock;

use creatordb_core::{ContentItem, ContentMetrics, ProfileSnapshot};
use regex::Regex;
use serde_json::Value;

use crate::extract::{ExtractContext, PageSignal, ProfileFragment, RecordShapes};
use crate::fields::{count_at, first_at, id_at, string_at, timestamp_at};
use crate::walk::find_key;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10,}$").expect("valid regex"));

const PUBLIC_BASE: &str = "https://www.tiktok.com";

/// How deep the cursor and has-more flags may sit in a payload.
const SIGNAL_DEPTH: usize = 4;

const FOLLOWERS: &[&str] = &["followerCount", "follower_count", "fans"];

/// Video records from the web API (`itemList`), the rehydration state, the
/// legacy `ItemModule` map, and the mobile API (`aweme_list`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TikTokShapes;

fn is_user_record(node: &Value) -> bool {
    ["uniqueId", "unique_id", "secUid", "sec_uid"]
        .iter()
        .any(|k| node.get(*k).is_some())
}

fn has_video_markers(node: &Value) -> bool {
    node.get("video").is_some_and(Value::is_object)
        || first_at(
            node,
            &[
                "stats.playCount",
                "statistics.play_count",
                "statsV2.playCount",
            ],
        )
        .is_some()
}

fn user_snapshot(user: &Value, stats: &Value) -> ProfileSnapshot {
    ProfileSnapshot {
        username: string_at(user, &["uniqueId", "unique_id"]).unwrap_or_default(),
        display_name: string_at(user, &["nickname"]),
        bio: string_at(user, &["signature"]),
        avatar_url: string_at(
            user,
            &[
                "avatarLarger",
                "avatarMedium",
                "avatarThumb",
                "avatar_larger.url_list.0",
                "avatar_thumb.url_list.0",
            ],
        ),
        banner_url: None,
        followers: count_at(stats, FOLLOWERS).unwrap_or(0),
        following: count_at(stats, &["followingCount", "following_count"]).unwrap_or(0),
        total_content_count: count_at(stats, &["videoCount", "video_count", "aweme_count"])
            .unwrap_or(0),
        total_views: 0,
    }
}

impl RecordShapes for TikTokShapes {
    fn item_containers(&self) -> &'static [&'static str] {
        &["itemList", "items", "aweme_list", "ItemModule", "data.itemList"]
    }

    fn item_from(&self, node: &Value, ctx: &ExtractContext<'_>) -> Option<ContentItem> {
        if is_user_record(node) || !has_video_markers(node) {
            return None;
        }
        let id = id_at(node, &["id", "aweme_id", "itemId", "video_id"])
            .filter(|id| VIDEO_ID_RE.is_match(id))?;

        let author = string_at(node, &["author.uniqueId", "author.unique_id", "author"])
            .unwrap_or_else(|| ctx.handle.to_string());
        let views = count_at(
            node,
            &["stats.playCount", "statistics.play_count", "statsV2.playCount", "playCount"],
        );

        Some(ContentItem {
            url: format!("{PUBLIC_BASE}/@{author}/video/{id}"),
            caption: string_at(node, &["desc", "title", "caption"]),
            thumbnail_url: string_at(
                node,
                &[
                    "video.cover",
                    "video.originCover",
                    "video.dynamicCover",
                    "video.cover.url_list.0",
                ],
            ),
            metrics: ContentMetrics {
                views: views.unwrap_or(0),
                likes: count_at(
                    node,
                    &["stats.diggCount", "statistics.digg_count", "statsV2.diggCount", "diggCount"],
                )
                .unwrap_or(0),
                comments: count_at(
                    node,
                    &[
                        "stats.commentCount",
                        "statistics.comment_count",
                        "statsV2.commentCount",
                        "commentCount",
                    ],
                )
                .unwrap_or(0),
                shares: count_at(
                    node,
                    &["stats.shareCount", "statistics.share_count", "statsV2.shareCount", "shareCount"],
                ),
            },
            published_at: timestamp_at(node, &["createTime", "create_time"], ctx.now),
            is_short: None,
            id,
        })
    }

    fn profile_from(&self, node: &Value, _ctx: &ExtractContext<'_>) -> Option<ProfileFragment> {
        // `userInfo`: {user: {...}, stats: {...}}
        if let (Some(user), Some(stats)) = (node.get("user"), node.get("stats")) {
            if user.is_object() && first_at(stats, FOLLOWERS).is_some() {
                return Some(ProfileFragment {
                    snapshot: user_snapshot(user, stats),
                    owner_id: id_at(user, &["id", "uid"]),
                    pagination_key: string_at(user, &["secUid", "sec_uid"]),
                });
            }
        }

        // Flat user with counters inline (mobile API, older payloads).
        if is_user_record(node) && first_at(node, FOLLOWERS).is_some() {
            return Some(ProfileFragment {
                snapshot: user_snapshot(node, node),
                owner_id: id_at(node, &["id", "uid"]),
                pagination_key: string_at(node, &["secUid", "sec_uid"]),
            });
        }
        None
    }

    fn page_signal(&self, payload: &Value, _ctx: &ExtractContext<'_>) -> PageSignal {
        let next_cursor = find_key(payload, &["cursor", "max_cursor"], SIGNAL_DEPTH).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() && s != "0" => Some(s.trim().to_string()),
            Value::Number(n) if n.as_u64() != Some(0) => Some(n.to_string()),
            _ => None,
        });
        let has_more = find_key(payload, &["hasMore", "has_more"], SIGNAL_DEPTH).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            _ => None,
        });
        PageSignal {
            next_cursor,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::extract::extract;

    fn ctx() -> ExtractContext<'static> {
        ExtractContext {
            handle: "creator1",
            max_depth: 24,
            now: Utc::now(),
        }
    }

    fn video(id: &str, plays: u64) -> Value {
        json!({
            "id": id,
            "desc": format!("clip {id}"),
            "createTime": 1_700_000_000,
            "author": {"uniqueId": "creator1"},
            "video": {"cover": "https://p16.example/cover.jpg"},
            "stats": {"playCount": plays, "diggCount": 5, "commentCount": 2, "shareCount": 1},
        })
    }

    #[test]
    fn rehydration_state_yields_profile_items_and_cursor() {
        let payload = json!({
            "__DEFAULT_SCOPE__": {
                "webapp.user-detail": {
                    "userInfo": {
                        "user": {
                            "id": "6800000000000000001",
                            "uniqueId": "creator1",
                            "secUid": "MS4wLjABAAAAtest",
                            "nickname": "Creator One",
                            "signature": "hello",
                            "avatarLarger": "https://p16.example/avatar.jpg",
                        },
                        "stats": {"followerCount": 1200, "followingCount": 3, "videoCount": 40, "heartCount": 9000},
                    },
                    "itemList": [video("7300000000000000001", 100), video("7300000000000000002", 200)],
                    "cursor": "1700000000000",
                    "hasMore": true,
                }
            }
        });

        let out = extract(&payload, &TikTokShapes, &ctx());

        let profile = out.profile.expect("profile");
        assert_eq!(profile.username, "creator1");
        assert_eq!(profile.followers, 1200);
        assert_eq!(profile.total_content_count, 40);
        assert_eq!(profile.display_name.as_deref(), Some("Creator One"));
        assert_eq!(out.owner_id.as_deref(), Some("6800000000000000001"));
        assert_eq!(out.pagination_key.as_deref(), Some("MS4wLjABAAAAtest"));
        assert_eq!(out.items.len(), 2);
        assert_eq!(
            out.items[0].url,
            "https://www.tiktok.com/@creator1/video/7300000000000000001"
        );
        assert_eq!(out.items[1].metrics.views, 200);
        assert_eq!(out.items[0].metrics.shares, Some(1));
        assert!(out.items[0].published_at.is_some());
        assert_eq!(out.signal.next_cursor.as_deref(), Some("1700000000000"));
        assert_eq!(out.signal.has_more, Some(true));
    }

    #[test]
    fn item_module_map_and_string_author() {
        let payload = json!({
            "ItemModule": {
                "7300000000000000003": {
                    "id": "7300000000000000003",
                    "author": "creator1",
                    "video": {"cover": "c"},
                    "stats": {"playCount": "1.2K"},
                }
            }
        });

        let out = extract(&payload, &TikTokShapes, &ctx());

        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].metrics.views, 1200);
        assert!(out.items[0].metrics.shares.is_none());
    }

    #[test]
    fn short_or_user_ids_are_not_videos() {
        let payload = json!({
            "itemList": [
                {"id": "12345", "video": {}, "stats": {"playCount": 1}},
                {"id": "6800000000000000001", "uniqueId": "someone", "video": {}},
            ]
        });

        assert!(extract(&payload, &TikTokShapes, &ctx()).items.is_empty());
    }

    #[test]
    fn other_users_stats_are_ignored() {
        let payload = json!({
            "suggested": {"uniqueId": "other", "followerCount": 99},
            "me": {"unique_id": "creator1", "follower_count": 7, "sec_uid": "MS4w"},
        });

        let out = extract(&payload, &TikTokShapes, &ctx());

        assert_eq!(out.profile.expect("profile").followers, 7);
        assert_eq!(out.pagination_key.as_deref(), Some("MS4w"));
    }

    #[test]
    fn api_page_signal_reads_numeric_cursor() {
        let payload = json!({"itemList": [], "cursor": 1_690_000_000_000_u64, "hasMore": false});
        let signal = TikTokShapes.page_signal(&payload, &ctx());
        assert_eq!(signal.next_cursor.as_deref(), Some("1690000000000"));
        assert_eq!(signal.has_more, Some(false));
    }

    #[test]
    fn zero_cursor_means_none() {
        let signal = TikTokShapes.page_signal(&json!({"cursor": "0"}), &ctx());
        assert!(signal.next_cursor.is_none());
    }
}
