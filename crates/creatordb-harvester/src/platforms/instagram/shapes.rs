use std::sync::LazyLock;

use creatordb_core::{ContentItem, ContentMetrics, ProfileSnapshot};
use regex::Regex;
use serde_json::Value;

use crate::extract::{ExtractContext, PageSignal, ProfileFragment, RecordShapes};
use crate::fields::{bool_at, count_at, first_at, id_at, string_at, timestamp_at};
use crate::walk::find_key;

static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{5,20}$").expect("valid regex"));

const PUBLIC_BASE: &str = "https://www.instagram.com";

/// Keys only media records carry; a shortcode alone is not enough.
const MEDIA_MARKERS: &[&str] = &[
    "display_url",
    "thumbnail_src",
    "media_type",
    "taken_at_timestamp",
    "taken_at",
    "image_versions2",
    "is_video",
    "edge_liked_by",
    "edge_media_preview_like",
    "like_count",
];

const FOLLOWERS: &[&str] = &["edge_followed_by.count", "follower_count"];

const SIGNAL_DEPTH: usize = 8;

/// GraphQL timeline edges (`edge_owner_to_timeline_media`) and the private
/// feed API's `items`, keyed by shortcode.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstagramShapes;

impl RecordShapes for InstagramShapes {
    fn item_containers(&self) -> &'static [&'static str] {
        &[
            "data.user.edge_owner_to_timeline_media.edges",
            "graphql.user.edge_owner_to_timeline_media.edges",
            "user.edge_owner_to_timeline_media.edges",
            "entry_data.ProfilePage.0.graphql.user.edge_owner_to_timeline_media.edges",
            "items",
        ]
    }

    fn item_from(&self, node: &Value, ctx: &ExtractContext<'_>) -> Option<ContentItem> {
        if !MEDIA_MARKERS.iter().any(|k| node.get(*k).is_some()) {
            return None;
        }
        let code = string_at(node, &["shortcode", "code"]).filter(|c| SHORTCODE_RE.is_match(c))?;

        let is_clip = node.get("product_type").and_then(Value::as_str) == Some("clips");
        let kind = if is_clip { "reel" } else { "p" };

        Some(ContentItem {
            url: format!("{PUBLIC_BASE}/{kind}/{code}/"),
            caption: string_at(
                node,
                &["edge_media_to_caption.edges.0.node.text", "caption", "accessibility_caption"],
            ),
            thumbnail_url: string_at(
                node,
                &["display_url", "thumbnail_src", "image_versions2.candidates.0.url"],
            ),
            metrics: ContentMetrics {
                views: count_at(
                    node,
                    &["video_view_count", "play_count", "view_count", "video_play_count"],
                )
                .unwrap_or(0),
                likes: count_at(
                    node,
                    &["edge_liked_by.count", "edge_media_preview_like.count", "like_count"],
                )
                .unwrap_or(0),
                comments: count_at(node, &["edge_media_to_comment.count", "comment_count"])
                    .unwrap_or(0),
                shares: None,
            },
            published_at: timestamp_at(node, &["taken_at_timestamp", "taken_at"], ctx.now),
            is_short: is_clip.then_some(true),
            id: code,
        })
    }

    fn profile_from(&self, node: &Value, _ctx: &ExtractContext<'_>) -> Option<ProfileFragment> {
        let username = node.get("username").and_then(Value::as_str)?;
        first_at(node, FOLLOWERS)?;

        Some(ProfileFragment {
            snapshot: ProfileSnapshot {
                username: username.to_string(),
                display_name: string_at(node, &["full_name"]),
                bio: string_at(node, &["biography"]),
                avatar_url: string_at(
                    node,
                    &["profile_pic_url_hd", "hd_profile_pic_url_info.url", "profile_pic_url"],
                ),
                banner_url: None,
                followers: count_at(node, FOLLOWERS).unwrap_or(0),
                following: count_at(node, &["edge_follow.count", "following_count"]).unwrap_or(0),
                total_content_count: count_at(
                    node,
                    &["edge_owner_to_timeline_media.count", "media_count"],
                )
                .unwrap_or(0),
                total_views: 0,
            },
            owner_id: id_at(node, &["id", "pk"]),
            pagination_key: None,
        })
    }

    fn page_signal(&self, payload: &Value, _ctx: &ExtractContext<'_>) -> PageSignal {
        if let Some(info) = find_key(payload, &["page_info"], SIGNAL_DEPTH) {
            return PageSignal {
                next_cursor: string_at(info, &["end_cursor"]),
                has_more: bool_at(info, &["has_next_page"]),
            };
        }
        PageSignal {
            next_cursor: id_at(payload, &["next_max_id"]),
            has_more: bool_at(payload, &["more_available"]),
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

    fn edge(code: &str, likes: u64) -> Value {
        json!({"node": {
            "__typename": "GraphImage",
            "shortcode": code,
            "display_url": format!("https://scontent.example/{code}.jpg"),
            "taken_at_timestamp": 1_700_000_000,
            "edge_liked_by": {"count": likes},
            "edge_media_to_comment": {"count": 3},
            "edge_media_to_caption": {"edges": [{"node": {"text": "sunset"}}]},
        }})
    }

    #[test]
    fn web_profile_info_yields_profile_items_and_cursor() {
        let payload = json!({
            "data": {"user": {
                "id": "1234567",
                "username": "creator1",
                "full_name": "Creator One",
                "biography": "bio",
                "profile_pic_url_hd": "https://scontent.example/pic.jpg",
                "edge_followed_by": {"count": 5400},
                "edge_follow": {"count": 12},
                "edge_owner_to_timeline_media": {
                    "count": 78,
                    "page_info": {"has_next_page": true, "end_cursor": "QVFC"},
                    "edges": [edge("Cabc123", 10), edge("Cdef456", 20), edge("Cabc123", 10)],
                },
            }},
            "status": "ok",
        });

        let out = extract(&payload, &InstagramShapes, &ctx());

        let profile = out.profile.expect("profile");
        assert_eq!(profile.followers, 5400);
        assert_eq!(profile.following, 12);
        assert_eq!(profile.total_content_count, 78);
        assert_eq!(out.owner_id.as_deref(), Some("1234567"));
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.items[0].url, "https://www.instagram.com/p/Cabc123/");
        assert_eq!(out.items[0].caption.as_deref(), Some("sunset"));
        assert_eq!(out.items[1].metrics.likes, 20);
        assert_eq!(out.signal.next_cursor.as_deref(), Some("QVFC"));
        assert_eq!(out.signal.has_more, Some(true));
    }

    #[test]
    fn feed_api_items_and_clips() {
        let payload = json!({
            "items": [{
                "pk": "3100000000000000001",
                "code": "DXyz987",
                "media_type": 2,
                "product_type": "clips",
                "taken_at": 1_700_000_000,
                "play_count": 15000,
                "like_count": 900,
                "comment_count": 40,
                "caption": {"text": "reel time"},
                "user": {"username": "creator1"},
            }],
            "next_max_id": "3100000000000000001_1234567",
            "more_available": false,
        });

        let out = extract(&payload, &InstagramShapes, &ctx());

        assert_eq!(out.items.len(), 1);
        let reel = &out.items[0];
        assert_eq!(reel.url, "https://www.instagram.com/reel/DXyz987/");
        assert_eq!(reel.is_short, Some(true));
        assert_eq!(reel.metrics.views, 15000);
        assert_eq!(reel.caption.as_deref(), Some("reel time"));
        assert_eq!(out.signal.has_more, Some(false));
        assert!(out.profile.is_none());
    }

    #[test]
    fn shortcode_without_media_markers_is_ignored() {
        let payload = json!({"links": [{"shortcode": "Cabc123", "href": "/p/Cabc123/"}]});
        assert!(extract(&payload, &InstagramShapes, &ctx()).items.is_empty());
    }

    #[test]
    fn commenter_without_counts_is_not_a_profile() {
        let payload = json!({"owner": {"username": "creator1", "id": "1"}});
        assert!(extract(&payload, &InstagramShapes, &ctx()).profile.is_none());
    }
}
