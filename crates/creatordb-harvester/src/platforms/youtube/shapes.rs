use std::sync::LazyLock;

use creatordb_core::{ContentItem, ContentMetrics, ProfileSnapshot};
use regex::Regex;
use serde_json::Value;

use crate::extract::{ExtractContext, PageSignal, ProfileFragment, RecordShapes};
use crate::fields::{count_at, first_at, get_path, string_at, text_of, timestamp_at};
use crate::normalize::{parse_count, parse_duration_secs};
use crate::walk::find_key;

static VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

const PUBLIC_BASE: &str = "https://www.youtube.com";

/// Longest video still counted as a short.
const SHORT_MAX_SECS: u64 = 60;

const VIEWS: &[&str] = &[
    "viewCountText",
    "shortViewCountText",
    "group.community.statistics.@views",
    "overlayMetadata.secondaryText.content",
];

/// Video renderers (`videoRenderer`, `gridVideoRenderer`, `reelItemRenderer`,
/// `shortsLockupViewModel`), channel headers and metadata from
/// `ytInitialData`/`browse` responses, and feed entries converted from RSS.
#[derive(Debug, Clone, Copy, Default)]
pub struct YouTubeShapes;

fn valid_id(id: String) -> Option<String> {
    VIDEO_ID_RE.is_match(&id).then_some(id)
}

fn thumbnail(node: &Value) -> Option<String> {
    string_at(
        node,
        &[
            "thumbnail.thumbnails.0.url",
            "thumbnail.sources.0.url",
            "group.thumbnail.@url",
        ],
    )
}

/// `shortsLockupViewModel`: id under the tap command, title and views in
/// the overlay.
fn shorts_lockup(node: &Value) -> Option<ContentItem> {
    let id = string_at(
        node,
        &["onTap.innertubeCommand.reelWatchEndpoint.videoId"],
    )
    .or_else(|| {
        node.get("entityId")
            .and_then(Value::as_str)
            .and_then(|e| e.strip_prefix("shorts-shelf-item-"))
            .map(str::to_owned)
    })
    .and_then(valid_id)?;
    let overlay = node.get("overlayMetadata")?;
    Some(ContentItem {
        url: format!("{PUBLIC_BASE}/shorts/{id}"),
        caption: string_at(overlay, &["primaryText.content"]),
        thumbnail_url: thumbnail(node),
        metrics: ContentMetrics {
            views: count_at(overlay, &["secondaryText.content"]).unwrap_or(0),
            ..ContentMetrics::default()
        },
        published_at: None,
        is_short: Some(true),
        id,
    })
}

impl RecordShapes for YouTubeShapes {
    fn item_containers(&self) -> &'static [&'static str] {
        &["feed.entry"]
    }

    fn item_from(&self, node: &Value, ctx: &ExtractContext<'_>) -> Option<ContentItem> {
        if node.get("overlayMetadata").is_some() {
            return shorts_lockup(node);
        }

        let id = node
            .get("videoId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .and_then(valid_id)?;
        let title = string_at(node, &["title", "headline"])?;
        let has_listing_fields = first_at(
            node,
            &[
                "viewCountText",
                "shortViewCountText",
                "lengthText",
                "publishedTimeText",
                "published",
            ],
        )
        .is_some();
        if !has_listing_fields {
            return None;
        }

        let reel = node.get("headline").is_some();
        let length_secs = node
            .get("lengthText")
            .and_then(text_of)
            .and_then(|t| parse_duration_secs(&t));
        let is_short = if reel {
            Some(true)
        } else {
            length_secs.map(|secs| secs <= SHORT_MAX_SECS)
        };
        let url = if is_short == Some(true) {
            format!("{PUBLIC_BASE}/shorts/{id}")
        } else {
            format!("{PUBLIC_BASE}/watch?v={id}")
        };

        Some(ContentItem {
            url,
            caption: Some(title),
            thumbnail_url: thumbnail(node),
            metrics: ContentMetrics {
                views: count_at(node, VIEWS).unwrap_or(0),
                likes: count_at(node, &["group.community.starRating.@count"]).unwrap_or(0),
                comments: 0,
                shares: None,
            },
            published_at: timestamp_at(node, &["published", "publishedTimeText"], ctx.now),
            is_short,
            id,
        })
    }

    fn profile_from(&self, node: &Value, _ctx: &ExtractContext<'_>) -> Option<ProfileFragment> {
        // metadata.channelMetadataRenderer
        if let Some(external_id) = node.get("externalId").and_then(Value::as_str) {
            return Some(ProfileFragment {
                snapshot: ProfileSnapshot {
                    display_name: string_at(node, &["title"]),
                    bio: string_at(node, &["description"]),
                    avatar_url: string_at(node, &["avatar.thumbnails.0.url"]),
                    ..ProfileSnapshot::default()
                },
                owner_id: Some(external_id.to_string()),
                pagination_key: None,
            });
        }

        // c4TabbedHeaderRenderer and aboutChannelViewModel
        if first_at(node, &["subscriberCountText", "videosCountText", "videoCountText"]).is_some() {
            return Some(ProfileFragment {
                snapshot: ProfileSnapshot {
                    display_name: string_at(node, &["title"]),
                    bio: string_at(node, &["description"]),
                    avatar_url: string_at(node, &["avatar.thumbnails.0.url"]),
                    banner_url: string_at(node, &["banner.thumbnails.0.url"]),
                    followers: count_at(node, &["subscriberCountText"]).unwrap_or(0),
                    total_content_count: count_at(node, &["videosCountText", "videoCountText"])
                        .unwrap_or(0),
                    total_views: count_at(node, &["viewCountText"]).unwrap_or(0),
                    ..ProfileSnapshot::default()
                },
                owner_id: string_at(node, &["channelId"]),
                pagination_key: None,
            });
        }

        // pageHeaderViewModel: counts live in metadata rows as free text.
        if let Some(Value::Array(rows)) = node.get("metadataRows") {
            let mut snapshot = ProfileSnapshot::default();
            let parts = rows
                .iter()
                .filter_map(|row| row.get("metadataParts").and_then(Value::as_array))
                .flatten()
                .filter_map(|part| get_path(part, "text.content").and_then(Value::as_str));
            for text in parts {
                let lower = text.to_ascii_lowercase();
                if lower.contains("subscriber") {
                    snapshot.followers = parse_count(text);
                } else if lower.contains("video") {
                    snapshot.total_content_count = parse_count(text);
                }
            }
            if snapshot.followers > 0 || snapshot.total_content_count > 0 {
                return Some(ProfileFragment {
                    snapshot,
                    ..ProfileFragment::default()
                });
            }
        }

        // Atom feed root: channel title and id.
        if node.get("entry").is_some() || node.get("author").is_some_and(|a| a.get("name").is_some()) {
            if let Some(channel_id) = string_at(node, &["channelId"]) {
                return Some(ProfileFragment {
                    snapshot: ProfileSnapshot {
                        display_name: string_at(node, &["title", "author.name"]),
                        ..ProfileSnapshot::default()
                    },
                    owner_id: Some(channel_id),
                    pagination_key: None,
                });
            }
        }
        None
    }

    fn page_signal(&self, payload: &Value, ctx: &ExtractContext<'_>) -> PageSignal {
        let token = find_key(payload, &["continuationCommand"], ctx.max_depth)
            .and_then(|c| string_at(c, &["token"]))
            .or_else(|| {
                find_key(payload, &["nextContinuationData"], ctx.max_depth)
                    .and_then(|c| string_at(c, &["continuation"]))
            });
        PageSignal {
            next_cursor: token,
            has_more: None,
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
            max_depth: 40,
            now: Utc::now(),
        }
    }

    fn video_renderer(id: &str, views: &str, length: &str) -> Value {
        json!({"richItemRenderer": {"content": {"videoRenderer": {
            "videoId": id,
            "title": {"runs": [{"text": "Video "}, {"text": id}]},
            "viewCountText": {"simpleText": views},
            "lengthText": {"simpleText": length},
            "publishedTimeText": {"simpleText": "2 weeks ago"},
            "thumbnail": {"thumbnails": [{"url": format!("https://i.ytimg.com/vi/{id}/hq.jpg")}]},
            "ownerText": {"runs": [{"text": "Channel"}]},
        }}}})
    }

    #[test]
    fn initial_data_yields_videos_profile_and_continuation() {
        let payload = json!({
            "contents": {"twoColumnBrowseResultsRenderer": {"tabs": [{"tabRenderer": {"content": {
                "richGridRenderer": {"contents": [
                    video_renderer("dQw4w9WgXcQ", "1,234,567 views", "3:32"),
                    video_renderer("aaaaaaaaaaa", "12K views", "0:45"),
                    {"continuationItemRenderer": {"continuationEndpoint": {
                        "continuationCommand": {"token": "4qmFsgKrCBIYVUN", "request": "CONTINUATION_REQUEST_TYPE_BROWSE"}
                    }}},
                ]}
            }}}]}},
            "header": {"c4TabbedHeaderRenderer": {
                "channelId": "UCabcdefghijklmnopqrstuv",
                "title": "Channel",
                "subscriberCountText": {"simpleText": "1.2M subscribers"},
                "videosCountText": {"runs": [{"text": "345"}, {"text": " videos"}]},
                "banner": {"thumbnails": [{"url": "https://yt3.example/banner.jpg"}]},
            }},
            "metadata": {"channelMetadataRenderer": {
                "externalId": "UCabcdefghijklmnopqrstuv",
                "title": "Channel",
                "description": "About the channel",
                "avatar": {"thumbnails": [{"url": "https://yt3.example/avatar.jpg"}]},
            }},
        });

        let out = extract(&payload, &YouTubeShapes, &ctx());

        assert_eq!(out.items.len(), 2);
        let long = &out.items[0];
        assert_eq!(long.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(long.metrics.views, 1_234_567);
        assert_eq!(long.is_short, Some(false));
        assert_eq!(long.caption.as_deref(), Some("Video dQw4w9WgXcQ"));
        assert!(long.published_at.is_some());
        let short = &out.items[1];
        assert_eq!(short.is_short, Some(true));
        assert_eq!(short.url, "https://www.youtube.com/shorts/aaaaaaaaaaa");
        assert_eq!(short.metrics.views, 12_000);

        let profile = out.profile.expect("profile");
        assert_eq!(profile.username, "creator1");
        assert_eq!(profile.followers, 1_200_000);
        assert_eq!(profile.total_content_count, 345);
        assert_eq!(profile.bio.as_deref(), Some("About the channel"));
        assert_eq!(profile.banner_url.as_deref(), Some("https://yt3.example/banner.jpg"));
        assert_eq!(out.owner_id.as_deref(), Some("UCabcdefghijklmnopqrstuv"));
        assert_eq!(out.signal.next_cursor.as_deref(), Some("4qmFsgKrCBIYVUN"));
    }

    #[test]
    fn shorts_lockup_view_model() {
        let payload = json!({"richItemRenderer": {"content": {"shortsLockupViewModel": {
            "entityId": "shorts-shelf-item-bbbbbbbbbbb",
            "overlayMetadata": {
                "primaryText": {"content": "A short"},
                "secondaryText": {"content": "3.4M views"},
            },
        }}}});

        let out = extract(&payload, &YouTubeShapes, &ctx());

        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].id, "bbbbbbbbbbb");
        assert_eq!(out.items[0].metrics.views, 3_400_000);
        assert_eq!(out.items[0].is_short, Some(true));
    }

    #[test]
    fn page_header_view_model_rows() {
        let payload = json!({"pageHeaderViewModel": {"metadata": {"contentMetadataViewModel": {
            "metadataRows": [
                {"metadataParts": [{"text": {"content": "@creator1"}}]},
                {"metadataParts": [
                    {"text": {"content": "56.7K subscribers"}},
                    {"text": {"content": "89 videos"}},
                ]},
            ]
        }}}});

        let profile = extract(&payload, &YouTubeShapes, &ctx()).profile.expect("profile");
        assert_eq!(profile.followers, 56_700);
        assert_eq!(profile.total_content_count, 89);
    }

    #[test]
    fn bare_watch_endpoints_are_not_videos() {
        let payload = json!({"navigationEndpoint": {"watchEndpoint": {"videoId": "dQw4w9WgXcQ"}}});
        assert!(extract(&payload, &YouTubeShapes, &ctx()).items.is_empty());
    }

    #[test]
    fn next_continuation_data_fallback() {
        let payload = json!({"continuations": [{"nextContinuationData": {"continuation": "abc"}}]});
        assert_eq!(
            YouTubeShapes.page_signal(&payload, &ctx()).next_cursor.as_deref(),
            Some("abc")
        );
    }
}
