//! YouTube: the innertube `browse` endpoint, `ytInitialData` in the channel's
//! videos page, the public Atom feed, then Open Graph tags. Later pages are
//! `browse` continuations.

mod rss;
mod shapes;

use std::fmt;
use std::sync::LazyLock;

use creatordb_core::{AccountIdentity, Platform};
use regex::Regex;
use serde_json::{json, Value};

pub use rss::xml_to_value;
pub use shapes::YouTubeShapes;

use super::{encode, labeled_counts, trim_base, OpenGraph};
use crate::engine::{PlatformEngine, Session};
use crate::error::HarvestError;
use crate::extract::RecordShapes;
use crate::html::assigned_json;
use crate::identity::{is_channel_id, Target};
use crate::normalize::parse_count;

const CLIENT_NAME: &str = "WEB";
const CLIENT_VERSION: &str = "2.20240101.00.00";
/// `browse` params selecting the channel's Videos tab.
const VIDEOS_TAB_PARAMS: &str = "EgZ2aWRlb3PyBgQKAjoA";

/// Channel id patterns in a handle page, most specific first.
static CHANNEL_ID_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""externalId"\s*:\s*"(UC[A-Za-z0-9_-]{22})""#,
        r#"<meta[^>]+itemprop="(?:channelId|identifier)"[^>]+content="(UC[A-Za-z0-9_-]{22})""#,
        r#"<link[^>]+rel="canonical"[^>]+href="[^"]*/channel/(UC[A-Za-z0-9_-]{22})""#,
        r#""browseId"\s*:\s*"(UC[A-Za-z0-9_-]{22})""#,
        r#""channelId"\s*:\s*"(UC[A-Za-z0-9_-]{22})""#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid channel id regex"))
    .collect()
});

static SUBSCRIBERS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*\s*[KMB]?)\s+subscribers").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeStrategy {
    Browse,
    Embedded,
    Rss,
    Meta,
    Continuation,
}

impl fmt::Display for YouTubeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            YouTubeStrategy::Browse => "browse",
            YouTubeStrategy::Embedded => "embedded",
            YouTubeStrategy::Rss => "rss",
            YouTubeStrategy::Meta => "meta",
            YouTubeStrategy::Continuation => "continuation",
        })
    }
}

const PROFILE_RESOLVED: &[YouTubeStrategy] = &[
    YouTubeStrategy::Browse,
    YouTubeStrategy::Embedded,
    YouTubeStrategy::Rss,
    YouTubeStrategy::Meta,
];
const PROFILE_BY_HANDLE: &[YouTubeStrategy] = &[YouTubeStrategy::Meta];
const PAGES: &[YouTubeStrategy] = &[YouTubeStrategy::Continuation];

#[derive(Debug, Clone)]
pub struct YouTubeEngine {
    base_url: String,
}

/// First channel id a handle page mentions.
fn channel_id_from_html(html: &str) -> Option<String> {
    CHANNEL_ID_RES.iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn client_context() -> Value {
    json!({
        "client": {
            "clientName": CLIENT_NAME,
            "clientVersion": CLIENT_VERSION,
            "hl": "en",
            "gl": "US",
        }
    })
}

fn browse_body(channel_id: &str, continuation: Option<&str>) -> Value {
    match continuation {
        Some(token) => json!({"context": client_context(), "continuation": token}),
        None => json!({
            "context": client_context(),
            "browseId": channel_id,
            "params": VIDEOS_TAB_PARAMS,
        }),
    }
}

impl YouTubeEngine {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: trim_base(base_url),
        }
    }

    fn handle_url(&self, handle: &str) -> String {
        format!("{}/@{handle}", self.base_url)
    }

    /// The page Open Graph tags are read from: the handle page when there is
    /// a handle, the channel page otherwise.
    fn landing_url(&self, identity: &AccountIdentity) -> String {
        if is_channel_id(&identity.handle) {
            format!("{}/channel/{}", self.base_url, identity.handle)
        } else {
            self.handle_url(&identity.handle)
        }
    }

    async fn browse(
        &self,
        channel_id: &str,
        continuation: Option<&str>,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        let url = format!("{}/youtubei/v1/browse?prettyPrint=false", self.base_url);
        let headers = [
            ("X-YouTube-Client-Name", "1"),
            ("X-YouTube-Client-Version", CLIENT_VERSION),
            ("Origin", self.base_url.as_str()),
        ];
        session
            .fetcher
            .post_json(&url, &headers, &browse_body(channel_id, continuation))
            .await
    }

    async fn embedded_state(&self, channel_id: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = format!("{}/channel/{channel_id}/videos", self.base_url);
        let html = session.page_html(&url).await?;
        assigned_json(&html, "ytInitialData")
            .ok_or_else(|| HarvestError::unrecognized(format!("ytInitialData in {url}")))
    }

    async fn feed(&self, channel_id: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = format!(
            "{}/feeds/videos.xml?channel_id={}",
            self.base_url,
            encode(channel_id)
        );
        let xml = session.fetcher.get_text(&url, &[]).await?;
        xml_to_value(&xml)
    }

    /// Builds a channel-header-shaped record from Open Graph tags and the
    /// first "N subscribers" label on the page.
    async fn meta_profile(&self, identity: &AccountIdentity, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = self.landing_url(identity);
        let html = session.page_html(&url).await?;
        let og = OpenGraph::from_html(&html);
        let subscribers = og
            .description
            .as_deref()
            .map(labeled_counts)
            .and_then(|counts| counts.get("subscribers").copied())
            .or_else(|| {
                SUBSCRIBERS_RE
                    .captures(&html)
                    .and_then(|c| c.get(1))
                    .map(|m| parse_count(m.as_str()))
            });
        let Some(subscribers) = subscribers else {
            return Err(HarvestError::unrecognized(format!("meta tags in {url}")));
        };

        let mut payload = json!({
            "header": {"c4TabbedHeaderRenderer": {
                "title": og.title,
                "description": og.description,
                "avatar": {"thumbnails": [{"url": og.image}]},
                "subscriberCountText": subscribers,
            }}
        });
        if identity.is_resolved() {
            payload["header"]["c4TabbedHeaderRenderer"]["channelId"] =
                Value::String(identity.resolved_id.clone());
        }
        Ok(payload)
    }
}

impl PlatformEngine for YouTubeEngine {
    type Strategy = YouTubeStrategy;

    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn shapes(&self) -> &dyn RecordShapes {
        &YouTubeShapes
    }

    fn profile_strategies(&self, identity: &AccountIdentity) -> &'static [YouTubeStrategy] {
        if identity.is_resolved() {
            PROFILE_RESOLVED
        } else {
            PROFILE_BY_HANDLE
        }
    }

    fn page_strategies(&self, identity: &AccountIdentity) -> &'static [YouTubeStrategy] {
        if identity.is_resolved() {
            PAGES
        } else {
            &[]
        }
    }

    async fn resolve(
        &self,
        target: &Target,
        known: Option<&AccountIdentity>,
        session: &Session<'_>,
    ) -> AccountIdentity {
        let handle = target.key();
        if let Target::ChannelId(id) = target {
            return AccountIdentity {
                resolved_id: id.clone(),
                ..AccountIdentity::unresolved(Platform::YouTube, handle)
            };
        }
        if let Some(known) = known.filter(|k| k.is_resolved()) {
            return AccountIdentity {
                handle: handle.to_string(),
                ..known.clone()
            };
        }

        let mut identity = AccountIdentity::unresolved(Platform::YouTube, handle);
        match session.page_html(&self.handle_url(handle)).await {
            Ok(html) => match channel_id_from_html(&html) {
                Some(id) => identity.resolved_id = id,
                None => tracing::debug!(handle, "no channel id in handle page"),
            },
            Err(e) => tracing::debug!(handle, error = %e, "handle page fetch failed during resolution"),
        }
        identity
    }

    async fn fetch_profile(
        &self,
        strategy: YouTubeStrategy,
        identity: &AccountIdentity,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        let channel_id = identity.resolved_id.as_str();
        if channel_id.is_empty() && strategy != YouTubeStrategy::Meta {
            return Err(HarvestError::Unresolved {
                handle: identity.handle.clone(),
            });
        }
        match strategy {
            YouTubeStrategy::Browse => self.browse(channel_id, None, session).await,
            YouTubeStrategy::Embedded => self.embedded_state(channel_id, session).await,
            YouTubeStrategy::Rss => self.feed(channel_id, session).await,
            YouTubeStrategy::Meta => self.meta_profile(identity, session).await,
            YouTubeStrategy::Continuation => {
                Err(HarvestError::unrecognized(format!("{strategy} is a page strategy")))
            }
        }
    }

    /// Without a token this is the first videos page, the same request the
    /// `browse` profile strategy makes.
    async fn fetch_page(
        &self,
        strategy: YouTubeStrategy,
        identity: &AccountIdentity,
        token: Option<&str>,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        if !identity.is_resolved() {
            return Err(HarvestError::Unresolved {
                handle: identity.handle.clone(),
            });
        }
        match strategy {
            YouTubeStrategy::Continuation => self.browse(&identity.resolved_id, token, session).await,
            _ => Err(HarvestError::unrecognized(format!("{strategy} is a profile strategy"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "UCabcdefghijklmnopqrstuv";

    #[test]
    fn channel_id_from_initial_data() {
        let html = format!(r#"<script>var ytInitialData = {{"metadata":{{"channelMetadataRenderer":{{"externalId":"{CHANNEL}"}}}}}};</script>"#);
        assert_eq!(channel_id_from_html(&html).as_deref(), Some(CHANNEL));
    }

    #[test]
    fn channel_id_from_meta_and_canonical_link() {
        let meta = format!(r#"<meta itemprop="identifier" content="{CHANNEL}">"#);
        assert_eq!(channel_id_from_html(&meta).as_deref(), Some(CHANNEL));

        let link = format!(r#"<link rel="canonical" href="https://www.youtube.com/channel/{CHANNEL}">"#);
        assert_eq!(channel_id_from_html(&link).as_deref(), Some(CHANNEL));

        assert_eq!(channel_id_from_html("<html></html>"), None);
    }

    #[test]
    fn browse_body_first_page_and_continuation() {
        let first = browse_body(CHANNEL, None);
        assert_eq!(first["browseId"], CHANNEL);
        assert_eq!(first["params"], VIDEOS_TAB_PARAMS);
        assert_eq!(first["context"]["client"]["clientName"], "WEB");

        let next = browse_body(CHANNEL, Some("4qmF"));
        assert_eq!(next["continuation"], "4qmF");
        assert!(next.get("browseId").is_none());
    }

    #[test]
    fn strategies_depend_on_channel_id() {
        let engine = YouTubeEngine::new("https://www.youtube.com");
        let mut identity = AccountIdentity::unresolved(Platform::YouTube, "creator1");
        assert_eq!(engine.profile_strategies(&identity), PROFILE_BY_HANDLE);
        assert!(engine.page_strategies(&identity).is_empty());
        identity.resolved_id = CHANNEL.to_string();
        assert_eq!(engine.profile_strategies(&identity)[0], YouTubeStrategy::Browse);
        assert_eq!(engine.page_strategies(&identity), PAGES);
    }

    #[test]
    fn landing_url_for_channel_targets() {
        let engine = YouTubeEngine::new("http://127.0.0.1:9000/");
        let by_channel = AccountIdentity::unresolved(Platform::YouTube, CHANNEL);
        assert_eq!(
            engine.landing_url(&by_channel),
            format!("http://127.0.0.1:9000/channel/{CHANNEL}")
        );
        let by_handle = AccountIdentity::unresolved(Platform::YouTube, "creator1");
        assert_eq!(engine.landing_url(&by_handle), "http://127.0.0.1:9000/@creator1");
    }
}
