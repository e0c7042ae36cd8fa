//! Instagram: `web_profile_info`, the page's `_sharedData`/JSON scripts, then
//! Open Graph tags. Later pages come from the GraphQL timeline query or the
//! private feed API, both keyed by the numeric user id.

mod shapes;

use std::fmt;
use std::sync::LazyLock;

use creatordb_core::{AccountIdentity, Platform};
use regex::Regex;
use serde_json::{json, Value};

pub use shapes::InstagramShapes;

use super::{encode, labeled_counts, trim_base, OpenGraph};
use crate::engine::{PlatformEngine, Session};
use crate::error::HarvestError;
use crate::extract::RecordShapes;
use crate::fields::get_path;
use crate::html::{application_json_scripts, assigned_json};
use crate::identity::Target;

/// Public web client app id the site sends with its own XHRs.
const WEB_APP_ID: &str = "936619743392459";
/// Persisted GraphQL query for a user's timeline media.
const TIMELINE_QUERY_HASH: &str = "69cba40317214236af40e7efa697781d";
const PAGE_SIZE: u32 = 12;

static TITLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(@[^)]+\)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstagramStrategy {
    Api,
    Embedded,
    Meta,
    GraphQl,
    FeedApi,
}

impl fmt::Display for InstagramStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstagramStrategy::Api => "api",
            InstagramStrategy::Embedded => "embedded",
            InstagramStrategy::Meta => "meta",
            InstagramStrategy::GraphQl => "graphql",
            InstagramStrategy::FeedApi => "feed_api",
        })
    }
}

const PROFILE: &[InstagramStrategy] = &[
    InstagramStrategy::Api,
    InstagramStrategy::Embedded,
    InstagramStrategy::Meta,
];
const PAGES: &[InstagramStrategy] = &[InstagramStrategy::GraphQl, InstagramStrategy::FeedApi];

#[derive(Debug, Clone)]
pub struct InstagramEngine {
    base_url: String,
}

impl InstagramEngine {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: trim_base(base_url),
        }
    }

    fn profile_url(&self, handle: &str) -> String {
        format!("{}/{handle}/", self.base_url)
    }

    async fn get_api(&self, url: &str, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let referer = self.profile_url(handle);
        let headers = [
            ("Accept", "application/json"),
            ("X-IG-App-ID", WEB_APP_ID),
            ("X-Requested-With", "XMLHttpRequest"),
            ("Referer", referer.as_str()),
        ];
        session.fetcher.get_json(url, &headers).await
    }

    async fn web_profile_info(&self, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = format!(
            "{}/api/v1/users/web_profile_info/?username={}",
            self.base_url,
            encode(handle)
        );
        let payload = self.get_api(&url, handle, session).await?;
        if get_path(&payload, "data.user").is_some_and(Value::is_null) {
            return Err(HarvestError::NotFound { url });
        }
        Ok(payload)
    }

    async fn embedded_state(&self, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = self.profile_url(handle);
        let html = session.page_html(&url).await?;
        if let Some(shared) = assigned_json(&html, "_sharedData") {
            return Ok(shared);
        }
        let scripts = application_json_scripts(&html);
        if scripts.is_empty() {
            return Err(HarvestError::unrecognized(format!("page state in {url}")));
        }
        Ok(Value::Array(scripts))
    }

    /// Builds a GraphQL-user-shaped record from
    /// `"1,234 Followers, 56 Following, 78 Posts - ..."`.
    async fn meta_profile(&self, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = self.profile_url(handle);
        let html = session.page_html(&url).await?;
        let og = OpenGraph::from_html(&html);
        let counts = og.description.as_deref().map(labeled_counts).unwrap_or_default();
        if !counts.contains_key("followers") {
            return Err(HarvestError::unrecognized(format!("meta tags in {url}")));
        }

        let full_name = og
            .title
            .as_deref()
            .and_then(|t| TITLE_NAME_RE.captures(t))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        Ok(json!({
            "user": {
                "username": handle,
                "full_name": full_name,
                "profile_pic_url": og.image,
                "edge_followed_by": {"count": counts.get("followers")},
                "edge_follow": {"count": counts.get("following")},
                "edge_owner_to_timeline_media": {"count": counts.get("posts")},
            }
        }))
    }

    fn graphql_url(&self, user_id: &str, token: Option<&str>) -> String {
        let mut variables = json!({"id": user_id, "first": PAGE_SIZE});
        if let Some(after) = token {
            variables["after"] = Value::String(after.to_string());
        }
        format!(
            "{}/graphql/query/?query_hash={TIMELINE_QUERY_HASH}&variables={}",
            self.base_url,
            encode(&variables.to_string())
        )
    }

    fn feed_url(&self, user_id: &str, token: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/v1/feed/user/{}/?count={PAGE_SIZE}",
            self.base_url,
            encode(user_id)
        );
        if let Some(max_id) = token {
            url.push_str("&max_id=");
            url.push_str(&encode(max_id));
        }
        url
    }

    /// Each page endpoint only continues its own kind of cursor.
    fn page_url(
        &self,
        strategy: InstagramStrategy,
        user_id: &str,
        token: Option<&str>,
    ) -> Result<String, HarvestError> {
        let feed_token = token.is_some_and(is_feed_max_id);
        match strategy {
            InstagramStrategy::GraphQl if feed_token => Err(HarvestError::unrecognized(
                "graphql cannot continue a feed max_id",
            )),
            InstagramStrategy::GraphQl => Ok(self.graphql_url(user_id, token)),
            InstagramStrategy::FeedApi if token.is_some() && !feed_token => Err(
                HarvestError::unrecognized("feed api cannot continue a graphql cursor"),
            ),
            InstagramStrategy::FeedApi => Ok(self.feed_url(user_id, token)),
            _ => Err(HarvestError::unrecognized(format!(
                "{strategy} is a profile strategy"
            ))),
        }
    }
}

/// Feed `max_id`s look like `<media pk>_<user id>`; GraphQL cursors are
/// opaque base64.
fn is_feed_max_id(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit() || b == b'_')
}

impl PlatformEngine for InstagramEngine {
    type Strategy = InstagramStrategy;

    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn shapes(&self) -> &dyn RecordShapes {
        &InstagramShapes
    }

    fn profile_strategies(&self, _identity: &AccountIdentity) -> &'static [InstagramStrategy] {
        PROFILE
    }

    fn page_strategies(&self, identity: &AccountIdentity) -> &'static [InstagramStrategy] {
        if identity.is_resolved() {
            PAGES
        } else {
            &[]
        }
    }

    /// Every profile strategy is keyed by handle; the numeric id comes back
    /// with the profile payload.
    async fn resolve(
        &self,
        target: &Target,
        known: Option<&AccountIdentity>,
        _session: &Session<'_>,
    ) -> AccountIdentity {
        let handle = target.key();
        match known.filter(|k| k.is_resolved()) {
            Some(known) => AccountIdentity {
                handle: handle.to_string(),
                ..known.clone()
            },
            None => AccountIdentity::unresolved(Platform::Instagram, handle),
        }
    }

    async fn fetch_profile(
        &self,
        strategy: InstagramStrategy,
        identity: &AccountIdentity,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        let handle = identity.handle.as_str();
        match strategy {
            InstagramStrategy::Api => self.web_profile_info(handle, session).await,
            InstagramStrategy::Embedded => self.embedded_state(handle, session).await,
            InstagramStrategy::Meta => self.meta_profile(handle, session).await,
            InstagramStrategy::GraphQl | InstagramStrategy::FeedApi => {
                Err(HarvestError::unrecognized(format!("{strategy} is a page strategy")))
            }
        }
    }

    async fn fetch_page(
        &self,
        strategy: InstagramStrategy,
        identity: &AccountIdentity,
        token: Option<&str>,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        if !identity.is_resolved() {
            return Err(HarvestError::Unresolved {
                handle: identity.handle.clone(),
            });
        }
        let url = self.page_url(strategy, &identity.resolved_id, token)?;
        self.get_api(&url, &identity.handle, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_url_encodes_variables() {
        let engine = InstagramEngine::new("https://www.instagram.com");
        let url = engine.graphql_url("1234567", Some("QVFC"));
        assert!(url.starts_with(
            "https://www.instagram.com/graphql/query/?query_hash=69cba40317214236af40e7efa697781d&variables="
        ));
        assert!(url.contains("%22after%22%3A%22QVFC%22"));
        assert!(url.contains("%22first%22%3A12"));
    }

    #[test]
    fn feed_url_omits_max_id_on_first_page() {
        let engine = InstagramEngine::new("http://127.0.0.1:9000/");
        assert_eq!(
            engine.feed_url("1234567", None),
            "http://127.0.0.1:9000/api/v1/feed/user/1234567/?count=12"
        );
        assert!(engine.feed_url("1", Some("a_b")).ends_with("&max_id=a_b"));
    }

    #[test]
    fn page_endpoints_only_continue_their_own_cursors() {
        let engine = InstagramEngine::new("https://www.instagram.com");
        let feed_id = "3100000000000000001_1234567";

        assert!(engine
            .page_url(InstagramStrategy::FeedApi, "1234567", Some("QVFC"))
            .is_err());
        assert!(engine
            .page_url(InstagramStrategy::GraphQl, "1234567", Some(feed_id))
            .is_err());

        let feed = engine
            .page_url(InstagramStrategy::FeedApi, "1234567", Some(feed_id))
            .unwrap();
        assert!(feed.ends_with(&format!("&max_id={feed_id}")));
        assert!(engine
            .page_url(InstagramStrategy::GraphQl, "1234567", Some("QVFC"))
            .unwrap()
            .contains("%22after%22%3A%22QVFC%22"));
        assert!(engine
            .page_url(InstagramStrategy::FeedApi, "1234567", None)
            .is_ok());
        assert!(engine
            .page_url(InstagramStrategy::Api, "1234567", None)
            .is_err());
    }

    #[test]
    fn pagination_needs_the_numeric_id() {
        let engine = InstagramEngine::new("https://www.instagram.com");
        let mut identity = AccountIdentity::unresolved(Platform::Instagram, "creator1");
        assert!(engine.page_strategies(&identity).is_empty());
        identity.resolved_id = "1234567".to_string();
        assert_eq!(engine.page_strategies(&identity), PAGES);
    }
}
