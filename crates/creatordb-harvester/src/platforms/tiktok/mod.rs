//! TikTok: web API, rehydration state embedded in the profile page, then
//! Open Graph tags.

mod shapes;

use std::fmt;
use std::sync::LazyLock;

use creatordb_core::{AccountIdentity, Platform};
use regex::Regex;
use serde_json::{json, Value};

pub use shapes::TikTokShapes;

use super::{encode, labeled_counts, trim_base, OpenGraph};
use crate::engine::{PlatformEngine, Session};
use crate::error::HarvestError;
use crate::extract::RecordShapes;
use crate::html::{assigned_json, script_json_by_id, unescape_json_fragment};
use crate::identity::Target;
use crate::walk::find_key;

/// Page-state script ids, newest layout first.
const STATE_SCRIPT_IDS: &[&str] = &["__UNIVERSAL_DATA_FOR_REHYDRATION__", "SIGI_STATE", "__NEXT_DATA__"];

/// `statusCode` values TikTok uses for unknown or banned accounts.
const MISSING_ACCOUNT_CODES: &[i64] = &[10202, 10221, 10222];

const PAGE_SIZE: u32 = 30;

static SEC_UID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""secUid"\s*:\s*"([^"]+)""#).expect("valid regex"));
static TITLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(@[^)]+\)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TikTokStrategy {
    /// `/api/user/detail/`, needs the `secUid`.
    Api,
    /// Page-state JSON in the profile HTML.
    Embedded,
    Meta,
    /// `/api/post/item_list/` cursor pagination.
    ItemList,
    /// `/api/creator/item_list/`, an older listing with the same shape.
    CreatorItemList,
}

impl fmt::Display for TikTokStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TikTokStrategy::Api => "api",
            TikTokStrategy::Embedded => "embedded",
            TikTokStrategy::Meta => "meta",
            TikTokStrategy::ItemList => "item_list",
            TikTokStrategy::CreatorItemList => "creator_item_list",
        })
    }
}

#[derive(Debug, Clone)]
pub struct TikTokEngine {
    base_url: String,
}

impl TikTokEngine {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: trim_base(base_url),
        }
    }

    fn profile_url(&self, handle: &str) -> String {
        format!("{}/@{handle}", self.base_url)
    }

    fn api_headers(&self, handle: &str) -> [(&'static str, String); 2] {
        [
            ("Accept", "application/json, text/plain, */*".to_string()),
            ("Referer", self.profile_url(handle)),
        ]
    }

    async fn get_api(&self, url: &str, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let headers = self.api_headers(handle);
        let headers: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let payload = session.fetcher.get_json(url, &headers).await?;
        reject_missing_account(&payload, url)?;
        Ok(payload)
    }

    async fn embedded_state(&self, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = self.profile_url(handle);
        let html = session.page_html(&url).await?;
        let state = STATE_SCRIPT_IDS
            .iter()
            .find_map(|id| script_json_by_id(&html, id))
            .or_else(|| assigned_json(&html, "SIGI_STATE"))
            .ok_or_else(|| HarvestError::unrecognized(format!("page state in {url}")))?;
        reject_missing_account(&state, &url)?;
        Ok(state)
    }

    /// Builds a `userInfo`-shaped record from Open Graph tags.
    async fn meta_profile(&self, handle: &str, session: &Session<'_>) -> Result<Value, HarvestError> {
        let url = self.profile_url(handle);
        let html = session.page_html(&url).await?;
        let og = OpenGraph::from_html(&html);
        let counts = og.description.as_deref().map(labeled_counts).unwrap_or_default();
        if og.is_empty() || !counts.contains_key("followers") {
            return Err(HarvestError::unrecognized(format!("meta tags in {url}")));
        }

        let nickname = og
            .title
            .as_deref()
            .and_then(|t| TITLE_NAME_RE.captures(t))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        Ok(json!({
            "userInfo": {
                "user": {
                    "uniqueId": handle,
                    "nickname": nickname,
                    "avatarLarger": og.image,
                },
                "stats": {
                    "followerCount": counts.get("followers"),
                    "followingCount": counts.get("following"),
                    "videoCount": counts.get("videos"),
                },
            }
        }))
    }

    fn item_list_url(&self, path: &str, sec_uid: &str, token: Option<&str>) -> String {
        format!(
            "{}/api/{path}/?aid=1988&secUid={}&count={PAGE_SIZE}&cursor={}",
            self.base_url,
            encode(sec_uid),
            encode(token.unwrap_or("0")),
        )
    }
}

fn reject_missing_account(payload: &Value, url: &str) -> Result<(), HarvestError> {
    let code = find_key(payload, &["statusCode", "status_code"], 4).and_then(Value::as_i64);
    if code.is_some_and(|c| MISSING_ACCOUNT_CODES.contains(&c)) {
        return Err(HarvestError::NotFound { url: url.to_string() });
    }
    Ok(())
}

/// `secUid` and numeric id from a profile page, structured state first.
fn ids_from_html(html: &str, handle: &str) -> Option<(Option<String>, String)> {
    let state = STATE_SCRIPT_IDS.iter().find_map(|id| script_json_by_id(html, id));
    if let Some(state) = state {
        let fragment = crate::extract::extract(
            &state,
            &TikTokShapes,
            &crate::extract::ExtractContext {
                handle,
                max_depth: 12,
                now: chrono::Utc::now(),
            },
        );
        if let Some(sec_uid) = fragment.pagination_key {
            return Some((fragment.owner_id, sec_uid));
        }
    }
    SEC_UID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| (None, unescape_json_fragment(m.as_str())))
}

const PROFILE_RESOLVED: &[TikTokStrategy] = &[TikTokStrategy::Api, TikTokStrategy::Embedded, TikTokStrategy::Meta];
const PROFILE_BY_HANDLE: &[TikTokStrategy] = &[TikTokStrategy::Embedded, TikTokStrategy::Meta];
const PAGES: &[TikTokStrategy] = &[TikTokStrategy::ItemList, TikTokStrategy::CreatorItemList];

impl PlatformEngine for TikTokEngine {
    type Strategy = TikTokStrategy;

    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn shapes(&self) -> &dyn RecordShapes {
        &TikTokShapes
    }

    fn profile_strategies(&self, identity: &AccountIdentity) -> &'static [TikTokStrategy] {
        if identity.pagination_key.is_some() {
            PROFILE_RESOLVED
        } else {
            PROFILE_BY_HANDLE
        }
    }

    fn page_strategies(&self, identity: &AccountIdentity) -> &'static [TikTokStrategy] {
        if identity.pagination_key.is_some() {
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
        if let Some(known) = known.filter(|k| k.pagination_key.is_some()) {
            return AccountIdentity {
                handle: handle.to_string(),
                ..known.clone()
            };
        }

        let mut identity = AccountIdentity::unresolved(Platform::TikTok, handle);
        match session.page_html(&self.profile_url(handle)).await {
            Ok(html) => {
                if let Some((user_id, sec_uid)) = ids_from_html(&html, handle) {
                    identity.resolved_id = user_id.unwrap_or_else(|| sec_uid.clone());
                    identity.pagination_key = Some(sec_uid);
                } else {
                    tracing::debug!(handle, "no secUid in profile page");
                }
            }
            Err(e) => tracing::debug!(handle, error = %e, "profile page fetch failed during resolution"),
        }
        identity
    }

    async fn fetch_profile(
        &self,
        strategy: TikTokStrategy,
        identity: &AccountIdentity,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        let handle = identity.handle.as_str();
        match strategy {
            TikTokStrategy::Api => {
                let sec_uid = identity.pagination_key.as_deref().unwrap_or_default();
                let url = format!(
                    "{}/api/user/detail/?aid=1988&uniqueId={}&secUid={}",
                    self.base_url,
                    encode(handle),
                    encode(sec_uid),
                );
                self.get_api(&url, handle, session).await
            }
            TikTokStrategy::Embedded => self.embedded_state(handle, session).await,
            TikTokStrategy::Meta => self.meta_profile(handle, session).await,
            TikTokStrategy::ItemList | TikTokStrategy::CreatorItemList => {
                Err(HarvestError::unrecognized(format!("{strategy} is a page strategy")))
            }
        }
    }

    async fn fetch_page(
        &self,
        strategy: TikTokStrategy,
        identity: &AccountIdentity,
        token: Option<&str>,
        session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        let Some(sec_uid) = identity.pagination_key.as_deref() else {
            return Err(HarvestError::Unresolved {
                handle: identity.handle.clone(),
            });
        };
        let path = match strategy {
            TikTokStrategy::ItemList => "post/item_list",
            TikTokStrategy::CreatorItemList => "creator/item_list",
            _ => return Err(HarvestError::unrecognized(format!("{strategy} is a profile strategy"))),
        };
        let url = self.item_list_url(path, sec_uid, token);
        self.get_api(&url, &identity.handle, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_from_rehydration_script() {
        let html = r#"<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__" type="application/json">
            {"__DEFAULT_SCOPE__":{"webapp.user-detail":{"userInfo":{
              "user":{"id":"6800000000000000001","uniqueId":"creator1","secUid":"MS4wABC"},
              "stats":{"followerCount":10}}}}}
        </script>"#;
        assert_eq!(
            ids_from_html(html, "creator1"),
            Some((Some("6800000000000000001".to_string()), "MS4wABC".to_string()))
        );
    }

    #[test]
    fn ids_from_raw_fragment() {
        let html = r#"<script>var x = {"secUid":"MS4w-xyz"};</script>"#;
        assert_eq!(ids_from_html(html, "creator1"), Some((None, "MS4w-xyz".to_string())));
        assert_eq!(ids_from_html("<html></html>", "creator1"), None);
    }

    #[test]
    fn missing_account_codes_map_to_not_found() {
        let payload = json!({"statusCode": 10202, "userInfo": {}});
        assert!(matches!(
            reject_missing_account(&payload, "u"),
            Err(HarvestError::NotFound { .. })
        ));
        assert!(reject_missing_account(&json!({"statusCode": 0}), "u").is_ok());
    }

    #[test]
    fn item_list_url_defaults_cursor_to_zero() {
        let engine = TikTokEngine::new("http://127.0.0.1:9000/");
        assert_eq!(
            engine.item_list_url("post/item_list", "MS4w+x", None),
            "http://127.0.0.1:9000/api/post/item_list/?aid=1988&secUid=MS4w%2Bx&count=30&cursor=0"
        );
    }

    #[test]
    fn strategies_depend_on_sec_uid() {
        let engine = TikTokEngine::new("https://www.tiktok.com");
        let mut identity = AccountIdentity::unresolved(Platform::TikTok, "creator1");
        assert_eq!(engine.profile_strategies(&identity), PROFILE_BY_HANDLE);
        assert!(engine.page_strategies(&identity).is_empty());
        identity.pagination_key = Some("MS4w".to_string());
        assert_eq!(engine.profile_strategies(&identity)[0], TikTokStrategy::Api);
        assert_eq!(engine.page_strategies(&identity), PAGES);
    }
}
