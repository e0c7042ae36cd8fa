use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use creatordb_core::{ContentMetrics, HarvesterSettings};
use serde_json::json;

use super::*;
use crate::extract::{PageSignal, ProfileFragment};
use crate::fields::{count_at, id_at};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Api,
    Embedded,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Api => "api",
            Step::Embedded => "embedded",
        })
    }
}

struct Shapes;

impl RecordShapes for Shapes {
    fn item_containers(&self) -> &'static [&'static str] {
        &["items"]
    }

    fn item_from(&self, node: &Value, _ctx: &ExtractContext<'_>) -> Option<ContentItem> {
        let id = id_at(node, &["videoId"])?;
        Some(ContentItem {
            url: format!("https://example.test/v/{id}"),
            caption: None,
            thumbnail_url: None,
            metrics: ContentMetrics {
                views: count_at(node, &["views"]).unwrap_or(0),
                ..ContentMetrics::default()
            },
            published_at: None,
            is_short: None,
            id,
        })
    }

    fn profile_from(&self, node: &Value, _ctx: &ExtractContext<'_>) -> Option<ProfileFragment> {
        let followers = count_at(node, &["followerCount"])?;
        Some(ProfileFragment {
            snapshot: ProfileSnapshot {
                followers,
                ..ProfileSnapshot::default()
            },
            owner_id: id_at(node, &["id"]),
            pagination_key: None,
        })
    }

    fn page_signal(&self, payload: &Value, _ctx: &ExtractContext<'_>) -> PageSignal {
        PageSignal {
            next_cursor: payload.get("cursor").and_then(Value::as_str).map(str::to_owned),
            has_more: payload.get("hasMore").and_then(Value::as_bool),
        }
    }
}

#[derive(Clone, Copy)]
enum PageMiss {
    NotFound,
    RateLimited,
}

struct FakeEngine {
    profile: Option<Value>,
    pages: HashMap<String, Value>,
    miss: PageMiss,
    page_calls: AtomicUsize,
}

impl FakeEngine {
    fn new(profile: Option<Value>) -> Self {
        Self {
            profile,
            pages: HashMap::new(),
            miss: PageMiss::NotFound,
            page_calls: AtomicUsize::new(0),
        }
    }

    fn page(mut self, token: &str, payload: Value) -> Self {
        self.pages.insert(token.to_string(), payload);
        self
    }
}

impl PlatformEngine for FakeEngine {
    type Strategy = Step;

    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    fn shapes(&self) -> &dyn RecordShapes {
        &Shapes
    }

    fn profile_strategies(&self, _identity: &AccountIdentity) -> &'static [Step] {
        &[Step::Api, Step::Embedded]
    }

    fn page_strategies(&self, _identity: &AccountIdentity) -> &'static [Step] {
        &[Step::Api]
    }

    async fn resolve(
        &self,
        target: &Target,
        _known: Option<&AccountIdentity>,
        _session: &Session<'_>,
    ) -> AccountIdentity {
        AccountIdentity::unresolved(Platform::TikTok, target.key())
    }

    async fn fetch_profile(
        &self,
        strategy: Step,
        _identity: &AccountIdentity,
        _session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        match (strategy, &self.profile) {
            (Step::Api, _) => Ok(json!({"statusCode": 10201})),
            (Step::Embedded, Some(profile)) => Ok(profile.clone()),
            (Step::Embedded, None) => Err(HarvestError::NotFound {
                url: "https://example.test/@ghost".to_string(),
            }),
        }
    }

    async fn fetch_page(
        &self,
        _strategy: Step,
        _identity: &AccountIdentity,
        token: Option<&str>,
        _session: &Session<'_>,
    ) -> Result<Value, HarvestError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        let key = token.unwrap_or_default();
        match (self.pages.get(key), self.miss) {
            (Some(page), _) => Ok(page.clone()),
            (None, PageMiss::NotFound) => Err(HarvestError::NotFound {
                url: format!("https://example.test/page/{key}"),
            }),
            (None, PageMiss::RateLimited) => Err(HarvestError::RateLimited {
                domain: "example.test".to_string(),
                retry_after_secs: 60,
            }),
        }
    }
}

fn items(ids: &[u32]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| json!({"videoId": format!("v{id}"), "views": 10}))
            .collect(),
    )
}

fn profile_page(ids: &[u32], cursor: &str) -> Value {
    json!({
        "user": {"id": "42", "followerCount": 1200},
        "items": items(ids),
        "cursor": cursor,
        "hasMore": true,
    })
}

fn plan(max_pages: usize, max_items: usize) -> RunPlan {
    RunPlan {
        target: Target::Handle("creator1".to_string()),
        known_identity: None,
        stored_cursor: None,
        fetch_content: true,
        resume: false,
        budget: PageBudget {
            max_pages,
            max_items,
        },
        page_delay: Duration::ZERO,
        max_depth: 16,
        now: Utc::now(),
    }
}

async fn run(engine: &FakeEngine, plan: &RunPlan) -> EngineRun {
    let fetcher = HttpFetcher::new(&HarvesterSettings::default()).unwrap();
    let session = Session::new(&fetcher, Deadline::after(Duration::from_secs(30)));
    run_engine(engine, &session, plan).await
}

fn ids(run: &EngineRun) -> Vec<&str> {
    run.result.items.iter().map(|i| i.id.as_str()).collect()
}

#[tokio::test]
async fn profile_page_then_following_pages_within_page_budget() {
    let engine = FakeEngine::new(Some(profile_page(&[1, 2, 3], "c1")))
        .page("c1", json!({"items": items(&[4, 5]), "cursor": "c2", "hasMore": true}))
        .page("c2", json!({"items": items(&[6]), "cursor": "c3", "hasMore": true}));

    let out = run(&engine, &plan(2, 100)).await;

    assert_eq!(ids(&out), ["v1", "v2", "v3", "v4", "v5"]);
    assert_eq!(out.stop, StopReason::PageBudget);
    assert_eq!(out.pages_fetched, 2);
    assert_eq!(out.result.cursor, HarvestCursor::at("c2"));
    assert_eq!(out.result.profile.followers, 1200);
    assert_eq!(out.result.profile.username, "creator1");
    assert_eq!(out.identity.resolved_id, "42");
    assert_eq!(out.result.total_views, 50);
    assert!(out.result.warnings.is_empty());
}

#[tokio::test]
async fn total_views_saturate_instead_of_overflowing() {
    let page = json!({
        "user": {"id": "42"},
        "items": [
            {"videoId": "v1", "views": u64::MAX},
            {"videoId": "v2", "views": u64::MAX},
        ],
        "hasMore": false,
    });
    let engine = FakeEngine::new(Some(page));

    let out = run(&engine, &plan(1, 100)).await;

    assert_eq!(ids(&out), ["v1", "v2"]);
    assert_eq!(out.result.total_views, u64::MAX);
}

#[tokio::test]
async fn resume_skips_profile_page_items() {
    let engine = FakeEngine::new(Some(profile_page(&[1, 2, 3], "c1")))
        .page("c1", json!({"items": items(&[4, 5]), "cursor": "c2"}))
        .page("c2", json!({"items": [], "hasMore": false}));
    let plan = RunPlan {
        stored_cursor: Some(HarvestCursor::at("c1")),
        resume: true,
        ..plan(10, 100)
    };

    let out = run(&engine, &plan).await;

    assert_eq!(ids(&out), ["v4", "v5"]);
    assert_eq!(out.stop, StopReason::Exhausted);
    assert_eq!(out.result.cursor, HarvestCursor::exhausted());
}

#[tokio::test]
async fn item_budget_truncation_keeps_current_token() {
    let engine = FakeEngine::new(Some(profile_page(&[1, 2, 3], "c1")))
        .page("c1", json!({"items": items(&[4, 5, 6]), "cursor": "c2"}));

    let out = run(&engine, &plan(10, 4)).await;

    assert_eq!(out.result.items.len(), 4);
    assert_eq!(out.stop, StopReason::ItemBudget);
    assert_eq!(out.result.cursor, HarvestCursor::at("c1"));
}

#[tokio::test]
async fn page_without_new_items_stops() {
    let engine = FakeEngine::new(Some(profile_page(&[1, 2], "c1")))
        .page("c1", json!({"items": items(&[1, 2]), "cursor": "c2"}))
        .page("c2", json!({"items": items(&[9]), "cursor": "c3"}));

    let out = run(&engine, &plan(10, 100)).await;

    assert_eq!(ids(&out), ["v1", "v2"]);
    assert_eq!(out.stop, StopReason::NoNewItems);
    assert_eq!(engine.page_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upstream_has_more_is_ignored_past_budget() {
    let mut engine = FakeEngine::new(Some(profile_page(&[0], "c1")));
    for n in 1..50_u32 {
        engine = engine.page(
            &format!("c{n}"),
            json!({"items": items(&[n]), "cursor": format!("c{}", n + 1), "hasMore": true}),
        );
    }

    let out = run(&engine, &plan(5, 100)).await;

    assert_eq!(out.pages_fetched, 5);
    assert_eq!(engine.page_calls.load(Ordering::SeqCst), 4);
    assert_eq!(out.result.items.len(), 5);
    assert!(!out.result.cursor.exhausted);
}

#[tokio::test]
async fn missing_profile_reports_not_found_without_paging() {
    let engine = FakeEngine::new(None);

    let out = run(&engine, &plan(5, 100)).await;

    let failure = out.profile_failure.expect("profile failure");
    assert_eq!(failure.kind, ProfileFailureKind::NotFound);
    assert!(failure.summary.contains("embedded"));
    assert!(out.result.items.is_empty());
    assert_eq!(out.result.profile.followers, 0);
    assert_eq!(engine.page_calls.load(Ordering::SeqCst), 0);
    assert_eq!(out.result.warnings.len(), 1);
}

#[tokio::test]
async fn rate_limited_page_keeps_partial_items() {
    let mut engine = FakeEngine::new(Some(profile_page(&[1, 2, 3], "c1")));
    engine.miss = PageMiss::RateLimited;

    let out = run(&engine, &plan(5, 100)).await;

    assert_eq!(out.result.items.len(), 3);
    assert_eq!(out.stop, StopReason::RateLimited);
    assert_eq!(out.result.cursor, HarvestCursor::at("c1"));
    assert!(out.result.warnings[0].contains("rate limited"));
}

#[tokio::test]
async fn profile_only_run_keeps_stored_cursor() {
    let engine = FakeEngine::new(Some(profile_page(&[1, 2, 3], "c1")));
    let plan = RunPlan {
        fetch_content: false,
        stored_cursor: Some(HarvestCursor::at("old")),
        ..plan(5, 100)
    };

    let out = run(&engine, &plan).await;

    assert!(out.result.items.is_empty());
    assert_eq!(out.stop, StopReason::NotRequested);
    assert_eq!(out.result.cursor, HarvestCursor::at("old"));
    assert_eq!(out.result.profile.followers, 1200);
}

#[tokio::test]
async fn profile_without_items_fetches_first_content_page() {
    let engine = FakeEngine::new(Some(json!({"user": {"followerCount": 7}})))
        .page("", json!({"items": items(&[1]), "hasMore": false}));

    let out = run(&engine, &plan(5, 100)).await;

    assert_eq!(ids(&out), ["v1"]);
    assert_eq!(out.stop, StopReason::Exhausted);
    assert_eq!(out.pages_fetched, 2);
}
