//! The harvest sequence shared by every platform engine.
//!
//! An engine only knows how to resolve an account, which strategies it has,
//! how to fetch one payload per strategy, and what its records look like.
//! [`run_engine`] drives the cascade, the extractor and the paginator on top
//! of that and always returns whatever it gathered.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use creatordb_core::{
    AccountIdentity, ContentItem, HarvestCursor, HarvestResult, Platform, ProfileSnapshot,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::cascade::{run_cascade, CascadeExhausted};
use crate::client::HttpFetcher;
use crate::deadline::Deadline;
use crate::error::HarvestError;
use crate::extract::{extract, ExtractContext, Extraction, RecordShapes};
use crate::identity::Target;
use crate::pagination::{PageBudget, PageState, StopReason};

/// Per-harvest network context.
///
/// HTML pages are cached by URL for the life of the session, so resolving an
/// identity and scraping the same page afterwards costs one request.
pub struct Session<'a> {
    pub fetcher: &'a HttpFetcher,
    pub deadline: Deadline,
    pages: Mutex<HashMap<String, String>>,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(fetcher: &'a HttpFetcher, deadline: Deadline) -> Self {
        Self {
            fetcher,
            deadline,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Fetches an HTML page once per session.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if the request fails or the deadline expires.
    pub async fn page_html(&self, url: &str) -> Result<String, HarvestError> {
        if let Some(cached) = self.pages.lock().await.get(url) {
            return Ok(cached.clone());
        }
        let html = self
            .deadline
            .run(self.fetcher.get_text(url, &[("Accept", "text/html,application/xhtml+xml")]))
            .await?;
        self.pages
            .lock()
            .await
            .insert(url.to_owned(), html.clone());
        Ok(html)
    }
}

impl fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// One platform's strategies and record shapes.
pub trait PlatformEngine: Send + Sync {
    type Strategy: Copy + fmt::Display + Send + Sync + 'static;

    fn platform(&self) -> Platform;

    fn shapes(&self) -> &dyn RecordShapes;

    /// Profile strategies in priority order. An unresolved identity only
    /// gets the strategies that can work from the handle alone.
    fn profile_strategies(&self, identity: &AccountIdentity) -> &'static [Self::Strategy];

    /// Strategies for pages after the profile page. May be empty when the
    /// identity lacks what pagination needs.
    fn page_strategies(&self, identity: &AccountIdentity) -> &'static [Self::Strategy];

    /// Maps `target` to an identity. `known` is the identity persisted by an
    /// earlier harvest, if any. Never fails: an unresolved identity has an
    /// empty `resolved_id`.
    fn resolve(
        &self,
        target: &Target,
        known: Option<&AccountIdentity>,
        session: &Session<'_>,
    ) -> impl Future<Output = AccountIdentity> + Send;

    fn fetch_profile(
        &self,
        strategy: Self::Strategy,
        identity: &AccountIdentity,
        session: &Session<'_>,
    ) -> impl Future<Output = Result<Value, HarvestError>> + Send;

    /// Fetches the page after `token`, or the first content page when
    /// `token` is `None`.
    fn fetch_page(
        &self,
        strategy: Self::Strategy,
        identity: &AccountIdentity,
        token: Option<&str>,
        session: &Session<'_>,
    ) -> impl Future<Output = Result<Value, HarvestError>> + Send;
}

/// Inputs to one engine run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub target: Target,
    pub known_identity: Option<AccountIdentity>,
    pub stored_cursor: Option<HarvestCursor>,
    pub fetch_content: bool,
    pub resume: bool,
    pub budget: PageBudget,
    pub page_delay: Duration,
    pub max_depth: usize,
    pub now: DateTime<Utc>,
}

/// Why the profile cascade produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFailureKind {
    NotFound,
    RateLimited,
    Deadline,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFailure {
    pub kind: ProfileFailureKind,
    pub summary: String,
}

impl ProfileFailure {
    fn from_cascade<S: fmt::Display>(exhausted: &CascadeExhausted<S>) -> Self {
        let kind = if exhausted.rate_limited() {
            ProfileFailureKind::RateLimited
        } else if exhausted.not_found() {
            ProfileFailureKind::NotFound
        } else if exhausted.deadline_exceeded() {
            ProfileFailureKind::Deadline
        } else {
            ProfileFailureKind::NoData
        };
        Self {
            kind,
            summary: exhausted.summary(),
        }
    }
}

/// Everything one engine run gathered, failed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRun {
    pub identity: AccountIdentity,
    pub result: HarvestResult,
    pub stop: StopReason,
    pub pages_fetched: usize,
    pub profile_failure: Option<ProfileFailure>,
}

/// Items gathered so far, deduplicated across pages and capped by budget.
struct Collector {
    seen: HashSet<String>,
    items: Vec<ContentItem>,
    max_items: usize,
}

impl Collector {
    fn new(max_items: usize) -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            max_items,
        }
    }

    /// Takes unseen items until the budget is full. Returns how many were
    /// taken and whether any unseen item had to be left behind.
    fn take(&mut self, items: Vec<ContentItem>) -> (usize, bool) {
        let mut taken = 0;
        for item in items {
            if self.seen.contains(&item.id) {
                continue;
            }
            if self.items.len() >= self.max_items {
                return (taken, true);
            }
            self.seen.insert(item.id.clone());
            self.items.push(item);
            taken += 1;
        }
        (taken, false)
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.max_items
    }
}

fn absorb_identity(identity: &mut AccountIdentity, extraction: &Extraction) {
    if !identity.is_resolved() {
        if let Some(owner_id) = extraction.owner_id.as_deref().filter(|id| !id.is_empty()) {
            identity.resolved_id = owner_id.to_owned();
        }
    }
    if identity.pagination_key.is_none() {
        identity.pagination_key.clone_from(&extraction.pagination_key);
    }
}

fn profile_payload_check(extraction: Extraction, strategy: &dyn fmt::Display) -> Result<Extraction, HarvestError> {
    if extraction.is_empty() {
        Err(HarvestError::unrecognized(format!("{strategy} profile payload")))
    } else {
        Ok(extraction)
    }
}

fn page_payload_check(extraction: Extraction, strategy: &dyn fmt::Display) -> Result<Extraction, HarvestError> {
    if extraction.items.is_empty() && extraction.signal.has_more != Some(false) {
        Err(HarvestError::unrecognized(format!("{strategy} page payload")))
    } else {
        Ok(extraction)
    }
}

fn stop_for_failure<S>(exhausted: &CascadeExhausted<S>) -> StopReason {
    if exhausted.rate_limited() {
        StopReason::RateLimited
    } else if exhausted.deadline_exceeded() {
        StopReason::Deadline
    } else {
        StopReason::FetchFailed
    }
}

/// Sum of item views, saturating at `u64::MAX`.
fn total_views(items: &[ContentItem]) -> u64 {
    items.iter().map(|i| i.metrics.views).fold(0, u64::saturating_add)
}

/// Runs one harvest for one account.
///
/// Page 1 comes from the profile cascade; later pages come from the page
/// cascade, one at a time, each preceded by `plan.page_delay`. Stops at the
/// page or item budget, on a page with no new items, when upstream says there
/// is nothing more, on failure, or at the deadline. Partial results are kept
/// in every case.
pub async fn run_engine<E: PlatformEngine>(engine: &E, session: &Session<'_>, plan: &RunPlan) -> EngineRun {
    let platform = engine.platform();
    let mut identity = engine
        .resolve(&plan.target, plan.known_identity.as_ref(), session)
        .await;
    let handle = identity.handle.clone();
    let ctx = ExtractContext {
        handle: &handle,
        max_depth: plan.max_depth,
        now: plan.now,
    };
    let mut warnings: Vec<String> = Vec::new();
    if !identity.is_resolved() {
        tracing::warn!(%platform, handle = %handle, "identity unresolved; using handle-only strategies");
    }

    let mut state = PageState::start(plan.stored_cursor.as_ref(), plan.resume && plan.fetch_content);
    let resumed = matches!(state, PageState::HasCursor(_));
    let mut collector = Collector::new(plan.budget.max_items);
    let mut profile: Option<ProfileSnapshot> = None;
    let mut profile_failure = None;
    let mut stop: Option<StopReason> = None;

    // Profile page. Counts against the page budget even when resuming.
    let mut pages_fetched = 1;
    let profile_round = {
        let identity = &identity;
        let ctx = &ctx;
        run_cascade(
            "profile",
            engine.profile_strategies(identity),
            &session.deadline,
            |strategy| async move {
                let payload = engine.fetch_profile(strategy, identity, session).await?;
                profile_payload_check(extract(&payload, engine.shapes(), ctx), &strategy)
            },
        )
        .await
    };

    match profile_round {
        Ok((strategy, extraction)) => {
            tracing::debug!(%platform, handle = %handle, %strategy, items = extraction.items.len(), "profile page extracted");
            absorb_identity(&mut identity, &extraction);
            profile = extraction.profile;

            if state == PageState::AwaitingFirstPage && plan.fetch_content {
                let has_signal = extraction.signal.next_cursor.is_some()
                    || extraction.signal.has_more == Some(false);
                if !extraction.items.is_empty() || has_signal {
                    let (_, truncated) = collector.take(extraction.items);
                    if truncated {
                        stop = Some(StopReason::ItemBudget);
                    } else {
                        state = state.advance(&extraction.signal);
                    }
                }
            }
        }
        Err(exhausted) => {
            let failure = ProfileFailure::from_cascade(&exhausted);
            warnings.push(format!("profile: {}", failure.summary));
            let fatal = matches!(
                failure.kind,
                ProfileFailureKind::NotFound | ProfileFailureKind::RateLimited | ProfileFailureKind::Deadline
            );
            if fatal {
                stop = Some(match failure.kind {
                    ProfileFailureKind::RateLimited => StopReason::RateLimited,
                    ProfileFailureKind::Deadline => StopReason::Deadline,
                    _ => StopReason::FetchFailed,
                });
            }
            profile_failure = Some(failure);
        }
    }

    if !plan.fetch_content {
        stop = Some(StopReason::NotRequested);
    }

    let stop = match stop {
        Some(stop) => stop,
        None => {
            let stop = paginate(
                engine,
                session,
                plan,
                &ctx,
                &mut identity,
                &mut state,
                &mut collector,
                &mut profile,
                &mut pages_fetched,
            )
            .await;
            if stop.is_degraded() {
                warnings.push(format!("pagination stopped early: {stop}"));
            }
            stop
        }
    };

    let mut profile = profile.unwrap_or_default();
    if profile.username.is_empty() {
        profile.username.clone_from(&handle);
    }
    let items = collector.items;
    let cursor = if plan.fetch_content {
        state.to_cursor()
    } else {
        plan.stored_cursor.clone().unwrap_or_default()
    };

    tracing::info!(
        %platform,
        handle = %handle,
        resolved = identity.is_resolved(),
        resumed,
        pages = pages_fetched,
        items = items.len(),
        %stop,
        "engine run finished"
    );

    EngineRun {
        result: HarvestResult {
            profile,
            scraped_count: items.len(),
            total_views: total_views(&items),
            items,
            cursor,
            warnings,
        },
        identity,
        stop,
        pages_fetched,
        profile_failure,
    }
}

#[allow(clippy::too_many_arguments)]
async fn paginate<E: PlatformEngine>(
    engine: &E,
    session: &Session<'_>,
    plan: &RunPlan,
    ctx: &ExtractContext<'_>,
    identity: &mut AccountIdentity,
    state: &mut PageState,
    collector: &mut Collector,
    profile: &mut Option<ProfileSnapshot>,
    pages_fetched: &mut usize,
) -> StopReason {
    loop {
        let token = match &*state {
            PageState::Exhausted => return StopReason::Exhausted,
            PageState::HasCursor(token) => Some(token.clone()),
            PageState::AwaitingFirstPage => None,
        };
        if !plan.budget.allows_page(*pages_fetched) {
            return StopReason::PageBudget;
        }
        if collector.is_full() {
            return StopReason::ItemBudget;
        }
        if session.deadline.is_expired() {
            return StopReason::Deadline;
        }
        let strategies = engine.page_strategies(identity);
        if strategies.is_empty() {
            tracing::debug!(handle = %identity.handle, "no page strategy applies to this identity");
            return StopReason::FetchFailed;
        }

        session.deadline.sleep(plan.page_delay).await;
        *pages_fetched += 1;
        let page = *pages_fetched;

        let round = {
            let identity = &*identity;
            let token = token.as_deref();
            run_cascade("page", strategies, &session.deadline, |strategy| async move {
                let payload = engine.fetch_page(strategy, identity, token, session).await?;
                page_payload_check(extract(&payload, engine.shapes(), ctx), &strategy)
            })
            .await
        };

        match round {
            Ok((strategy, extraction)) => {
                absorb_identity(identity, &extraction);
                if let Some(fragment) = extraction.profile {
                    match profile.as_mut() {
                        Some(existing) => existing.absorb(fragment),
                        None => *profile = Some(fragment),
                    }
                }
                let (taken, truncated) = collector.take(extraction.items);
                tracing::debug!(handle = %identity.handle, page, %strategy, new_items = taken, "page extracted");
                if truncated {
                    // Keep the current token so the next run re-reads this page.
                    return StopReason::ItemBudget;
                }
                *state = state.advance(&extraction.signal);
                if *state == PageState::Exhausted {
                    return StopReason::Exhausted;
                }
                if taken == 0 {
                    return StopReason::NoNewItems;
                }
            }
            Err(exhausted) => {
                let stop = stop_for_failure(&exhausted);
                tracing::warn!(handle = %identity.handle, page, error = %exhausted.summary(), "page fetch failed");
                return stop;
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
