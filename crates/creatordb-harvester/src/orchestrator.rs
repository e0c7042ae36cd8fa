//! One harvest, end to end: validate the request, run the platform engine,
//! re-host the avatar, hand the result to the sink, and shape the response.
//!
//! [`Harvester::harvest`] never fails. Every problem ends up as a warning
//! and a [`WarningCode`] on the returned envelope.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use creatordb_core::{
    AccountIdentity, HarvestRequest, HarvestResponse, HarvesterSettings, Platform,
    ProfileSnapshot, WarningCode,
};
use futures::stream::{self, StreamExt};

use crate::client::HttpFetcher;
use crate::deadline::Deadline;
use crate::engine::{run_engine, EngineRun, ProfileFailureKind, RunPlan, Session};
use crate::error::HarvestError;
use crate::identity::{parse_target, Target};
use crate::media::AvatarRehoster;
use crate::merge::SafeMergePolicy;
use crate::pagination::{PageBudget, StopReason};
use crate::platforms::{InstagramEngine, TikTokEngine, YouTubeEngine};
use crate::sink::{apply_harvest, SinkInput};
use crate::store::{HarvestStore, StoredAccount};

/// Runs harvests against one store with one set of settings.
///
/// Safe to share across tasks; concurrent calls must target different
/// accounts.
#[derive(Debug)]
pub struct Harvester<S> {
    settings: HarvesterSettings,
    fetcher: HttpFetcher,
    store: S,
    policy: SafeMergePolicy,
    rehoster: Option<AvatarRehoster>,
    instagram: InstagramEngine,
    tiktok: TikTokEngine,
    youtube: YouTubeEngine,
}

fn known_identity(platform: Platform, handle: &str, stored: Option<&StoredAccount>) -> Option<AccountIdentity> {
    let stored = stored?;
    let resolved_id = stored.resolved_id.clone().filter(|id| !id.is_empty())?;
    Some(AccountIdentity {
        platform,
        handle: handle.to_string(),
        resolved_id,
        pagination_key: stored.pagination_key.clone(),
    })
}

/// `success` and `code` for a finished run.
fn outcome(run: &EngineRun, fetch_content: bool, store_failed: bool) -> (bool, Option<WarningCode>) {
    if let Some(failure) = &run.profile_failure {
        if run.result.items.is_empty() {
            let code = match failure.kind {
                ProfileFailureKind::NotFound => WarningCode::NotFound,
                ProfileFailureKind::RateLimited => WarningCode::RateLimited,
                ProfileFailureKind::Deadline => WarningCode::DeadlineExceeded,
                ProfileFailureKind::NoData if !run.identity.is_resolved() => WarningCode::Unresolved,
                ProfileFailureKind::NoData => WarningCode::NoData,
            };
            return (false, Some(code));
        }
    }
    let code = match run.stop {
        StopReason::RateLimited => Some(WarningCode::RateLimited),
        StopReason::Deadline => Some(WarningCode::DeadlineExceeded),
        _ if fetch_content && !run.identity.is_resolved() => Some(WarningCode::Unresolved),
        StopReason::FetchFailed => Some(WarningCode::Partial),
        _ if run.profile_failure.is_some() || store_failed => Some(WarningCode::Partial),
        _ => None,
    };
    (true, code)
}

impl<S: HarvestStore> Harvester<S> {
    /// # Errors
    ///
    /// Returns [`HarvestError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: HarvesterSettings, store: S) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(&settings)?;
        let rehoster = settings
            .media_dir
            .clone()
            .map(|dir| AvatarRehoster::new(fetcher.clone(), dir, &settings.media_base_url));
        Ok(Self {
            policy: SafeMergePolicy::from_settings(&settings),
            instagram: InstagramEngine::new(&settings.instagram_base_url),
            tiktok: TikTokEngine::new(&settings.tiktok_base_url),
            youtube: YouTubeEngine::new(&settings.youtube_base_url),
            fetcher,
            rehoster,
            store,
            settings,
        })
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn settings(&self) -> &HarvesterSettings {
        &self.settings
    }

    /// Harvests one account and persists whatever was gathered.
    pub async fn harvest(&self, request: &HarvestRequest) -> HarvestResponse {
        let Some(raw) = request.target() else {
            return HarvestResponse::failed(
                "",
                WarningCode::InvalidRequest,
                "one of handle, profileUrl or channelId is required",
            );
        };
        let Some(platform) = request.platform() else {
            return HarvestResponse::failed(
                raw,
                WarningCode::InvalidRequest,
                format!("cannot tell which platform \"{raw}\" belongs to"),
            );
        };
        let Some(target) = parse_target(raw) else {
            return HarvestResponse::failed(
                raw,
                WarningCode::InvalidRequest,
                format!("\"{raw}\" is not an account handle or profile URL"),
            );
        };
        if matches!(target, Target::ChannelId(_)) && platform != Platform::YouTube {
            return HarvestResponse::failed(
                raw,
                WarningCode::InvalidRequest,
                format!("channel ids only exist on youtube, not {platform}"),
            );
        }

        let mut warnings = Vec::new();
        let stored = match self.store.load_account(platform, target.key()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(%platform, handle = target.key(), error = %e, "could not load stored account");
                warnings.push(format!("store: {e}"));
                None
            }
        };

        let now = Utc::now();
        let plan = RunPlan {
            known_identity: known_identity(platform, target.key(), stored.as_ref()),
            stored_cursor: stored.as_ref().map(|s| s.cursor.clone()),
            fetch_content: request.fetch_content,
            resume: request.resume_from_cursor,
            budget: PageBudget {
                max_pages: self.settings.max_pages,
                max_items: self.settings.max_items,
            },
            page_delay: Duration::from_millis(self.settings.page_delay_ms),
            max_depth: self.settings.max_depth,
            now,
            target,
        };
        let session = Session::new(
            &self.fetcher,
            Deadline::after(Duration::from_secs(self.settings.deadline_secs)),
        );

        let mut run = match platform {
            Platform::Instagram => run_engine(&self.instagram, &session, &plan).await,
            Platform::TikTok => run_engine(&self.tiktok, &session, &plan).await,
            Platform::YouTube => run_engine(&self.youtube, &session, &plan).await,
        };
        warnings.append(&mut run.result.warnings);
        run.result.warnings = warnings;

        let avatar_source = self
            .rehost_avatar(&mut run.result.profile, stored.as_ref(), &session.deadline, &mut run.result.warnings)
            .await;

        let mut store_failed = false;
        if run.result.has_data() {
            let input = SinkInput {
                identity: &run.identity,
                account_ref: request.account_id.as_deref(),
                result: &run.result,
                fetch_content: request.fetch_content,
                avatar_source_url: avatar_source.as_deref(),
                now,
            };
            match apply_harvest(&self.store, &self.policy, input).await {
                Ok(report) => {
                    run.result.profile = report.profile;
                    run.result.cursor = report.cursor;
                }
                Err(e) => {
                    tracing::warn!(%platform, handle = %run.identity.handle, error = %e, "harvest not persisted");
                    run.result.warnings.push(format!("store: {e}"));
                    store_failed = true;
                }
            }
        } else {
            tracing::debug!(%platform, handle = %run.identity.handle, "nothing usable gathered; store left untouched");
        }

        let (success, code) = outcome(&run, request.fetch_content, store_failed);
        if code == Some(WarningCode::Unresolved) && run.result.warnings.is_empty() {
            run.result
                .warnings
                .push("account id unresolved; content pages unavailable".to_string());
        }
        let warning = (!run.result.warnings.is_empty()).then(|| run.result.warnings.join("; "));

        tracing::info!(
            %platform,
            handle = %run.identity.handle,
            success,
            code = code.map_or("ok", WarningCode::as_str),
            items = run.result.scraped_count,
            pages = run.pages_fetched,
            followers = run.result.profile.followers,
            "harvest finished"
        );

        HarvestResponse {
            success,
            data: run.result,
            warning,
            code,
        }
    }

    /// Harvests several accounts concurrently, at most
    /// `max_concurrent_accounts` at a time. A repeated account is answered
    /// with an `invalid_request` envelope instead of a second harvest.
    ///
    /// Results come back in completion order.
    pub async fn harvest_many(&self, requests: Vec<HarvestRequest>) -> Vec<(HarvestRequest, HarvestResponse)> {
        let limit = self.settings.max_concurrent_accounts.max(1);
        let mut seen: HashSet<(Platform, String)> = HashSet::new();
        let mut duplicates = Vec::new();
        let mut unique = Vec::new();
        for request in requests {
            let key = request
                .platform()
                .zip(request.target().and_then(parse_target))
                .map(|(platform, target)| (platform, target.key().to_string()));
            match key {
                Some(key) if !seen.insert(key.clone()) => {
                    let response = HarvestResponse::failed(
                        &key.1,
                        WarningCode::InvalidRequest,
                        format!("{} {} appears more than once in the batch", key.0, key.1),
                    );
                    duplicates.push((request, response));
                }
                _ => unique.push(request),
            }
        }

        let mut results: Vec<(HarvestRequest, HarvestResponse)> = stream::iter(unique)
            .map(|request| async move {
                let response = self.harvest(&request).await;
                (request, response)
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        results.extend(duplicates);
        results
    }

    /// Swaps the upstream avatar for an owned copy and returns the upstream
    /// URL it came from. An unchanged upstream URL reuses the stored copy.
    async fn rehost_avatar(
        &self,
        profile: &mut ProfileSnapshot,
        stored: Option<&StoredAccount>,
        deadline: &Deadline,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        let upstream = profile.avatar_url.clone()?;
        let Some(rehoster) = &self.rehoster else {
            return Some(upstream);
        };

        let unchanged = stored
            .filter(|s| s.avatar_source_url.as_deref() == Some(upstream.as_str()))
            .and_then(|s| s.profile.avatar_url.clone());
        if let Some(owned) = unchanged {
            profile.avatar_url = Some(owned);
            return Some(upstream);
        }

        match deadline.run(rehoster.rehost(&upstream)).await {
            Ok(rehosted) => {
                profile.avatar_url = Some(rehosted.url);
                Some(rehosted.source_url)
            }
            Err(e) => {
                tracing::warn!(url = %upstream, error = %e, "avatar re-hosting failed; keeping upstream url");
                warnings.push(format!("avatar: {e}"));
                Some(upstream)
            }
        }
    }
}
