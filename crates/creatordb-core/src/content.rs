//! Platform-agnostic harvest data model.
//!
//! All counters are non-negative integers. A zero counter is valid but
//! suspicious: it usually means the upstream hid the value from a degraded
//! request, which is why the merge sink treats zeros specially.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Platform;

/// Who is being harvested, and how the platform addresses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub platform: Platform,
    pub handle: String,
    /// Platform-addressable id (numeric user id, `secUid`, channel id).
    /// Empty when resolution failed.
    pub resolved_id: String,
    /// Deep-pagination key, when the platform needs one beyond `resolved_id`.
    pub pagination_key: Option<String>,
}

impl AccountIdentity {
    #[must_use]
    pub fn unresolved(platform: Platform, handle: impl Into<String>) -> Self {
        Self {
            platform,
            handle: handle.into(),
            resolved_id: String::new(),
            pagination_key: None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.resolved_id.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub banner_url: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub total_content_count: u64,
    pub total_views: u64,
}

impl ProfileSnapshot {
    /// An all-zero snapshot carrying only the handle.
    #[must_use]
    pub fn empty(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Fills fields that are still empty (or zero) from `other`.
    ///
    /// The first fragment to supply a value wins; later fragments only fill gaps.
    pub fn absorb(&mut self, other: ProfileSnapshot) {
        if self.username.is_empty() {
            self.username = other.username;
        }
        fill(&mut self.display_name, other.display_name);
        fill(&mut self.bio, other.bio);
        fill(&mut self.avatar_url, other.avatar_url);
        fill(&mut self.banner_url, other.banner_url);
        fill_count(&mut self.followers, other.followers);
        fill_count(&mut self.following, other.following);
        fill_count(&mut self.total_content_count, other.total_content_count);
        fill_count(&mut self.total_views, other.total_views);
    }

    /// True when no counter and no descriptive field was found.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.followers == 0
            && self.following == 0
            && self.total_content_count == 0
            && self.total_views == 0
            && self.display_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value.filter(|v| !v.trim().is_empty());
    }
}

fn fill_count(slot: &mut u64, value: u64) {
    if *slot == 0 {
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetrics {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: Option<u64>,
}

/// A post or video in the platform-agnostic shape.
///
/// `id` is the canonical, platform-validated identifier and the upsert key
/// within one platform+account scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub url: String,
    pub caption: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metrics: ContentMetrics,
    pub published_at: Option<DateTime<Utc>>,
    pub is_short: Option<bool>,
}

/// Resumable pagination position, opaque to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestCursor {
    pub token: Option<String>,
    pub exhausted: bool,
}

impl HarvestCursor {
    #[must_use]
    pub fn exhausted() -> Self {
        Self {
            token: None,
            exhausted: true,
        }
    }

    #[must_use]
    pub fn at(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            exhausted: false,
        }
    }

    /// The token to resume from, if this cursor still has somewhere to go.
    #[must_use]
    pub fn resumable_token(&self) -> Option<&str> {
        if self.exhausted {
            None
        } else {
            self.token.as_deref().filter(|t| !t.is_empty())
        }
    }
}

/// One harvest's output, handed to the merge sink and back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestResult {
    pub profile: ProfileSnapshot,
    pub items: Vec<ContentItem>,
    pub scraped_count: usize,
    pub total_views: u64,
    pub cursor: HarvestCursor,
    pub warnings: Vec<String>,
}

impl HarvestResult {
    /// A structurally valid result with nothing in it.
    #[must_use]
    pub fn empty(handle: &str) -> Self {
        Self {
            profile: ProfileSnapshot::empty(handle),
            items: Vec::new(),
            scraped_count: 0,
            total_views: 0,
            cursor: HarvestCursor::default(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.items.is_empty() || !self.profile.is_blank()
    }
}
