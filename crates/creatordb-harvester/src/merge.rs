//! Reconciling a fresh harvest against what is already persisted.

use std::collections::HashMap;

use creatordb_core::{ContentItem, HarvesterSettings, ProfileSnapshot};

/// Guards known-good aggregate counters against degraded harvests.
///
/// A fresh counter at or below `threshold` never replaces a persisted counter
/// above it. With the default threshold of `0` this is "never overwrite a
/// nonzero value with zero". A genuine drop to zero cannot be told apart from
/// a blocked scrape, so the rule can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeMergePolicy {
    pub enabled: bool,
    pub threshold: u64,
}

impl Default for SafeMergePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0,
        }
    }
}

impl SafeMergePolicy {
    #[must_use]
    pub fn from_settings(settings: &HarvesterSettings) -> Self {
        Self {
            enabled: settings.safe_merge_enabled,
            threshold: settings.safe_merge_threshold,
        }
    }

    #[must_use]
    pub fn merge_counter(&self, persisted: u64, fresh: u64) -> u64 {
        if self.enabled && fresh <= self.threshold && persisted > self.threshold {
            persisted
        } else {
            fresh
        }
    }

    /// Counters go through [`Self::merge_counter`]; descriptive fields keep
    /// the persisted value when the fresh harvest did not find one.
    #[must_use]
    pub fn merge_profile(
        &self,
        persisted: Option<&ProfileSnapshot>,
        fresh: &ProfileSnapshot,
    ) -> ProfileSnapshot {
        let Some(prev) = persisted else {
            return fresh.clone();
        };

        ProfileSnapshot {
            username: if fresh.username.is_empty() {
                prev.username.clone()
            } else {
                fresh.username.clone()
            },
            display_name: fresh.display_name.clone().or_else(|| prev.display_name.clone()),
            bio: fresh.bio.clone().or_else(|| prev.bio.clone()),
            avatar_url: fresh.avatar_url.clone().or_else(|| prev.avatar_url.clone()),
            banner_url: fresh.banner_url.clone().or_else(|| prev.banner_url.clone()),
            followers: self.merge_counter(prev.followers, fresh.followers),
            following: self.merge_counter(prev.following, fresh.following),
            total_content_count: self
                .merge_counter(prev.total_content_count, fresh.total_content_count),
            total_views: self.merge_counter(prev.total_views, fresh.total_views),
        }
    }
}

/// Collapses repeated ids, keeping the first position and the last-seen data.
#[must_use]
pub fn dedupe_items(items: &[ContentItem]) -> Vec<ContentItem> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<ContentItem> = Vec::with_capacity(items.len());

    for item in items {
        if let Some(&pos) = index.get(item.id.as_str()) {
            out[pos] = item.clone();
        } else {
            index.insert(item.id.as_str(), out.len());
            out.push(item.clone());
        }
    }
    out
}
