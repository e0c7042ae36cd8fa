//! Recursive record extraction over payloads of unknown shape.
//!
//! Each platform describes what its records look like through
//! [`RecordShapes`]; this module does the walking, deduplication and
//! profile assembly. Known container paths are visited first, then the whole
//! tree is walked regardless so renamed containers are still found.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use creatordb_core::{ContentItem, ProfileSnapshot};
use serde_json::Value;

use crate::fields::get_path;
use crate::walk::{walk, Visit};

/// Per-call inputs the shape predicates may need.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Handle being harvested, without a leading `@`. Empty when unknown.
    pub handle: &'a str,
    pub max_depth: usize,
    pub now: DateTime<Utc>,
}

/// A user/stats record found somewhere in a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFragment {
    pub snapshot: ProfileSnapshot,
    /// Platform id of the account the fragment describes.
    pub owner_id: Option<String>,
    pub pagination_key: Option<String>,
}

/// What a payload says about the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignal {
    pub next_cursor: Option<String>,
    /// `Some(false)` is an explicit "no more pages".
    pub has_more: Option<bool>,
}

/// Platform-specific record recognition.
pub trait RecordShapes: Send + Sync {
    /// Dotted paths to arrays (or id-keyed maps) of content records.
    fn item_containers(&self) -> &'static [&'static str];

    /// A canonical item if `node` looks like a content record with a valid id.
    fn item_from(&self, node: &Value, ctx: &ExtractContext<'_>) -> Option<ContentItem>;

    /// A profile fragment if `node` looks like a user/stats record.
    fn profile_from(&self, node: &Value, ctx: &ExtractContext<'_>) -> Option<ProfileFragment>;

    fn page_signal(&self, payload: &Value, ctx: &ExtractContext<'_>) -> PageSignal;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub profile: Option<ProfileSnapshot>,
    pub items: Vec<ContentItem>,
    pub owner_id: Option<String>,
    pub pagination_key: Option<String>,
    pub signal: PageSignal,
}

impl Extraction {
    /// Nothing recognizable was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.profile.as_ref().is_none_or(ProfileSnapshot::is_blank)
    }
}

fn same_handle(a: &str, b: &str) -> bool {
    a.trim_start_matches('@')
        .eq_ignore_ascii_case(b.trim_start_matches('@'))
}

/// Walks `payload` and returns every distinct item plus the merged profile.
///
/// Items are deduplicated by id within the call. Profile fragments naming a
/// different user than `ctx.handle` are ignored; the remaining fragments are
/// merged with the first one winning on each field.
#[must_use]
pub fn extract(payload: &Value, shapes: &dyn RecordShapes, ctx: &ExtractContext<'_>) -> Extraction {
    let mut seen: HashSet<String> = HashSet::new();
    let mut items: Vec<ContentItem> = Vec::new();
    let mut accept = |item: ContentItem, items: &mut Vec<ContentItem>| {
        if seen.insert(item.id.clone()) {
            items.push(item);
        }
    };

    for path in shapes.item_containers() {
        let Some(container) = get_path(payload, path) else {
            continue;
        };
        let records: Box<dyn Iterator<Item = &Value>> = match container {
            Value::Array(list) => Box::new(list.iter()),
            Value::Object(map) => Box::new(map.values()),
            _ => continue,
        };
        for record in records {
            let candidate = shapes
                .item_from(record, ctx)
                .or_else(|| record.get("node").and_then(|n| shapes.item_from(n, ctx)));
            if let Some(item) = candidate {
                accept(item, &mut items);
            }
        }
    }

    let mut profile: Option<ProfileSnapshot> = None;
    let mut owner_id = None;
    let mut pagination_key = None;

    walk(payload, ctx.max_depth, &mut |node, _depth| {
        if !node.is_object() {
            return Visit::Descend;
        }
        if let Some(item) = shapes.item_from(node, ctx) {
            accept(item, &mut items);
            return Visit::Skip;
        }
        if let Some(fragment) = shapes.profile_from(node, ctx) {
            let username = &fragment.snapshot.username;
            if ctx.handle.is_empty() || username.is_empty() || same_handle(username, ctx.handle) {
                owner_id = owner_id.take().or(fragment.owner_id);
                pagination_key = pagination_key.take().or(fragment.pagination_key);
                match profile.as_mut() {
                    Some(existing) => existing.absorb(fragment.snapshot),
                    None => profile = Some(fragment.snapshot),
                }
            }
        }
        Visit::Descend
    });

    if let Some(p) = profile.as_mut() {
        if p.username.is_empty() {
            ctx.handle.clone_into(&mut p.username);
        }
    }

    Extraction {
        profile,
        items,
        owner_id,
        pagination_key,
        signal: shapes.page_signal(payload, ctx),
    }
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
