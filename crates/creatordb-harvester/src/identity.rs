//! Turning a free-form handle or profile URL into something a platform
//! engine can address.

use std::sync::LazyLock;

use creatordb_core::Platform;
use regex::Regex;

static CHANNEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{22}$").expect("valid regex"));

/// Path segments that name a post or a listing, never an account.
const NON_PROFILE_SEGMENTS: &[&str] = &[
    "p", "reel", "reels", "tv", "stories", "explore", "watch", "shorts", "results", "feed",
    "playlist", "video", "tag", "discover",
];

/// A normalized account reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Lowercased handle without `@`.
    Handle(String),
    /// A YouTube channel id (`UC` + 22 characters), case preserved.
    ChannelId(String),
}

impl Target {
    /// The key the account is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Target::Handle(h) | Target::ChannelId(h) => h,
        }
    }
}

#[must_use]
pub fn is_channel_id(s: &str) -> bool {
    CHANNEL_ID_RE.is_match(s)
}

fn handle(raw: &str) -> Option<Target> {
    let h = raw.trim().trim_start_matches('@').trim_end_matches('/');
    if h.is_empty() || h.contains(char::is_whitespace) {
        return None;
    }
    if is_channel_id(h) {
        return Some(Target::ChannelId(h.to_string()));
    }
    Some(Target::Handle(h.to_ascii_lowercase()))
}

/// Parses `@handle`, a bare handle or channel id, or a profile URL of the
/// shapes `host/@handle`, `host/channel/<id>`, `host/c/<name>`,
/// `host/user/<name>` and `host/<handle>`.
///
/// Returns `None` for empty input and for URLs that point at a post rather
/// than an account.
#[must_use]
pub fn parse_target(raw: &str) -> Option<Target> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    let has_scheme = without_scheme.is_some();
    let s = without_scheme.unwrap_or(trimmed);
    let s = s.split(['?', '#']).next().unwrap_or_default();

    let mut segments = s.split('/').filter(|seg| !seg.is_empty());
    let first = segments.next()?;
    if !has_scheme && Platform::from_url(first).is_none() {
        // Bare handle: anything after a slash is noise.
        return handle(first);
    }

    let segment = segments.next()?;
    if segment.starts_with('@') {
        return handle(segment);
    }
    match segment.to_ascii_lowercase().as_str() {
        "channel" => segments.next().and_then(handle),
        "c" | "user" => segments
            .next()
            .map(|name| Target::Handle(name.to_ascii_lowercase())),
        lower if NON_PROFILE_SEGMENTS.contains(&lower) => None,
        _ => handle(segment),
    }
}
