//! Per-platform engines: strategies, endpoints and record shapes.

pub mod instagram;
pub mod tiktok;
pub mod youtube;

use std::collections::HashMap;
use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

pub use instagram::InstagramEngine;
pub use tiktok::TikTokEngine;
pub use youtube::YouTubeEngine;

use crate::html::meta_content;
use crate::normalize::parse_count;

static LABELED_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d.,\u{a0} ]*?(?:\s*(?:k|m|b|mil|mi|bi|mln)\b)?)\s*(followers|following|posts|likes|subscribers|videos|views)\b",
    )
    .expect("valid labeled count regex")
});

/// Query-string component encoding: everything but unreserved characters.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

pub(crate) fn encode(component: &str) -> String {
    utf8_percent_encode(component, QUERY).to_string()
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Counts introduced by a label in free text, keyed by the lowercased label.
///
/// `"1.2M Followers, 56 Following, 78 Posts"` yields `followers => 1200000`,
/// `following => 56`, `posts => 78`. The first occurrence of a label wins.
pub(crate) fn labeled_counts(text: &str) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for caps in LABELED_COUNT_RE.captures_iter(text) {
        let (Some(number), Some(label)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        counts
            .entry(label.as_str().to_ascii_lowercase())
            .or_insert_with(|| parse_count(number.as_str()));
    }
    counts
}

/// The Open Graph tags a profile page carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OpenGraph {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl OpenGraph {
    pub(crate) fn from_html(html: &str) -> Self {
        Self {
            title: meta_content(html, "og:title").or_else(|| meta_content(html, "twitter:title")),
            description: meta_content(html, "og:description")
                .or_else(|| meta_content(html, "description")),
            image: meta_content(html, "og:image").or_else(|| meta_content(html, "twitter:image")),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_counts_reads_profile_descriptions() {
        let counts =
            labeled_counts("1.2M Followers, 1,234 Following, 78 Posts - See Instagram photos");
        assert_eq!(counts["followers"], 1_200_000);
        assert_eq!(counts["following"], 1234);
        assert_eq!(counts["posts"], 78);
    }

    #[test]
    fn labeled_counts_handles_locale_suffixes() {
        let counts = labeled_counts("Creator (@creator1) no TikTok | 12,3 mil curtidas. 3,4 mil followers.");
        assert_eq!(counts["followers"], 3400);
        assert!(!counts.contains_key("likes"));
    }

    #[test]
    fn labeled_counts_first_occurrence_wins() {
        let counts = labeled_counts("10 videos and later 20 videos");
        assert_eq!(counts["videos"], 10);
    }

    #[test]
    fn open_graph_falls_back_to_plain_meta() {
        let html = r#"<meta name="description" content="5 subscribers"><meta property="og:image" content="https://cdn/a.jpg">"#;
        let og = OpenGraph::from_html(html);
        assert_eq!(og.description.as_deref(), Some("5 subscribers"));
        assert_eq!(og.image.as_deref(), Some("https://cdn/a.jpg"));
        assert!(og.title.is_none());
        assert!(!og.is_empty());
    }

    #[test]
    fn encode_escapes_reserved_characters() {
        assert_eq!(encode(r#"{"id":"1"}"#), "%7B%22id%22%3A%221%22%7D");
        assert_eq!(encode("a-b_c.d~"), "a-b_c.d~");
    }
}
