//! Pulling structural data out of profile-page HTML: page-state JSON in
//! `<script>` tags, JavaScript variable assignments, and `<meta>` tags.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static SCRIPT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script>").expect("valid script regex")
});
static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr regex")
});

/// Value of `attr` in a tag's attribute text, case-insensitive on the name.
#[must_use]
pub fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    ATTR_RE.captures_iter(tag).find_map(|c| {
        let name = c.get(1)?.as_str();
        if !name.eq_ignore_ascii_case(attr) {
            return None;
        }
        c.get(2)
            .or_else(|| c.get(3))
            .map(|m| decode_entities(m.as_str().trim()))
    })
}

/// Parses the body of `<script id="...">` as JSON.
#[must_use]
pub fn script_json_by_id(html: &str, id: &str) -> Option<Value> {
    SCRIPT_TAG_RE.captures_iter(html).find_map(|c| {
        let attrs = c.get(1)?.as_str();
        if extract_attr(attrs, "id").as_deref() != Some(id) {
            return None;
        }
        serde_json::from_str(c.get(2)?.as_str().trim()).ok()
    })
}

/// Every `<script type="application/json">` body that parses.
#[must_use]
pub fn application_json_scripts(html: &str) -> Vec<Value> {
    SCRIPT_TAG_RE
        .captures_iter(html)
        .filter(|c| {
            c.get(1)
                .and_then(|a| extract_attr(a.as_str(), "type"))
                .is_some_and(|t| t.eq_ignore_ascii_case("application/json"))
        })
        .filter_map(|c| serde_json::from_str(c.get(2)?.as_str().trim()).ok())
        .collect()
}

/// Parses the object literal assigned to a JavaScript variable, e.g.
/// `window._sharedData = {...};` or `var ytInitialData = {...};`.
///
/// Every occurrence of `name` is tried until one yields valid JSON.
#[must_use]
pub fn assigned_json(html: &str, name: &str) -> Option<Value> {
    let mut search_from = 0;
    while let Some(offset) = html[search_from..].find(name) {
        let after = search_from + offset + name.len();
        search_from = after;

        let rest = html[after..].trim_start();
        let Some(rest) = rest
            .strip_prefix('=')
            .or_else(|| rest.strip_prefix("\"]").map(|r| r.trim_start().trim_start_matches('=')))
        else {
            continue;
        };
        let rest = rest.trim_start();
        if let Some(object) = extract_balanced_object(rest) {
            if let Ok(value) = serde_json::from_str(object) {
                return Some(value);
            }
        }
    }
    None
}

/// The shortest prefix of `s` forming a balanced `{...}`, honoring string
/// literals and escapes.
#[must_use]
pub fn extract_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            ']' => depth -= 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
#[must_use]
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let matches = ["property", "name", "itemprop"]
            .iter()
            .filter_map(|a| extract_attr(tag, a))
            .any(|v| v.eq_ignore_ascii_case(key));
        if matches {
            extract_attr(tag, "content").filter(|c| !c.is_empty())
        } else {
            None
        }
    })
}

/// Minimal entity decoding for attribute values.
#[must_use]
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Unescapes a JSON string fragment captured by a regex (`\u0026`, `\/`).
#[must_use]
pub fn unescape_json_fragment(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
