//! Public channel feed (`/feeds/videos.xml`) as a generic JSON tree.
//!
//! Elements become objects keyed by local name (`yt:videoId` -> `videoId`,
//! `media:group` -> `group`), attributes become `@name` keys, and repeated
//! siblings become arrays. A leaf element with no attributes is a string.
//! The extractor then treats the feed like any other payload.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::HarvestError;

fn local(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Map<String, Value> {
    let mut map = Map::new();
    for attr in e.attributes().flatten() {
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = format!("@{}", local(attr.key.local_name().as_ref()));
        let value = attr
            .unescape_value()
            .map_or_else(|_| local(&attr.value), std::borrow::Cow::into_owned);
        map.insert(key, Value::String(value));
    }
    map
}

fn finish(mut map: Map<String, Value>, text: String) -> Value {
    if map.is_empty() {
        return Value::String(text);
    }
    if !text.is_empty() {
        map.insert("#text".to_string(), Value::String(text));
    }
    Value::Object(map)
}

fn insert_child(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        None => {
            parent.insert(name, value);
        }
        Some(Value::Array(repeated)) => repeated.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Parses an Atom/RSS document into a JSON object rooted at the document.
///
/// # Errors
///
/// Returns [`HarvestError::UnrecognizedPayload`] on malformed XML or a
/// document without a root element.
pub fn xml_to_value(xml: &str) -> Result<Value, HarvestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // (local name, attributes + children, text)
    let mut stack: Vec<(String, Map<String, Value>, String)> =
        vec![(String::new(), Map::new(), String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push((local(e.local_name().as_ref()), attributes(&e), String::new()));
            }
            Ok(Event::Empty(e)) => {
                let value = finish(attributes(&e), String::new());
                if let Some((_, parent, _)) = stack.last_mut() {
                    insert_child(parent, local(e.local_name().as_ref()), value);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(HarvestError::unrecognized("feed xml: unbalanced end tag"));
                }
                if let Some((name, map, text)) = stack.pop() {
                    if let Some((_, parent, _)) = stack.last_mut() {
                        insert_child(parent, name, finish(map, text));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(HarvestError::unrecognized(format!("feed xml: {e}"))),
            _ => {}
        }
    }

    match stack.pop() {
        Some((_, root, _)) if stack.is_empty() && !root.is_empty() => Ok(Value::Object(root)),
        _ => Err(HarvestError::unrecognized("feed xml: no root element")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <title>Channel &amp; Co</title>
 <yt:channelId>UCabcdefghijklmnopqrstuv</yt:channelId>
 <author><name>Channel</name><uri>https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv</uri></author>
 <entry>
  <yt:videoId>dQw4w9WgXcQ</yt:videoId>
  <title>First</title>
  <published>2024-01-02T03:04:05+00:00</published>
  <media:group>
   <media:thumbnail url="https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" width="480" height="360"/>
   <media:community><media:statistics views="1234"/></media:community>
  </media:group>
 </entry>
 <entry>
  <yt:videoId>aaaaaaaaaaa</yt:videoId>
  <title>Second</title>
 </entry>
</feed>"#;

    #[test]
    fn feed_becomes_tree_keyed_by_local_name() {
        let value = xml_to_value(FEED).unwrap();
        let feed = &value["feed"];
        assert_eq!(feed["title"], "Channel & Co");
        assert_eq!(feed["channelId"], "UCabcdefghijklmnopqrstuv");
        assert_eq!(feed["author"]["name"], "Channel");

        let entries = feed["entry"].as_array().expect("repeated entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["videoId"], "dQw4w9WgXcQ");
        assert_eq!(entries[0]["group"]["community"]["statistics"]["@views"], "1234");
        assert_eq!(entries[0]["group"]["thumbnail"]["@width"], "480");
        assert!(feed.get("@yt").is_none());
    }

    #[test]
    fn malformed_xml_is_unrecognized() {
        assert!(matches!(
            xml_to_value("<feed><entry></feed>"),
            Err(HarvestError::UnrecognizedPayload { .. })
        ));
        assert!(xml_to_value("").is_err());
    }
}
