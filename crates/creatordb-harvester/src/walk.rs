//! Depth-bounded traversal over arbitrary JSON trees.
//!
//! The visitor is pure with respect to the tree: it only observes nodes and
//! tells the walker whether to look inside them.

use serde_json::Value;

/// What the walker should do after visiting a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Descend,
    /// Do not look at this node's children.
    Skip,
}

/// Pre-order walk in key order. Nodes deeper than `max_depth` are
/// never visited; the root is depth 0.
pub fn walk<'a, F>(root: &'a Value, max_depth: usize, visitor: &mut F)
where
    F: FnMut(&'a Value, usize) -> Visit,
{
    let mut stack: Vec<(&'a Value, usize)> = vec![(root, 0)];

    while let Some((node, depth)) = stack.pop() {
        if visitor(node, depth) == Visit::Skip || depth >= max_depth {
            continue;
        }

        match node {
            Value::Object(map) => {
                let start = stack.len();
                stack.extend(map.values().map(|child| (child, depth + 1)));
                stack[start..].reverse();
            }
            Value::Array(items) => {
                stack.extend(items.iter().rev().map(|child| (child, depth + 1)));
            }
            _ => {}
        }
    }
}

/// First non-null value stored under any of `keys`, in pre-order.
#[must_use]
pub fn find_key<'a>(root: &'a Value, keys: &[&str], max_depth: usize) -> Option<&'a Value> {
    let mut found = None;
    walk(root, max_depth, &mut |node, _| {
        if found.is_some() {
            return Visit::Skip;
        }
        if let Value::Object(map) = node {
            if let Some(hit) = keys
                .iter()
                .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
            {
                found = Some(hit);
                return Visit::Skip;
            }
        }
        Visit::Descend
    });
    found
}
