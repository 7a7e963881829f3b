//! JSON-LD structured data helpers

use scraper::{Html, Selector};
use serde_json::Value;

/// Parses every `<script type="application/ld+json">` block
///
/// Top-level arrays and `@graph` containers are flattened into individual
/// nodes. Blocks that fail to parse are skipped.
pub fn collect_json_ld(document: &Html) -> Vec<Value> {
    let Ok(script_selector) = Selector::parse("script[type]") else {
        return Vec::new();
    };

    let mut nodes = Vec::new();
    for script in document.select(&script_selector) {
        let is_json_ld = script
            .value()
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
            .unwrap_or(false);
        if !is_json_ld {
            continue;
        }

        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => flatten_into(value, &mut nodes),
            Err(e) => tracing::debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    nodes
}

fn flatten_into(value: Value, nodes: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, nodes);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.get("@graph").cloned() {
                map.retain(|k, _| k != "@graph");
                flatten_into(graph, nodes);
            }
            if !map.is_empty() {
                nodes.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Finds every value stored under `key` anywhere in the given nodes
///
/// Object keys are visited in document order. A node's own value under `key`
/// comes before anything nested inside it, and earlier blocks win when a
/// caller keeps the first hit.
pub fn find_values<'a>(nodes: &'a [Value], key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    for node in nodes {
        walk(node, key, &mut found);
    }
    found
}

fn walk<'a>(value: &'a Value, key: &str, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(own) = map.get(key) {
                found.push(own);
            }
            for v in map.values() {
                walk(v, key, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, key, found);
            }
        }
        _ => {}
    }
}

/// Expands a value into its string members (a string, or an array of strings)
pub fn string_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items.iter().flat_map(string_values).collect(),
        _ => Vec::new(),
    }
}

/// Collects the distinct `@type` names declared by top-level nodes
pub fn schema_types(nodes: &[Value]) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for node in nodes {
        if let Some(declared) = node.get("@type") {
            for name in string_values(declared) {
                if !types.contains(&name) {
                    types.push(name);
                }
            }
        }
    }
    types
}
