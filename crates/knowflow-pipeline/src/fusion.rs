//! Merging vector and graph evidence into one context string

use knowflow_core::{EvidenceItem, GraphRecord};
use serde_json::{Map, Value};

/// Items taken from each evidence source
pub const MAX_ITEMS_PER_SOURCE: usize = 3;

const KIND_KEYS: [&str; 2] = ["type", "label"];
const RESERVED_KEYS: [&str; 5] = ["type", "label", "labels", "properties", "relationships"];

/// The first three vector texts followed by the first three graph records, blank-line separated
pub fn fuse(vector: &[EvidenceItem], graph: &[GraphRecord]) -> String {
    vector
        .iter()
        .take(MAX_ITEMS_PER_SOURCE)
        .map(|item| item.text.clone())
        .chain(graph.iter().take(MAX_ITEMS_PER_SOURCE).map(render_graph_record))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `Type: ..\nProperties: ..` with an optional `\nRelationships: ..` line
///
/// Records from generated queries rarely carry a `properties` map; their remaining
/// columns are rendered as properties instead.
pub fn render_graph_record(record: &GraphRecord) -> String {
    let kind = KIND_KEYS
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .or_else(|| {
            record
                .get("labels")
                .and_then(Value::as_array)
                .and_then(|labels| labels.first())
                .and_then(Value::as_str)
        })
        .unwrap_or("Unknown");

    let properties = match record.get("properties").and_then(Value::as_object) {
        Some(properties) => render_properties(properties),
        None => {
            let columns: Map<String, Value> = record
                .iter()
                .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            render_properties(&columns)
        }
    };

    let mut text = format!("Type: {kind}\nProperties: {properties}");
    if let Some(relationships) = record.get("relationships").and_then(Value::as_array) {
        let types: Vec<String> = relationships
            .iter()
            .filter_map(|rel| match rel {
                Value::String(kind) => Some(kind.clone()),
                Value::Object(object) => object.get("type").map(display_value),
                _ => None,
            })
            .collect();
        text.push_str(&format!("\nRelationships: {}", types.join(", ")));
    }
    text
}

/// `k: v, ...` in key order
pub fn render_properties(properties: &Map<String, Value>) -> String {
    let mut entries: Vec<(&String, &Value)> = properties.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, value)| format!("{key}: {}", display_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
