//! Table and JSON rendering for command results

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use knowflow_core::{
    ContextNode, ConversationSession, EvidenceItem, EvidenceSource, Message, SubResponse,
};
use serde::Serialize;

const PREVIEW_CHARS: usize = 80;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Single-line preview of at most `max` characters
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn sessions_table(sessions: &[ConversationSession]) -> Table {
    let mut table = table(vec!["ID", "Title", "Last activity", "Recent nodes"]);
    for session in sessions {
        table.add_row(vec![
            session.id.to_string(),
            session.title.clone(),
            session.last_activity.format("%Y-%m-%d %H:%M").to_string(),
            session.recent_node_ids.len().to_string(),
        ]);
    }
    table
}

pub fn messages_table(messages: &[Message]) -> Table {
    let mut table = table(vec!["When", "Sender", "Content"]);
    for message in messages {
        table.add_row(vec![
            message.created_at.format("%H:%M:%S").to_string(),
            message.sender.as_str().to_string(),
            preview(&message.content, PREVIEW_CHARS * 2),
        ]);
    }
    table
}

pub fn evidence_table(items: &[EvidenceItem]) -> Table {
    let mut table = table(vec!["Source", "Score", "Text"]);
    for item in items {
        let source = match item.source {
            EvidenceSource::Vector => "vector",
            EvidenceSource::Graph => "graph",
        };
        let score = item
            .score
            .map(|score| format!("{score:.3}"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            source.to_string(),
            score,
            preview(&item.text, PREVIEW_CHARS),
        ]);
    }
    table
}

pub fn sub_responses_table(sub_responses: &[SubResponse]) -> Table {
    let mut table = table(vec!["Sub-question", "Answer"]);
    for sub in sub_responses {
        table.add_row(vec![
            sub.question.clone(),
            preview(&sub.message, PREVIEW_CHARS),
        ]);
    }
    table
}

pub fn context_nodes_table(nodes: &[ContextNode]) -> Table {
    let mut table = table(vec!["Node", "Label", "Name"]);
    for node in nodes {
        let name = node
            .properties
            .get("name")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        table.add_row(vec![
            node.id.clone(),
            node.label.clone().unwrap_or_default(),
            preview(name, PREVIEW_CHARS),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_evidence_table_marks_unscored_graph_items() {
        let rendered = evidence_table(&[
            EvidenceItem::vector("Refunds within 30 days", 0.91234),
            EvidenceItem::graph("Type: Concept"),
        ])
        .to_string();
        assert!(rendered.contains("0.912"));
        assert!(rendered.contains("graph"));
        assert!(rendered.contains(" - "));
    }
}
