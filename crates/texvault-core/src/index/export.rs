//! # Graph Export
//!
//! Flattened node/edge view of an [`Index`] for visualization.
//!
//! The view is derived, never persisted. Ordering follows the index's
//! `BTreeMap`, so exports of the same index are byte-identical.

use super::Index;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A note in the exported graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    /// Number of backlinks.
    pub in_degree: usize,
    /// Number of outgoing links (dangling included).
    pub out_degree: usize,
    /// Placeholder for a referenced slug that has no note.
    pub missing: bool,
}

/// A reference edge in the exported graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    /// The target note does not exist.
    pub dangling: bool,
}

/// Nodes and edges of the link graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphView {
    /// Build the view. Dangling targets appear as `missing` nodes.
    #[must_use]
    pub fn from_index(index: &Index) -> Self {
        let mut nodes: Vec<GraphNode> = index
            .notes
            .iter()
            .map(|(slug, entry)| GraphNode {
                id: slug.clone(),
                title: entry.title.clone(),
                in_degree: entry.backlinks.len(),
                out_degree: entry.outgoing_links.len(),
                missing: false,
            })
            .collect();

        let mut edges = Vec::new();
        let mut missing = BTreeSet::new();
        for (source, entry) in &index.notes {
            for target in &entry.outgoing_links {
                let dangling = !index.notes.contains_key(target);
                if dangling {
                    missing.insert(target.clone());
                }
                edges.push(GraphEdge {
                    source: source.clone(),
                    target: target.clone(),
                    dangling,
                });
            }
        }

        nodes.extend(missing.into_iter().map(|slug| GraphNode {
            title: slug.clone(),
            id: slug,
            in_degree: 0,
            out_degree: 0,
            missing: true,
        }));

        Self { nodes, edges }
    }

    /// Render as Graphviz DOT. Missing notes are drawn dashed.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph notes {\n  rankdir=LR;\n  node [shape=box];\n");
        for node in &self.nodes {
            let style = if node.missing { ", style=dashed" } else { "" };
            out.push_str(&format!(
                "  \"{}\" [label=\"{}\"{}];\n",
                dot_escape(&node.id),
                dot_escape(&node.title),
                style
            ));
        }
        for edge in &self.edges {
            let style = if edge.dangling { " [style=dashed]" } else { "" };
            out.push_str(&format!(
                "  \"{}\" -> \"{}\"{};\n",
                dot_escape(&edge.source),
                dot_escape(&edge.target),
                style
            ));
        }
        out.push_str("}\n");
        out
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteHeader;
    use crate::index::IndexEntry;

    fn sample() -> Index {
        let mut index = Index::new();
        let mut intro = IndexEntry::from_header(&NoteHeader::new("intro", "intro.tex", "Intro"));
        intro.outgoing_links.insert("advanced".to_string());
        intro.outgoing_links.insert("missing".to_string());
        index.notes.insert("intro".to_string(), intro);
        index.notes.insert(
            "advanced".to_string(),
            IndexEntry::from_header(&NoteHeader::new("advanced", "advanced.tex", "Advanced")),
        );
        index.rebuild_backlinks();
        index
    }

    #[test]
    fn view_marks_dangling_targets() {
        let view = GraphView::from_index(&sample());

        assert_eq!(view.nodes.len(), 3);
        assert_eq!(view.edges.len(), 2);
        let missing: Vec<_> = view.nodes.iter().filter(|n| n.missing).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "missing");

        let advanced = view.nodes.iter().find(|n| n.id == "advanced").expect("node");
        assert_eq!(advanced.in_degree, 1);
    }

    #[test]
    fn dot_output_is_deterministic() {
        let index = sample();
        let a = GraphView::from_index(&index).to_dot();
        let b = GraphView::from_index(&index).to_dot();
        assert_eq!(a, b);
        assert!(a.starts_with("digraph notes {"));
        assert!(a.contains("\"intro\" -> \"advanced\";"));
        assert!(a.contains("\"intro\" -> \"missing\" [style=dashed];"));
    }

    #[test]
    fn dot_escapes_quotes() {
        assert_eq!(dot_escape(r#"say "hi""#), r#"say \"hi\""#);
    }
}
