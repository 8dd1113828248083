//! Structural checks for trees and documents.
//!
//! Editing operations keep trees well formed, so these rules only fire on
//! data that came from outside (decoded files, hand-built values). The codec
//! refuses documents with `Error` findings.

use crate::id::{NodeId, TreeId};
use crate::model::{Node, NodeKind, Plot, Tree};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashMap;

// ─── Diagnostic types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Breaks a tree invariant; the tree cannot be edited safely.
    Error,
    /// Tolerated, but probably not what the author meant.
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LintDiagnostic {
    pub tree_id: TreeId,
    /// The node this diagnostic refers to.
    pub node_id: NodeId,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-child", "cycle").
    pub rule: &'static str,
}

impl LintDiagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == LintSeverity::Error
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

#[must_use]
pub fn lint_tree(tree: &Tree) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_dangling_children(tree, &mut diags);
    lint_multiple_parents(tree, &mut diags);
    lint_cycles(tree, &mut diags);
    lint_empty_branching(tree, &mut diags);
    lint_slices(tree, &mut diags);
    diags
}

/// Lint every tree of every plot, in plot order.
#[must_use]
pub fn lint_document(plots: &[Plot]) -> Vec<LintDiagnostic> {
    plots
        .iter()
        .flat_map(|plot| plot.trees.iter())
        .flat_map(lint_tree)
        .collect()
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn error(tree: &Tree, node: &Node, rule: &'static str, message: String) -> LintDiagnostic {
    LintDiagnostic {
        tree_id: tree.id,
        node_id: node.id,
        message,
        severity: LintSeverity::Error,
        rule,
    }
}

fn lint_dangling_children(tree: &Tree, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.nodes.iter() {
        let Some(children) = node.children() else {
            continue;
        };
        for child in children.iter().filter(|c| !tree.nodes.contains(*c)) {
            diags.push(error(
                tree,
                node,
                "dangling-child",
                format!("{} lists {child} as a child, but {child} is not in the tree", node.id),
            ));
        }
    }
}

fn lint_multiple_parents(tree: &Tree, diags: &mut Vec<LintDiagnostic>) {
    let mut owner: HashMap<NodeId, NodeId> = HashMap::new();
    for node in tree.nodes.iter() {
        let Some(children) = node.children() else {
            continue;
        };
        for child in children.iter() {
            if let Some(first) = owner.insert(child, node.id) {
                diags.push(error(
                    tree,
                    node,
                    "multiple-parents",
                    format!("{child} is a child of both {first} and {}", node.id),
                ));
            }
        }
    }
}

/// Reports one diagnostic per strongly connected component of the parent
/// relation, on its smallest id.
fn lint_cycles(tree: &Tree, diags: &mut Vec<LintDiagnostic>) {
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for node in tree.nodes.iter() {
        graph.add_node(node.id);
        if let Some(children) = node.children() {
            for child in children.iter().filter(|c| tree.nodes.contains(*c)) {
                graph.add_edge(node.id, child, ());
            }
        }
    }

    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|id| graph.contains_edge(*id, *id));
        if !is_cycle {
            continue;
        }
        let Some(first) = component.iter().min().and_then(|id| tree.nodes.get(*id)) else {
            continue;
        };
        let mut members: Vec<&str> = component.iter().map(|id| id.as_str()).collect();
        members.sort_unstable();
        diags.push(error(
            tree,
            first,
            "cycle",
            format!("parent relation loops through {}", members.join(", ")),
        ));
    }
}

fn lint_empty_branching(tree: &Tree, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.nodes.iter() {
        if let NodeKind::Branching { children, .. } = &node.kind
            && children.is_empty()
        {
            diags.push(error(
                tree,
                node,
                "empty-branching",
                format!("{} is branching but has no children", node.id),
            ));
        }
    }
}

fn lint_slices(tree: &Tree, diags: &mut Vec<LintDiagnostic>) {
    for node in tree.nodes.iter() {
        if let Some(slice) = node.slice()
            && !slice.fits(&tree.sentence)
        {
            diags.push(LintDiagnostic {
                tree_id: tree.id,
                node_id: node.id,
                message: format!(
                    "slice [{}, {}) of {} runs past the end of the sentence",
                    slice.start, slice.end_exclusive, node.id
                ),
                severity: LintSeverity::Warning,
                rule: "slice-out-of-range",
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StringSlice;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn tree(nodes: impl IntoIterator<Item = Node>) -> Tree {
        let mut tree = Tree::new(TreeId::intern("lint_sample"), "Noun verbed.");
        tree.nodes = nodes.into_iter().collect();
        tree
    }

    fn rules(tree: &Tree) -> Vec<&'static str> {
        lint_tree(tree).into_iter().map(|d| d.rule).collect()
    }

    #[test]
    fn well_formed_tree_is_clean() {
        let tree = tree([
            Node::branching(id("top"), "S", [id("term1"), id("term2")]),
            Node::terminal(id("term1"), "N", StringSlice::new(0, 4)),
            Node::terminal(id("term2"), "VP", StringSlice::new(5, 11)),
        ]);
        assert!(lint_tree(&tree).is_empty());
    }

    #[test]
    fn dangling_child() {
        let tree = tree([Node::branching(id("top"), "S", [id("ghost")])]);
        let diags = lint_tree(&tree);
        assert_eq!(rules(&tree), vec!["dangling-child"]);
        assert_eq!(diags[0].node_id, id("top"));
        assert!(diags[0].is_error());
    }

    #[test]
    fn multiple_parents() {
        let tree = tree([
            Node::branching(id("a"), "A", [id("term1")]),
            Node::branching(id("b"), "B", [id("term1")]),
            Node::terminal(id("term1"), "N", StringSlice::new(0, 4)),
        ]);
        assert_eq!(rules(&tree), vec!["multiple-parents"]);
    }

    #[test]
    fn cycle_is_reported_once() {
        let tree = tree([
            Node::branching(id("cyc_a"), "A", [id("cyc_b")]),
            Node::branching(id("cyc_b"), "B", [id("cyc_a")]),
            Node::branching(id("loop"), "L", [id("loop")]),
        ]);
        let diags: Vec<_> = lint_tree(&tree)
            .into_iter()
            .filter(|d| d.rule == "cycle")
            .map(|d| d.node_id)
            .collect();
        assert_eq!(diags.len(), 2);
        assert!(diags.contains(&id("cyc_a")));
        assert!(diags.contains(&id("loop")));
    }

    #[test]
    fn empty_branching() {
        let tree = tree([Node::branching(id("top"), "S", Vec::new())]);
        assert_eq!(rules(&tree), vec!["empty-branching"]);
    }

    #[test]
    fn slice_out_of_range_is_a_warning() {
        let tree = tree([Node::terminal(id("term1"), "N", StringSlice::new(5, 40))]);
        let diags = lint_tree(&tree);
        assert_eq!(rules(&tree), vec!["slice-out-of-range"]);
        assert_eq!(diags[0].severity, LintSeverity::Warning);
    }

    #[test]
    fn document_lint_visits_every_plot() {
        let bad = tree([Node::branching(id("top"), "S", [id("ghost")])]);
        let plots = vec![Plot::new(), Plot::new().add_tree(bad)];
        assert_eq!(lint_document(&plots).len(), 1);
    }
}
