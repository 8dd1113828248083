//! Emitter: `Tree` → labelled-bracket notation.
//!
//! Output round-trips through `parser::parse_tree`. Stranded nodes are
//! written as empty brackets, so what they remember is not preserved. A
//! caret terminal covers no words and also comes back as a stranded node.

use crate::id::NodeId;
use crate::model::*;
use crate::query::{descendant_ids, top_level_ids};
use std::collections::HashSet;
use std::fmt::Write;

/// Emit `tree` as bracket notation on one line. With `with_ids` every label
/// carries its `@id`.
#[must_use]
pub fn emit_tree(tree: &Tree, with_ids: bool) -> String {
    let mut emitter = Emitter {
        tree,
        with_ids,
        out: String::with_capacity(tree.sentence.len() * 2 + tree.nodes.len() * 8),
        visited: HashSet::new(),
    };
    let roots = emitter.in_sentence_order(top_level_ids(&tree.nodes));
    for (i, id) in roots.into_iter().enumerate() {
        if i > 0 {
            emitter.out.push(' ');
        }
        emitter.emit_node(id);
    }
    emitter.out
}

struct Emitter<'a> {
    tree: &'a Tree,
    with_ids: bool,
    out: String,
    visited: HashSet<NodeId>,
}

impl Emitter<'_> {
    fn emit_node(&mut self, id: NodeId) {
        let Some(node) = self.tree.nodes.get(id) else {
            return;
        };
        if !self.visited.insert(id) {
            return;
        }
        self.out.push('[');
        self.out.push_str(&sanitize_label(&node.label));
        let marked = match &node.kind {
            NodeKind::Branching { folded, .. } => *folded,
            NodeKind::Terminal { triangle, .. } => *triangle,
            NodeKind::Stranded(_) => false,
        };
        if marked {
            self.out.push('^');
        }
        if self.with_ids {
            let _ = write!(self.out, "@{}", id.as_str());
        }

        match &node.kind {
            NodeKind::Branching { children, .. } => {
                for child in self.in_sentence_order(children.iter()) {
                    self.out.push(' ');
                    self.emit_node(child);
                }
            }
            NodeKind::Terminal { slice, .. } => {
                for word in slice.text(&self.tree.sentence).split_whitespace() {
                    self.out.push(' ');
                    self.out.push_str(word);
                }
            }
            NodeKind::Stranded(_) => {}
        }
        self.out.push(']');
    }

    /// Sort by the leftmost sentence position covered, then by id.
    fn in_sentence_order(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut keyed: Vec<(usize, NodeId)> = ids
            .into_iter()
            .map(|id| (self.leftmost(id), id))
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    fn leftmost(&self, id: NodeId) -> usize {
        let nodes = &self.tree.nodes;
        std::iter::once(id)
            .chain(descendant_ids(nodes, id))
            .filter_map(|d| nodes.get(d).and_then(Node::slice))
            .map(|s| s.start)
            .min()
            .unwrap_or(usize::MAX)
    }
}

/// Labels are single tokens in the notation.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '[' | ']' | '@') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TreeId;
    use crate::parser::{parse_tree, parse_tree_with_id};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn emit_follows_sentence_order() {
        let mut tree = Tree::new(TreeId::intern("emit_sample"), "Noun verbed.");
        // "vp" sorts before "np" by id, but comes later in the sentence.
        tree.nodes = [
            Node::branching(id("emit_top"), "S", [id("vp"), id("np")]),
            Node::terminal(id("np"), "NP", StringSlice::new(0, 4)),
            Node::terminal(id("vp"), "VP", StringSlice::new(5, 12)),
        ]
        .into_iter()
        .collect();
        assert_eq!(emit_tree(&tree, false), "[S [NP Noun] [VP verbed.]]");
        assert_eq!(
            emit_tree(&tree, true),
            "[S@emit_top [NP@np Noun] [VP@vp verbed.]]"
        );
    }

    #[test]
    fn roundtrip_through_parser() {
        let source = "[S@r1 [NP^@r2 [N@r3 old dogs]] [VP@r4 [V^@r5 sleep soundly]]] [XP@r6]";
        let tree = parse_tree_with_id(source, TreeId::intern("emit_rt")).unwrap();
        let emitted = emit_tree(&tree, true);
        assert_eq!(emitted, source);
        let reparsed = parse_tree_with_id(&emitted, TreeId::intern("emit_rt")).unwrap();
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn labels_are_sanitized() {
        let mut tree = Tree::new(TreeId::intern("emit_labels"), "x");
        tree.nodes = [Node::terminal(id("odd"), "N P[1]", StringSlice::new(0, 1))]
            .into_iter()
            .collect();
        let emitted = emit_tree(&tree, false);
        assert_eq!(emitted, "[N_P_1_ x]");
        assert!(parse_tree(&emitted).is_ok());
    }
}
