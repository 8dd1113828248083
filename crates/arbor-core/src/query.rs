//! Read-only structural queries over a node collection.
//!
//! Parent links are not stored; they are derived from the `children` sets.
//! Every walk is bounded by the collection size so a corrupt (cyclic)
//! collection cannot hang a query.

use crate::entity::EntitySet;
use crate::id::NodeId;
use crate::model::{ChildSet, Node, StringSlice, Tree};
use std::collections::{BTreeSet, HashMap};

/// Map from child id to the id of the branching node that owns it.
pub fn parent_map(nodes: &EntitySet<Node>) -> HashMap<NodeId, NodeId> {
    let mut parents = HashMap::with_capacity(nodes.len());
    for node in nodes.iter() {
        if let Some(children) = node.children() {
            for child in children.iter() {
                parents.insert(child, node.id);
            }
        }
    }
    parents
}

/// The branching node listing `id` as a child, if any.
pub fn parent_id(nodes: &EntitySet<Node>, id: NodeId) -> Option<NodeId> {
    nodes
        .iter()
        .find(|n| n.children().is_some_and(|c| c.contains(id)))
        .map(|n| n.id)
}

/// Direct parents of any of `ids`.
pub fn parent_ids(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> BTreeSet<NodeId> {
    let wanted: ChildSet = ids.into_iter().collect();
    nodes
        .iter()
        .filter(|n| n.children().is_some_and(|c| c.intersects(&wanted)))
        .map(|n| n.id)
        .collect()
}

/// Direct children of any of `ids`.
pub fn child_ids(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> BTreeSet<NodeId> {
    ids.into_iter()
        .filter_map(|id| nodes.get(id))
        .filter_map(Node::children)
        .flat_map(|c| c.iter())
        .collect()
}

/// Nodes that no branching node claims as a child, in id order.
pub fn top_level_ids(nodes: &EntitySet<Node>) -> Vec<NodeId> {
    let parents = parent_map(nodes);
    nodes.ids().filter(|id| !parents.contains_key(id)).collect()
}

/// Every node below `id`, excluding `id` itself. Children that do not
/// resolve are skipped.
pub fn descendant_ids(nodes: &EntitySet<Node>, id: NodeId) -> BTreeSet<NodeId> {
    let mut found = BTreeSet::new();
    let mut stack: Vec<NodeId> = nodes
        .get(id)
        .and_then(Node::children)
        .map(|c| c.iter().collect())
        .unwrap_or_default();
    while let Some(current) = stack.pop() {
        if current == id || !nodes.contains(current) || !found.insert(current) {
            continue;
        }
        if let Some(children) = nodes.get(current).and_then(Node::children) {
            stack.extend(children.iter());
        }
    }
    found
}

/// The subtree below `id`, sharing node allocations with `nodes`.
pub fn descendants(nodes: &EntitySet<Node>, id: NodeId) -> EntitySet<Node> {
    nodes.subset(&descendant_ids(nodes, id))
}

/// Strict ancestors of `id`, nearest first.
pub fn ancestor_ids(nodes: &EntitySet<Node>, id: NodeId) -> Vec<NodeId> {
    let parents = parent_map(nodes);
    let mut out = Vec::new();
    let mut current = id;
    while let Some(&parent) = parents.get(&current) {
        if parent == id || out.len() > nodes.len() {
            break;
        }
        out.push(parent);
        current = parent;
    }
    out
}

/// True iff `a` is a (direct or indirect) ancestor of `b`.
pub fn dominates(nodes: &EntitySet<Node>, a: NodeId, b: NodeId) -> bool {
    a != b && ancestor_ids(nodes, b).contains(&a)
}

/// Other children of `id`'s parent. Empty for top-level nodes.
pub fn sibling_ids(nodes: &EntitySet<Node>, id: NodeId) -> Vec<NodeId> {
    parent_id(nodes, id)
        .and_then(|p| nodes.get(p))
        .and_then(Node::children)
        .map(|c| c.iter().filter(|s| *s != id).collect())
        .unwrap_or_default()
}

/// `a` c-commands `b` iff they differ, neither dominates the other, and the
/// lowest ancestor of `a` with more than one child dominates `b`.
pub fn c_commands(nodes: &EntitySet<Node>, a: NodeId, b: NodeId) -> bool {
    if a == b || !nodes.contains(a) || !nodes.contains(b) {
        return false;
    }
    if dominates(nodes, a, b) || dominates(nodes, b, a) {
        return false;
    }
    ancestor_ids(nodes, a)
        .into_iter()
        .find(|anc| {
            nodes
                .get(*anc)
                .and_then(Node::children)
                .is_some_and(|c| c.len() > 1)
        })
        .is_some_and(|branching_ancestor| dominates(nodes, branching_ancestor, b))
}

/// Terminals whose slice overlaps `slice` (for a caret: whose closed range
/// contains it).
pub fn node_ids_assigned_to_slice(nodes: &EntitySet<Node>, slice: StringSlice) -> Vec<NodeId> {
    nodes
        .iter()
        .filter(|n| n.slice().is_some_and(|s| s.overlaps(&slice)))
        .map(|n| n.id)
        .collect()
}

/// Loose completeness check: exactly one top-level node, and it has a
/// non-empty label. Intentionally not a syntactic well-formedness test.
pub fn is_complete(nodes: &EntitySet<Node>) -> bool {
    match top_level_ids(nodes).as_slice() {
        [only] => nodes.get(*only).is_some_and(|n| !n.label.is_empty()),
        _ => false,
    }
}

impl Tree {
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        dominates(&self.nodes, a, b)
    }

    pub fn c_commands(&self, a: NodeId, b: NodeId) -> bool {
        c_commands(&self.nodes, a, b)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        parent_id(&self.nodes, id)
    }

    pub fn top_level_ids(&self) -> Vec<NodeId> {
        top_level_ids(&self.nodes)
    }

    pub fn node_ids_assigned_to_slice(&self, slice: StringSlice) -> Vec<NodeId> {
        node_ids_assigned_to_slice(&self.nodes, slice)
    }

    pub fn is_complete(&self) -> bool {
        is_complete(&self.nodes)
    }
}
