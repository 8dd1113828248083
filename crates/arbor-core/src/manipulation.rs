//! Structural editing of node collections and plots.
//!
//! Every operation is a pure function from the old collection to a new one.
//! Entries an operation does not touch keep their allocation (see
//! `EntitySet::shares_entry`). Degenerate requests (self adoption, empty
//! target sets, absent ids) return the input unchanged; only a missing
//! *subject* node (the parent in an insert, the adopting or disowning node)
//! is reported as `NoSuchNode`.
//!
//! Stranding: a branching node that loses its last child becomes
//! `FormerlyBranching`, holding its whole subtree as it was before the edit.
//! A node that was a terminal until it gained children strands back to
//! `FormerlyTerminal` with the slice it had.

use crate::entity::EntitySet;
use crate::error::CoreResult;
use crate::id::{NodeId, TreeId};
use crate::model::*;
use crate::query::{descendants, dominates};
use std::collections::BTreeMap;

// ─── Stranding helpers ────────────────────────────────────────────────────

/// `node` lost all of its children; remember its subtree from `before`,
/// or its old anchoring if it was promoted from a terminal.
fn strand(node: &Node, before: &EntitySet<Node>) -> Node {
    let kind = match node.kind {
        NodeKind::Branching {
            former_terminal: Some(FormerTerminal { slice, triangle }),
            ..
        } => StrandedKind::FormerlyTerminal {
            former_slice: slice,
            former_triangle: triangle,
        },
        _ => StrandedKind::FormerlyBranching {
            former_descendants: descendants(before, node.id),
        },
    };
    node.with_kind(NodeKind::Stranded(kind))
}

/// Remove `detached` from the children of every branching node in `nodes`
/// (except `keep`), stranding the ones left empty.
fn detach(
    before: &EntitySet<Node>,
    nodes: &EntitySet<Node>,
    detached: &ChildSet,
    keep: Option<NodeId>,
) -> EntitySet<Node> {
    nodes.update_where(|node| {
        if Some(node.id) == keep {
            return None;
        }
        let children = node.children()?;
        if !children.intersects(detached) {
            return None;
        }
        let remaining = children.without(detached);
        Some(if remaining.is_empty() {
            strand(node, before)
        } else {
            node.with_children(remaining)
        })
    })
}

// ─── Insert / adopt / disown / delete ─────────────────────────────────────

/// Create the node described by `inserted` under the id `new_id`.
///
/// Branching requests take their target children away from their current
/// parents. A target parent that is not branching yet is converted into a
/// branching node owning only the new node.
pub fn insert_node(
    nodes: &EntitySet<Node>,
    new_id: NodeId,
    inserted: &InsertedNode,
) -> CoreResult<EntitySet<Node>> {
    let parent = match inserted.target_parent_id {
        Some(parent_id) => Some(nodes.try_get(parent_id)?.id),
        None => None,
    };
    if nodes.contains(new_id) {
        log::warn!("insert_node: {new_id} already exists, ignoring insert");
        return Ok(nodes.clone());
    }

    let (with_children_detached, new_node) = match &inserted.kind {
        InsertedKind::Branching { target_child_ids } => {
            // A target child may not be (or contain) the target parent.
            let targets: ChildSet = target_child_ids
                .iter()
                .filter(|id| nodes.contains(*id))
                .filter(|id| parent.is_none_or(|p| *id != p && !dominates(nodes, *id, p)))
                .collect();
            let node = if targets.is_empty() {
                Node::stranded(new_id, inserted.label.clone())
            } else {
                Node::new(
                    new_id,
                    inserted.label.clone(),
                    NodeKind::Branching {
                        children: targets.clone(),
                        folded: false,
                        former_terminal: None,
                    },
                )
            };
            (detach(nodes, nodes, &targets, parent), node)
        }
        InsertedKind::Terminal {
            target_slice,
            triangle,
        } => (
            nodes.clone(),
            Node::new(
                new_id,
                inserted.label.clone(),
                NodeKind::Terminal {
                    slice: *target_slice,
                    triangle: *triangle,
                },
            ),
        ),
    };

    let result = with_children_detached.insert(new_node);
    Ok(match parent {
        Some(parent_id) => {
            let moved = match &inserted.kind {
                InsertedKind::Branching { target_child_ids } => target_child_ids.clone(),
                InsertedKind::Terminal { .. } => ChildSet::new(),
            };
            result.transform(parent_id, |p| attach_child(p, new_id, &moved))
        }
        None => result,
    })
}

/// Add `child` to `parent`, dropping the ids in `moved` that now live
/// under `child`.
fn attach_child(parent: &Node, child: NodeId, moved: &ChildSet) -> Node {
    match parent.children() {
        Some(children) => {
            let mut children = children.without(moved);
            children.insert(child);
            parent.with_children(children)
        }
        None => parent.with_kind(NodeKind::Branching {
            children: [child].into_iter().collect(),
            folded: false,
            former_terminal: parent.terminal_memory(),
        }),
    }
}

/// Make `adopted` children of `adopting`, taking them from their current
/// parents. A non-branching adopting node is promoted to branching; a
/// terminal keeps its slice aside so it can strand back to it.
pub fn adopt_nodes(
    nodes: &EntitySet<Node>,
    adopting: NodeId,
    adopted: impl IntoIterator<Item = NodeId>,
) -> CoreResult<EntitySet<Node>> {
    let adopting_node = nodes.try_get(adopting)?;
    let requested: ChildSet = adopted.into_iter().collect();
    if requested.contains(adopting) {
        log::debug!("adopt_nodes: {adopting} cannot adopt itself");
        return Ok(nodes.clone());
    }
    // Absent ids and ancestors of the adopting node (which would close a
    // cycle) are dropped.
    let targets: ChildSet = requested
        .iter()
        .filter(|id| nodes.contains(*id) && !dominates(nodes, *id, adopting))
        .collect();
    if targets.is_empty() {
        log::debug!("adopt_nodes: nothing to adopt for {adopting}");
        return Ok(nodes.clone());
    }

    let adopter = match adopting_node.children() {
        Some(children) => adopting_node.with_children(children.union(&targets)),
        None => adopting_node.with_kind(NodeKind::Branching {
            children: targets.clone(),
            folded: false,
            former_terminal: adopting_node.terminal_memory(),
        }),
    };
    Ok(detach(nodes, nodes, &targets, Some(adopting)).insert(adopter))
}

/// Remove `disowned` from the children of `disowning`, stranding it if no
/// children remain.
pub fn disown_nodes(
    nodes: &EntitySet<Node>,
    disowning: NodeId,
    disowned: impl IntoIterator<Item = NodeId>,
) -> CoreResult<EntitySet<Node>> {
    let node = nodes.try_get(disowning)?;
    let disowned: ChildSet = disowned.into_iter().collect();
    if disowned.contains(disowning) {
        log::debug!("disown_nodes: {disowning} cannot disown itself");
        return Ok(nodes.clone());
    }
    let Some(children) = node.children() else {
        return Ok(nodes.clone());
    };
    if !children.intersects(&disowned) {
        return Ok(nodes.clone());
    }
    let remaining = children.without(&disowned);
    let replacement = if remaining.is_empty() {
        strand(node, nodes)
    } else {
        node.with_children(remaining)
    };
    Ok(nodes.insert(replacement))
}

/// Remove the listed nodes. Their children are kept and become top-level
/// unless another remaining ancestor still owns them.
#[must_use]
pub fn delete_nodes(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> EntitySet<Node> {
    let doomed: ChildSet = ids.into_iter().filter(|id| nodes.contains(*id)).collect();
    if doomed.is_empty() {
        return nodes.clone();
    }
    let doomed_ids: Vec<NodeId> = doomed.iter().collect();
    let remaining = nodes.remove_all(&doomed_ids);
    detach(nodes, &remaining, &doomed, None)
}

// ─── Node-level transforms ────────────────────────────────────────────────

/// Replace one node with `f` applied to it. Absent ids are ignored.
#[must_use]
pub fn transform_node(
    nodes: &EntitySet<Node>,
    id: NodeId,
    f: impl FnOnce(&Node) -> Node,
) -> EntitySet<Node> {
    nodes.transform(id, f)
}

/// `transform_node` over several ids.
#[must_use]
pub fn transform_nodes(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    f: impl FnMut(&Node) -> Node,
) -> EntitySet<Node> {
    let ids: Vec<NodeId> = ids.into_iter().collect();
    nodes.transform_all(&ids, f)
}

/// Give every listed node the same label.
#[must_use]
pub fn set_label(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    label: &str,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| Node {
        label: label.to_string(),
        ..n.clone()
    })
}

/// Nudge the manual offset of the listed nodes.
#[must_use]
pub fn move_nodes(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    dx: f64,
    dy: f64,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| Node {
        offset: n.offset.plus(dx, dy),
        ..n.clone()
    })
}

/// Drop manual offsets so the nodes fall back to their computed position.
#[must_use]
pub fn reset_offsets(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| Node {
        offset: PlotCoordsOffset::ZERO,
        ..n.clone()
    })
}

/// Choose how the listed nodes are placed vertically (see `YAlignMode`).
#[must_use]
pub fn set_y_align(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    mode: YAlignMode,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| Node {
        y_align: mode,
        ..n.clone()
    })
}

/// Set the triangle flag on the listed terminals; other nodes are skipped.
#[must_use]
pub fn set_triangle(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    triangle: bool,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| match &n.kind {
        NodeKind::Terminal { slice, .. } => n.with_kind(NodeKind::Terminal {
            slice: *slice,
            triangle,
        }),
        _ => n.clone(),
    })
}

/// Fold or unfold the listed branching nodes; other nodes are skipped.
#[must_use]
pub fn set_folded(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
    folded: bool,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| n.with_folded(folded))
}

/// Flip the fold state of each listed branching node independently.
#[must_use]
pub fn toggle_folded(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| n.with_folded(!n.is_folded()))
}

/// Anchor `id` to `slice`, turning it into a terminal. A branching node's
/// children are released and become top-level.
pub fn assign_slice(
    nodes: &EntitySet<Node>,
    id: NodeId,
    slice: StringSlice,
) -> CoreResult<EntitySet<Node>> {
    let node = nodes.try_get(id)?;
    let triangle = match &node.kind {
        NodeKind::Terminal { triangle, .. } => *triangle,
        NodeKind::Stranded(StrandedKind::FormerlyTerminal {
            former_triangle, ..
        }) => *former_triangle,
        _ => false,
    };
    Ok(nodes.insert(node.with_kind(NodeKind::Terminal { slice, triangle })))
}

/// Detach the listed terminals from the sentence; they remember their slice.
#[must_use]
pub fn unassign_slice(
    nodes: &EntitySet<Node>,
    ids: impl IntoIterator<Item = NodeId>,
) -> EntitySet<Node> {
    transform_nodes(nodes, ids, |n| match &n.kind {
        NodeKind::Terminal { slice, triangle } => {
            n.with_kind(NodeKind::Stranded(StrandedKind::FormerlyTerminal {
                former_slice: *slice,
                former_triangle: *triangle,
            }))
        }
        _ => n.clone(),
    })
}

// ─── Id regeneration ──────────────────────────────────────────────────────

/// An isomorphic copy of `nodes` with every id replaced by `fresh_id()`,
/// including ids remembered inside stranded nodes.
#[must_use]
pub fn regenerate_node_ids(
    nodes: &EntitySet<Node>,
    mut fresh_id: impl FnMut() -> NodeId,
) -> EntitySet<Node> {
    let mut mapping = BTreeMap::new();
    rewrite_ids(nodes, &mut mapping, &mut fresh_id)
}

fn rewrite_ids(
    nodes: &EntitySet<Node>,
    mapping: &mut BTreeMap<NodeId, NodeId>,
    fresh_id: &mut dyn FnMut() -> NodeId,
) -> EntitySet<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes.iter() {
        let id = mapped_id(node.id, mapping, fresh_id);
        let kind = match &node.kind {
            NodeKind::Branching {
                children,
                folded,
                former_terminal,
            } => NodeKind::Branching {
                children: children
                    .iter()
                    .map(|c| mapped_id(c, mapping, fresh_id))
                    .collect(),
                folded: *folded,
                former_terminal: *former_terminal,
            },
            NodeKind::Stranded(StrandedKind::FormerlyBranching { former_descendants }) => {
                NodeKind::Stranded(StrandedKind::FormerlyBranching {
                    former_descendants: rewrite_ids(former_descendants, mapping, fresh_id),
                })
            }
            other => other.clone(),
        };
        out.push(Node {
            id,
            kind,
            ..node.clone()
        });
    }
    out.into_iter().collect()
}

fn mapped_id(
    id: NodeId,
    mapping: &mut BTreeMap<NodeId, NodeId>,
    fresh_id: &mut dyn FnMut() -> NodeId,
) -> NodeId {
    *mapping.entry(id).or_insert_with(|| fresh_id())
}

// ─── Tree wrappers ────────────────────────────────────────────────────────

impl Tree {
    pub fn insert_node(&self, new_id: NodeId, inserted: &InsertedNode) -> CoreResult<Tree> {
        Ok(self.with_nodes(insert_node(&self.nodes, new_id, inserted)?))
    }

    pub fn adopt_nodes(
        &self,
        adopting: NodeId,
        adopted: impl IntoIterator<Item = NodeId>,
    ) -> CoreResult<Tree> {
        Ok(self.with_nodes(adopt_nodes(&self.nodes, adopting, adopted)?))
    }

    pub fn disown_nodes(
        &self,
        disowning: NodeId,
        disowned: impl IntoIterator<Item = NodeId>,
    ) -> CoreResult<Tree> {
        Ok(self.with_nodes(disown_nodes(&self.nodes, disowning, disowned)?))
    }

    #[must_use]
    pub fn delete_nodes(&self, ids: impl IntoIterator<Item = NodeId>) -> Tree {
        self.with_nodes(delete_nodes(&self.nodes, ids))
    }

    #[must_use]
    pub fn transform_node(&self, id: NodeId, f: impl FnOnce(&Node) -> Node) -> Tree {
        self.with_nodes(transform_node(&self.nodes, id, f))
    }

    #[must_use]
    pub fn transform_nodes(
        &self,
        ids: impl IntoIterator<Item = NodeId>,
        f: impl FnMut(&Node) -> Node,
    ) -> Tree {
        self.with_nodes(transform_nodes(&self.nodes, ids, f))
    }

    /// Copy of this tree under `new_tree_id` with freshly generated node ids.
    #[must_use]
    pub fn regenerate_node_ids(&self, new_tree_id: TreeId) -> Tree {
        Tree {
            id: new_tree_id,
            sentence: self.sentence.clone(),
            nodes: regenerate_node_ids(&self.nodes, NodeId::generate),
            offset: self.offset,
        }
    }

    #[must_use]
    pub fn moved_by(&self, dx: f64, dy: f64) -> Tree {
        Tree {
            offset: self.offset.plus(dx, dy),
            ..self.clone()
        }
    }
}

// ─── Plot level ───────────────────────────────────────────────────────────

impl Plot {
    #[must_use]
    pub fn add_tree(&self, tree: Tree) -> Plot {
        Plot::with_trees(self.trees.insert(tree))
    }

    #[must_use]
    pub fn delete_trees(&self, ids: impl IntoIterator<Item = TreeId>) -> Plot {
        let ids: Vec<TreeId> = ids.into_iter().collect();
        Plot::with_trees(self.trees.remove_all(&ids))
    }

    #[must_use]
    pub fn transform_tree(&self, id: TreeId, f: impl FnOnce(&Tree) -> Tree) -> Plot {
        Plot::with_trees(self.trees.transform(id, f))
    }

    #[must_use]
    pub fn transform_trees(
        &self,
        ids: impl IntoIterator<Item = TreeId>,
        f: impl FnMut(&Tree) -> Tree,
    ) -> Plot {
        let ids: Vec<TreeId> = ids.into_iter().collect();
        Plot::with_trees(self.trees.transform_all(&ids, f))
    }

    /// Like `transform_tree`, but `f` may fail and a missing tree is an error.
    pub fn try_transform_tree(
        &self,
        id: TreeId,
        f: impl FnOnce(&Tree) -> CoreResult<Tree>,
    ) -> CoreResult<Plot> {
        let updated = f(self.try_tree(id)?)?;
        Ok(self.add_tree(updated))
    }

    #[must_use]
    pub fn move_trees(&self, ids: impl IntoIterator<Item = TreeId>, dx: f64, dy: f64) -> Plot {
        self.transform_trees(ids, |t| t.moved_by(dx, dy))
    }
}
