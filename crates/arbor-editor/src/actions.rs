//! Content actions: the edits a user can make to a document.
//!
//! `reduce` turns one action into a `PlotEdit`, the before/after value of
//! the single plot it touches. The history decides how much of that edit
//! to record.

use crate::error::{EditorError, EditorResult};
use arbor_core::manipulation::{
    assign_slice, delete_nodes, move_nodes, set_label, set_triangle, set_y_align, toggle_folded,
    unassign_slice,
};
use arbor_core::{
    CoreResult, EntitySet, InsertedNode, Node, NodeId, Plot, StringSlice, Tree, TreeId,
    YAlignMode,
};
use std::collections::BTreeMap;

/// A node addressed across trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeRef {
    pub tree: TreeId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(tree: TreeId, node: NodeId) -> Self {
        Self { tree, node }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentAction {
    InsertNode {
        plot: usize,
        tree: TreeId,
        new_id: NodeId,
        inserted: InsertedNode,
    },
    DeleteNodes {
        plot: usize,
        nodes: Vec<NodeRef>,
    },
    AdoptNodes {
        plot: usize,
        tree: TreeId,
        adopting: NodeId,
        adopted: Vec<NodeId>,
    },
    DisownNodes {
        plot: usize,
        tree: TreeId,
        disowning: NodeId,
        disowned: Vec<NodeId>,
    },
    SetLabel {
        plot: usize,
        nodes: Vec<NodeRef>,
        label: String,
    },
    MoveNodes {
        plot: usize,
        nodes: Vec<NodeRef>,
        dx: f64,
        dy: f64,
    },
    SetTriangle {
        plot: usize,
        nodes: Vec<NodeRef>,
        triangle: bool,
    },
    ToggleFolded {
        plot: usize,
        nodes: Vec<NodeRef>,
    },
    SetYAlign {
        plot: usize,
        nodes: Vec<NodeRef>,
        mode: YAlignMode,
    },
    AssignSlice {
        plot: usize,
        tree: TreeId,
        node: NodeId,
        slice: StringSlice,
    },
    UnassignSlice {
        plot: usize,
        nodes: Vec<NodeRef>,
    },
    SetSentence {
        plot: usize,
        tree: TreeId,
        sentence: String,
    },
    AddTree {
        plot: usize,
        tree: Tree,
    },
    DeleteTrees {
        plot: usize,
        trees: Vec<TreeId>,
    },
    MoveTrees {
        plot: usize,
        trees: Vec<TreeId>,
        dx: f64,
        dy: f64,
    },
    /// Add copies of `trees` with fresh tree and node ids, shifted by `(dx, dy)`.
    PasteTrees {
        plot: usize,
        trees: Vec<Tree>,
        dx: f64,
        dy: f64,
    },
    /// Append an empty plot.
    AddPlot,
    RemovePlot {
        plot: usize,
    },
}

impl ContentAction {
    /// Short human-readable name, reported back by undo/redo.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InsertNode { .. } => "Insert node",
            Self::DeleteNodes { .. } => "Delete nodes",
            Self::AdoptNodes { .. } => "Adopt nodes",
            Self::DisownNodes { .. } => "Disown nodes",
            Self::SetLabel { .. } => "Edit label",
            Self::MoveNodes { .. } => "Move nodes",
            Self::SetTriangle { .. } => "Toggle triangle",
            Self::ToggleFolded { .. } => "Toggle fold",
            Self::SetYAlign { .. } => "Align nodes",
            Self::AssignSlice { .. } => "Assign slice",
            Self::UnassignSlice { .. } => "Unassign slice",
            Self::SetSentence { .. } => "Edit sentence",
            Self::AddTree { .. } => "Add tree",
            Self::DeleteTrees { .. } => "Delete trees",
            Self::MoveTrees { .. } => "Move trees",
            Self::PasteTrees { .. } => "Paste trees",
            Self::AddPlot => "Add plot",
            Self::RemovePlot { .. } => "Remove plot",
        }
    }
}

/// The old and new value of the one plot an action touched. `None` on one
/// side means the plot was added or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotEdit {
    pub plot_index: usize,
    pub old: Option<Plot>,
    pub new: Option<Plot>,
}

/// Compute the effect of `action` on `document` without changing it.
pub fn reduce(document: &[Plot], action: &ContentAction) -> EditorResult<PlotEdit> {
    use ContentAction as A;

    let (index, new) = match action {
        A::AddPlot => {
            return Ok(PlotEdit {
                plot_index: document.len(),
                old: None,
                new: Some(Plot::new()),
            });
        }
        A::RemovePlot { plot } => {
            return Ok(PlotEdit {
                plot_index: *plot,
                old: Some(plot_at(document, *plot)?.clone()),
                new: None,
            });
        }
        A::InsertNode {
            plot,
            tree,
            new_id,
            inserted,
        } => (
            *plot,
            edit_tree(document, *plot, *tree, |t| t.insert_node(*new_id, inserted))?,
        ),
        A::DeleteNodes { plot, nodes } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| delete_nodes(set, ids))?,
        ),
        A::AdoptNodes {
            plot,
            tree,
            adopting,
            adopted,
        } => (
            *plot,
            edit_tree(document, *plot, *tree, |t| {
                t.adopt_nodes(*adopting, adopted.iter().copied())
            })?,
        ),
        A::DisownNodes {
            plot,
            tree,
            disowning,
            disowned,
        } => (
            *plot,
            edit_tree(document, *plot, *tree, |t| {
                t.disown_nodes(*disowning, disowned.iter().copied())
            })?,
        ),
        A::SetLabel { plot, nodes, label } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| set_label(set, ids, label))?,
        ),
        A::MoveNodes {
            plot,
            nodes,
            dx,
            dy,
        } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| move_nodes(set, ids, *dx, *dy))?,
        ),
        A::SetTriangle {
            plot,
            nodes,
            triangle,
        } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| {
                set_triangle(set, ids, *triangle)
            })?,
        ),
        A::ToggleFolded { plot, nodes } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| toggle_folded(set, ids))?,
        ),
        A::SetYAlign { plot, nodes, mode } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| set_y_align(set, ids, *mode))?,
        ),
        A::AssignSlice {
            plot,
            tree,
            node,
            slice,
        } => (
            *plot,
            edit_tree(document, *plot, *tree, |t| {
                Ok(t.with_nodes(assign_slice(&t.nodes, *node, *slice)?))
            })?,
        ),
        A::UnassignSlice { plot, nodes } => (
            *plot,
            edit_nodes(document, *plot, nodes, |set, ids| unassign_slice(set, ids))?,
        ),
        A::SetSentence {
            plot,
            tree,
            sentence,
        } => (
            *plot,
            edit_tree(document, *plot, *tree, |t| Ok(t.with_sentence(sentence.as_str())))?,
        ),
        A::AddTree { plot, tree } => (*plot, plot_at(document, *plot)?.add_tree(tree.clone())),
        A::DeleteTrees { plot, trees } => (
            *plot,
            plot_at(document, *plot)?.delete_trees(trees.iter().copied()),
        ),
        A::MoveTrees {
            plot,
            trees,
            dx,
            dy,
        } => (
            *plot,
            plot_at(document, *plot)?.move_trees(trees.iter().copied(), *dx, *dy),
        ),
        A::PasteTrees {
            plot,
            trees,
            dx,
            dy,
        } => {
            let mut target = plot_at(document, *plot)?.clone();
            for tree in trees {
                let copy = tree.regenerate_node_ids(TreeId::generate()).moved_by(*dx, *dy);
                target = target.add_tree(copy);
            }
            (*plot, target)
        }
    };

    Ok(PlotEdit {
        plot_index: index,
        old: Some(plot_at(document, index)?.clone()),
        new: Some(new),
    })
}

fn plot_at(document: &[Plot], index: usize) -> EditorResult<&Plot> {
    document.get(index).ok_or(EditorError::NoSuchPlot(index))
}

fn edit_tree(
    document: &[Plot],
    plot: usize,
    tree: TreeId,
    f: impl FnOnce(&Tree) -> CoreResult<Tree>,
) -> EditorResult<Plot> {
    Ok(plot_at(document, plot)?.try_transform_tree(tree, f)?)
}

/// Apply `f` once per tree to the selected nodes of that tree.
fn edit_nodes(
    document: &[Plot],
    plot: usize,
    nodes: &[NodeRef],
    mut f: impl FnMut(&EntitySet<Node>, Vec<NodeId>) -> EntitySet<Node>,
) -> EditorResult<Plot> {
    let mut by_tree: BTreeMap<TreeId, Vec<NodeId>> = BTreeMap::new();
    for r in nodes {
        by_tree.entry(r.tree).or_default().push(r.node);
    }
    let mut result = plot_at(document, plot)?.clone();
    for (tree, ids) in by_tree {
        result = result.try_transform_tree(tree, |t| Ok(t.with_nodes(f(&t.nodes, ids))))?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::{CoreError, parse_tree_with_id};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn document() -> Vec<Plot> {
        let tree = parse_tree_with_id(
            "[S@top [NP@branch1 [N@term1 Noun]] [VP@term2 verbed.]]",
            TreeId::intern("actions_tree"),
        )
        .unwrap();
        vec![Plot::new().add_tree(tree)]
    }

    #[test]
    fn node_action_edits_one_plot() {
        let doc = document();
        let tree = TreeId::intern("actions_tree");
        let edit = reduce(
            &doc,
            &ContentAction::SetLabel {
                plot: 0,
                nodes: vec![NodeRef::new(tree, id("term1"))],
                label: "Noun".into(),
            },
        )
        .unwrap();
        assert_eq!(edit.plot_index, 0);
        assert_eq!(edit.old.as_ref(), Some(&doc[0]));
        let new = edit.new.unwrap();
        assert_eq!(new.trees[tree].nodes[id("term1")].label, "Noun");
    }

    #[test]
    fn missing_plot_and_tree_are_errors() {
        let doc = document();
        assert_eq!(
            reduce(&doc, &ContentAction::RemovePlot { plot: 3 }),
            Err(EditorError::NoSuchPlot(3))
        );
        let ghost = TreeId::intern("actions_ghost");
        assert_eq!(
            reduce(
                &doc,
                &ContentAction::SetSentence {
                    plot: 0,
                    tree: ghost,
                    sentence: "x".into()
                }
            ),
            Err(EditorError::Core(CoreError::NoSuchTree(ghost)))
        );
    }

    #[test]
    fn add_plot_appends() {
        let doc = document();
        let edit = reduce(&doc, &ContentAction::AddPlot).unwrap();
        assert_eq!(edit.plot_index, 1);
        assert_eq!(edit.old, None);
        assert_eq!(edit.new, Some(Plot::new()));
    }

    #[test]
    fn paste_regenerates_ids() {
        let doc = document();
        let source = doc[0].trees[TreeId::intern("actions_tree")].clone();
        let edit = reduce(
            &doc,
            &ContentAction::PasteTrees {
                plot: 0,
                trees: vec![source.clone()],
                dx: 30.0,
                dy: 0.0,
            },
        )
        .unwrap();
        let new = edit.new.unwrap();
        assert_eq!(new.trees.len(), 2);
        let pasted = new.trees.iter().find(|t| t.id != source.id).unwrap();
        assert_eq!(pasted.sentence, source.sentence);
        assert_eq!(pasted.offset.dx, 30.0);
        assert!(pasted.nodes.ids().all(|n| !source.nodes.contains(n)));
    }
}
