//! Round-based layout solver.
//!
//! Turns a stored tree into `PositionedTree` coordinates. Terminals sit on a
//! fixed row under the midpoint of their text; every branching node sits one
//! level above its highest child, centered over its children. Nodes become
//! ready once everything they depend on is placed, so the solver runs in
//! rounds until nothing is pending.
//!
//! Tree coordinates grow downwards, so "above" means a smaller `y` and the
//! rows used by terminals are negative.

use crate::entity::EntitySet;
use crate::id::NodeId;
use crate::model::*;
use crate::query::{descendant_ids, parent_map, top_level_ids};
use std::collections::{BTreeMap, BTreeSet};

/// Former subtrees nested deeper than this are placed like plain stranded
/// nodes.
const MAX_FORMER_DEPTH: usize = 64;

/// Vertical constants used by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Distance between a branching node and its highest child.
    pub level_height: f64,
    /// Row of regular terminals.
    pub terminal_y: f64,
    /// Row of triangle terminals and folded branches.
    pub triangle_terminal_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            level_height: 40.0,
            terminal_y: -20.0,
            triangle_terminal_y: -40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    x: f64,
    y: f64,
    triangle_base: Option<TreeXRange>,
}

impl Placement {
    fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            triangle_base: None,
        }
    }
}

struct Solver<'a> {
    sentence: &'a str,
    str_width: &'a dyn Fn(&str) -> f64,
    config: &'a LayoutConfig,
}

/// Compute coordinates for every visible node of `tree`. Descendants of
/// folded nodes are hidden and left out of the result.
pub fn position_tree(
    tree: &Tree,
    str_width: &dyn Fn(&str) -> f64,
    config: &LayoutConfig,
) -> PositionedTree {
    let solver = Solver {
        sentence: &tree.sentence,
        str_width,
        config,
    };
    let placed = solver.solve(&tree.nodes, 0);
    let placed = solver.align_tops(&tree.nodes, placed);

    let nodes = tree
        .nodes
        .iter()
        .filter_map(|node| {
            placed.get(&node.id).map(|p| PositionedNode {
                node: node.clone(),
                tree_x: p.x,
                tree_y: p.y,
                triangle_base: p.triangle_base,
            })
        })
        .collect();

    PositionedTree {
        id: tree.id,
        sentence: tree.sentence.clone(),
        nodes,
        offset: tree.offset,
    }
}

/// `position_tree` for each tree of the plot.
pub fn position_plot(
    plot: &Plot,
    str_width: &dyn Fn(&str) -> f64,
    config: &LayoutConfig,
) -> PositionedPlot {
    PositionedPlot {
        trees: plot
            .trees
            .iter()
            .map(|tree| position_tree(tree, str_width, config))
            .collect(),
    }
}

impl Solver<'_> {
    fn solve(&self, nodes: &EntitySet<Node>, depth: usize) -> BTreeMap<NodeId, Placement> {
        let hidden: BTreeSet<NodeId> = nodes
            .iter()
            .filter(|n| n.is_folded())
            .flat_map(|n| descendant_ids(nodes, n.id))
            .collect();
        let mut pending: BTreeSet<NodeId> =
            nodes.ids().filter(|id| !hidden.contains(id)).collect();
        let mut placed: BTreeMap<NodeId, Placement> = BTreeMap::new();

        let mut round = 0;
        while !pending.is_empty() {
            round += 1;
            let ready: Vec<NodeId> = pending
                .iter()
                .copied()
                .filter(|id| self.is_ready(&nodes[*id], nodes, &placed))
                .collect();

            if ready.is_empty() {
                log::warn!(
                    "positioning stalled with {} nodes pending; placing them as plain nodes",
                    pending.len()
                );
                for id in std::mem::take(&mut pending) {
                    placed.insert(id, plain(&nodes[id]));
                }
                break;
            }

            for id in &ready {
                let placement = self.place(&nodes[*id], nodes, &placed, depth);
                placed.insert(*id, placement);
                pending.remove(id);
            }
            log::trace!("positioning round {round}: placed {} nodes", ready.len());
        }
        placed
    }

    fn is_ready(
        &self,
        node: &Node,
        nodes: &EntitySet<Node>,
        placed: &BTreeMap<NodeId, Placement>,
    ) -> bool {
        match &node.kind {
            NodeKind::Branching {
                children,
                folded: false,
                ..
            } => children
                .iter()
                .filter(|c| nodes.contains(*c))
                .all(|c| placed.contains_key(&c)),
            _ => true,
        }
    }

    fn place(
        &self,
        node: &Node,
        nodes: &EntitySet<Node>,
        placed: &BTreeMap<NodeId, Placement>,
        depth: usize,
    ) -> Placement {
        let base = match &node.kind {
            NodeKind::Terminal { slice, triangle } => self.terminal(*slice, *triangle),
            NodeKind::Branching { folded: true, .. } => {
                match folded_span(nodes, node.id) {
                    Some(span) => self.terminal(span, true),
                    None => Placement::at(0.0, self.config.triangle_terminal_y),
                }
            }
            NodeKind::Branching { children, .. } => {
                let ys: Vec<&Placement> = children.iter().filter_map(|c| placed.get(&c)).collect();
                match self.above(&ys) {
                    Some(p) => p,
                    None => return plain(node),
                }
            }
            NodeKind::Stranded(StrandedKind::FormerlyTerminal {
                former_slice,
                former_triangle,
            }) => self.terminal(*former_slice, *former_triangle),
            NodeKind::Stranded(StrandedKind::FormerlyBranching { former_descendants }) => {
                if former_descendants.is_empty() || depth >= MAX_FORMER_DEPTH {
                    return plain(node);
                }
                let former = self.solve(former_descendants, depth + 1);
                let roots: Vec<&Placement> = top_level_ids(former_descendants)
                    .iter()
                    .filter_map(|id| former.get(id))
                    .collect();
                match self.above(&roots) {
                    Some(p) => p,
                    None => return plain(node),
                }
            }
            NodeKind::Stranded(StrandedKind::Plain) => return plain(node),
        };
        Placement {
            x: base.x + node.offset.dx,
            y: base.y + node.offset.dy,
            triangle_base: base.triangle_base,
        }
    }

    /// Centered over `below`, one level above the highest of them.
    fn above(&self, below: &[&Placement]) -> Option<Placement> {
        if below.is_empty() {
            return None;
        }
        let mean_x = below.iter().map(|p| p.x).sum::<f64>() / below.len() as f64;
        let min_y = below.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        Some(Placement::at(mean_x, min_y - self.config.level_height))
    }

    fn terminal(&self, slice: StringSlice, triangle: bool) -> Placement {
        let start = (self.str_width)(slice.prefix(self.sentence));
        let width = (self.str_width)(slice.text(self.sentence));
        if triangle {
            Placement {
                x: start + width / 2.0,
                y: self.config.triangle_terminal_y,
                triangle_base: Some(TreeXRange {
                    start,
                    end: start + width,
                }),
            }
        } else {
            Placement::at(start + width / 2.0, self.config.terminal_y)
        }
    }

    /// Re-level `Top` aligned nodes with their highest sibling, keeping
    /// their own vertical offset.
    fn align_tops(
        &self,
        nodes: &EntitySet<Node>,
        placed: BTreeMap<NodeId, Placement>,
    ) -> BTreeMap<NodeId, Placement> {
        let parents = parent_map(nodes);
        let mut aligned = placed.clone();
        for node in nodes.iter().filter(|n| n.y_align == YAlignMode::Top) {
            let Some(parent) = parents.get(&node.id).and_then(|p| nodes.get(*p)) else {
                continue;
            };
            let Some(children) = parent.children() else {
                continue;
            };
            let highest_sibling = children
                .iter()
                .filter(|c| *c != node.id)
                .filter_map(|c| placed.get(&c).map(|p| p.y))
                .reduce(f64::min);
            if let (Some(y), Some(p)) = (highest_sibling, aligned.get_mut(&node.id)) {
                p.y = y + node.offset.dy;
            }
        }
        aligned
    }
}

/// Stranded plain nodes use their manual offset as an absolute position.
fn plain(node: &Node) -> Placement {
    Placement::at(node.offset.dx, node.offset.dy)
}

/// Span covered by the terminals below `id`.
fn folded_span(nodes: &EntitySet<Node>, id: NodeId) -> Option<StringSlice> {
    descendant_ids(nodes, id)
        .into_iter()
        .filter_map(|d| nodes.get(d).and_then(Node::slice))
        .reduce(|a, b| a.span(&b))
}
