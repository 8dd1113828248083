//! Core data model for Arbor documents.
//!
//! A document is an ordered list of plots (canvases). A plot holds trees; a
//! tree holds a sentence and a forest of labeled nodes. Nodes reference their
//! children by id, and every id is owned by at most one parent, so the
//! structure is a forest rather than a DAG. Terminal nodes are anchored to a
//! span of the sentence.
//!
//! Nothing in here is mutated in place: collections are `EntitySet`s and
//! every edit produces new values that share whatever they did not touch.

use crate::entity::{Entity, EntitySet};
use crate::error::CoreError;
use crate::id::{NodeId, TreeId};
use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

// ─── Primitives ──────────────────────────────────────────────────────────

/// A half-open range `[start, end_exclusive)` of chars in a tree's sentence.
///
/// Offsets count Unicode scalar values, not bytes. A zero-length slice is a
/// caret position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSlice")]
pub struct StringSlice {
    pub start: usize,
    pub end_exclusive: usize,
}

/// Wire form of `StringSlice`, checked before it becomes one.
#[derive(Deserialize)]
struct RawSlice {
    start: usize,
    end_exclusive: usize,
}

impl TryFrom<RawSlice> for StringSlice {
    type Error = String;

    fn try_from(raw: RawSlice) -> Result<Self, Self::Error> {
        if raw.start > raw.end_exclusive {
            return Err(format!(
                "reversed slice [{}, {})",
                raw.start, raw.end_exclusive
            ));
        }
        Ok(StringSlice::new(raw.start, raw.end_exclusive))
    }
}

impl StringSlice {
    /// Build a slice; reversed bounds are swapped so `start <= end_exclusive` holds.
    pub const fn new(start: usize, end_exclusive: usize) -> Self {
        if start <= end_exclusive {
            Self {
                start,
                end_exclusive,
            }
        } else {
            Self {
                start: end_exclusive,
                end_exclusive: start,
            }
        }
    }

    pub const fn caret(position: usize) -> Self {
        Self {
            start: position,
            end_exclusive: position,
        }
    }

    pub const fn len(&self) -> usize {
        self.end_exclusive - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end_exclusive
    }

    /// Range intersection. Touching endpoints do not overlap, except that a
    /// caret counts as inside any slice whose closed range `[start, end]`
    /// contains it.
    pub fn overlaps(&self, other: &StringSlice) -> bool {
        if self.is_empty() {
            return other.start <= self.start && self.start <= other.end_exclusive;
        }
        if other.is_empty() {
            return self.start <= other.start && other.start <= self.end_exclusive;
        }
        self.start < other.end_exclusive && other.start < self.end_exclusive
    }

    /// Smallest slice covering both.
    pub fn span(&self, other: &StringSlice) -> StringSlice {
        StringSlice::new(
            self.start.min(other.start),
            self.end_exclusive.max(other.end_exclusive),
        )
    }

    /// The covered text. Bounds past the end of `sentence` are clamped.
    pub fn text<'a>(&self, sentence: &'a str) -> &'a str {
        let from = char_to_byte(sentence, self.start);
        let to = char_to_byte(sentence, self.end_exclusive);
        &sentence[from..to.max(from)]
    }

    /// Text before the slice.
    pub fn prefix<'a>(&self, sentence: &'a str) -> &'a str {
        &sentence[..char_to_byte(sentence, self.start)]
    }

    pub fn fits(&self, sentence: &str) -> bool {
        self.end_exclusive <= sentence.chars().count()
    }
}

/// Byte offset of the `index`-th char, or `s.len()` past the end.
pub(crate) fn char_to_byte(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map_or(s.len(), |(b, _)| b)
}

/// A 2D offset, used both for manual node nudges and for tree placement on
/// the plot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotCoordsOffset {
    pub dx: f64,
    pub dy: f64,
}

impl PlotCoordsOffset {
    pub const ZERO: Self = Self { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    #[must_use]
    pub fn plus(&self, dx: f64, dy: f64) -> Self {
        Self {
            dx: self.dx + dx,
            dy: self.dy + dy,
        }
    }
}

/// Vertical alignment of a node relative to its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YAlignMode {
    /// Placed by the regular bottom-up rule.
    #[default]
    Bottom,
    /// Re-leveled to the highest sibling (e.g. traces).
    Top,
}

// ─── Child sets ──────────────────────────────────────────────────────────

/// The children of a branching node: a sorted, duplicate-free set of ids.
///
/// Most syntax-tree nodes have one to three children, so the ids live inline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ChildSet(SmallVec<[NodeId; 4]>);

impl ChildSet {
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: NodeId) -> bool {
        match self.0.binary_search(&id) {
            Ok(_) => false,
            Err(at) => {
                self.0.insert(at, id);
                true
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.0.binary_search(&id) {
            Ok(at) => {
                self.0.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn union(&self, other: &ChildSet) -> ChildSet {
        let mut out = self.clone();
        for id in other.iter() {
            out.insert(id);
        }
        out
    }

    #[must_use]
    pub fn without(&self, other: &ChildSet) -> ChildSet {
        ChildSet(self.0.iter().copied().filter(|id| !other.contains(*id)).collect())
    }

    pub fn intersects(&self, other: &ChildSet) -> bool {
        self.iter().any(|id| other.contains(id))
    }
}

impl FromIterator<NodeId> for ChildSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut ids: SmallVec<[NodeId; 4]> = iter.into_iter().collect();
        ids.sort();
        ids.dedup();
        ChildSet(ids)
    }
}

impl<'de> Deserialize<'de> for ChildSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ids = Vec::<NodeId>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// What a stranded node remembers about its former role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrandedKind {
    /// Lost its last child. Holds the whole former subtree, keyed by id,
    /// exactly as it was before the edit that stranded it.
    FormerlyBranching { former_descendants: EntitySet<Node> },
    /// Lost its slice.
    FormerlyTerminal {
        former_slice: StringSlice,
        former_triangle: bool,
    },
    /// Never had a structural role.
    Plain,
}

/// The anchoring of a terminal that was promoted to branching. Kept so the
/// node can strand back to `FormerlyTerminal` when its children go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormerTerminal {
    pub slice: StringSlice,
    pub triangle: bool,
}

/// The node variants stored in a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Owns one or more children. A folded node is drawn as a collapsed
    /// triangle spanning its subtree, and its descendants are hidden.
    Branching {
        children: ChildSet,
        folded: bool,
        /// Set when the node was a terminal right before it became branching.
        #[serde(default)]
        former_terminal: Option<FormerTerminal>,
    },

    /// Anchored to a span of the sentence. `triangle` draws the span under a
    /// triangle instead of a single line.
    Terminal { slice: StringSlice, triangle: bool },

    /// No current structural role.
    Stranded(StrandedKind),
}

/// A single labeled node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    /// Manual nudge applied on top of the computed position.
    pub offset: PlotCoordsOffset,
    pub y_align: YAlignMode,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            label: label.into(),
            offset: PlotCoordsOffset::ZERO,
            y_align: YAlignMode::Bottom,
            kind,
        }
    }

    pub fn branching(
        id: NodeId,
        label: impl Into<String>,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self::new(
            id,
            label,
            NodeKind::Branching {
                children: children.into_iter().collect(),
                folded: false,
                former_terminal: None,
            },
        )
    }

    pub fn terminal(id: NodeId, label: impl Into<String>, slice: StringSlice) -> Self {
        Self::new(
            id,
            label,
            NodeKind::Terminal {
                slice,
                triangle: false,
            },
        )
    }

    pub fn stranded(id: NodeId, label: impl Into<String>) -> Self {
        Self::new(id, label, NodeKind::Stranded(StrandedKind::Plain))
    }

    /// Same id, label, offset and alignment with a different kind.
    #[must_use]
    pub fn with_kind(&self, kind: NodeKind) -> Self {
        Self {
            id: self.id,
            label: self.label.clone(),
            offset: self.offset,
            y_align: self.y_align,
            kind,
        }
    }

    /// Same branching node with a different child set. Non-branching nodes
    /// are returned unchanged.
    #[must_use]
    pub fn with_children(&self, children: ChildSet) -> Self {
        match &self.kind {
            NodeKind::Branching {
                folded,
                former_terminal,
                ..
            } => self.with_kind(NodeKind::Branching {
                children,
                folded: *folded,
                former_terminal: *former_terminal,
            }),
            _ => self.clone(),
        }
    }

    /// Same branching node, folded or not. Non-branching nodes are returned
    /// unchanged.
    #[must_use]
    pub fn with_folded(&self, folded: bool) -> Self {
        match &self.kind {
            NodeKind::Branching {
                children,
                former_terminal,
                ..
            } => self.with_kind(NodeKind::Branching {
                children: children.clone(),
                folded,
                former_terminal: *former_terminal,
            }),
            _ => self.clone(),
        }
    }

    /// What this node would remember of its anchoring if it were promoted
    /// to branching now.
    pub fn terminal_memory(&self) -> Option<FormerTerminal> {
        match self.kind {
            NodeKind::Terminal { slice, triangle } => Some(FormerTerminal { slice, triangle }),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&ChildSet> {
        match &self.kind {
            NodeKind::Branching { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn slice(&self) -> Option<StringSlice> {
        match &self.kind {
            NodeKind::Terminal { slice, .. } => Some(*slice),
            _ => None,
        }
    }

    pub fn is_branching(&self) -> bool {
        matches!(self.kind, NodeKind::Branching { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal { .. })
    }

    pub fn is_stranded(&self) -> bool {
        matches!(self.kind, NodeKind::Stranded(_))
    }

    pub fn is_folded(&self) -> bool {
        matches!(self.kind, NodeKind::Branching { folded: true, .. })
    }
}

impl Entity for Node {
    type Id = NodeId;

    fn id(&self) -> NodeId {
        self.id
    }

    fn not_found(id: NodeId) -> CoreError {
        CoreError::NoSuchNode(id)
    }
}

/// The shape of a node to be created by `insert_node`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertedKind {
    /// Take over `target_child_ids` from their current parents.
    Branching { target_child_ids: ChildSet },
    /// Cover `target_slice` of the sentence.
    Terminal {
        target_slice: StringSlice,
        triangle: bool,
    },
}

/// A request to create a node. Consumed by `insert_node` and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedNode {
    pub label: String,
    /// Parent to attach the new node to, if any.
    pub target_parent_id: Option<NodeId>,
    pub kind: InsertedKind,
}

impl InsertedNode {
    pub fn branching(
        label: impl Into<String>,
        target_parent_id: Option<NodeId>,
        target_child_ids: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            label: label.into(),
            target_parent_id,
            kind: InsertedKind::Branching {
                target_child_ids: target_child_ids.into_iter().collect(),
            },
        }
    }

    pub fn terminal(
        label: impl Into<String>,
        target_parent_id: Option<NodeId>,
        target_slice: StringSlice,
        triangle: bool,
    ) -> Self {
        Self {
            label: label.into(),
            target_parent_id,
            kind: InsertedKind::Terminal {
                target_slice,
                triangle,
            },
        }
    }
}

// ─── Trees & plots ───────────────────────────────────────────────────────

/// A sentence and the forest of nodes drawn over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub sentence: String,
    pub nodes: EntitySet<Node>,
    /// Placement of the tree on its plot.
    pub offset: PlotCoordsOffset,
}

impl Tree {
    pub fn new(id: TreeId, sentence: impl Into<String>) -> Self {
        Self {
            id,
            sentence: sentence.into(),
            nodes: EntitySet::new(),
            offset: PlotCoordsOffset::ZERO,
        }
    }

    /// Same tree with a different node collection.
    #[must_use]
    pub fn with_nodes(&self, nodes: EntitySet<Node>) -> Self {
        Self {
            id: self.id,
            sentence: self.sentence.clone(),
            nodes,
            offset: self.offset,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
}

impl Entity for Tree {
    type Id = TreeId;

    fn id(&self) -> TreeId {
        self.id
    }

    fn not_found(id: TreeId) -> CoreError {
        CoreError::NoSuchTree(id)
    }
}

/// A canvas holding zero or more trees.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plot {
    pub trees: EntitySet<Tree>,
}

impl Plot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trees(trees: EntitySet<Tree>) -> Self {
        Self { trees }
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id)
    }

    pub fn try_tree(&self, id: TreeId) -> Result<&Tree, CoreError> {
        self.trees.try_get(id)
    }
}

/// A whole document: plots in tab order.
pub type Document = Vec<Plot>;

// ─── Positioned output (result of the positioning engine) ───────────────

/// Horizontal extent of a triangle's base, in tree coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeXRange {
    pub start: f64,
    pub end: f64,
}

/// A stored node annotated with its computed tree-relative coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedNode {
    pub node: Node,
    pub tree_x: f64,
    pub tree_y: f64,
    /// Set for triangle terminals and folded branches.
    pub triangle_base: Option<TreeXRange>,
}

impl PositionedNode {
    pub fn id(&self) -> NodeId {
        self.node.id
    }
}

impl Entity for PositionedNode {
    type Id = NodeId;

    fn id(&self) -> NodeId {
        self.node.id
    }

    fn not_found(id: NodeId) -> CoreError {
        CoreError::NoSuchNode(id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedTree {
    pub id: TreeId,
    pub sentence: String,
    pub nodes: EntitySet<PositionedNode>,
    pub offset: PlotCoordsOffset,
}

impl Entity for PositionedTree {
    type Id = TreeId;

    fn id(&self) -> TreeId {
        self.id
    }

    fn not_found(id: TreeId) -> CoreError {
        CoreError::NoSuchTree(id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionedPlot {
    pub trees: EntitySet<PositionedTree>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_overlap_excludes_touching_ranges() {
        let noun = StringSlice::new(0, 4);
        let verb = StringSlice::new(5, 11);
        let space_and_verb = StringSlice::new(4, 11);
        assert!(!noun.overlaps(&verb));
        assert!(!noun.overlaps(&StringSlice::new(4, 5)));
        assert!(verb.overlaps(&space_and_verb));
        assert!(space_and_verb.overlaps(&verb));
    }

    #[test]
    fn caret_inside_closed_range() {
        let noun = StringSlice::new(0, 4);
        assert!(StringSlice::caret(0).overlaps(&noun));
        assert!(StringSlice::caret(4).overlaps(&noun));
        assert!(noun.overlaps(&StringSlice::caret(2)));
        assert!(!StringSlice::caret(5).overlaps(&noun));
    }

    #[test]
    fn slice_text_counts_chars() {
        let sentence = "Ünïcode verbs";
        let slice = StringSlice::new(0, 7);
        assert_eq!(slice.text(sentence), "Ünïcode");
        assert_eq!(StringSlice::new(8, 13).text(sentence), "verbs");
        assert_eq!(StringSlice::new(8, 13).prefix(sentence), "Ünïcode ");
        assert_eq!(StringSlice::new(8, 40).text(sentence), "verbs");
        assert!(!StringSlice::new(8, 40).fits(sentence));
    }

    #[test]
    fn reversed_slice_is_normalized() {
        assert_eq!(StringSlice::new(7, 3), StringSlice::new(3, 7));
        assert_eq!(StringSlice::new(3, 7).len(), 4);
    }

    #[test]
    fn child_set_is_sorted_and_deduplicated() {
        let a = NodeId::intern("a");
        let b = NodeId::intern("b");
        let set: ChildSet = [b, a, b].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![a, b]);

        let mut grown = set.clone();
        assert!(!grown.insert(a));
        assert!(grown.remove(b));
        assert_eq!(grown.len(), 1);
        assert!(set.intersects(&grown));
        assert!(set.without(&grown).contains(b));
    }

    #[test]
    fn with_kind_keeps_common_fields() {
        let mut node = Node::terminal(NodeId::intern("t"), "N", StringSlice::new(0, 4));
        node.offset = PlotCoordsOffset::new(3.0, -2.0);
        node.y_align = YAlignMode::Top;
        let stranded = node.with_kind(NodeKind::Stranded(StrandedKind::Plain));
        assert_eq!(stranded.label, "N");
        assert_eq!(stranded.offset, node.offset);
        assert_eq!(stranded.y_align, YAlignMode::Top);
        assert!(stranded.is_stranded());
    }
}
