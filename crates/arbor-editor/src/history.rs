//! Undo/Redo content history.
//!
//! Every applied action is recorded as one `ContentChange` holding the full
//! old and new value of the smallest scope it touched: a single tree when
//! only one tree differs, otherwise the whole plot. Undo writes `old` back,
//! redo writes `new`; no inverse operations or patches are needed. Values
//! share structure, so keeping them on the stacks is cheap.

use crate::actions::{ContentAction, PlotEdit, reduce};
use crate::error::EditorResult;
use arbor_core::{Document, Plot, Tree, TreeId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum undo depth; the oldest change is dropped beyond it. `0`
    /// keeps everything.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 200 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeScope {
    /// One tree changed, was added (`old: None`) or was removed (`new: None`).
    Tree {
        plot_index: usize,
        tree_id: TreeId,
        old: Option<Tree>,
        new: Option<Tree>,
    },
    /// Several trees changed, or the plot itself was added or removed.
    Plot {
        plot_index: usize,
        old: Option<Plot>,
        new: Option<Plot>,
    },
}

impl ChangeScope {
    /// The same change running backwards.
    #[must_use]
    fn inverted(self) -> Self {
        match self {
            Self::Tree {
                plot_index,
                tree_id,
                old,
                new,
            } => Self::Tree {
                plot_index,
                tree_id,
                old: new,
                new: old,
            },
            Self::Plot {
                plot_index,
                old,
                new,
            } => Self::Plot {
                plot_index,
                old: new,
                new: old,
            },
        }
    }

    /// Write the `new` side of this change into `document`.
    fn write(&self, document: &mut Document) {
        match self {
            Self::Tree {
                plot_index,
                tree_id,
                new,
                ..
            } => {
                let Some(plot) = document.get_mut(*plot_index) else {
                    log::warn!("history: plot {plot_index} vanished, dropping tree change");
                    return;
                };
                *plot = match new {
                    Some(tree) => plot.add_tree(tree.clone()),
                    None => plot.delete_trees([*tree_id]),
                };
            }
            Self::Plot {
                plot_index,
                old,
                new,
            } => match (old, new) {
                (None, Some(plot)) => {
                    let at = (*plot_index).min(document.len());
                    document.insert(at, plot.clone());
                }
                (Some(_), None) => {
                    if *plot_index < document.len() {
                        document.remove(*plot_index);
                    }
                }
                (_, Some(plot)) => {
                    if let Some(slot) = document.get_mut(*plot_index) {
                        *slot = plot.clone();
                    }
                }
                (None, None) => {}
            },
        }
    }
}

/// One reversible edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChange {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub scope: ChangeScope,
}

impl ContentChange {
    /// Narrow a plot edit to the smallest scope that captures it. `None`
    /// when the edit changed nothing.
    pub fn from_plot_edit(edit: PlotEdit, description: &str) -> Option<Self> {
        let plot_index = edit.plot_index;
        let scope = match (edit.old, edit.new) {
            (Some(old), Some(new)) => match changed_trees(&old, &new).as_slice() {
                [] => return None,
                [tree_id] => ChangeScope::Tree {
                    plot_index,
                    tree_id: *tree_id,
                    old: old.tree(*tree_id).cloned(),
                    new: new.tree(*tree_id).cloned(),
                },
                _ => ChangeScope::Plot {
                    plot_index,
                    old: Some(old),
                    new: Some(new),
                },
            },
            (None, None) => return None,
            (old, new) => ChangeScope::Plot {
                plot_index,
                old,
                new,
            },
        };
        Some(Self {
            timestamp: Utc::now(),
            description: description.to_string(),
            scope,
        })
    }
}

/// Ids of the trees that were added, removed or replaced.
fn changed_trees(old: &Plot, new: &Plot) -> Vec<TreeId> {
    let ids: BTreeSet<TreeId> = old.trees.ids().chain(new.trees.ids()).collect();
    ids.into_iter()
        .filter(|id| !old.trees.shares_entry(&new.trees, *id) && old.tree(*id) != new.tree(*id))
        .collect()
}

/// The current document plus its undo and redo stacks.
#[derive(Debug, Clone)]
pub struct ContentHistory {
    current: Document,
    undo_stack: Vec<ContentChange>,
    redo_stack: Vec<ContentChange>,
    config: HistoryConfig,
}

impl ContentHistory {
    pub fn new(document: Document, config: HistoryConfig) -> Self {
        Self {
            current: document,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            config,
        }
    }

    pub fn current(&self) -> &[Plot] {
        &self.current
    }

    pub fn into_document(self) -> Document {
        self.current
    }

    /// Apply `action` and record it. Returns `false` when the action
    /// changed nothing (no history entry is made then).
    pub fn apply(&mut self, action: &ContentAction) -> EditorResult<bool> {
        let edit = reduce(&self.current, action)?;
        let Some(change) = ContentChange::from_plot_edit(edit, action.description()) else {
            log::debug!("history: {} changed nothing", action.description());
            return Ok(false);
        };
        self.record(change);
        Ok(true)
    }

    /// Record a change computed elsewhere and make its `new` side current.
    pub fn record(&mut self, change: ContentChange) {
        change.scope.write(&mut self.current);
        self.undo_stack.push(change);
        if self.config.max_depth > 0 && self.undo_stack.len() > self.config.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Undo the last change. Returns its description.
    pub fn undo(&mut self) -> Option<String> {
        let change = self.undo_stack.pop()?;
        let reverted = ContentChange {
            scope: change.scope.inverted(),
            ..change
        };
        reverted.scope.write(&mut self.current);
        let desc = reverted.description.clone();
        self.redo_stack.push(reverted);
        Some(desc)
    }

    /// Redo the last undone change. Returns its description.
    pub fn redo(&mut self) -> Option<String> {
        let change = self.redo_stack.pop()?;
        let restored = ContentChange {
            scope: change.scope.inverted(),
            ..change
        };
        restored.scope.write(&mut self.current);
        let desc = restored.description.clone();
        self.undo_stack.push(restored);
        Some(desc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Most recent change first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &ContentChange> {
        self.undo_stack.iter().rev()
    }
}

impl Default for ContentHistory {
    fn default() -> Self {
        Self::new(vec![Plot::new()], HistoryConfig::default())
    }
}
