//! Editing a tree's sentence while keeping terminals on their words.

use crate::model::{Node, NodeKind, StrandedKind, StringSlice, Tree};

/// The region of the old sentence replaced by an edit, in chars, and the
/// length change it caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SentenceEdit {
    start: usize,
    old_end: usize,
    delta: isize,
}

impl SentenceEdit {
    fn between(old: &str, new: &str) -> Option<SentenceEdit> {
        if old == new {
            return None;
        }
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();
        let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        Some(SentenceEdit {
            start: prefix,
            old_end: old.len() - suffix,
            delta: new.len() as isize - old.len() as isize,
        })
    }

    fn shift(&self, offset: usize) -> usize {
        offset.saturating_add_signed(self.delta)
    }

    /// Where `slice` lands after the edit, or `None` when the edit cuts
    /// through it or deletes all of its text.
    fn rebase(&self, slice: StringSlice) -> Option<StringSlice> {
        if slice.end_exclusive <= self.start {
            Some(slice)
        } else if slice.start >= self.old_end {
            Some(StringSlice::new(
                self.shift(slice.start),
                self.shift(slice.end_exclusive),
            ))
        } else if slice.start <= self.start && slice.end_exclusive >= self.old_end {
            let stretched = StringSlice::new(slice.start, self.shift(slice.end_exclusive));
            (slice.is_empty() || !stretched.is_empty()).then_some(stretched)
        } else {
            None
        }
    }
}

impl Tree {
    /// Replace the sentence. Terminal slices follow the text they covered;
    /// terminals whose text was partially rewritten are unassigned.
    #[must_use]
    pub fn with_sentence(&self, sentence: impl Into<String>) -> Tree {
        let sentence = sentence.into();
        let Some(edit) = SentenceEdit::between(&self.sentence, &sentence) else {
            return self.clone();
        };
        let nodes = self.nodes.update_where(|node| {
            let NodeKind::Terminal { slice, triangle } = node.kind else {
                return None;
            };
            match edit.rebase(slice) {
                Some(rebased) if rebased == slice => None,
                Some(rebased) => Some(node.with_kind(NodeKind::Terminal {
                    slice: rebased,
                    triangle,
                })),
                None => Some(unassigned(node, slice, triangle)),
            }
        });
        Tree {
            id: self.id,
            sentence,
            nodes,
            offset: self.offset,
        }
    }
}

fn unassigned(node: &Node, slice: StringSlice, triangle: bool) -> Node {
    log::debug!("with_sentence: edit cuts through the slice of {}", node.id);
    node.with_kind(NodeKind::Stranded(StrandedKind::FormerlyTerminal {
        former_slice: slice,
        former_triangle: triangle,
    }))
}
