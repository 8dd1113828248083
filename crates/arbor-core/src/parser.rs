//! Parser for labelled-bracket notation → `Tree`.
//!
//! Built on `winnow` 0.7. The notation is the one used by most syntax
//! tree tools:
//!
//! ```text
//! [S [NP [N Noun]] [VP^ verbed.]]
//! ```
//!
//! Each bracket opens with a label. The body is either words (a terminal
//! over those words), nested brackets (a branching node) or nothing (a
//! stranded node). A label may end with `^` (triangle terminal, or folded
//! branch) and with `@id` to pin the node id. The sentence is the words of
//! all terminals joined by single spaces.

use crate::id::{NodeId, TreeId};
use crate::model::*;
use std::collections::HashSet;
use thiserror::Error;
use winnow::ascii::multispace0;
use winnow::combinator::{alt, cut_err, preceded, repeat, terminated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at byte {offset}: {message}")]
pub struct ParseError {
    /// Byte offset into the input.
    pub offset: usize,
    pub message: String,
}

/// Parse bracket notation into a tree with a freshly generated id.
#[must_use = "parsing result should be used"]
pub fn parse_tree(input: &str) -> Result<Tree, ParseError> {
    parse_tree_with_id(input, TreeId::generate())
}

/// Parse bracket notation into a tree with the given id. Nodes without an
/// explicit `@id` get generated ids.
pub fn parse_tree_with_id(input: &str, tree_id: TreeId) -> Result<Tree, ParseError> {
    let brackets = parse_brackets.parse(input).map_err(|e| {
        let message = e.inner().to_string();
        ParseError {
            offset: e.offset(),
            message: if message.is_empty() {
                "unexpected input".to_string()
            } else {
                message
            },
        }
    })?;

    // Generated ids must not land on a pin that appears later in the input.
    for bracket in &brackets {
        intern_pinned(bracket);
    }

    let mut builder = TreeBuilder {
        input_len: input.len(),
        sentence: String::new(),
        sentence_chars: 0,
        nodes: Vec::new(),
        seen: HashSet::new(),
    };
    for bracket in &brackets {
        builder.build(bracket)?;
    }

    let mut tree = Tree::new(tree_id, builder.sentence);
    tree.nodes = builder.nodes.into_iter().collect();
    Ok(tree)
}

// ─── Grammar ────────────────────────────────────────────────────────────

/// A bracket as written, before ids and slices are assigned.
#[derive(Debug)]
struct RawBracket<'a> {
    /// Input length remaining at the opening `[`, for error offsets.
    remaining: usize,
    label: &'a str,
    items: Vec<Item<'a>>,
}

#[derive(Debug)]
enum Item<'a> {
    Bracket(RawBracket<'a>),
    Word(&'a str),
}

fn is_token_char(c: char) -> bool {
    !c.is_whitespace() && c != '[' && c != ']'
}

fn parse_brackets<'a>(input: &mut &'a str) -> ModalResult<Vec<RawBracket<'a>>> {
    terminated(repeat(0.., preceded(multispace0, parse_bracket)), multispace0).parse_next(input)
}

fn parse_bracket<'a>(input: &mut &'a str) -> ModalResult<RawBracket<'a>> {
    let remaining = input.len();
    let (label, items): (&str, Vec<Item<'a>>) = preceded(
        ('[', multispace0),
        cut_err(terminated(
            (
                take_while(0.., is_token_char),
                repeat(0.., preceded(multispace0, parse_item)),
            ),
            (multispace0, ']')
                .context(StrContext::Expected(StrContextValue::CharLiteral(']'))),
        )),
    )
    .parse_next(input)?;
    Ok(RawBracket {
        remaining,
        label,
        items,
    })
}

fn parse_item<'a>(input: &mut &'a str) -> ModalResult<Item<'a>> {
    alt((
        parse_bracket.map(Item::Bracket),
        take_while(1.., is_token_char).map(Item::Word),
    ))
    .parse_next(input)
}

/// Split `NP^@np1` into the label, the `^` marker and the pinned id.
fn split_label(raw: &str) -> (&str, bool, Option<&str>) {
    let (head, id) = match raw.rsplit_once('@') {
        Some((head, id)) if !id.is_empty() => (head, Some(id)),
        _ => (raw, None),
    };
    match head.strip_suffix('^') {
        Some(label) => (label, true, id),
        None => (head, false, id),
    }
}

fn intern_pinned(bracket: &RawBracket<'_>) {
    if let (_, _, Some(pinned)) = split_label(bracket.label) {
        NodeId::intern(pinned);
    }
    for item in &bracket.items {
        if let Item::Bracket(child) = item {
            intern_pinned(child);
        }
    }
}

// ─── Tree assembly ──────────────────────────────────────────────────────

struct TreeBuilder {
    input_len: usize,
    sentence: String,
    sentence_chars: usize,
    nodes: Vec<Node>,
    seen: HashSet<NodeId>,
}

impl TreeBuilder {
    fn error(&self, bracket: &RawBracket<'_>, message: String) -> ParseError {
        ParseError {
            offset: self.input_len - bracket.remaining,
            message,
        }
    }

    fn push_word(&mut self, word: &str) -> StringSlice {
        if self.sentence_chars > 0 {
            self.sentence.push(' ');
            self.sentence_chars += 1;
        }
        let start = self.sentence_chars;
        self.sentence.push_str(word);
        self.sentence_chars += word.chars().count();
        StringSlice::new(start, self.sentence_chars)
    }

    fn build(&mut self, bracket: &RawBracket<'_>) -> Result<NodeId, ParseError> {
        let (label, marked, pinned) = split_label(bracket.label);
        let id = match pinned {
            Some(pinned) => NodeId::intern(pinned),
            None => NodeId::generate(),
        };
        if !self.seen.insert(id) {
            return Err(self.error(bracket, format!("duplicate node id @{}", id.as_str())));
        }

        let words: Vec<&str> = bracket
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Word(w) => Some(*w),
                Item::Bracket(_) => None,
            })
            .collect();
        let has_brackets = words.len() < bracket.items.len();

        let kind = if bracket.items.is_empty() {
            NodeKind::Stranded(StrandedKind::Plain)
        } else if has_brackets && !words.is_empty() {
            return Err(self.error(
                bracket,
                format!("[{label} ...] mixes words and brackets"),
            ));
        } else if has_brackets {
            let mut children = ChildSet::new();
            for item in &bracket.items {
                if let Item::Bracket(child) = item {
                    children.insert(self.build(child)?);
                }
            }
            NodeKind::Branching {
                children,
                folded: marked,
                former_terminal: None,
            }
        } else {
            let mut slice = StringSlice::caret(self.sentence_chars);
            for (i, word) in words.iter().enumerate() {
                let covered = self.push_word(word);
                slice = if i == 0 { covered } else { slice.span(&covered) };
            }
            NodeKind::Terminal {
                slice,
                triangle: marked,
            }
        };

        self.nodes.push(Node::new(id, label, kind));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{parent_id, top_level_ids};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    #[test]
    fn parse_simple_sentence() {
        let tree = parse_tree("[S@top [NP@np [N@n Noun]] [VP@vp verbed.]]").unwrap();
        assert_eq!(tree.sentence, "Noun verbed.");
        assert_eq!(tree.nodes.len(), 4);
        assert_eq!(tree.nodes[id("n")].slice(), Some(StringSlice::new(0, 4)));
        assert_eq!(tree.nodes[id("vp")].slice(), Some(StringSlice::new(5, 12)));
        assert_eq!(parent_id(&tree.nodes, id("np")), Some(id("top")));
        assert_eq!(top_level_ids(&tree.nodes), vec![id("top")]);
        assert_eq!(tree.nodes[id("top")].label, "S");
    }

    #[test]
    fn unpinned_parent_never_takes_a_pinned_child_id() {
        let next = NodeId::generate();
        let n: usize = next.as_str().trim_start_matches("node_").parse().unwrap();
        let children: String = (n + 1..=n + 64)
            .map(|k| format!(" [N@node_{k} w{k}]"))
            .collect();
        let tree = parse_tree(&format!("[S{children}]")).unwrap();

        assert_eq!(tree.nodes.len(), 65);
        let top = top_level_ids(&tree.nodes);
        assert_eq!(top.len(), 1);
        assert_eq!(tree.nodes[top[0]].children().map(ChildSet::len), Some(64));
    }

    #[test]
    fn multi_word_terminal_spans_its_words() {
        let tree = parse_tree("[S [NP@np the  old  man] [VP left]]").unwrap();
        assert_eq!(tree.sentence, "the old man left");
        assert_eq!(tree.nodes[id("np")].slice(), Some(StringSlice::new(0, 11)));
    }

    #[test]
    fn markers_and_stranded_brackets() {
        let tree = parse_tree("[VP^@tri ran away] [XP@lonely] [NP^@folded [N@inner dogs]]").unwrap();
        assert_eq!(
            tree.nodes[id("tri")].kind,
            NodeKind::Terminal {
                slice: StringSlice::new(0, 8),
                triangle: true
            }
        );
        assert_eq!(
            tree.nodes[id("lonely")].kind,
            NodeKind::Stranded(StrandedKind::Plain)
        );
        assert!(tree.nodes[id("folded")].is_folded());
        assert_eq!(top_level_ids(&tree.nodes).len(), 3);
    }

    #[test]
    fn unpinned_nodes_get_fresh_ids() {
        let tree = parse_tree("[S [N a] [V b]]").unwrap();
        assert_eq!(tree.nodes.len(), 3);
        assert!(tree.is_complete());
    }

    #[test]
    fn label_splitting() {
        assert_eq!(split_label("NP"), ("NP", false, None));
        assert_eq!(split_label("NP^"), ("NP", true, None));
        assert_eq!(split_label("NP^@x"), ("NP", true, Some("x")));
        assert_eq!(split_label("NP@"), ("NP@", false, None));
        assert_eq!(split_label(""), ("", false, None));
    }

    #[test]
    fn mixing_words_and_brackets_is_an_error() {
        let err = parse_tree("[S word [N noun]]").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("mixes"));
    }

    #[test]
    fn unclosed_bracket_is_an_error() {
        assert!(parse_tree("[S [N noun]").is_err());
        assert!(parse_tree("[S noun]]").is_err());
        assert!(parse_tree("noun").is_err());
    }

    #[test]
    fn duplicate_pinned_ids_are_rejected() {
        let err = parse_tree("[S@dup [N@dup x]]").unwrap_err();
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn empty_input_is_an_empty_tree() {
        let tree = parse_tree("  \n").unwrap();
        assert!(tree.nodes.is_empty());
        assert_eq!(tree.sentence, "");
    }
}
