//! Integration tests: bracket notation, lint and the binary document codec.

use arbor_core::*;
use pretty_assertions::assert_eq;

const DITRANSITIVE: &str = include_str!("fixtures/ditransitive.tree");
const FOREST: &str = include_str!("fixtures/forest.tree");

fn id(s: &str) -> NodeId {
    NodeId::intern(s)
}

fn fixture(input: &str, tree_id: &str) -> Tree {
    parse_tree_with_id(input, TreeId::intern(tree_id)).unwrap()
}

#[test]
fn ditransitive_fixture_parses() {
    let tree = fixture(DITRANSITIVE, "ditransitive");
    assert_eq!(tree.sentence, "Mary gave John a book");
    assert_eq!(tree.top_level_ids(), vec![id("s")]);
    assert!(tree.is_complete());

    let obj2 = &tree.nodes[id("obj2")];
    assert_eq!(
        obj2.kind,
        NodeKind::Terminal {
            slice: StringSlice::new(15, 21),
            triangle: true,
        }
    );
    assert_eq!(obj2.slice().map(|s| s.text(&tree.sentence)), Some("a book"));
    assert!(tree.c_commands(id("subj"), id("john")));
    assert!(!tree.c_commands(id("john"), id("subj")));
}

#[test]
fn forest_fixture_has_three_roots() {
    let tree = fixture(FOREST, "forest");
    assert_eq!(tree.sentence, "that the dog barked loudly");
    assert_eq!(
        tree.top_level_ids(),
        vec![id("cp"), id("floating"), id("tp")]
    );
    assert_eq!(tree.nodes[id("tbar")].label, "T'");
    assert_eq!(tree.nodes[id("floating")].kind, NodeKind::Stranded(StrandedKind::Plain));
    assert!(!tree.is_complete());
}

#[test]
fn emitted_fixtures_reparse_to_the_same_tree() {
    for (input, name) in [(DITRANSITIVE, "emit_ditransitive"), (FOREST, "emit_forest")] {
        let tree = fixture(input, name);
        let emitted = emit_tree(&tree, true);
        let reparsed = fixture(&emitted, name);
        assert_eq!(reparsed, tree, "round trip through {emitted:?}");
    }
}

#[test]
fn fixtures_lint_clean() {
    let plot = Plot::new()
        .add_tree(fixture(DITRANSITIVE, "lint_ditransitive"))
        .add_tree(fixture(FOREST, "lint_forest"));
    assert_eq!(lint_document(&[plot]), Vec::new());
}

#[test]
fn codec_roundtrips_parsed_document() {
    let first = Plot::new()
        .add_tree(fixture(DITRANSITIVE, "codec_ditransitive"))
        .add_tree(fixture(FOREST, "codec_forest").moved_by(0.0, 120.0));
    let document = vec![first, Plot::new()];

    let bytes = encode_document(&document).unwrap();
    assert_eq!(&bytes[..4], b"ARBR");
    assert_eq!(decode_document(&bytes).unwrap(), document);
}

#[test]
fn codec_refuses_structurally_broken_document() {
    // `vp` lists a child that is not in the tree.
    let tree = fixture(DITRANSITIVE, "codec_broken");
    let broken = tree.transform_node(id("vp"), |n| {
        let mut children: ChildSet = n.children().cloned().unwrap_or_default();
        children.insert(id("codec_ghost"));
        n.with_children(children)
    });
    let bytes = encode_document(&[Plot::new().add_tree(broken)]).unwrap();

    match decode_document(&bytes) {
        Err(CodecError::Invalid(diagnostics)) => {
            assert!(diagnostics.iter().all(LintDiagnostic::is_error));
            assert_eq!(diagnostics[0].node_id, id("vp"));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn malformed_notation_reports_offsets() {
    let unclosed = parse_tree("[S [NP dogs]").unwrap_err();
    assert!(unclosed.offset >= "[S [NP dogs".len());

    let mixed = parse_tree("[S dogs [VP bark]]").unwrap_err();
    assert_eq!(mixed.offset, 0);
    assert!(mixed.message.contains("mixes words and brackets"));

    let duplicate = parse_tree("[S@dup [N@dup dogs]]").unwrap_err();
    assert!(duplicate.message.contains("@dup"));

    assert!(parse_tree("dogs").is_err());
    assert!(parse_tree("[S dogs]]").is_err());
}

#[test]
fn sentence_edit_on_parsed_tree() {
    let tree = fixture(DITRANSITIVE, "sentence_ditransitive");
    let edited = tree.with_sentence("Mary gave John a new book");

    // The edit falls inside the triangle, which stretches over it.
    assert_eq!(
        edited.nodes[id("obj2")].slice(),
        Some(StringSlice::new(15, 25))
    );
    assert!(edited.nodes.shares_entry(&tree.nodes, id("mary")));
    assert!(edited.nodes.shares_entry(&tree.nodes, id("john")));
}
