//! Binary persistence for whole documents.
//!
//! Layout: the magic bytes `ARBR`, one format version byte, then the plots
//! as MessagePack (`rmp-serde`, struct fields by name, enums tagged by
//! variant name). Decoded documents are linted and refused if any tree is
//! structurally broken.

use crate::lint::{LintDiagnostic, lint_document};
use crate::model::Plot;
use std::io::ErrorKind;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"ARBR";
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("not an arbor document")]
    BadMagic,

    #[error("unsupported format version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u8),

    #[error("document is truncated")]
    Truncated,

    #[error("malformed document body: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error(
        "document failed validation with {} problem(s): {}",
        .0.len(),
        .0.first().map_or("", |d| d.message.as_str())
    )]
    Invalid(Vec<LintDiagnostic>),
}

pub fn encode_document(plots: &[Plot]) -> Result<Vec<u8>, CodecError> {
    let body = rmp_serde::to_vec_named(plots)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode_document(bytes: &[u8]) -> Result<Vec<Plot>, CodecError> {
    let Some(magic) = bytes.get(..MAGIC.len()) else {
        return Err(if MAGIC.starts_with(bytes) {
            CodecError::Truncated
        } else {
            CodecError::BadMagic
        });
    };
    if magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let Some(&version) = bytes.get(MAGIC.len()) else {
        return Err(CodecError::Truncated);
    };
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let plots: Vec<Plot> =
        rmp_serde::from_slice(&bytes[HEADER_LEN..]).map_err(|e| match &e {
            rmp_serde::decode::Error::InvalidMarkerRead(io)
            | rmp_serde::decode::Error::InvalidDataRead(io)
                if io.kind() == ErrorKind::UnexpectedEof =>
            {
                CodecError::Truncated
            }
            _ => CodecError::Decode(e),
        })?;

    let errors: Vec<LintDiagnostic> = lint_document(&plots)
        .into_iter()
        .filter(LintDiagnostic::is_error)
        .collect();
    if !errors.is_empty() {
        log::warn!("rejecting decoded document: {} structural errors", errors.len());
        return Err(CodecError::Invalid(errors));
    }
    Ok(plots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{NodeId, TreeId};
    use crate::model::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn sample() -> Vec<Plot> {
        let mut tree = Tree::new(TreeId::intern("codec_sample"), "Noun verbed.");
        tree.nodes = [
            Node::branching(id("top"), "S", [id("branch1"), id("term2")]),
            Node::branching(id("branch1"), "NP", [id("term1")]),
            Node::terminal(id("term1"), "N", StringSlice::new(0, 4)),
            Node::terminal(id("term2"), "VP", StringSlice::new(5, 11)),
        ]
        .into_iter()
        .collect();
        vec![Plot::new().add_tree(tree), Plot::new()]
    }

    #[test]
    fn header_is_written_first() {
        let bytes = encode_document(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"ARBR");
        assert_eq!(bytes[4], FORMAT_VERSION);
    }

    #[test]
    fn roundtrip() {
        let plots = sample();
        let decoded = decode_document(&encode_document(&plots).unwrap()).unwrap();
        assert_eq!(decoded, plots);
    }

    #[test]
    fn header_errors() {
        assert!(matches!(decode_document(b""), Err(CodecError::Truncated)));
        assert!(matches!(decode_document(b"AR"), Err(CodecError::Truncated)));
        assert!(matches!(decode_document(b"ARBR"), Err(CodecError::Truncated)));
        assert!(matches!(decode_document(b"JUNKDATA"), Err(CodecError::BadMagic)));
        assert!(matches!(
            decode_document(b"ARBR\x07\x90"),
            Err(CodecError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn reversed_slices_are_rejected() {
        // Struct literals bypass `StringSlice::new`, which would reorder them.
        let reversed = StringSlice {
            start: 9,
            end_exclusive: 4,
        };
        let anchored = Node::new(
            id("reversed_term"),
            "N",
            NodeKind::Terminal {
                slice: reversed,
                triangle: false,
            },
        );
        let remembered = Node::new(
            id("reversed_former"),
            "N",
            NodeKind::Stranded(StrandedKind::FormerlyTerminal {
                former_slice: reversed,
                former_triangle: true,
            }),
        );

        for node in [anchored, remembered] {
            let mut tree = Tree::new(TreeId::intern("codec_reversed"), "Noun verbed.");
            tree.nodes = [node.clone()].into_iter().collect();
            let bytes = encode_document(&[Plot::new().add_tree(tree)]).unwrap();
            match decode_document(&bytes) {
                Err(CodecError::Decode(e)) => assert!(e.to_string().contains("reversed slice")),
                other => panic!("{} decoded as {other:?}", node.id),
            }
        }
    }

    #[test]
    fn truncated_body_fails_cleanly() {
        let bytes = encode_document(&sample()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode_document(cut),
            Err(CodecError::Truncated | CodecError::Decode(_))
        ));
    }
}
