pub mod codec;
pub mod emitter;
pub mod entity;
pub mod error;
pub mod id;
pub mod lint;
pub mod manipulation;
pub mod model;
pub mod parser;
pub mod positioning;
pub mod query;
pub mod sentence;

pub use codec::{CodecError, decode_document, encode_document};
pub use emitter::emit_tree;
pub use entity::{Entity, EntitySet};
pub use error::{CoreError, CoreResult};
pub use id::{NodeId, TreeId};
pub use lint::{LintDiagnostic, LintSeverity, lint_document, lint_tree};
pub use model::*;
pub use parser::{ParseError, parse_tree, parse_tree_with_id};
pub use positioning::{LayoutConfig, position_plot, position_tree};
