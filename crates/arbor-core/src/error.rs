//! Error types shared by the core crate.

use crate::id::{NodeId, TreeId};
use thiserror::Error;

/// Lookup failures. These signal a caller bug (indexing by an id that is not
/// in the collection) rather than an expected runtime condition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    #[error("no such node: {0}")]
    NoSuchNode(NodeId),

    #[error("no such tree: {0}")]
    NoSuchTree(TreeId),
}

pub type CoreResult<T> = Result<T, CoreError>;
