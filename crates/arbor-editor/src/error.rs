use arbor_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("no plot at index {0}")]
    NoSuchPlot(usize),
}

pub type EditorResult<T> = Result<T, EditorError>;
