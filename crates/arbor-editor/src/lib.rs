pub mod actions;
pub mod error;
pub mod history;

pub use actions::{ContentAction, NodeRef, PlotEdit, reduce};
pub use error::{EditorError, EditorResult};
pub use history::{ChangeScope, ContentChange, ContentHistory, HistoryConfig};
