mod catalog;
mod error;
mod session;

pub use catalog::{quote_identifier, ColumnInfo, IndexInfo, TableStructure};
pub use error::{EditorError, Result};
pub use session::{Outcome, Session};
