pub mod cli;
pub mod db;
pub mod logging;
pub mod storage;
pub mod tui;

pub use db::{EditorError, Outcome, Result, Session, TableStructure};
pub use storage::table::{Column, Row, Schema, Table, Value};
