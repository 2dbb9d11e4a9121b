pub mod csv;
pub mod table;

pub use csv::{ensure_extension, CsvWriter};
pub use table::{Column, Row, Schema, Table, Value};
