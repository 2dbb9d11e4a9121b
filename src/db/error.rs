use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database file not found: {0}")]
    DatabaseNotFound(String),

    #[error("No database is open")]
    NoConnection,

    #[error("Please enter a SQL statement")]
    EmptyStatement,

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Please select a table first")]
    NoTableSelected,

    #[error("No data to export")]
    NothingToExport,
}

pub type Result<T> = std::result::Result<T, EditorError>;
