use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use super::catalog::{self, TableStructure};
use super::error::{EditorError, Result};
use crate::storage::table::{Column, Row, Schema, Table, Value};

/// What the driver handed back for a statement.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The statement produced result columns; all rows are materialized.
    Rows(Table),
    /// The statement changed data; carries the affected row count.
    Affected(usize),
}

/// Owns the single live connection and the transaction-mode flag.
///
/// The flag is only ever true while a connection is open. Opening another
/// file, closing, or dropping the session rolls back an open transaction
/// before the connection is released.
#[derive(Debug, Default)]
pub struct Session {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    in_transaction: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an existing database file. Never creates one.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(EditorError::DatabaseNotFound(path.display().to_string()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        self.attach(path, flags)
    }

    /// Opens `path`, creating the database file when it does not exist.
    pub fn create(&mut self, path: &Path) -> Result<()> {
        self.attach(path, OpenFlags::default())
    }

    fn attach(&mut self, path: &Path, flags: OpenFlags) -> Result<()> {
        self.close();

        let conn = Connection::open_with_flags(path, flags)?;
        // Opening is lazy in SQLite; touch the schema so a corrupt or
        // non-database file fails here instead of on the first statement.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;

        debug!(path = %path.display(), "opened database");
        self.conn = Some(conn);
        self.path = Some(path.to_path_buf());
        self.in_transaction = false;
        Ok(())
    }

    /// Releases the connection, rolling back first when a transaction is open.
    /// Rollback failures are logged and otherwise ignored.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            self.in_transaction = false;
            return;
        };

        if self.in_transaction {
            if conn.is_autocommit() {
                debug!("no active transaction to roll back on close");
            } else {
                match conn.execute_batch("ROLLBACK") {
                    Ok(()) => info!("Uncommitted transaction rolled back on close"),
                    Err(e) => warn!("Rollback on close failed: {}", e),
                }
            }
        }
        self.in_transaction = false;

        if let Err((_, e)) = conn.close() {
            warn!("Closing database failed: {}", e);
        }
        if let Some(path) = self.path.take() {
            info!("Database connection closed: {}", path.display());
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name of the open database, for titles and messages.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(EditorError::NoConnection)
    }

    /// Forwards one statement to SQLite. Only the trimmed text is checked;
    /// SQLite alone decides whether it is valid.
    pub fn execute(&self, sql: &str) -> Result<Outcome> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(EditorError::EmptyStatement);
        }
        let conn = self.conn()?;

        let mut stmt = conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            return Ok(Outcome::Affected(affected));
        }

        let columns: Vec<Column> = stmt.column_names().into_iter().map(Column::new).collect();
        let column_count = columns.len();
        let mut table = Table::new(Schema::new(columns));

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            table.add_row(Row::new(values));
        }

        Ok(Outcome::Rows(table))
    }

    /// Switches to manual-commit mode. Returns false when there is nothing to
    /// do: no connection, or a transaction is already open.
    pub fn begin(&mut self) -> Result<bool> {
        if self.in_transaction {
            return Ok(false);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Ok(false);
        };
        conn.execute_batch("BEGIN DEFERRED")?;
        self.in_transaction = true;
        Ok(true)
    }

    /// Commits and restores auto-commit. No-op outside a transaction.
    pub fn commit(&mut self) -> Result<bool> {
        self.finish("COMMIT")
    }

    /// Rolls back and restores auto-commit. No-op outside a transaction.
    pub fn rollback(&mut self) -> Result<bool> {
        self.finish("ROLLBACK")
    }

    fn finish(&mut self, command: &str) -> Result<bool> {
        if !self.in_transaction {
            return Ok(false);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Ok(false);
        };
        // The user may already have ended the transaction by hand.
        if !conn.is_autocommit() {
            conn.execute_batch(command)?;
        }
        self.in_transaction = false;
        Ok(true)
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        catalog::list_tables(self.conn()?)
    }

    pub fn describe_table(&self, table: &str) -> Result<TableStructure> {
        catalog::describe_table(self.conn()?, table)
    }

    /// Compacts the database file.
    pub fn vacuum(&self) -> Result<()> {
        self.conn()?.execute_batch("VACUUM")?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        (dir, path)
    }

    #[test]
    fn test_open_missing_file_fails() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        assert!(matches!(
            session.open(&path),
            Err(EditorError::DatabaseNotFound(_))
        ));
        assert!(!session.is_open());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_non_database_fails() {
        let (_dir, path) = scratch();
        std::fs::write(&path, b"definitely not a sqlite database, just some text").unwrap();

        let mut session = Session::new();
        assert!(session.open(&path).is_err());
        assert!(!session.is_open());
    }

    #[test]
    fn test_execute_without_connection() {
        let session = Session::new();
        assert!(matches!(
            session.execute("SELECT 1"),
            Err(EditorError::NoConnection)
        ));
    }

    #[test]
    fn test_empty_statement_rejected() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        session.create(&path).unwrap();
        assert!(matches!(
            session.execute("   \n "),
            Err(EditorError::EmptyStatement)
        ));
    }

    #[test]
    fn test_outcomes() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        session.create(&path).unwrap();

        assert!(matches!(
            session.execute("CREATE TABLE t(a INT, b TEXT)").unwrap(),
            Outcome::Affected(0)
        ));
        assert!(matches!(
            session
                .execute("INSERT INTO t VALUES (1, 'x'), (2, NULL)")
                .unwrap(),
            Outcome::Affected(2)
        ));

        match session.execute("SELECT a, b FROM t ORDER BY a").unwrap() {
            Outcome::Rows(table) => {
                let names: Vec<&str> =
                    table.schema.columns.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert_eq!(table.row_count(), 2);
                assert_eq!(table.rows[0].values[1], Value::Text("x".into()));
                assert!(table.rows[1].values[1].is_null());
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_transaction_preconditions() {
        let mut session = Session::new();
        assert!(!session.begin().unwrap());
        assert!(!session.commit().unwrap());
        assert!(!session.in_transaction());

        let (_dir, path) = scratch();
        session.create(&path).unwrap();
        assert!(!session.rollback().unwrap());
        assert!(session.begin().unwrap());
        assert!(!session.begin().unwrap());
        assert!(session.in_transaction());
        assert!(session.commit().unwrap());
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_commit_after_manual_commit() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        session.create(&path).unwrap();

        session.begin().unwrap();
        session.execute("COMMIT").unwrap();
        assert!(session.commit().unwrap());
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_reopen_resets_transaction_flag() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        session.create(&path).unwrap();
        session.execute("CREATE TABLE t(a INT)").unwrap();
        session.begin().unwrap();
        session.execute("INSERT INTO t VALUES (1)").unwrap();

        session.open(&path).unwrap();
        assert!(!session.in_transaction());
        assert!(session.is_open());

        // The replaced connection rolled back its pending insert.
        match session.execute("SELECT count(*) FROM t").unwrap() {
            Outcome::Rows(table) => assert_eq!(table.rows[0].values[0], Value::Integer(0)),
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_close_clears_state() {
        let (_dir, path) = scratch();
        let mut session = Session::new();
        session.create(&path).unwrap();
        session.begin().unwrap();
        session.close();

        assert!(!session.is_open());
        assert!(!session.in_transaction());
        assert!(session.path().is_none());
        // Closing twice is harmless.
        session.close();
    }
}
