//! Schema introspection through SQLite's catalog table and `PRAGMA`s.

use std::fmt::Write as _;

use rusqlite::Connection;

use super::error::{EditorError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableStructure {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

impl TableStructure {
    /// Plain-text report shown in the Tables tab.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Table: {}", self.table);
        let _ = writeln!(out);
        let _ = writeln!(out, "Columns:");
        let _ = writeln!(
            out,
            "{:<20} {:<20} {:<10} {:<10} {}",
            "Name", "Type", "Nullable", "Default", "PK"
        );
        let _ = writeln!(out, "{}", "-".repeat(70));
        for col in &self.columns {
            let _ = writeln!(
                out,
                "{:<20} {:<20} {:<10} {:<10} {}",
                col.name,
                col.declared_type,
                if col.not_null { "NOT NULL" } else { "NULL" },
                col.default_value.as_deref().unwrap_or(""),
                if col.primary_key { "yes" } else { "" }
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Indexes:");
        if self.indexes.is_empty() {
            let _ = writeln!(out, "No indexes");
        }
        for index in &self.indexes {
            let _ = writeln!(
                out,
                "Index: {} ({})",
                index.name,
                if index.unique { "unique" } else { "non-unique" }
            );
            let _ = writeln!(out, "  Columns: {}", index.columns.join(", "));
        }
        out
    }
}

/// Wraps an identifier in double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// User tables, skipping SQLite's own `sqlite_*` tables.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    // LIKE treats `_` as a wildcard and ignores case, so match the prefix exactly.
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master \
         WHERE type='table' AND substr(name, 1, 7) <> 'sqlite_' \
         ORDER BY name",
    )?;

    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(tables)
}

pub fn describe_table(conn: &Connection, table: &str) -> Result<TableStructure> {
    let quoted = quote_identifier(table);

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get("name")?,
                declared_type: row.get::<_, Option<String>>("type")?.unwrap_or_default(),
                not_null: row.get::<_, i64>("notnull")? != 0,
                default_value: row.get("dflt_value")?,
                primary_key: row.get::<_, i64>("pk")? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        return Err(EditorError::TableNotFound(table.to_string()));
    }

    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", quoted))?;
    let index_heads = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>("name")?, row.get::<_, i64>("unique")? != 0))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut indexes = Vec::with_capacity(index_heads.len());
    for (name, unique) in index_heads {
        let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quote_identifier(&name)))?;
        // Expression indexes report a NULL column name.
        let columns = stmt
            .query_map([], |row| row.get::<_, Option<String>>("name"))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|c| c.unwrap_or_else(|| "<expression>".to_string()))
            .collect();
        indexes.push(IndexInfo {
            name,
            unique,
            columns,
        });
    }

    Ok(TableStructure {
        table: table.to_string(),
        columns,
        indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                age INTEGER DEFAULT 18
            );
            CREATE INDEX idx_users_age ON users(age);
            CREATE TABLE "odd ""name""" (x);
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_list_tables_sorted() {
        let conn = fixture();
        let tables = list_tables(&conn).unwrap();
        assert_eq!(tables, vec!["odd \"name\"".to_string(), "users".to_string()]);
    }

    #[test]
    fn test_list_tables_keeps_sqlite_lookalikes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sqlitenotes (a); CREATE TABLE \"SQLite2\" (b); CREATE TABLE users (c);
             CREATE TABLE t (x INTEGER PRIMARY KEY AUTOINCREMENT);",
        )
        .unwrap();

        // AUTOINCREMENT creates the internal sqlite_sequence table.
        let tables = list_tables(&conn).unwrap();
        assert_eq!(tables, vec!["SQLite2", "sqlitenotes", "t", "users"]);
    }

    #[test]
    fn test_describe_columns_and_indexes() {
        let conn = fixture();
        let structure = describe_table(&conn, "users").unwrap();

        assert_eq!(structure.columns.len(), 3);
        assert!(structure.columns[0].primary_key);
        assert!(structure.columns[1].not_null);
        assert_eq!(structure.columns[2].default_value.as_deref(), Some("18"));

        let age_index = structure
            .indexes
            .iter()
            .find(|i| i.name == "idx_users_age")
            .unwrap();
        assert!(!age_index.unique);
        assert_eq!(age_index.columns, vec!["age".to_string()]);
        assert!(structure.indexes.iter().any(|i| i.unique && i.columns == ["email"]));
    }

    #[test]
    fn test_describe_quoted_name() {
        let conn = fixture();
        let structure = describe_table(&conn, "odd \"name\"").unwrap();
        assert_eq!(structure.columns[0].name, "x");
        assert!(structure.render().contains("No indexes"));
    }

    #[test]
    fn test_describe_missing_table() {
        let conn = fixture();
        assert!(matches!(
            describe_table(&conn, "nope"),
            Err(EditorError::TableNotFound(_))
        ));
    }
}
