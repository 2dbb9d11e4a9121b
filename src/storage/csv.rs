use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::table::Table;

#[cfg(windows)]
pub const PLATFORM_LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const PLATFORM_LINE_ENDING: &str = "\n";

/// Writes a result buffer as CSV. Every field, header included, is quoted.
pub struct CsvWriter {
    line_ending: &'static str,
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvWriter {
    pub fn new() -> Self {
        Self {
            line_ending: PLATFORM_LINE_ENDING,
        }
    }

    pub fn write_file(&self, table: &Table, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(table, &mut writer)?;
        writer.flush()
    }

    pub fn write_to<W: Write>(&self, table: &Table, writer: &mut W) -> io::Result<()> {
        let header: Vec<String> = table
            .schema
            .columns
            .iter()
            .map(|c| quote_field(&c.name))
            .collect();
        self.write_record(writer, &header)?;

        for row in &table.rows {
            let fields: Vec<String> = row
                .values
                .iter()
                .map(|v| quote_field(&v.to_export_string()))
                .collect();
            self.write_record(writer, &fields)?;
        }

        Ok(())
    }

    fn write_record<W: Write>(&self, writer: &mut W, fields: &[String]) -> io::Result<()> {
        writer.write_all(fields.join(",").as_bytes())?;
        writer.write_all(self.line_ending.as_bytes())
    }
}

fn quote_field(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Appends `extension` when the path does not already end with it.
pub fn ensure_extension(path: &Path, extension: &str) -> std::path::PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(extension) => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(extension);
            name.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{Column, Row, Schema, Value};
    use std::path::PathBuf;

    /// Output with line endings normalized to `\n`.
    fn render(table: &Table) -> String {
        let mut buf = Vec::new();
        CsvWriter::new().write_to(table, &mut buf).unwrap();
        String::from_utf8(buf).unwrap().replace("\r\n", "\n")
    }

    fn sample() -> Table {
        let mut table = Table::new(Schema::new(vec![Column::new("id"), Column::new("note")]));
        table.add_row(Row::new(vec![
            Value::Integer(1),
            Value::Text("say \"hi\"".to_string()),
        ]));
        table.add_row(Row::new(vec![Value::Integer(2), Value::Text("a,b".to_string())]));
        table
    }

    #[test]
    fn test_quotes_every_field() {
        assert_eq!(
            render(&sample()),
            "\"id\",\"note\"\n\"1\",\"say \"\"hi\"\"\"\n\"2\",\"a,b\"\n"
        );
    }

    #[test]
    fn test_null_and_blob_fields() {
        let mut table = Table::new(Schema::new(vec![Column::new("a"), Column::new("b")]));
        table.add_row(Row::new(vec![Value::Null, Value::Blob(vec![0x01, 0xff])]));

        assert_eq!(render(&table), "\"a\",\"b\"\n\"\",\"01ff\"\n");
    }

    #[test]
    fn test_platform_line_ending() {
        let mut buf = Vec::new();
        CsvWriter::new().write_to(&sample(), &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.matches(PLATFORM_LINE_ENDING).count(), 3);
        assert!(out.ends_with(PLATFORM_LINE_ENDING));
    }

    #[test]
    fn test_header_only_for_empty_result() {
        let table = Table::new(Schema::new(vec![Column::new("x")]));
        assert_eq!(render(&table), "\"x\"\n");
    }

    #[test]
    fn test_ensure_extension() {
        assert_eq!(ensure_extension(Path::new("out"), "csv"), PathBuf::from("out.csv"));
        assert_eq!(ensure_extension(Path::new("out.CSV"), "csv"), PathBuf::from("out.CSV"));
        assert_eq!(ensure_extension(Path::new("data.txt"), "db"), PathBuf::from("data.txt.db"));
    }
}
