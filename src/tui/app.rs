use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::action::{parse_command, Action, ToolbarItem};
use super::editor::QueryEditor;
use crate::db::{quote_identifier, EditorError, Outcome, Session};
use crate::logging::LogBuffer;
use crate::storage::csv::{ensure_extension, CsvWriter};
use crate::storage::table::Table;

pub const APP_NAME: &str = "SQLite Editor";

/// Widest a grid column grows before values are truncated.
const MAX_COLUMN_WIDTH: usize = 40;
const MIN_COLUMN_WIDTH: usize = 4;

pub const HELP_TEXT: &str = "\
Basics
  ^O / :open <path>     open an existing database
  ^N / :new <path>      create a database (.db is appended when missing)
  Enter / :e            execute the statement in the editor
  ^S / :w               save (VACUUM) the database
  :close                close the database

Transactions
  ^B / :begin           start a transaction
  ^T / :commit          commit the transaction
  ^R / :rollback        roll the transaction back

Tables
  t                     switch between the Query and Tables tabs
  j / k                 pick a table (Tables tab)
  r / :refresh          reload the table list
  s / :desc [table]     show the table structure
  v / :view [table]     show the table data

Export
  ^E / :export <path>   write the results to CSV (.csv is appended)

Editing
  i / a / A / I         insert mode; Esc returns to normal mode
  Up / Down             statement history (insert mode)
  Tab                   focus editor or results; h j k l scroll results
  F1 / :help            this help    :about    :q quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Normal,
    Insert,
    Command,
    /// Waiting for y/n on overwriting an existing file.
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Query,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Query,
    Tables,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A popup message; any key dismisses it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

pub struct App {
    pub editor: QueryEditor,
    pub session: Session,
    pub result: Option<Table>,
    pub column_widths: Vec<usize>,
    pub tables: Vec<String>,
    pub selected_table: Option<usize>,
    pub structure: Option<String>,
    pub notice: Option<Notice>,
    pub status: Option<String>,
    pub mode: Mode,
    pub focus: Focus,
    pub tab: Tab,
    pub should_quit: bool,
    pub command_buffer: String,
    pub pending_overwrite: Option<PathBuf>,
    pub result_scroll: usize,
    pub result_horizontal_scroll: usize,
    pub log: Arc<LogBuffer>,
}

impl App {
    pub fn new(log: Arc<LogBuffer>) -> Self {
        Self {
            editor: QueryEditor::new(),
            session: Session::new(),
            result: None,
            column_widths: Vec::new(),
            tables: Vec::new(),
            selected_table: None,
            structure: None,
            notice: None,
            status: None,
            mode: Mode::Normal,
            focus: Focus::Query,
            tab: Tab::Query,
            should_quit: false,
            command_buffer: String::new(),
            pending_overwrite: None,
            result_scroll: 0,
            result_horizontal_scroll: 0,
            log,
        }
    }

    pub fn title(&self) -> String {
        match self.session.file_name() {
            Some(name) => format!("{} - {}", APP_NAME, name),
            None => APP_NAME.to_string(),
        }
    }

    pub fn selected_table_name(&self) -> Option<&str> {
        self.selected_table
            .and_then(|i| self.tables.get(i))
            .map(String::as_str)
    }

    /// Availability of each action bar entry.
    pub fn is_enabled(&self, item: ToolbarItem) -> bool {
        let connected = self.session.is_open();
        let in_tx = self.session.in_transaction();
        match item {
            ToolbarItem::Open | ToolbarItem::New => true,
            ToolbarItem::Save | ToolbarItem::Execute => connected,
            ToolbarItem::Begin => connected && !in_tx,
            ToolbarItem::Commit | ToolbarItem::Rollback => connected && in_tx,
            ToolbarItem::Export => {
                connected && self.result.as_ref().is_some_and(|t| t.row_count() > 0)
            }
        }
    }

    pub fn dispatch(&mut self, action: Action) {
        let gate = match &action {
            Action::Save => Some(ToolbarItem::Save),
            Action::Execute => Some(ToolbarItem::Execute),
            Action::BeginTransaction => Some(ToolbarItem::Begin),
            Action::Commit => Some(ToolbarItem::Commit),
            Action::Rollback => Some(ToolbarItem::Rollback),
            Action::Export(_) => Some(ToolbarItem::Export),
            _ => None,
        };
        if let Some(item) = gate {
            if !self.is_enabled(item) {
                debug!(?action, "action disabled");
                self.status = Some(format!("{} is not available right now", item.label()));
                return;
            }
        }
        self.status = None;

        match action {
            Action::Open(path) => self.open_database(&path),
            Action::New(path) => self.new_database(&path),
            Action::Close => self.close_database(),
            Action::Save => self.save_database(),
            Action::Execute => self.execute_query(),
            Action::BeginTransaction => self.begin_transaction(),
            Action::Commit => self.commit_transaction(),
            Action::Rollback => self.rollback_transaction(),
            Action::Export(path) => self.export_results(&path),
            Action::RefreshTables => self.refresh_tables(),
            Action::DescribeTable(name) => self.view_table_structure(name),
            Action::ViewTableData(name) => self.view_table_data(name),
            Action::ShowHelp => self.show_help(),
            Action::ShowAbout => self.show_about(),
            Action::Clear => {
                self.editor.clear();
                self.clear_result();
            }
            Action::Quit => self.quit(),
        }
    }

    fn show_info(&mut self, title: &str, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind: NoticeKind::Info,
            title: title.to_string(),
            message: message.into(),
        });
    }

    /// The single failure path: one error log entry plus an error popup.
    fn report_error(&mut self, context: &str, err: &EditorError) {
        error!("{}: {}", context, err);
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            title: "Error".to_string(),
            message: format!("{}: {}", context, err),
        });
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn open_database(&mut self, path: &Path) {
        match self.session.open(path) {
            Ok(()) => self.on_connected(),
            Err(e) => self.on_connect_failed(&e),
        }
    }

    /// Creates a database, asking first when the file already exists.
    pub fn new_database(&mut self, path: &Path) {
        let path = ensure_extension(path, "db");
        if path.exists() {
            self.pending_overwrite = Some(path);
            self.mode = Mode::Confirm;
            return;
        }
        self.create_database(&path);
    }

    /// Answers the overwrite question raised by [`App::new_database`].
    pub fn confirm_overwrite(&mut self, overwrite: bool) {
        self.mode = Mode::Normal;
        let Some(path) = self.pending_overwrite.take() else {
            return;
        };
        if !overwrite {
            return;
        }

        // The file being replaced may be the one currently open.
        self.session.close();
        if let Err(e) = fs::remove_file(&path) {
            self.report_error("Connection failed", &EditorError::from(e));
            self.reset_database_view();
            return;
        }
        self.create_database(&path);
    }

    fn create_database(&mut self, path: &Path) {
        match self.session.create(path) {
            Ok(()) => self.on_connected(),
            Err(e) => self.on_connect_failed(&e),
        }
    }

    fn on_connected(&mut self) {
        let name = self.session.file_name().unwrap_or_default();
        self.clear_result();
        self.structure = None;
        self.show_info("Connected", format!("Connected to database: {}", name));
        info!("Connected to database: {}", name);
        self.refresh_tables();
    }

    fn on_connect_failed(&mut self, err: &EditorError) {
        // Any previous connection was released before the attempt.
        self.reset_database_view();
        self.report_error("Connection failed", err);
    }

    pub fn close_database(&mut self) {
        if !self.session.is_open() {
            return;
        }
        self.session.close();
        self.reset_database_view();
    }

    fn reset_database_view(&mut self) {
        self.clear_result();
        self.tables.clear();
        self.selected_table = None;
        self.structure = None;
    }

    /// SQLite persists on commit; saving compacts the file.
    pub fn save_database(&mut self) {
        match self.session.vacuum() {
            Ok(()) => {
                info!("Database saved (VACUUM)");
                self.show_info("Saved", "Database saved");
            }
            Err(e) => self.report_error("Save failed", &e),
        }
    }

    pub fn quit(&mut self) {
        self.session.close();
        self.should_quit = true;
    }

    fn clear_result(&mut self) {
        self.result = None;
        self.column_widths.clear();
        self.result_scroll = 0;
        self.result_horizontal_scroll = 0;
    }

    pub fn execute_query(&mut self) {
        let sql = self.editor.text().trim().to_string();
        if sql.is_empty() {
            self.show_info("Notice", EditorError::EmptyStatement.to_string());
            return;
        }
        if !self.session.is_open() {
            self.show_info("Notice", EditorError::NoConnection.to_string());
            return;
        }

        info!("Executing SQL: {}", sql);
        self.clear_result();

        match self.session.execute(&sql) {
            Ok(Outcome::Rows(table)) => {
                info!("Query returned {} rows", table.row_count());
                self.column_widths = column_widths(&table);
                self.result = Some(table);
            }
            Ok(Outcome::Affected(count)) => {
                let mut message = format!("Statement succeeded, {} rows affected", count);
                if self.session.in_transaction() {
                    message.push_str(" (in transaction, not yet committed)");
                    info!("{}", message);
                } else {
                    info!("{}", message);
                    self.show_info("Done", message);
                }
                if is_schema_change(&sql) {
                    self.refresh_tables();
                }
            }
            Err(e) => {
                self.report_error("SQL error", &e);
                return;
            }
        }

        self.editor.push_history(&sql);
    }

    pub fn begin_transaction(&mut self) {
        match self.session.begin() {
            Ok(true) => {
                info!("Transaction started");
                self.show_info(
                    "Transaction",
                    "Transaction started. Run your statements, then commit or roll back.",
                );
            }
            Ok(false) => {}
            Err(e) => self.report_error("Begin transaction failed", &e),
        }
    }

    pub fn commit_transaction(&mut self) {
        match self.session.commit() {
            Ok(true) => {
                info!("Transaction committed");
                self.show_info("Transaction", "Transaction committed");
            }
            Ok(false) => {}
            Err(e) => self.report_error("Commit failed", &e),
        }
    }

    pub fn rollback_transaction(&mut self) {
        match self.session.rollback() {
            Ok(true) => {
                info!("Transaction rolled back");
                self.show_info("Transaction", "Transaction rolled back");
            }
            Ok(false) => {}
            Err(e) => self.report_error("Rollback failed", &e),
        }
    }

    pub fn export_results(&mut self, path: &Path) {
        let Some(table) = self.result.as_ref().filter(|t| t.row_count() > 0) else {
            self.show_info("Notice", EditorError::NothingToExport.to_string());
            return;
        };

        let path = ensure_extension(path, "csv");
        match CsvWriter::new().write_file(table, &path) {
            Ok(()) => {
                info!("Results exported to: {}", path.display());
                self.show_info("Exported", format!("Data exported to: {}", path.display()));
            }
            Err(e) => self.report_error("Export failed", &EditorError::from(e)),
        }
    }

    /// Reloads the table list, keeping the selection when the table survives.
    pub fn refresh_tables(&mut self) {
        if !self.session.is_open() {
            return;
        }
        let previous = self.selected_table_name().map(str::to_string);

        match self.session.list_tables() {
            Ok(tables) => {
                self.selected_table = previous
                    .and_then(|name| tables.iter().position(|t| *t == name))
                    .or(if tables.is_empty() { None } else { Some(0) });
                self.tables = tables;
            }
            Err(e) => self.report_error("Loading table list failed", &e),
        }
    }

    pub fn select_next_table(&mut self) {
        if self.tables.is_empty() {
            return;
        }
        self.selected_table = Some(match self.selected_table {
            Some(i) if i + 1 < self.tables.len() => i + 1,
            Some(i) => i,
            None => 0,
        });
    }

    pub fn select_previous_table(&mut self) {
        if self.tables.is_empty() {
            return;
        }
        self.selected_table = Some(self.selected_table.map_or(0, |i| i.saturating_sub(1)));
    }

    /// Picks `name` when given (selecting it in the list if present),
    /// otherwise the current selection.
    fn resolve_table(&mut self, name: Option<String>) -> Option<String> {
        match name {
            Some(name) => {
                if let Some(i) = self.tables.iter().position(|t| *t == name) {
                    self.selected_table = Some(i);
                }
                Some(name)
            }
            None => self.selected_table_name().map(str::to_string),
        }
    }

    pub fn view_table_structure(&mut self, name: Option<String>) {
        if !self.session.is_open() {
            self.show_info("Notice", EditorError::NoConnection.to_string());
            return;
        }
        let Some(table) = self.resolve_table(name) else {
            self.show_info("Notice", EditorError::NoTableSelected.to_string());
            return;
        };

        match self.session.describe_table(&table) {
            Ok(structure) => {
                self.structure = Some(structure.render());
                self.tab = Tab::Tables;
            }
            Err(e) => self.report_error("Loading table structure failed", &e),
        }
    }

    pub fn view_table_data(&mut self, name: Option<String>) {
        if !self.session.is_open() {
            self.show_info("Notice", EditorError::NoConnection.to_string());
            return;
        }
        let Some(table) = self.resolve_table(name) else {
            self.show_info("Notice", EditorError::NoTableSelected.to_string());
            return;
        };

        self.tab = Tab::Query;
        self.editor
            .set_text(format!("SELECT * FROM {};", quote_identifier(&table)));
        self.execute_query();
    }

    pub fn show_help(&mut self) {
        self.show_info("Help", HELP_TEXT);
    }

    pub fn show_about(&mut self) {
        self.show_info(
            "About",
            format!(
                "{} v{}\nA simple terminal editor for SQLite databases.\n\
                 Run SQL, inspect tables, manage transactions, export CSV.",
                APP_NAME,
                env!("CARGO_PKG_VERSION")
            ),
        );
    }

    pub fn enter_insert_mode(&mut self) {
        self.mode = Mode::Insert;
        self.focus = Focus::Query;
        self.tab = Tab::Query;
    }

    pub fn enter_normal_mode(&mut self) {
        self.mode = Mode::Normal;
    }

    /// Opens the command line, optionally pre-filled (used by the shortcut
    /// keys that stand in for file dialogs).
    pub fn enter_command_mode(&mut self, prefill: &str) {
        self.mode = Mode::Command;
        self.command_buffer = prefill.to_string();
    }

    pub fn execute_command(&mut self) {
        let line = std::mem::take(&mut self.command_buffer);
        self.mode = Mode::Normal;
        match parse_command(&line) {
            Ok(action) => self.dispatch(action),
            Err(message) => self.status = Some(message),
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Query => Focus::Results,
            Focus::Results => Focus::Query,
        };
    }

    pub fn toggle_tab(&mut self) {
        self.tab = match self.tab {
            Tab::Query => Tab::Tables,
            Tab::Tables => Tab::Query,
        };
    }

    pub fn scroll_results_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(1);
    }

    pub fn scroll_results_down(&mut self) {
        if let Some(ref table) = self.result {
            if self.result_scroll < table.row_count().saturating_sub(1) {
                self.result_scroll += 1;
            }
        }
    }

    pub fn scroll_results_left(&mut self) {
        self.result_horizontal_scroll = self.result_horizontal_scroll.saturating_sub(1);
    }

    pub fn scroll_results_right(&mut self) {
        if self.result_horizontal_scroll + 1 < self.column_widths.len() {
            self.result_horizontal_scroll += 1;
        }
    }

    pub fn page_up(&mut self) {
        self.result_scroll = self.result_scroll.saturating_sub(10);
    }

    pub fn page_down(&mut self) {
        if let Some(ref table) = self.result {
            self.result_scroll = (self.result_scroll + 10).min(table.row_count().saturating_sub(1));
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.result_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        if let Some(ref table) = self.result {
            self.result_scroll = table.row_count().saturating_sub(1);
        }
    }
}

/// Header or widest value, clamped to a readable range.
fn column_widths(table: &Table) -> Vec<usize> {
    table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let header_width = col.name.chars().count();
            let max_value_width = table
                .rows
                .iter()
                .map(|row| {
                    row.get(i)
                        .map(|v| v.to_string().chars().count())
                        .unwrap_or(0)
                })
                .max()
                .unwrap_or(0);
            header_width
                .max(max_value_width)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Statements after which the table list is reloaded.
fn is_schema_change(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    ["CREATE TABLE", "DROP TABLE", "ALTER TABLE"]
        .iter()
        .any(|kw| upper.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{Column, Row, Schema, Value};

    #[test]
    fn test_schema_change_detection() {
        assert!(is_schema_change("create table t(a)"));
        assert!(is_schema_change("DROP TABLE IF EXISTS t"));
        assert!(is_schema_change("alter TABLE t add column b"));
        assert!(!is_schema_change("CREATE INDEX i ON t(a)"));
        assert!(!is_schema_change("INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn test_column_widths_are_clamped() {
        let mut table = Table::new(Schema::new(vec![Column::new("a"), Column::new("long")]));
        table.add_row(Row::new(vec![
            Value::Integer(1),
            Value::Text("x".repeat(100)),
        ]));
        assert_eq!(column_widths(&table), vec![MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH]);
    }

    #[test]
    fn test_actions_disabled_without_connection() {
        let app = App::new(LogBuffer::new_shared());
        assert!(app.is_enabled(ToolbarItem::Open));
        assert!(app.is_enabled(ToolbarItem::New));
        for item in [
            ToolbarItem::Save,
            ToolbarItem::Execute,
            ToolbarItem::Begin,
            ToolbarItem::Commit,
            ToolbarItem::Rollback,
            ToolbarItem::Export,
        ] {
            assert!(!app.is_enabled(item), "{:?} should be disabled", item);
        }
    }

    #[test]
    fn test_disabled_action_sets_status() {
        let mut app = App::new(LogBuffer::new_shared());
        app.dispatch(Action::Commit);
        assert!(app.status.as_deref().unwrap().contains("Commit"));
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_unknown_command_reports_status() {
        let mut app = App::new(LogBuffer::new_shared());
        app.enter_command_mode("bogus");
        app.execute_command();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.status.as_deref(), Some("Unknown command: bogus"));
    }

    #[test]
    fn test_title_without_database() {
        let app = App::new(LogBuffer::new_shared());
        assert_eq!(app.title(), APP_NAME);
    }
}
