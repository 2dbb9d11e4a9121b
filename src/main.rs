use std::io::{self, stdout, Stdout};
use std::path::Path;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;

use sqlite_editor::cli::{Cli, OutputFormat};
use sqlite_editor::db::{Outcome, Session};
use sqlite_editor::logging::{self, LogBuffer};
use sqlite_editor::storage::csv::CsvWriter;
use sqlite_editor::storage::table::Table;
use sqlite_editor::tui::{app::App, input::handle_events, ui::draw};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();

    let log = LogBuffer::new_shared();
    logging::init(log.clone(), cli.log_file.as_deref(), &cli.log_level)?;

    match (&cli.query, &cli.path) {
        (Some(query), Some(path)) => run_query(path, query, cli.format),
        _ => run_tui(&cli, log),
    }
}

fn run_query(path: &Path, query: &str, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::new();
    session.open(path)?;

    match session.execute(query)? {
        Outcome::Rows(table) => match format {
            OutputFormat::Table => print_table(&table),
            OutputFormat::Csv => CsvWriter::new().write_to(&table, &mut io::stdout().lock())?,
        },
        Outcome::Affected(count) => println!("({} rows affected)", count),
    }

    session.close();
    Ok(())
}

fn print_table(table: &Table) {
    if table.row_count() == 0 {
        println!("(0 rows)");
        return;
    }

    let widths: Vec<usize> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let header_width = col.name.chars().count();
            let max_value_width = table
                .rows
                .iter()
                .map(|row| row.get(i).map(|v| v.to_string().chars().count()).unwrap_or(0))
                .max()
                .unwrap_or(0);
            header_width.max(max_value_width)
        })
        .collect();

    let header: Vec<String> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{:width$}", col.name, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("-+-"));

    for row in &table.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if v.is_numeric() {
                    format!("{:>width$}", v.to_string(), width = widths[i])
                } else {
                    format!("{:width$}", v.to_string(), width = widths[i])
                }
            })
            .collect();
        println!("{}", values.join(" | "));
    }

    println!("({} rows)", table.row_count());
}

fn run_tui(cli: &Cli, log: std::sync::Arc<LogBuffer>) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(log);
    if let Some(path) = &cli.path {
        app.open_database(path);
    }

    let result = event_loop(&mut terminal, &mut app);

    // Rolls back an open transaction before the connection goes away.
    app.quit();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map_err(Into::into)
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, app))?;

        if handle_events(app)? {
            return Ok(());
        }
    }
}
