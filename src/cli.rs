use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sqlite-editor")]
#[command(author, version, about = "A terminal editor for SQLite databases")]
pub struct Cli {
    /// SQLite database file to open at startup
    pub path: Option<PathBuf>,

    /// Execute one SQL statement against PATH and print the result (non-interactive mode)
    #[arg(short, long, requires = "path")]
    pub query: Option<String>,

    /// Output format for non-interactive mode
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log filter for the log file (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_path() {
        assert!(Cli::try_parse_from(["sqlite-editor", "-q", "SELECT 1"]).is_err());
    }

    #[test]
    fn test_parse_full() {
        let cli = Cli::try_parse_from([
            "sqlite-editor",
            "app.db",
            "--query",
            "SELECT 1",
            "--format",
            "csv",
            "--log-file",
            "editor.log",
        ])
        .unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("app.db")));
        assert_eq!(cli.query.as_deref(), Some("SELECT 1"));
        assert!(matches!(cli.format, OutputFormat::Csv));
        assert_eq!(cli.log_level, "info");
    }
}
