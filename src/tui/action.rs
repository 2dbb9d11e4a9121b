use std::path::PathBuf;

/// Everything the user can ask the controller to do. Key bindings and
/// command-line words both resolve to one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Open(PathBuf),
    New(PathBuf),
    Close,
    Save,
    Execute,
    BeginTransaction,
    Commit,
    Rollback,
    Export(PathBuf),
    RefreshTables,
    DescribeTable(Option<String>),
    ViewTableData(Option<String>),
    ShowHelp,
    ShowAbout,
    Clear,
    Quit,
}

/// Entries of the action bar, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarItem {
    Open,
    New,
    Save,
    Begin,
    Commit,
    Rollback,
    Execute,
    Export,
}

impl ToolbarItem {
    pub const ALL: [ToolbarItem; 8] = [
        ToolbarItem::Open,
        ToolbarItem::New,
        ToolbarItem::Save,
        ToolbarItem::Begin,
        ToolbarItem::Commit,
        ToolbarItem::Rollback,
        ToolbarItem::Execute,
        ToolbarItem::Export,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ToolbarItem::Open => "Open",
            ToolbarItem::New => "New",
            ToolbarItem::Save => "Save",
            ToolbarItem::Begin => "Begin",
            ToolbarItem::Commit => "Commit",
            ToolbarItem::Rollback => "Rollback",
            ToolbarItem::Execute => "Execute",
            ToolbarItem::Export => "Export",
        }
    }

    pub fn key_hint(self) -> &'static str {
        match self {
            ToolbarItem::Open => "^O",
            ToolbarItem::New => "^N",
            ToolbarItem::Save => "^S",
            ToolbarItem::Begin => "^B",
            ToolbarItem::Commit => "^T",
            ToolbarItem::Rollback => "^R",
            ToolbarItem::Execute => "Enter",
            ToolbarItem::Export => "^E",
        }
    }
}

/// Parses a `:` command line into an action.
///
/// Returns `Err` with a message for unknown commands or missing arguments.
pub fn parse_command(line: &str) -> Result<Action, String> {
    let line = line.trim();
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((w, rest)) => (w, rest.trim()),
        None => (line, ""),
    };
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    match word {
        "q" | "quit" | "exit" => Ok(Action::Quit),
        "e" | "exec" | "execute" => Ok(Action::Execute),
        "o" | "open" => path_arg(&arg, "open").map(Action::Open),
        "n" | "new" => path_arg(&arg, "new").map(Action::New),
        "close" => Ok(Action::Close),
        "w" | "write" | "save" | "vacuum" => Ok(Action::Save),
        "export" => path_arg(&arg, "export").map(Action::Export),
        "begin" => Ok(Action::BeginTransaction),
        "commit" => Ok(Action::Commit),
        "rollback" => Ok(Action::Rollback),
        "refresh" | "tables" => Ok(Action::RefreshTables),
        "desc" | "describe" => Ok(Action::DescribeTable(arg)),
        "view" => Ok(Action::ViewTableData(arg)),
        "help" | "h" => Ok(Action::ShowHelp),
        "about" => Ok(Action::ShowAbout),
        "clear" => Ok(Action::Clear),
        "" => Err("Empty command".to_string()),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn path_arg(arg: &Option<String>, command: &str) -> Result<PathBuf, String> {
    arg.as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| format!("Usage: :{} <path>", command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("q"), Ok(Action::Quit));
        assert_eq!(
            parse_command("open  /tmp/my data.db "),
            Ok(Action::Open(PathBuf::from("/tmp/my data.db")))
        );
        assert_eq!(parse_command("desc"), Ok(Action::DescribeTable(None)));
        assert_eq!(
            parse_command("view users"),
            Ok(Action::ViewTableData(Some("users".to_string())))
        );
        assert_eq!(parse_command("w"), Ok(Action::Save));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("export").unwrap_err().contains("Usage"));
        assert!(parse_command("frobnicate").unwrap_err().contains("Unknown"));
        assert!(parse_command("  ").is_err());
    }
}
