use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::action::ToolbarItem;
use super::app::{App, Focus, Mode, NoticeKind, Tab};
use crate::logging::LogLevel;

const LOG_PANE_HEIGHT: u16 = 6;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(10),   // Tab body
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);
    match app.tab {
        Tab::Query => draw_query_tab(frame, app, chunks[1]),
        Tab::Tables => draw_tables_tab(frame, app, chunks[1]),
    }
    draw_status_bar(frame, app, chunks[2]);

    if app.mode == Mode::Command {
        draw_command_line(frame, app);
    }
    if app.mode == Mode::Confirm {
        draw_confirm(frame, app);
    }
    if app.notice.is_some() {
        draw_notice(frame, app);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let tab_style = |tab: Tab| {
        if app.tab == tab {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let mut spans = vec![
        Span::styled(" ", Style::default()),
        Span::styled(
            app.title(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(" SQL Query ", tab_style(Tab::Query)),
        Span::raw(" "),
        Span::styled(" Tables ", tab_style(Tab::Tables)),
    ];
    if app.session.in_transaction() {
        spans.push(Span::styled(
            "  [TRANSACTION]",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

fn draw_query_tab(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),              // Action bar
            Constraint::Length(7),              // Query editor
            Constraint::Length(LOG_PANE_HEIGHT), // Log pane
            Constraint::Min(5),                 // Results
        ])
        .split(area);

    draw_action_bar(frame, app, chunks[0]);
    draw_query_editor(frame, app, chunks[1]);
    draw_log_pane(frame, app, chunks[2]);
    draw_results(frame, app, chunks[3]);
}

fn draw_action_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (i, item) in ToolbarItem::ALL.iter().enumerate() {
        // Separators mirror the grouping: file | transaction | query.
        if i == 3 || i == 6 {
            spans.push(Span::styled(" │", Style::default().fg(Color::DarkGray)));
        }
        let style = if app.is_enabled(*item) {
            Style::default().fg(Color::White)
        } else {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM)
        };
        spans.push(Span::styled(
            format!(" {}", item.key_hint()),
            style.add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!(" {}", item.label()), style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_query_editor(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Query;
    let border_color = if is_focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .title(" SQL (i: insert, Enter: execute) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (cursor_line, cursor_col) = app.editor.cursor_position();
    let cursor_line = to_u16(cursor_line);
    // Keep the cursor line visible when the statement is taller than the box.
    let scroll = cursor_line.saturating_sub(inner.height.saturating_sub(1));

    let highlighted_lines = highlight_sql_multiline(app.editor.text());
    let paragraph = Paragraph::new(highlighted_lines).scroll((scroll, 0));
    frame.render_widget(paragraph, inner);

    if app.mode == Mode::Insert && is_focused {
        let cursor_y = inner.y.saturating_add(cursor_line.saturating_sub(scroll));
        let cursor_x = inner
            .x
            .saturating_add(to_u16(cursor_col))
            .min(inner.right().saturating_sub(1));
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

/// Terminal coordinates are u16; anything larger pins to the edge.
fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

fn highlight_sql_multiline(query: &str) -> Vec<Line<'static>> {
    query.split('\n').map(highlight_sql_line).collect()
}

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "JOIN", "INNER", "LEFT", "OUTER", "ON",
    "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "LIMIT", "OFFSET", "AS", "DISTINCT",
    "NULL", "IS", "IN", "LIKE", "GLOB", "BETWEEN", "CASE", "WHEN", "THEN", "ELSE", "END",
    "WITH", "UNION", "ALL", "EXCEPT", "INTERSECT", "EXISTS", "INSERT", "INTO", "VALUES",
    "UPDATE", "SET", "DELETE", "CREATE", "DROP", "ALTER", "TABLE", "INDEX", "VIEW",
    "TRIGGER", "PRIMARY", "KEY", "UNIQUE", "DEFAULT", "REFERENCES", "BEGIN", "COMMIT",
    "ROLLBACK", "TRANSACTION", "PRAGMA", "VACUUM", "REPLACE", "RETURNING", "IF", "INTEGER",
    "TEXT", "REAL", "BLOB",
];

fn highlight_sql_line(query: &str) -> Line<'static> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut string_char = ' ';

    for c in query.chars() {
        if in_string {
            current.push(c);
            if c == string_char {
                spans.push(Span::styled(
                    std::mem::take(&mut current),
                    Style::default().fg(Color::Green),
                ));
                in_string = false;
            }
        } else if c == '\'' || c == '"' {
            if !current.is_empty() {
                spans.push(colorize_word(&std::mem::take(&mut current)));
            }
            current.push(c);
            in_string = true;
            string_char = c;
        } else if c.is_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            if !current.is_empty() {
                spans.push(colorize_word(&std::mem::take(&mut current)));
            }
            let style = match c {
                '(' | ')' | ',' | ';' => Style::default().fg(Color::Yellow),
                '=' | '<' | '>' | '!' | '+' | '-' | '*' | '/' | '%' | '|' => {
                    Style::default().fg(Color::Magenta)
                }
                _ => Style::default(),
            };
            spans.push(Span::styled(c.to_string(), style));
        }
    }

    if !current.is_empty() {
        if in_string {
            spans.push(Span::styled(current, Style::default().fg(Color::Green)));
        } else {
            spans.push(colorize_word(&current));
        }
    }

    Line::from(spans)
}

fn colorize_word(word: &str) -> Span<'static> {
    let upper = word.to_uppercase();
    if KEYWORDS.contains(&upper.as_str()) {
        Span::styled(
            word.to_string(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )
    } else if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        Span::styled(word.to_string(), Style::default().fg(Color::Cyan))
    } else {
        Span::styled(word.to_string(), Style::default())
    }
}

fn draw_log_pane(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = app
        .log
        .tail(inner.height as usize)
        .into_iter()
        .map(|entry| {
            let color = match entry.level {
                LogLevel::Info => Color::Blue,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::styled(entry.render(), Style::default().fg(color))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_results(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Results;
    let border_color = if is_focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let title = match app.result {
        Some(ref table) => format!(" Results ({} rows) ", table.row_count()),
        None => " Results ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(ref table) = app.result else {
        let hint = if app.session.is_open() {
            "Enter a SQL statement and press Enter to execute"
        } else {
            "Open a database with Ctrl+O or create one with Ctrl+N"
        };
        let help = Paragraph::new(hint).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, inner);
        return;
    };

    let header_cells: Vec<Cell> = table
        .schema
        .columns
        .iter()
        .enumerate()
        .skip(app.result_horizontal_scroll)
        .map(|(i, col)| {
            let width = app.column_widths.get(i).copied().unwrap_or(10);
            Cell::from(truncate_string(&col.name, width))
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        })
        .collect();

    let header = Row::new(header_cells).height(1);

    if table.row_count() == 0 {
        let widths = visible_widths(app);
        frame.render_widget(Table::new(Vec::<Row>::new(), widths).header(header), inner);
        return;
    }

    let visible_height = inner.height.saturating_sub(1) as usize;
    let rows: Vec<Row> = table
        .rows
        .iter()
        .skip(app.result_scroll)
        .take(visible_height)
        .map(|row| {
            let cells: Vec<Cell> = row
                .values
                .iter()
                .enumerate()
                .skip(app.result_horizontal_scroll)
                .map(|(i, val)| {
                    let width = app.column_widths.get(i).copied().unwrap_or(10);
                    let text = truncate_string(&val.to_string(), width);
                    let line = if val.is_numeric() {
                        Line::from(text).alignment(Alignment::Right)
                    } else {
                        Line::from(text)
                    };
                    let style = if val.is_null() {
                        Style::default().fg(Color::DarkGray)
                    } else {
                        Style::default()
                    };
                    Cell::from(line).style(style)
                })
                .collect();
            Row::new(cells)
        })
        .collect();

    let widths = visible_widths(app);
    let table_widget = Table::new(rows, widths)
        .header(header)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    frame.render_widget(table_widget, inner);
}

fn visible_widths(app: &App) -> Vec<Constraint> {
    app.column_widths
        .iter()
        .skip(app.result_horizontal_scroll)
        .map(|&w| Constraint::Length(w as u16 + 2))
        .collect()
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    } else {
        s.chars().take(max_len).collect()
    }
}

fn draw_tables_tab(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let items: Vec<ListItem> = app
        .tables
        .iter()
        .map(|t| ListItem::new(t.as_str()))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .title(" Tables (r: refresh) ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(app.selected_table);
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let text = app
        .structure
        .as_deref()
        .unwrap_or("Select a table, then press s for its structure or v for its data");
    let structure = Paragraph::new(text)
        .block(
            Block::default()
                .title(" Structure ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(structure, chunks[1]);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_str = match app.mode {
        Mode::Normal => "NORMAL",
        Mode::Insert => "INSERT",
        Mode::Command => "COMMAND",
        Mode::Confirm => "CONFIRM",
    };

    let mode_color = match app.mode {
        Mode::Normal => Color::Blue,
        Mode::Insert => Color::Green,
        Mode::Command => Color::Yellow,
        Mode::Confirm => Color::Red,
    };

    let help = match (&app.status, app.mode, app.tab) {
        (Some(status), _, _) => status.as_str(),
        (None, Mode::Normal, Tab::Query) => {
            "i:insert  Enter:execute  Tab:focus  t:tables  ::command  F1:help  q:quit"
        }
        (None, Mode::Normal, Tab::Tables) => "j/k:select  s:structure  v:data  r:refresh  t:query",
        (None, Mode::Insert, _) => "Esc:normal  Enter:newline  Ctrl+Enter:execute  Up/Down:history",
        (None, Mode::Command, _) => "Enter:run  Esc:cancel",
        (None, Mode::Confirm, _) => "y:overwrite  n:cancel",
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default().fg(Color::Black).bg(mode_color),
        ),
        Span::raw(" "),
        Span::styled(help.to_string(), Style::default().fg(Color::DarkGray)),
    ]);

    frame.render_widget(Paragraph::new(status), area);
}

fn draw_command_line(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let popup_area = Rect {
        x: 0,
        y: area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };

    frame.render_widget(Clear, popup_area);

    let command_line = Paragraph::new(format!(":{}", app.command_buffer))
        .style(Style::default().fg(Color::White));
    frame.render_widget(command_line, popup_area);

    frame.set_cursor_position((
        to_u16(app.command_buffer.chars().count()).saturating_add(1),
        popup_area.y,
    ));
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_confirm(frame: &mut Frame, app: &App) {
    let path = app
        .pending_overwrite
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let text = format!("{}\nalready exists. Overwrite it? (y/n)", path);

    let area = centered_rect(60, 5, frame.area());
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(text)
        .block(
            Block::default()
                .title(" Confirm overwrite ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn draw_notice(frame: &mut Frame, app: &App) {
    let Some(ref notice) = app.notice else {
        return;
    };
    let color = match notice.kind {
        NoticeKind::Info => Color::Cyan,
        NoticeKind::Error => Color::Red,
    };

    let lines = to_u16(notice.message.lines().count());
    let area = centered_rect(70, lines.saturating_add(4), frame.area());
    frame.render_widget(Clear, area);

    let popup = Paragraph::new(notice.message.as_str())
        .block(
            Block::default()
                .title(format!(" {} (any key to close) ", notice.title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghij", 6), "abc...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
        assert_eq!(truncate_string("abcdef", 2), "ab");
    }

    #[test]
    fn test_cursor_column_saturates() {
        assert_eq!(to_u16(12), 12);
        assert_eq!(to_u16(70_000), u16::MAX);
        assert_eq!(4u16.saturating_add(to_u16(usize::MAX)), u16::MAX);
    }

    #[test]
    fn test_draw_long_line_does_not_panic() {
        use crate::logging::LogBuffer;
        use ratatui::{backend::TestBackend, Terminal};

        let mut app = App::new(LogBuffer::new_shared());
        app.editor.set_text("x".repeat(70_000));
        app.enter_insert_mode();

        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|frame| draw(frame, &app)).unwrap();
    }

    #[test]
    fn test_highlight_keeps_text() {
        let line = highlight_sql_line("select 'a b', 42 from t;");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "select 'a b', 42 from t;");
    }
}
