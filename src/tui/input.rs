use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

use super::action::Action;
use super::app::{App, Focus, Mode, Tab};

pub fn handle_events(app: &mut App) -> std::io::Result<bool> {
    if event::poll(Duration::from_millis(100))? {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                handle_key_event(app, key);
            }
        }
    }
    Ok(app.should_quit)
}

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // A popup swallows the next key.
    if app.notice.is_some() {
        app.dismiss_notice();
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C leaves insert mode, otherwise quits.
    if ctrl && key.code == KeyCode::Char('c') {
        match app.mode {
            Mode::Insert | Mode::Command => app.enter_normal_mode(),
            Mode::Confirm => app.confirm_overwrite(false),
            Mode::Normal => app.dispatch(Action::Quit),
        }
        return;
    }

    if app.mode != Mode::Confirm && handle_shortcut(app, key) {
        return;
    }

    match app.mode {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::Insert => handle_insert_mode(app, key),
        Mode::Command => handle_command_mode(app, key),
        Mode::Confirm => handle_confirm_mode(app, key),
    }
}

/// Action bar shortcuts, available in every mode except confirmation.
fn handle_shortcut(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::F(1) {
        app.dispatch(Action::ShowHelp);
        return true;
    }
    if !key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }

    match key.code {
        KeyCode::Char('o') => app.enter_command_mode("open "),
        KeyCode::Char('n') => app.enter_command_mode("new "),
        KeyCode::Char('e') if app.mode != Mode::Insert => app.enter_command_mode("export "),
        KeyCode::Char('s') => app.dispatch(Action::Save),
        KeyCode::Char('b') => app.dispatch(Action::BeginTransaction),
        KeyCode::Char('t') => app.dispatch(Action::Commit),
        KeyCode::Char('r') => app.dispatch(Action::Rollback),
        KeyCode::Enter => {
            app.dispatch(Action::Execute);
            app.enter_normal_mode();
        }
        _ => return false,
    }
    true
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match app.tab {
        Tab::Query => handle_query_tab(app, key),
        Tab::Tables => handle_tables_tab(app, key),
    }
}

fn handle_tables_tab(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('t') | KeyCode::Esc => app.toggle_tab(),
        KeyCode::Char(':') => app.enter_command_mode(""),
        KeyCode::Char('q') => app.dispatch(Action::Quit),
        KeyCode::Char('j') | KeyCode::Down => app.select_next_table(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous_table(),
        KeyCode::Char('r') => app.dispatch(Action::RefreshTables),
        KeyCode::Char('s') | KeyCode::Enter => app.dispatch(Action::DescribeTable(None)),
        KeyCode::Char('v') => app.dispatch(Action::ViewTableData(None)),
        _ => {}
    }
}

fn handle_query_tab(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let on_query = app.focus == Focus::Query;

    match key.code {
        // Mode switching
        KeyCode::Char('i') => app.enter_insert_mode(),
        KeyCode::Char('I') => {
            app.editor.move_line_start();
            app.enter_insert_mode();
        }
        KeyCode::Char('a') => {
            app.editor.move_right();
            app.enter_insert_mode();
        }
        KeyCode::Char('A') => {
            app.editor.move_line_end();
            app.enter_insert_mode();
        }
        KeyCode::Char(':') => app.enter_command_mode(""),
        KeyCode::Char('t') => app.toggle_tab(),

        KeyCode::Char('q') => app.dispatch(Action::Quit),

        KeyCode::Tab => app.toggle_focus(),

        // Paging must be matched before the plain-letter arms below.
        KeyCode::Char('d') if ctrl => app.page_down(),
        KeyCode::Char('u') if ctrl => app.page_up(),

        KeyCode::Char('h') | KeyCode::Left => {
            if on_query {
                app.editor.move_left();
            } else {
                app.scroll_results_left();
            }
        }
        KeyCode::Char('l') | KeyCode::Right => {
            if on_query {
                app.editor.move_right();
            } else {
                app.scroll_results_right();
            }
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if on_query {
                app.editor.move_down();
            } else {
                app.scroll_results_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if on_query {
                app.editor.move_up();
            } else {
                app.scroll_results_up();
            }
        }
        KeyCode::Char('0') if on_query => app.editor.move_line_start(),
        KeyCode::Char('$') if on_query => app.editor.move_line_end(),
        KeyCode::Char('w') if on_query => app.editor.move_word_forward(),
        KeyCode::Char('b') if on_query => app.editor.move_word_backward(),
        KeyCode::Char('x') if on_query => app.editor.delete_char_forward(),
        KeyCode::Char('D') if on_query => app.editor.delete_to_line_end(),
        KeyCode::Char('g') if !on_query => app.scroll_to_top(),
        KeyCode::Char('G') if !on_query => app.scroll_to_bottom(),

        KeyCode::Enter => app.dispatch(Action::Execute),

        _ => {}
    }
}

fn handle_insert_mode(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => app.enter_normal_mode(),
        KeyCode::Enter => app.editor.insert_char('\n'),
        KeyCode::Tab => app.editor.insert_str("    "),
        KeyCode::Backspace => app.editor.delete_char(),
        KeyCode::Delete => app.editor.delete_char_forward(),
        KeyCode::Left => app.editor.move_left(),
        KeyCode::Right => app.editor.move_right(),
        KeyCode::Home => app.editor.move_line_start(),
        KeyCode::End => app.editor.move_line_end(),
        KeyCode::Up => app.editor.history_up(),
        KeyCode::Down => app.editor.history_down(),

        KeyCode::Char('w') if ctrl => app.editor.delete_word_backward(),
        KeyCode::Char('u') if ctrl => app.editor.delete_to_line_start(),
        KeyCode::Char('k') if ctrl => app.editor.delete_to_line_end(),
        KeyCode::Char('a') if ctrl => app.editor.move_line_start(),
        KeyCode::Char('e') if ctrl => app.editor.move_line_end(),

        KeyCode::Char(c) if !ctrl => app.editor.insert_char(c),

        _ => {}
    }
}

fn handle_command_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.command_buffer.clear();
            app.enter_normal_mode();
        }
        KeyCode::Enter => app.execute_command(),
        KeyCode::Backspace => {
            if app.command_buffer.pop().is_none() {
                app.enter_normal_mode();
            }
        }
        KeyCode::Char(c) => app.command_buffer.push(c),
        _ => {}
    }
}

fn handle_confirm_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_overwrite(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_overwrite(false),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogBuffer;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_typing_in_insert_mode() {
        let mut app = App::new(LogBuffer::new_shared());
        handle_key_event(&mut app, key(KeyCode::Char('i')));
        for c in "SELECT 1".chars() {
            handle_key_event(&mut app, key(KeyCode::Char(c)));
        }
        handle_key_event(&mut app, key(KeyCode::Esc));

        assert_eq!(app.editor.text(), "SELECT 1");
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn test_open_shortcut_prefills_command() {
        let mut app = App::new(LogBuffer::new_shared());
        handle_key_event(&mut app, ctrl('o'));
        assert_eq!(app.mode, Mode::Command);
        assert_eq!(app.command_buffer, "open ");
    }

    #[test]
    fn test_notice_swallows_key() {
        let mut app = App::new(LogBuffer::new_shared());
        app.dispatch(Action::ShowHelp);
        assert!(app.notice.is_some());

        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.notice.is_none());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_tab_switch_and_quit() {
        let mut app = App::new(LogBuffer::new_shared());
        handle_key_event(&mut app, key(KeyCode::Char('t')));
        assert_eq!(app.tab, Tab::Tables);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }
}
