/// Multi-line SQL input with a byte cursor that always sits on a char
/// boundary, plus recall of previously executed statements.
#[derive(Debug, Default, Clone)]
pub struct QueryEditor {
    text: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
}

impl QueryEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replaces the contents and puts the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
        self.history_index = None;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// (line, column) of the cursor, both counted in chars.
    pub fn cursor_position(&self) -> (usize, usize) {
        let before = &self.text[..self.cursor];
        let line = before.matches('\n').count();
        let col = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0);
        (line, col)
    }

    fn prev_boundary(&self, pos: usize) -> usize {
        self.text[..pos]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self, pos: usize) -> usize {
        self.text[pos..]
            .chars()
            .next()
            .map(|c| pos + c.len_utf8())
            .unwrap_or(pos)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
    }

    fn line_end(&self, pos: usize) -> usize {
        self.text[pos..]
            .find('\n')
            .map(|i| pos + i)
            .unwrap_or(self.text.len())
    }

    /// Byte offset of the `col`-th char of the line starting at `start`,
    /// clamped to the line end.
    fn offset_in_line(&self, start: usize, col: usize) -> usize {
        let end = self.line_end(start);
        self.text[start..end]
            .char_indices()
            .nth(col)
            .map(|(i, _)| start + i)
            .unwrap_or(end)
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn insert_str(&mut self, s: &str) {
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            let start = self.prev_boundary(self.cursor);
            self.text.drain(start..self.cursor);
            self.cursor = start;
        }
    }

    pub fn delete_char_forward(&mut self) {
        if self.cursor < self.text.len() {
            let end = self.next_boundary(self.cursor);
            self.text.drain(self.cursor..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary(self.cursor);
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary(self.cursor);
    }

    pub fn move_line_start(&mut self) {
        self.cursor = self.line_start(self.cursor);
    }

    pub fn move_line_end(&mut self) {
        self.cursor = self.line_end(self.cursor);
    }

    pub fn move_word_forward(&mut self) {
        let rest = &self.text[self.cursor..];
        let mut chars = rest.char_indices().peekable();

        while let Some((_, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
        }
        while let Some((_, c)) = chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            chars.next();
        }

        self.cursor += chars.peek().map(|(i, _)| *i).unwrap_or(rest.len());
    }

    pub fn move_word_backward(&mut self) {
        let before: Vec<(usize, char)> = self.text[..self.cursor].char_indices().collect();
        let mut idx = before.len();

        while idx > 0 && before[idx - 1].1.is_whitespace() {
            idx -= 1;
        }
        while idx > 0 && !before[idx - 1].1.is_whitespace() {
            idx -= 1;
        }

        self.cursor = before.get(idx).map(|(i, _)| *i).unwrap_or(self.cursor);
    }

    pub fn move_up(&mut self) {
        let start = self.line_start(self.cursor);
        if start == 0 {
            return;
        }
        let col = self.text[start..self.cursor].chars().count();
        let prev_start = self.line_start(start - 1);
        self.cursor = self.offset_in_line(prev_start, col);
    }

    pub fn move_down(&mut self) {
        let end = self.line_end(self.cursor);
        if end == self.text.len() {
            return;
        }
        let start = self.line_start(self.cursor);
        let col = self.text[start..self.cursor].chars().count();
        self.cursor = self.offset_in_line(end + 1, col);
    }

    pub fn delete_word_backward(&mut self) {
        let end = self.cursor;
        self.move_word_backward();
        self.text.drain(self.cursor..end);
    }

    /// Deletes from the cursor to the end of the current line.
    pub fn delete_to_line_end(&mut self) {
        let end = self.line_end(self.cursor);
        self.text.drain(self.cursor..end);
    }

    /// Deletes from the start of the current line to the cursor.
    pub fn delete_to_line_start(&mut self) {
        let start = self.line_start(self.cursor);
        self.text.drain(start..self.cursor);
        self.cursor = start;
    }

    /// Records an executed statement, skipping consecutive duplicates.
    pub fn push_history(&mut self, statement: &str) {
        if self.history.last().map(String::as_str) != Some(statement) {
            self.history.push(statement.to_string());
        }
        self.history_index = None;
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }

        let new_index = match self.history_index {
            None => self.history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };

        self.history_index = Some(new_index);
        self.text = self.history[new_index].clone();
        self.cursor = self.text.len();
    }

    pub fn history_down(&mut self) {
        match self.history_index {
            None => {}
            Some(i) if i + 1 >= self.history.len() => {
                self.history_index = None;
                self.clear();
            }
            Some(i) => {
                self.history_index = Some(i + 1);
                self.text = self.history[i + 1].clone();
                self.cursor = self.text.len();
            }
        }
    }
}
