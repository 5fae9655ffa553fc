use super::*;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl App {
    pub(super) fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Vec<Task> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return self.control(ControlEvent::Quit, now),
                KeyCode::Char('a') => self.cursor = 0,
                KeyCode::Char('e') => self.cursor = self.input.len(),
                KeyCode::Char('u') => self.clear_input_buffer(),
                KeyCode::Char('p') => self.history_prev(),
                KeyCode::Char('n') => self.history_next(),
                _ => {}
            }
            return Vec::new();
        }

        if key.modifiers.contains(KeyModifiers::ALT) && matches!(key.code, KeyCode::Backspace) {
            self.backspace_word();
            return Vec::new();
        }

        match key.code {
            KeyCode::Esc => return self.control(ControlEvent::Quit, now),
            KeyCode::Enter => {
                let text = self.input.clone();
                return self.control(ControlEvent::Submit(text), now);
            }
            KeyCode::PageUp => self.scroll_up(PAGE_SCROLL_LINES),
            KeyCode::PageDown => self.scroll_down(PAGE_SCROLL_LINES),
            KeyCode::Up => self.history_prev(),
            KeyCode::Down => self.history_next(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            KeyCode::Char(c) => self.insert_char(c),
            _ => {}
        }
        Vec::new()
    }

    /// The composer is single-line: pasted line breaks become spaces.
    pub(super) fn handle_paste(&mut self, raw: &str) {
        let flattened = raw
            .replace("\r\n", " ")
            .replace(['\r', '\n'], " ");
        self.insert_str(&flattened);
    }

    pub(super) fn clear_input_buffer(&mut self) {
        self.input.clear();
        self.cursor = 0;
        self.history_pos = None;
    }

    fn input_is_full(&self) -> bool {
        self.input.chars().count() >= self.input_limit
    }

    pub(super) fn insert_char(&mut self, c: char) {
        if c.is_control() || self.input_is_full() {
            return;
        }
        self.input.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub(super) fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            if self.input_is_full() {
                self.last_status = format!("input limit is {} characters", self.input_limit);
                break;
            }
            self.insert_char(c);
        }
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.input[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
    }

    pub(super) fn backspace(&mut self) {
        if let Some(prev_idx) = self.prev_boundary() {
            self.input.drain(prev_idx..self.cursor);
            self.cursor = prev_idx;
        }
    }

    pub(super) fn backspace_word(&mut self) {
        while self.cursor > 0 && self.input[..self.cursor].ends_with(' ') {
            self.backspace();
        }
        while self.cursor > 0 && !self.input[..self.cursor].ends_with(' ') {
            self.backspace();
        }
    }

    pub(super) fn delete(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.input.drain(self.cursor..self.cursor + ch.len_utf8());
        }
    }

    pub(super) fn move_left(&mut self) {
        if let Some(prev_idx) = self.prev_boundary() {
            self.cursor = prev_idx;
        }
    }

    pub(super) fn move_right(&mut self) {
        if let Some(ch) = self.input[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    /// Recall prompts submitted earlier in this run.
    pub(super) fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_pos {
            None => self.history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.history_pos = Some(next);
        self.input = self.history[next].clone();
        self.cursor = self.input.len();
    }

    pub(super) fn history_next(&mut self) {
        let Some(i) = self.history_pos else {
            return;
        };
        if i + 1 >= self.history.len() {
            self.clear_input_buffer();
            return;
        }
        self.history_pos = Some(i + 1);
        self.input = self.history[i + 1].clone();
        self.cursor = self.input.len();
    }
}
