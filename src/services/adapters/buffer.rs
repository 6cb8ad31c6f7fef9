//! In-memory editor surface with a line/column cursor.

use crate::services::ports::editor::{CursorPosition, EditorSurface};

#[derive(Debug, Default, Clone)]
pub struct PlainBuffer {
    content: String,
    cursor: CursorPosition,
}

impl PlainBuffer {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            cursor: (0, 0),
        }
    }

    /// Moves the cursor, clamping to the buffer's actual lines and columns.
    pub fn set_cursor(&mut self, line: usize, column: usize) {
        let line_count = self.content.lines().count().max(1);
        let line = line.min(line_count - 1);
        let width = self.content.lines().nth(line).map_or(0, |l| l.chars().count());
        self.cursor = (line, column.min(width));
    }
}

impl EditorSurface for PlainBuffer {
    fn buffer_content(&self) -> String {
        self.content.clone()
    }

    fn set_buffer_content(&mut self, content: &str) {
        self.content = content.to_string();
        let (line, column) = self.cursor;
        self.set_cursor(line, column);
    }

    fn cursor(&self) -> CursorPosition {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_clamps_to_content() {
        let mut buf = PlainBuffer::new("one\ntwo");
        buf.set_cursor(5, 99);
        assert_eq!(buf.cursor(), (1, 3));
    }

    #[test]
    fn replacing_content_keeps_cursor_in_bounds() {
        let mut buf = PlainBuffer::new("a long first line\nsecond");
        buf.set_cursor(1, 6);
        buf.set_buffer_content("x");
        assert_eq!(buf.cursor(), (0, 1));
        assert_eq!(buf.buffer_content(), "x");
    }
}
