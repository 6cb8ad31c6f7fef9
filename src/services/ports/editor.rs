//! Editor surface port: the minimal contract the workspace needs from a
//! text-editing component.

/// Zero-based (line, column) cursor position.
pub type CursorPosition = (usize, usize);

pub trait EditorSurface {
    fn buffer_content(&self) -> String;

    fn set_buffer_content(&mut self, content: &str);

    fn cursor(&self) -> CursorPosition;
}
