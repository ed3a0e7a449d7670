//! Line buffer that strips terminal escapes and splits on newlines.
//!
//! Output arrives in arbitrary chunks; escape sequences and multibyte
//! characters can straddle chunk boundaries, so the `vte` parser state is
//! kept across calls.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};
use memchr::memchr;
use vte::{Parser, Perform};

/// Accumulates channel output and yields complete lines.
pub struct LineBuffer {
    /// Cleaned bytes not yet terminated by a newline.
    pending: BytesMut,

    /// Escape sequence parser, kept across chunks.
    parser: Parser,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            pending: BytesMut::with_capacity(4096),
            parser: Parser::new(),
        }
    }

    /// Feed raw bytes and return every line they complete.
    pub fn extend(&mut self, data: &[u8]) -> Vec<String> {
        let mut printer = Printable {
            out: &mut self.pending,
        };
        self.parser.advance(&mut printer, data);

        let mut lines = Vec::new();
        while let Some(pos) = memchr(b'\n', &self.pending) {
            let line = self.pending.split_to(pos + 1);
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// The unterminated tail, e.g. a prompt waiting for input.
    pub fn partial(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.pending)
    }

    /// Take the unterminated tail, leaving the buffer empty.
    pub fn take_partial(&mut self) -> String {
        let tail = self.pending.split();
        String::from_utf8_lossy(&tail).into_owned()
    }

    /// Flush the tail as a final line, if there is one.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_partial())
        }
    }

    /// Check if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps printable characters, tabs and newlines.
struct Printable<'a> {
    out: &'a mut BytesMut,
}

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.out.put_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if byte == b'\n' || byte == b'\t' {
            self.out.put_u8(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.extend(b"first\nsecond\nthi");
        assert_eq!(lines, vec!["first", "second"]);
        assert_eq!(buffer.partial(), "thi");

        let lines = buffer.extend(b"rd\n");
        assert_eq!(lines, vec!["third"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_strips_ansi_and_carriage_returns() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.extend(b"\x1b[32mgreen\x1b[0m\r\n");
        assert_eq!(lines, vec!["green"]);
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.extend(b"a\x1b[3").is_empty());
        let lines = buffer.extend(b"1mb\n");
        assert_eq!(lines, vec!["ab"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        let text = "Intel® Xeon\n".as_bytes();
        let (head, tail) = text.split_at(6);
        assert!(buffer.extend(head).is_empty());
        assert_eq!(buffer.extend(tail), vec!["Intel® Xeon"]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"no newline");
        assert_eq!(buffer.finish().as_deref(), Some("no newline"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_keeps_tabs() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.extend(b"a\tb\n"), vec!["a\tb"]);
    }
}
