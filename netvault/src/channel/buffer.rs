//! Dialog buffer: accumulates one match call's output and exposes the
//! candidate lines prompt patterns are evaluated against.

use memchr::memrchr;

use super::filter::{self, CR, LF};
use super::patterns::PromptSet;

/// Collects printable text and C0 controls, dropping escape sequences.
#[derive(Default)]
struct Printable {
    out: Vec<u8>,
}

impl vte::Perform for Printable {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        self.out.push(byte);
    }
}

/// Buffer for accumulating device output between two prompts.
///
/// Unless control characters are kept, each chunk is first stripped of
/// ANSI escape sequences (the parser state survives sequences split across
/// reads) and then run through the control-character filter.
pub struct DialogBuffer {
    /// Text committed so far.
    committed: Vec<u8>,

    /// A CR ended the previous chunk; its meaning depends on the next byte.
    carry_cr: bool,

    keep_control_chars: bool,

    parser: vte::Parser,
}

impl DialogBuffer {
    pub fn new(keep_control_chars: bool) -> Self {
        Self {
            committed: Vec::with_capacity(4096),
            carry_cr: false,
            keep_control_chars,
            parser: vte::Parser::new(),
        }
    }

    /// Append a chunk just read.
    ///
    /// Returns the offset where candidate lines start: the beginning of the
    /// line that was open before this chunk arrived.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let old_len = self.committed.len();

        if self.keep_control_chars {
            self.committed.extend_from_slice(data);
        } else {
            let mut suffix = Vec::with_capacity(data.len() + 1);
            if std::mem::take(&mut self.carry_cr) {
                suffix.push(CR);
            }
            suffix.extend_from_slice(&self.strip_escapes(data));

            filter::filter(&mut self.committed, &mut suffix);

            if suffix.last() == Some(&CR) {
                suffix.pop();
                self.carry_cr = true;
            }
            self.committed.extend_from_slice(&suffix);
        }

        let boundary = old_len.min(self.committed.len());
        memrchr(LF, &self.committed[..boundary]).map_or(0, |j| j + 1)
    }

    fn strip_escapes(&mut self, data: &[u8]) -> Vec<u8> {
        let mut printable = Printable::default();
        self.parser.advance(&mut printable, data);
        printable.out
    }

    /// Candidate lines from `start`, without their line terminators.
    pub fn lines_from(&self, start: usize) -> impl Iterator<Item = &[u8]> {
        let tail = &self.committed[start.min(self.committed.len())..];
        let tail = tail.strip_suffix(&[LF]).unwrap_or(tail);
        tail.split(|&b| b == LF)
            .map(|line| line.strip_suffix(&[CR]).unwrap_or(line))
    }

    /// Find the first line from `start` matching any prompt, in line order
    /// then pattern order.
    pub fn find(&self, prompts: &PromptSet, start: usize) -> Option<usize> {
        self.lines_from(start).find_map(|line| prompts.find(line))
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.committed
    }

    /// Take ownership of the buffer contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.committed
    }
}
