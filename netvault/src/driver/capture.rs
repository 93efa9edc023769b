//! Captured dialog: command echoes interleaved with device output.

use regex::bytes::Regex;

/// Blocks captured during the command phase, in order.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    blocks: Vec<Vec<u8>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: impl Into<Vec<u8>>) {
        self.blocks.push(block.into());
    }

    /// Drop everything captured so far.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Concatenate the blocks, dropping lines that match `line_filter`.
    ///
    /// An empty filter keeps every line.
    pub fn render(&self, line_filter: &str) -> Result<Vec<u8>, regex::Error> {
        let payload = self.blocks.concat();
        if line_filter.is_empty() {
            return Ok(payload);
        }

        let filter = Regex::new(line_filter)?;
        let mut out = Vec::with_capacity(payload.len());
        for line in payload.split_inclusive(|&b| b == b'\n') {
            let text = line.strip_suffix(b"\n").unwrap_or(line);
            let text = text.strip_suffix(b"\r").unwrap_or(text);
            if !filter.is_match(text) {
                out.extend_from_slice(line);
            }
        }
        Ok(out)
    }
}
