//! Terminal control-character elimination.
//!
//! Device CLIs redraw lines with CR, erase with BS and sprinkle other C0
//! bytes into their output. The filter applies those edits so prompt
//! patterns see the text a terminal would show.

use memchr::memrchr;

pub const LF: u8 = b'\n';
pub const CR: u8 = b'\r';
pub const BS: u8 = 0x08;

/// Apply terminal edits of `suffix` (bytes just read) on top of `committed`.
///
/// On return `suffix` holds the filtered bytes and `committed` may have been
/// shortened by edits that reached back into it. Neither buffer holds BS or
/// a C0 byte other than LF and the CR of a CR-LF pair; a CR ending `suffix`
/// is left in place because its meaning depends on the next byte.
pub fn filter(committed: &mut Vec<u8>, suffix: &mut Vec<u8>) {
    let input = std::mem::take(suffix);
    let mut out = Vec::with_capacity(input.len());
    let last = input.len().saturating_sub(1);

    let mut i = 0;
    while i < input.len() {
        match input[i] {
            LF => out.push(LF),
            CR if input.get(i + 1) == Some(&LF) => {
                out.extend_from_slice(&[CR, LF]);
                i += 1;
            }
            CR if i == last => out.push(CR),
            CR => carriage_return(committed, &mut out),
            BS => backspace(committed, &mut out),
            b if b < 0x20 => {}
            b => out.push(b),
        }
        i += 1;
    }

    *suffix = out;
}

/// Lone CR: erase the current line back to the previous line boundary.
fn carriage_return(committed: &mut Vec<u8>, out: &mut Vec<u8>) {
    match memrchr(LF, out) {
        Some(j) => out.truncate(j + 1),
        None => {
            out.clear();
            if let Some(j) = memrchr(LF, committed) {
                committed.truncate(j + 1);
            }
        }
    }
}

/// BS: erase the preceding byte, from `committed` when `out` is empty.
/// A CR-LF pair is erased as one line break.
fn backspace(committed: &mut Vec<u8>, out: &mut Vec<u8>) {
    let target = if out.is_empty() { committed } else { out };
    if target.pop() == Some(LF) && target.last() == Some(&CR) {
        target.pop();
    }
}
