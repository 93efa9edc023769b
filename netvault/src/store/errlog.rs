//! Per-device error log: the last N fetch outcomes, newest first.

use std::io;
use std::path::Path;

use super::backend::Backend;

/// Write `line` at the head of the log at `path`, keeping at most
/// `max_lines` lines. A zero `max_lines` disables the log.
pub fn append(backend: &dyn Backend, path: &Path, line: &str, max_lines: usize) -> io::Result<()> {
    if max_lines == 0 {
        return Ok(());
    }

    let existing = match backend.get(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut out = String::with_capacity(line.len() + existing.len() + 1);
    out.push_str(line.trim_end_matches(['\r', '\n']));
    out.push('\n');
    for kept in String::from_utf8_lossy(&existing)
        .lines()
        .take(max_lines - 1)
    {
        out.push_str(kept);
        out.push('\n');
    }

    backend.put(path, out.as_bytes(), "text/plain")
}

/// Read the log, newest first. A missing log is empty.
pub fn read(backend: &dyn Backend, path: &Path) -> io::Result<Vec<String>> {
    match backend.get(path) {
        Ok(data) => Ok(String::from_utf8_lossy(&data)
            .lines()
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
