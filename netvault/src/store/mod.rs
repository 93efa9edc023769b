//! Versioned snapshot repository.
//!
//! Under a prefix `P` the repository keeps snapshots `P0`, `P1`, ... `Pn`,
//! where `n` is a monotonically increasing commit id, a temporary `Ptmp`
//! used while publishing, and a shortcut `Plast` holding the latest id.
//! The shortcut only speeds up lookups; the directory listing is the
//! source of truth.

mod backend;
pub mod errlog;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

pub use backend::{Backend, FileInfo, LocalFs, Prefix};

use crate::error::StoreError;

/// Parse the commit id of `name` under basename prefix `base`.
///
/// Only names made of `base` followed by decimal digits qualify.
pub fn extract_commit_id(base: &str, name: &str) -> Option<u64> {
    let digits = name.strip_prefix(base)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Repository over a storage backend.
#[derive(Clone)]
pub struct Repository {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::local()
    }
}

impl Repository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Repository on the local filesystem.
    pub fn local() -> Self {
        Self::new(Arc::new(LocalFs))
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Snapshot ids under `prefix`, ascending.
    fn commit_ids(&self, prefix: &Prefix) -> Result<Vec<u64>, StoreError> {
        let names = match self.backend.list(prefix.dir()) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("list", prefix.dir(), e)),
        };

        let mut ids: Vec<u64> = names
            .iter()
            .filter_map(|name| extract_commit_id(prefix.base(), name))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Latest snapshot and its commit id, if any.
    pub fn find_last_config(&self, prefix: &Prefix) -> Result<Option<(PathBuf, u64)>, StoreError> {
        if let Ok(data) = self.backend.get(&prefix.last()) {
            if let Ok(id) = String::from_utf8_lossy(&data).trim().parse::<u64>() {
                let path = prefix.snapshot(id);
                if self.backend.exists(&path) {
                    return Ok(Some((path, id)));
                }
            }
            debug!("store: stale shortcut {}", prefix.last().display());
        }

        Ok(self
            .commit_ids(prefix)?
            .last()
            .map(|&id| (prefix.snapshot(id), id)))
    }

    /// Snapshot paths sorted by commit id, oldest first unless `reverse`.
    pub fn list_config_sorted(
        &self,
        prefix: &Prefix,
        reverse: bool,
    ) -> Result<Vec<PathBuf>, StoreError> {
        let mut ids = self.commit_ids(prefix)?;
        if reverse {
            ids.reverse();
        }
        Ok(ids.into_iter().map(|id| prefix.snapshot(id)).collect())
    }

    /// Publish a new snapshot produced by `writer`.
    ///
    /// With `changes_only`, a payload equal to the latest snapshot is
    /// discarded and the latest snapshot's path is returned instead.
    pub fn save_new_config<W>(
        &self,
        prefix: &Prefix,
        max_files: usize,
        writer: W,
        changes_only: bool,
        content_type: &str,
    ) -> Result<PathBuf, StoreError>
    where
        W: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let tmp = prefix.tmp();
        if self.backend.exists(&tmp) {
            return Err(StoreError::TmpExists(tmp));
        }

        self.backend
            .create_dir_all(prefix.dir())
            .map_err(|e| StoreError::io("mkdir", prefix.dir(), e))?;

        let mut payload = Vec::new();
        writer(&mut payload).map_err(|e| StoreError::io("write", &tmp, e))?;
        if let Err(e) = self.backend.put(&tmp, &payload, content_type) {
            self.remove_quietly(&tmp);
            return Err(StoreError::io("write", &tmp, e));
        }

        let previous = match self.find_last_config(prefix) {
            Ok(previous) => previous,
            Err(e) => {
                self.remove_quietly(&tmp);
                return Err(e);
            }
        };

        if changes_only {
            if let Some((prev_path, _)) = &previous {
                if self.same_content(prev_path, &tmp) {
                    debug!("store: {} unchanged", prev_path.display());
                    self.remove_quietly(&tmp);
                    return Ok(prev_path.clone());
                }
            }
        }

        let new_id = previous.map_or(0, |(_, id)| id + 1);
        let new_path = prefix.snapshot(new_id);
        if let Err(e) = self.backend.rename(&tmp, &new_path) {
            self.remove_quietly(&tmp);
            return Err(StoreError::io("rename", &tmp, e));
        }

        let last = prefix.last();
        if let Err(e) = self
            .backend
            .put(&last, format!("{}\n", new_id).as_bytes(), "text/plain")
        {
            warn!("store: could not write {}: {}", last.display(), e);
            self.remove_quietly(&last);
        }

        if let Err(e) = self.prune(prefix, max_files) {
            warn!("store: retention for {}: {}", prefix.dir().display(), e);
        }

        Ok(new_path)
    }

    /// Delete the oldest snapshots until at most `max_files` remain.
    /// Zero disables pruning.
    pub fn prune(&self, prefix: &Prefix, max_files: usize) -> Result<usize, StoreError> {
        if max_files == 0 {
            return Ok(0);
        }

        let ids = self.commit_ids(prefix)?;
        let excess = ids.len().saturating_sub(max_files);
        for &id in &ids[..excess] {
            let path = prefix.snapshot(id);
            self.backend
                .remove(&path)
                .map_err(|e| StoreError::io("remove", &path, e))?;
            debug!("store: pruned {}", path.display());
        }
        Ok(excess)
    }

    /// Byte equality of two stored files. Unreadable files compare unequal.
    fn same_content(&self, a: &Path, b: &Path) -> bool {
        match (self.backend.get(a), self.backend.get(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    pub fn file_info(&self, path: &Path) -> Result<FileInfo, StoreError> {
        self.backend
            .file_info(path)
            .map_err(|e| StoreError::io("stat", path, e))
    }

    /// Contents of the latest snapshot.
    pub fn read_last(&self, prefix: &Prefix) -> Result<Vec<u8>, StoreError> {
        let (path, _) = self
            .find_last_config(prefix)?
            .ok_or_else(|| StoreError::NoSnapshot(prefix.with_suffix("")))?;
        self.backend
            .get(&path)
            .map_err(|e| StoreError::io("read", &path, e))
    }

    /// Modification time of the latest snapshot, if any.
    pub fn last_mod_time(&self, prefix: &Prefix) -> Option<DateTime<Utc>> {
        let (path, _) = self.find_last_config(prefix).ok().flatten()?;
        let info = self.backend.file_info(&path).ok()?;
        Some(DateTime::<Utc>::from(info.mod_time))
    }

    fn remove_quietly(&self, path: &Path) {
        if let Err(e) = self.backend.remove(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("store: could not remove {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(text: &'static str) -> impl FnOnce(&mut Vec<u8>) -> io::Result<()> {
        move |buf| {
            buf.extend_from_slice(text.as_bytes());
            Ok(())
        }
    }

    #[test]
    fn test_extract_commit_id() {
        assert_eq!(extract_commit_id("r1.", "r1.0"), Some(0));
        assert_eq!(extract_commit_id("r1.", "r1.42"), Some(42));
        assert_eq!(extract_commit_id("r1.", "r1.last"), None);
        assert_eq!(extract_commit_id("r1.", "r1.tmp"), None);
        assert_eq!(extract_commit_id("r1.", "r1.errlog"), None);
        assert_eq!(extract_commit_id("r1.", "r1.4x2"), None);
        assert_eq!(extract_commit_id("r1.", "r10.3"), None);
        assert_eq!(extract_commit_id("r1.", "r1."), None);
    }

    #[test]
    fn test_save_numbers_snapshots_and_writes_shortcut() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "r1");

        let first = repo.save_new_config(&prefix, 0, write("a"), false, "text/plain").unwrap();
        let second = repo.save_new_config(&prefix, 0, write("b"), false, "text/plain").unwrap();

        assert_eq!(first, prefix.snapshot(0));
        assert_eq!(second, prefix.snapshot(1));
        assert_eq!(fs::read_to_string(prefix.last()).unwrap().trim(), "1");
        assert!(!prefix.tmp().exists());
        assert_eq!(
            extract_commit_id(prefix.base(), second.file_name().unwrap().to_str().unwrap()),
            Some(1)
        );
    }

    #[test]
    fn test_changes_only_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "r1");

        let first = repo.save_new_config(&prefix, 10, write("same"), true, "text/plain").unwrap();
        let second = repo.save_new_config(&prefix, 10, write("same"), true, "text/plain").unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.list_config_sorted(&prefix, false).unwrap().len(), 1);
        assert_eq!(fs::read_to_string(prefix.last()).unwrap().trim(), "0");
        assert!(!prefix.tmp().exists());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "d");

        for text in ["0", "1", "2", "3"] {
            repo.save_new_config(&prefix, 2, write(text), false, "text/plain").unwrap();
        }

        assert_eq!(
            repo.list_config_sorted(&prefix, false).unwrap(),
            vec![prefix.snapshot(2), prefix.snapshot(3)]
        );
        assert_eq!(fs::read_to_string(prefix.last()).unwrap().trim(), "3");
    }

    #[test]
    fn test_zero_max_files_disables_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "d");
        for text in ["0", "1", "2"] {
            repo.save_new_config(&prefix, 0, write(text), false, "text/plain").unwrap();
        }
        assert_eq!(repo.list_config_sorted(&prefix, true).unwrap().len(), 3);
    }

    #[test]
    fn test_tmp_must_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "r1");
        fs::create_dir_all(prefix.dir()).unwrap();
        fs::write(prefix.tmp(), "leftover").unwrap();

        let err = repo
            .save_new_config(&prefix, 0, write("a"), false, "text/plain")
            .unwrap_err();
        assert!(matches!(err, StoreError::TmpExists(_)));
    }

    #[test]
    fn test_writer_failure_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "r1");

        let err = repo
            .save_new_config(
                &prefix,
                0,
                |_: &mut Vec<u8>| Err(io::Error::other("boom")),
                false,
                "text/plain",
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { op: "write", .. }));
        assert!(!prefix.tmp().exists());
        assert!(repo.find_last_config(&prefix).unwrap().is_none());
    }

    #[test]
    fn test_stale_shortcut_falls_back_to_listing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "r1");
        fs::create_dir_all(prefix.dir()).unwrap();
        fs::write(prefix.snapshot(7), "x").unwrap();
        fs::write(prefix.snapshot(12), "y").unwrap();
        fs::write(prefix.last(), "99\n").unwrap();

        let (path, id) = repo.find_last_config(&prefix).unwrap().unwrap();
        assert_eq!(id, 12);
        assert_eq!(path, prefix.snapshot(12));
        assert_eq!(repo.read_last(&prefix).unwrap(), b"y");
        assert!(repo.last_mod_time(&prefix).is_some());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::local();
        let prefix = Prefix::for_device(dir.path(), "ghost");
        assert!(repo.find_last_config(&prefix).unwrap().is_none());
        assert!(matches!(
            repo.read_last(&prefix),
            Err(StoreError::NoSnapshot(_))
        ));
    }
}
