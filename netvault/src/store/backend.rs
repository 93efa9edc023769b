//! Pluggable filesystem primitives for the repository store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Modification time and size of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub mod_time: SystemTime,
    pub size: u64,
}

/// Storage primitives the repository is built on.
///
/// `put` must publish the whole payload at once; `rename` must be atomic
/// for the repository's publish-by-rename contract to hold.
pub trait Backend: Send + Sync {
    fn get(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn put(&self, path: &Path, data: &[u8], content_type: &str) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Basenames of the entries in `dir`.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn file_info(&self, path: &Path) -> io::Result<FileInfo>;

    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
}

/// Local filesystem backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Backend for LocalFs {
    fn get(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn put(&self, path: &Path, data: &[u8], _content_type: &str) -> io::Result<()> {
        fs::write(path, data)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn file_info(&self, path: &Path) -> io::Result<FileInfo> {
        let meta = fs::metadata(path)?;
        Ok(FileInfo {
            mod_time: meta.modified()?,
            size: meta.len(),
        })
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }
}

/// A repository prefix `P`: snapshots are `P<n>`, plus `Ptmp` and `Plast`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    dir: PathBuf,
    base: String,
}

impl Prefix {
    /// Split `prefix` into its directory and basename prefix.
    pub fn new(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        let text = prefix.to_string_lossy();
        if text.ends_with(std::path::MAIN_SEPARATOR) || text.ends_with('/') {
            return Self {
                dir: prefix.to_path_buf(),
                base: String::new(),
            };
        }
        let dir = prefix
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = prefix
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { dir, base }
    }

    /// Prefix for one device: `<repo>/<id>/<id>.`
    pub fn for_device(repository: &Path, id: &str) -> Self {
        Self {
            dir: repository.join(id),
            base: format!("{}.", id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `P` followed by `suffix`.
    pub fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.base, suffix))
    }

    pub fn snapshot(&self, id: u64) -> PathBuf {
        self.with_suffix(&id.to_string())
    }

    pub fn tmp(&self) -> PathBuf {
        self.with_suffix("tmp")
    }

    pub fn last(&self) -> PathBuf {
        self.with_suffix("last")
    }

    pub fn errlog(&self) -> PathBuf {
        self.with_suffix("errlog")
    }
}
