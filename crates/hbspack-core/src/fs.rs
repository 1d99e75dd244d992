//! File system access used by the transform and the CLI.

use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Last modification time of `path`.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Debug, Clone)]
struct MockFile {
    contents: String,
    modified: SystemTime,
}

/// In-memory file system with controllable modification times.
///
/// Files added without an explicit time get one well in the past, so a
/// cache entry stored "now" is fresh until the test moves the time forward
/// with [`MockFileSystem::touch`] or [`MockFileSystem::set_modified`].
#[derive(Debug, Default)]
pub struct MockFileSystem {
    files: RwLock<FxHashMap<PathBuf, MockFile>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let file = MockFile {
            contents: contents.into(),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000),
        };
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), file);
    }

    /// Replaces the contents without changing the modification time.
    pub fn set_contents(&self, path: &Path, contents: impl Into<String>) {
        if let Some(file) = self
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
        {
            file.contents = contents.into();
        }
    }

    pub fn set_modified(&self, path: &Path, modified: SystemTime) {
        if let Some(file) = self
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(path)
        {
            file.modified = modified;
        }
    }

    /// Moves the modification time past the present.
    pub fn touch(&self, path: &Path) {
        self.set_modified(path, SystemTime::now() + Duration::from_secs(3600));
    }

    pub fn remove_file(&self, path: &Path) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )
    }
}

impl FileSystem for MockFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|f| f.contents.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| Self::not_found(path))
    }

    fn write_file(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let file = files.entry(path.to_path_buf()).or_insert_with(|| MockFile {
            contents: String::new(),
            modified: SystemTime::UNIX_EPOCH,
        });
        file.contents = contents.to_string();
        file.modified = SystemTime::now();
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_and_missing() {
        let fs = MockFileSystem::new();
        fs.add_file("/t/a.hbs", "hello");
        assert_eq!(fs.read_file(Path::new("/t/a.hbs")).unwrap(), "hello");
        let err = fs.read_file(Path::new("/t/b.hbs")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(fs.modified(Path::new("/t/b.hbs")).is_err());
    }

    #[test]
    fn test_touch_moves_time_past_now() {
        let fs = MockFileSystem::new();
        let path = Path::new("/t/a.hbs");
        fs.add_file(path, "x");
        assert!(fs.modified(path).unwrap() < SystemTime::now());
        fs.touch(path);
        assert!(fs.modified(path).unwrap() > SystemTime::now());
    }

    #[test]
    fn test_real_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.js");
        let fs = RealFileSystem::new();
        fs.write_file(&path, "export default 1;").unwrap();
        assert!(fs.exists(&path));
        assert_eq!(fs.read_file(&path).unwrap(), "export default 1;");
        assert!(fs.modified(&path).is_ok());
    }
}
