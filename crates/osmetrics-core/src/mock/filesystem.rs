//! In-memory filesystem for testing local sources without a real `/proc`.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::source::FileSystem;

/// Stores files in memory so tests can simulate `/proc` states on any host.
///
/// Clones share the read log, so a test can keep one copy and hand the other
/// to a source.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, Vec<u8>>,
    reads: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        self.files
            .insert(path.as_ref().to_path_buf(), content.as_ref().to_vec());
    }

    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Every path passed to `read`, in call order, including misses.
    pub fn read_history(&self) -> Vec<PathBuf> {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.read_history().iter().filter(|p| *p == path).count()
    }
}

impl FileSystem for MockFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_basic() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");

        let content = fs.read(Path::new("/proc/loadavg")).unwrap();
        assert_eq!(content, b"0.15 0.10 0.05 1/150 1234\n");
        assert!(fs.read(Path::new("/proc")).is_err());
    }

    #[test]
    fn test_mock_fs_remove() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu 1 2 3 4\n");
        fs.remove_file("/proc/stat");
        let err = fs.read(Path::new("/proc/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mock_fs_read_log_is_shared() {
        let fs = MockFs::linux_host();
        let handed_out = fs.clone();
        handed_out.read(Path::new("/proc/stat")).unwrap();
        handed_out.read(Path::new("/proc/stat")).unwrap();
        let _ = handed_out.read(Path::new("/proc/missing"));

        assert_eq!(fs.read_count("/proc/stat"), 2);
        assert_eq!(fs.read_count("/proc/missing"), 1);
        assert_eq!(fs.read_history().len(), 3);
    }
}
