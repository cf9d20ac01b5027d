//! Filesystem access for local sources.
//!
//! The `FileSystem` trait lets a local source read the real `/proc` on Linux
//! or an in-memory [`MockFs`](crate::mock::MockFs) in tests and on macOS CI.
//! Reads are blocking; [`LocalTransport`](super::LocalTransport) moves them
//! onto the blocking pool so the fetch timeout can cut them short.

use std::io;
use std::path::Path;

pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}
