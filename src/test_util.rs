//! Scratch directories for tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Directory under the system temp dir, removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh directory named `iris-serve-<prefix>-<random>`.
    pub fn new(prefix: &str) -> io::Result<Self> {
        let suffix: u64 = rand::thread_rng().gen();
        let path = std::env::temp_dir().join(format!("iris-serve-{prefix}-{suffix:016x}"));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Location of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
