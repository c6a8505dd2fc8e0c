//! Temporary file allocation
//!
//! Archive-resident files are materialized here before anything opens them,
//! and rewrites build the replacement archive here before it is moved into
//! place. Names are unique per allocation so operations on different archives
//! never collide. Nothing here deletes them; that is left to the caller and
//! the OS temp cleaner.

use crate::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the system temp directory
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Create an empty, uniquely named file and return its path.
    ///
    /// The extension is kept so format detection that depends on it (TAR)
    /// still works on the materialized copy.
    pub fn allocate(&self, prefix: &str, extension: Option<&str>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let suffix = extension.map(|e| format!(".{}", e)).unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        tracing::debug!("Allocated temp file {}", path.display());
        Ok(path)
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::system()
    }
}
