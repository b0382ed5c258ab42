use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::AllocatedAsset;

/// Directory that receives the images of expired postings.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
}

impl AssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed and delete files left by earlier runs.
    /// Subdirectories are left alone.
    pub fn prepare(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.dir)?;

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn write(&self, asset: &AllocatedAsset, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(asset.file_name());
        fs::write(&path, bytes)?;
        Ok(path)
    }
}
