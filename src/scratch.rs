use log::{debug, warn};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::runtime::Runtime;

/// A uniquely named working directory that is removed when dropped.
///
/// Import and export each work in their own scratch directory so concurrent
/// operations never observe each other's half-written state.
pub struct ScratchDir<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ScratchDir<'a, R> {
    /// Create a fresh directory under `parent` named `<prefix><random>`.
    pub fn create(runtime: &'a R, parent: &Path, prefix: &str) -> Result<Self> {
        let path = runtime.create_scratch_dir(parent, prefix)?;
        debug!("Created scratch directory {:?}", path);
        Ok(Self { runtime, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove everything inside the directory but keep the directory itself.
    pub fn clear(&self) -> Result<()> {
        for entry in self.runtime.read_dir(&self.path)? {
            if self.runtime.is_dir(&entry) && !self.runtime.is_symlink(&entry) {
                self.runtime.remove_dir_all(&entry)?;
            } else {
                self.runtime.remove_file(&entry)?;
            }
        }
        Ok(())
    }
}

impl<R: Runtime> Drop for ScratchDir<'_, R> {
    fn drop(&mut self) {
        if !self.runtime.exists(&self.path) {
            return;
        }
        debug!("Cleaning up: {:?}", self.path);
        if let Err(e) = self.runtime.remove_dir_all(&self.path) {
            warn!("Failed to remove scratch directory {:?}: {:#}", self.path, e);
        }
    }
}
