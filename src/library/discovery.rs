use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

use super::manifest::MANIFEST_FILE;

/// Find all library directories by scanning for library.json files
///
/// Directory structure: `<root>/<machineName-major.minor>/library.json`.
/// Results follow directory-scan order.
#[tracing::instrument(skip(runtime, root))]
pub fn find_library_dirs<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Vec<PathBuf>> {
    let mut library_dirs = Vec::new();

    if !runtime.exists(root) {
        return Ok(library_dirs);
    }

    for entry in runtime.read_dir(root)? {
        if runtime.is_dir(&entry) && runtime.exists(&entry.join(MANIFEST_FILE)) {
            library_dirs.push(entry);
        }
    }

    Ok(library_dirs)
}
