use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

use crate::error::RegistryError;
use crate::runtime::{Runtime, is_path_under};

/// Mode applied to every extracted directory.
pub const DIR_MODE: u32 = 0o755;
/// Mode applied to every extracted file.
pub const FILE_MODE: u32 = 0o644;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Extractor for uploaded zip packages.
///
/// Every entry is validated before anything is written: an entry whose
/// target leaves `extract_to`, or that is stored as a symbolic link, aborts
/// the whole extraction. After writing, the tree is walked again to reject
/// symlinks and to normalize permissions.
pub struct ZipExtractor;

struct PlannedEntry {
    index: usize,
    target: PathBuf,
    is_dir: bool,
}

impl ZipExtractor {
    #[tracing::instrument(skip(self, runtime))]
    pub fn extract<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting zip archive to {:?}...", extract_to);
        let mut file = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        // zip needs Read + Seek; Runtime::open only gives Read
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
        let mut archive = ZipArchive::new(std::io::Cursor::new(buffer))
            .with_context(|| "Failed to parse ZIP archive")?;

        let plan = Self::plan(&mut archive, extract_to)?;

        for planned in &plan {
            if planned.is_dir {
                runtime.create_dir_all(&planned.target)?;
                continue;
            }
            if let Some(parent) = planned.target.parent() {
                runtime.create_dir_all(parent)?;
            }
            let mut entry = archive
                .by_index(planned.index)
                .with_context(|| format!("Failed to read ZIP entry {}", planned.index))?;
            let mut dest_file = runtime.create_file(&planned.target)?;
            std::io::copy(&mut entry, &mut dest_file)
                .with_context(|| format!("Failed to extract file {:?}", planned.target))?;
        }

        secure_tree(runtime, extract_to)?;

        info!("Extracted {} entries.", plan.len());
        Ok(())
    }

    /// Resolve and check every entry's destination.
    fn plan<T: Read + std::io::Seek>(
        archive: &mut ZipArchive<T>,
        extract_to: &Path,
    ) -> Result<Vec<PlannedEntry>> {
        let mut plan = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .with_context(|| format!("Failed to read ZIP entry {}", index))?;

            // enclosed_name() strips a leading `/`; a rooted name is hostile
            let raw_name = entry.name();
            if raw_name.starts_with(['/', '\\']) || Path::new(raw_name).is_absolute() {
                return Err(RegistryError::PathTraversal(raw_name.to_string()).into());
            }

            let entry_path = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => return Err(RegistryError::PathTraversal(entry.name().to_string()).into()),
            };

            let target = extract_to.join(&entry_path);
            if !is_path_under(&target, extract_to) {
                return Err(RegistryError::PathTraversal(entry.name().to_string()).into());
            }

            if entry
                .unix_mode()
                .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
            {
                return Err(RegistryError::SymlinkRejected(entry_path).into());
            }

            plan.push(PlannedEntry {
                index,
                target,
                is_dir: entry.is_dir(),
            });
        }
        Ok(plan)
    }
}

/// Reject symbolic links anywhere below `root` and normalize permissions:
/// directories become [`DIR_MODE`], files [`FILE_MODE`].
pub fn secure_tree<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<()> {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        runtime.set_permissions(&dir, DIR_MODE)?;
        for entry in runtime.read_dir(&dir)? {
            if runtime.is_symlink(&entry) {
                return Err(RegistryError::SymlinkRejected(entry).into());
            }
            if runtime.is_dir(&entry) {
                pending.push(entry);
            } else {
                runtime.set_permissions(&entry, FILE_MODE)?;
            }
        }
    }
    Ok(())
}
