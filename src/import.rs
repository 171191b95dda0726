//! Importing uploaded library archives into the store.
//!
//! An import runs in its own scratch directory under the temp root:
//! the archive is materialized there, extracted with [`ZipExtractor`], and
//! every top-level library folder is then moved into `libraries_dir`.
//! The scratch directory is removed whether the import succeeds or not.
//!
//! Merges are not atomic across libraries: if a later library fails to
//! move, the ones already moved stay installed.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::archive::ZipExtractor;
use crate::error::RegistryError;
use crate::identity::{compare_versions, is_newer_patch};
use crate::library::{InstalledLibrary, LibraryManifest, LibraryStore, MANIFEST_FILE};
use crate::runtime::{Runtime, is_path_under};
use crate::scratch::ScratchDir;

const SCRATCH_PREFIX: &str = "h5p-import-";
const ARCHIVE_NAME: &str = "upload.h5p";
const CONTENT_DIR: &str = "content";

/// Where the archive to import comes from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Raw archive bytes, e.g. an upload body.
    Bytes(Vec<u8>),
    /// A file that must live inside the importer's temp root.
    File(PathBuf),
}

/// Folder names handled by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Folders moved into the libraries directory.
    pub installed: Vec<String>,
    /// Folders whose exact version was already installed.
    pub skipped: Vec<String>,
}

pub struct Importer<'a, R: Runtime> {
    store: &'a LibraryStore<R>,
    temp_dir: PathBuf,
}

impl<'a, R: Runtime> Importer<'a, R> {
    /// `temp_dir` is both the parent of scratch directories and the only
    /// place an [`ImportSource::File`] may come from.
    pub fn new(store: &'a LibraryStore<R>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            temp_dir: temp_dir.into(),
        }
    }

    /// Import `source`, returning `true` only if every step succeeded.
    ///
    /// The store's snapshot is not refreshed; call
    /// [`LibraryStore::reload`] to observe the new libraries.
    pub fn import(&self, source: &ImportSource) -> bool {
        match self.try_import(source) {
            Ok(summary) => {
                info!(
                    "Import finished: {} installed, {} already present",
                    summary.installed.len(),
                    summary.skipped.len()
                );
                true
            }
            Err(e) => {
                warn!("Import failed: {:#}", e);
                false
            }
        }
    }

    #[tracing::instrument(skip(self, source))]
    pub fn try_import(&self, source: &ImportSource) -> Result<ImportSummary> {
        let runtime = self.store.runtime();
        let scratch = ScratchDir::create(runtime, &self.temp_dir, SCRATCH_PREFIX)?;

        let archive_path = scratch.path().join(ARCHIVE_NAME);
        self.materialize(source, &archive_path)?;

        let content_dir = scratch.path().join(CONTENT_DIR);
        runtime.create_dir_all(&content_dir)?;
        ZipExtractor.extract(runtime, &archive_path, &content_dir)?;

        let extracted = self.extracted_libraries(&content_dir)?;
        if extracted.is_empty() {
            warn!("Archive contains no library folders");
        }
        let installed = self.store.scan()?;

        let mut summary = ImportSummary::default();
        for library in &extracted {
            self.merge(library, &installed, &mut summary)?;
        }
        Ok(summary)
    }

    fn materialize(&self, source: &ImportSource, archive_path: &Path) -> Result<()> {
        let runtime = self.store.runtime();
        match source {
            ImportSource::Bytes(bytes) => {
                debug!("Writing {} byte upload to {:?}", bytes.len(), archive_path);
                runtime.write(archive_path, bytes)
            }
            ImportSource::File(path) => {
                let resolved = self.validate_source_file(path)?;
                debug!("Copying {:?} to {:?}", resolved, archive_path);
                // Read through the handle that was checked, not the path again
                let mut reader = runtime.open_regular_file(&resolved)?;
                let mut writer = runtime.create_file(archive_path)?;
                std::io::copy(&mut reader, &mut writer)
                    .with_context(|| format!("Failed to copy {:?}", resolved))?;
                Ok(())
            }
        }
    }

    /// Resolve `path` and make sure it is a regular file inside the temp root.
    fn validate_source_file(&self, path: &Path) -> Result<PathBuf> {
        let runtime = self.store.runtime();
        if runtime.is_symlink(path) {
            return Err(RegistryError::SymlinkRejected(path.to_path_buf()).into());
        }
        let resolved = runtime
            .canonicalize(path)
            .with_context(|| format!("Failed to resolve {:?}", path))?;
        let allowed = runtime
            .canonicalize(&self.temp_dir)
            .with_context(|| format!("Failed to resolve {:?}", self.temp_dir))?;
        if !is_path_under(&resolved, &allowed) {
            return Err(RegistryError::SourceOutsideTempDir(path.to_path_buf()).into());
        }
        if !runtime.is_file(&resolved) {
            return Err(RegistryError::NotARegularFile(path.to_path_buf()).into());
        }
        Ok(resolved)
    }

    /// Every top-level folder with a manifest, in name order. Folders without
    /// a manifest (content, media) are ignored; a manifest that fails to parse
    /// or names another library fails the import.
    fn extracted_libraries(&self, content_dir: &Path) -> Result<Vec<InstalledLibrary>> {
        let runtime = self.store.runtime();
        let mut entries = runtime.read_dir(content_dir)?;
        entries.sort();

        let mut libraries = Vec::new();
        for path in entries {
            let manifest_path = path.join(MANIFEST_FILE);
            if !runtime.is_dir(&path) || !runtime.is_file(&manifest_path) {
                debug!("Ignoring {:?}: not a library folder", path);
                continue;
            }
            let folder_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("Invalid folder name {:?}", path))?
                .to_string();
            let manifest = LibraryManifest::load(runtime, &manifest_path)
                .with_context(|| format!("Invalid manifest in uploaded folder {}", folder_name))?;
            if !manifest.matches_dir_name(&folder_name) {
                return Err(RegistryError::DirectoryMismatch {
                    dir: folder_name,
                    identity: manifest.identity().to_string(),
                }
                .into());
            }
            libraries.push(InstalledLibrary {
                manifest,
                folder_name,
                path,
            });
        }
        Ok(libraries)
    }

    fn merge(
        &self,
        library: &InstalledLibrary,
        installed: &[InstalledLibrary],
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let runtime = self.store.runtime();
        let identity = library.identity();
        let version = library.manifest.version();

        let same_line: Vec<&InstalledLibrary> = installed
            .iter()
            .filter(|i| i.identity().same_minor_line(&identity))
            .collect();

        if same_line
            .iter()
            .any(|i| compare_versions(&i.manifest.version(), &version) == Ordering::Equal)
        {
            info!("{} is already installed, skipping", identity);
            summary.skipped.push(library.folder_name.clone());
            return Ok(());
        }

        for existing in &same_line {
            let existing_version = existing.manifest.version();
            if is_newer_patch(&existing_version, &version) {
                debug!("Removing older patch {:?}", existing.path);
                runtime
                    .remove_dir_all(&existing.path)
                    .with_context(|| format!("Failed to remove {:?}", existing.path))?;
            } else {
                warn!(
                    "Installed {} {} is newer than the imported {}; installing the imported copy",
                    existing.manifest.machine_name, existing_version, identity
                );
            }
        }

        let libraries_dir = self.store.libraries_dir();
        let destination = libraries_dir.join(&library.folder_name);
        if runtime.is_symlink(&destination) {
            runtime.remove_file(&destination)?;
        } else if runtime.exists(&destination) {
            debug!("Clearing destination {:?}", destination);
            runtime
                .remove_dir_all(&destination)
                .with_context(|| format!("Failed to clear {:?}", destination))?;
        }

        runtime.create_dir_all(libraries_dir)?;
        runtime
            .rename(&library.path, &destination)
            .with_context(|| format!("Failed to move {:?} to {:?}", library.path, destination))?;
        info!("Installed {} into {:?}", identity, destination);
        summary.installed.push(library.folder_name.clone());
        Ok(())
    }
}
