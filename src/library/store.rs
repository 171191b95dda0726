//! Library store: the refreshable view of every installed library.
//!
//! The store holds a snapshot of manifests read from `libraries_dir`. The
//! snapshot changes only on [`LibraryStore::reload`]; callers that mutate the
//! directory (import, removal) must reload to observe the result.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::RegistryError;
use crate::identity::Identity;
use crate::runtime::{Runtime, is_path_under};

use super::discovery::find_library_dirs;
use super::manifest::{LibraryManifest, MANIFEST_FILE};
use super::semantics::SEMANTICS_FILE;

/// File name of a library's icon.
pub const ICON_FILE: &str = "icon.svg";

/// A library directory together with its parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledLibrary {
    pub manifest: LibraryManifest,
    pub folder_name: String,
    pub path: PathBuf,
}

impl InstalledLibrary {
    pub fn identity(&self) -> Identity {
        self.manifest.identity()
    }
}

/// Filter for [`LibraryStore::list_identities`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub runnable_only: bool,
    pub machine_name: Option<String>,
}

pub struct LibraryStore<R: Runtime> {
    runtime: R,
    libraries_dir: PathBuf,
    libraries: Vec<InstalledLibrary>,
}

impl<R: Runtime> LibraryStore<R> {
    /// Create a store with an empty snapshot. Call [`reload`](Self::reload) to populate it.
    pub fn new(runtime: R, libraries_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            libraries_dir: libraries_dir.into(),
            libraries: Vec::new(),
        }
    }

    /// Create a store and load its first snapshot.
    pub fn open(runtime: R, libraries_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(runtime, libraries_dir);
        store.reload()?;
        Ok(store)
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn libraries_dir(&self) -> &Path {
        &self.libraries_dir
    }

    /// The current snapshot, in directory-scan order.
    pub fn libraries(&self) -> &[InstalledLibrary] {
        &self.libraries
    }

    /// Replace the snapshot with a fresh scan of `libraries_dir`.
    #[tracing::instrument(skip(self))]
    pub fn reload(&mut self) -> Result<()> {
        self.libraries = self.scan()?;
        debug!(
            "Loaded {} librar(ies) from {:?}",
            self.libraries.len(),
            self.libraries_dir
        );
        Ok(())
    }

    /// Read every library under `libraries_dir` without touching the snapshot.
    ///
    /// A directory whose manifest cannot be read, cannot be parsed, or does
    /// not match the directory name is skipped with a warning; only failing
    /// to list `libraries_dir` itself is an error.
    pub fn scan(&self) -> Result<Vec<InstalledLibrary>> {
        let dirs = find_library_dirs(&self.runtime, &self.libraries_dir)
            .with_context(|| format!("Failed to scan libraries in {:?}", self.libraries_dir))?;

        let mut libraries = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match self.load_dir(&dir) {
                Ok(library) => libraries.push(library),
                Err(e) => warn!("Skipping library directory {:?}: {:#}", dir, e),
            }
        }
        Ok(libraries)
    }

    fn load_dir(&self, dir: &Path) -> Result<InstalledLibrary> {
        let folder_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid library directory name {:?}", dir))?
            .to_string();
        let manifest = LibraryManifest::load(&self.runtime, &dir.join(MANIFEST_FILE))?;
        if !manifest.matches_dir_name(&folder_name) {
            return Err(RegistryError::DirectoryMismatch {
                dir: folder_name,
                identity: manifest.identity().to_string(),
            }
            .into());
        }
        Ok(InstalledLibrary {
            manifest,
            folder_name,
            path: dir.to_path_buf(),
        })
    }

    /// Exact minor-line match. If more than one directory holds the same line,
    /// the highest patch wins.
    pub fn find_exact(&self, machine_name: &str, major: u32, minor: u32) -> Option<&InstalledLibrary> {
        self.libraries
            .iter()
            .filter(|l| {
                l.manifest.machine_name == machine_name
                    && l.manifest.major_version == major
                    && l.manifest.minor_version == minor
            })
            .max_by_key(|l| l.manifest.patch_version)
    }

    /// Highest installed `major.minor.patch` for a machine name.
    pub fn find_latest(&self, machine_name: &str) -> Option<&InstalledLibrary> {
        self.libraries
            .iter()
            .filter(|l| l.manifest.machine_name == machine_name)
            .max_by_key(|l| {
                (
                    l.manifest.major_version,
                    l.manifest.minor_version,
                    l.manifest.patch_version,
                )
            })
    }

    /// Highest installed minor line within one major version.
    pub fn find_latest_in_major(&self, machine_name: &str, major: u32) -> Option<&InstalledLibrary> {
        self.libraries
            .iter()
            .filter(|l| l.manifest.machine_name == machine_name && l.manifest.major_version == major)
            .max_by_key(|l| (l.manifest.minor_version, l.manifest.patch_version))
    }

    /// Resolve an identity as far as its version goes: exact minor line,
    /// latest within the major, or latest overall for a bare machine name.
    /// The patch component is ignored.
    pub fn get(&self, identity: &Identity) -> Option<&InstalledLibrary> {
        match (identity.major, identity.minor) {
            (Some(major), Some(minor)) => self.find_exact(&identity.machine_name, major, minor),
            (Some(major), None) => self.find_latest_in_major(&identity.machine_name, major),
            (None, _) => self.find_latest(&identity.machine_name),
        }
    }

    pub fn is_installed(&self, identity: &Identity) -> bool {
        match (identity.major, identity.minor) {
            (Some(major), Some(minor)) => self
                .find_exact(&identity.machine_name, major, minor)
                .is_some(),
            _ => false,
        }
    }

    /// Formatted identities (`"machineName major.minor.patch"`) in scan order.
    pub fn list_identities(&self, filter: &ListFilter) -> Vec<String> {
        self.libraries
            .iter()
            .filter(|l| !filter.runnable_only || l.manifest.is_runnable())
            .filter(|l| {
                filter
                    .machine_name
                    .as_deref()
                    .is_none_or(|name| l.manifest.machine_name == name)
            })
            .map(|l| l.identity().to_string())
            .collect()
    }

    /// Folder of the latest installed library with this machine name.
    ///
    /// The requested major.minor (and patch) are not used for the lookup, so
    /// asking for an older minor line returns the newest one. Use
    /// [`folder_path_exact`](Self::folder_path_exact) for a strict lookup.
    pub fn folder_path_for(&self, identity: &Identity) -> Option<PathBuf> {
        let latest = self.find_latest(&identity.machine_name)?;
        if identity.has_minor_line() && !identity.same_minor_line(&latest.identity()) {
            warn!(
                "Requested {} but resolving to latest installed {}",
                identity,
                latest.identity()
            );
        }
        Some(latest.path.clone())
    }

    /// Folder of the exact minor line, or `None` if that line is not installed.
    pub fn folder_path_exact(&self, identity: &Identity) -> Option<PathBuf> {
        let (major, minor) = (identity.major?, identity.minor?);
        self.find_exact(&identity.machine_name, major, minor)
            .map(|l| l.path.clone())
    }

    pub fn icon_available(&self, identity: &Identity) -> bool {
        self.get(identity)
            .is_some_and(|l| self.runtime.is_file(&l.path.join(ICON_FILE)))
    }

    /// URL of the library icon below `base_url`, if the icon exists.
    pub fn icon_url_for(&self, identity: &Identity, base_url: &str) -> Option<String> {
        let library = self.get(identity)?;
        if !self.runtime.is_file(&library.path.join(ICON_FILE)) {
            return None;
        }
        Some(format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            library.folder_name,
            ICON_FILE
        ))
    }

    /// Modification time of a file inside a library directory.
    ///
    /// Returns `Ok(None)` when the library or the file does not exist, or
    /// when `file` points outside the library directory.
    pub fn file_modification_date(
        &self,
        identity: &Identity,
        file: &Path,
    ) -> Result<Option<SystemTime>> {
        let Some(library) = self.get(identity) else {
            return Ok(None);
        };
        let path = library.path.join(file);
        if !is_path_under(&path, &library.path) || !self.runtime.exists(&path) {
            return Ok(None);
        }
        self.runtime.modified(&path).map(Some)
    }

    /// Parsed `semantics.json` of a library.
    ///
    /// `Ok(None)` if the library is not installed or has no semantics; a file
    /// that exists but is not valid JSON is an error.
    pub fn load_semantics(&self, identity: &Identity) -> Result<Option<Value>> {
        let Some(library) = self.get(identity) else {
            return Ok(None);
        };
        let path = library.path.join(SEMANTICS_FILE);
        if !self.runtime.exists(&path) {
            return Ok(None);
        }
        let content = self.runtime.read_to_string(&path)?;
        let semantics = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse semantics {:?}", path))?;
        Ok(Some(semantics))
    }

    /// Delete the directory of an installed minor line.
    ///
    /// Returns `Ok(false)` if nothing matched. The snapshot is not refreshed.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, identity: &Identity) -> Result<bool> {
        let Some(path) = self.folder_path_exact(identity) else {
            debug!("{} is not installed, nothing to remove", identity);
            return Ok(false);
        };
        debug!("Removing library directory {:?}", path);
        self.runtime
            .remove_dir_all(&path)
            .with_context(|| format!("Failed to remove {:?}", path))?;
        Ok(true)
    }
}
