//! Packing a library and everything it needs into one `.h5p` archive.

use anyhow::{Context, Result};
use glob::Pattern;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::archive::ZipPacker;
use crate::dependency::DependencyResolver;
use crate::error::RegistryError;
use crate::identity::Identity;
use crate::library::LibraryStore;
use crate::runtime::Runtime;
use crate::scratch::ScratchDir;

const SCRATCH_PREFIX: &str = "h5p-export-";
pub const ARCHIVE_EXTENSION: &str = "h5p";

pub struct Exporter<'a, R: Runtime> {
    store: &'a LibraryStore<R>,
    export_dir: PathBuf,
    temp_dir: PathBuf,
}

impl<'a, R: Runtime> Exporter<'a, R> {
    pub fn new(
        store: &'a LibraryStore<R>,
        export_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            export_dir: export_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Archive `identity` together with every installed library in its
    /// dependency closure and return the path of the written archive.
    ///
    /// Dependencies that are not installed are left out silently. The
    /// archive is named `<machineName>-<major>.<minor>.<patch>.h5p` after the
    /// installed version, and older archives with that name are replaced.
    #[tracing::instrument(skip(self))]
    pub fn export(&self, identity: &Identity) -> Result<PathBuf> {
        let runtime = self.store.runtime();
        let target = self
            .store
            .get(identity)
            .ok_or_else(|| RegistryError::LibraryNotInstalled(identity.to_string()))?;
        let target_identity = target.identity();

        let scratch = ScratchDir::create(runtime, &self.temp_dir, SCRATCH_PREFIX)?;

        let closure = DependencyResolver::new(self.store).transitive_closure(&target_identity);
        let mut shipped = 0usize;
        for entry in &closure {
            let Some(folder) = Identity::parse(entry)
                .ok()
                .and_then(|id| self.store.folder_path_exact(&id))
            else {
                debug!("{} is not installed, leaving it out", entry);
                continue;
            };
            let folder_name = folder
                .file_name()
                .with_context(|| format!("Invalid library folder {:?}", folder))?;
            copy_tree(runtime, &folder, &scratch.path().join(folder_name))?;
            shipped += 1;
        }

        let stem = format!(
            "{}-{}",
            target.manifest.machine_name,
            target.manifest.version()
        );
        self.remove_previous_exports(&stem)?;

        let archive_path = self
            .export_dir
            .join(format!("{}.{}", stem, ARCHIVE_EXTENSION));
        ZipPacker.pack(runtime, scratch.path(), &archive_path)?;
        scratch.clear()?;

        info!(
            "Exported {} with {} librar(ies) to {:?}",
            target_identity, shipped, archive_path
        );
        Ok(archive_path)
    }

    /// Delete files in the export directory named `<stem>.<anything>`.
    fn remove_previous_exports(&self, stem: &str) -> Result<()> {
        let runtime = self.store.runtime();
        if !runtime.is_dir(&self.export_dir) {
            return Ok(());
        }
        let pattern = Pattern::new(&format!("{}.*", Pattern::escape(stem)))
            .context("Invalid export file pattern")?;
        for path in runtime.read_dir(&self.export_dir)? {
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pattern.matches(name));
            if matches && !runtime.is_dir(&path) {
                debug!("Removing previous export {:?}", path);
                runtime
                    .remove_file(&path)
                    .with_context(|| format!("Failed to remove {:?}", path))?;
            }
        }
        Ok(())
    }
}

/// Copy `from` into `to` recursively. Symbolic links are refused.
fn copy_tree<R: Runtime + ?Sized>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((source, target)) = pending.pop() {
        runtime.create_dir_all(&target)?;
        for entry in runtime.read_dir(&source)? {
            if runtime.is_symlink(&entry) {
                return Err(RegistryError::SymlinkRejected(entry).into());
            }
            let Some(name) = entry.file_name() else {
                continue;
            };
            let destination = target.join(name);
            if runtime.is_dir(&entry) {
                pending.push((entry, destination));
            } else {
                runtime
                    .copy(&entry, &destination)
                    .with_context(|| format!("Failed to copy {:?}", entry))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{install_library, library_json};
    use std::fs::{self, File};
    use tempfile::{TempDir, tempdir};
    use zip::ZipArchive;

    struct Fixture {
        root: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fx = Self {
                root: tempdir().unwrap(),
            };
            fs::create_dir_all(fx.libraries()).unwrap();
            fx
        }

        fn libraries(&self) -> PathBuf {
            self.root.path().join("libraries")
        }

        fn exports(&self) -> PathBuf {
            self.root.path().join("exports")
        }

        fn temp(&self) -> PathBuf {
            self.root.path().join("tmp")
        }

        fn store(&self) -> LibraryStore<RealRuntime> {
            LibraryStore::open(RealRuntime, self.libraries()).unwrap()
        }
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    fn id(text: &str) -> Identity {
        Identity::parse(text).unwrap()
    }

    #[test]
    fn test_export_ships_installed_closure() {
        let fx = Fixture::new();
        let column = install_library(
            &fx.libraries(),
            &library_json("H5P.Column", 1, 13, 4, 1, &[("H5P.Text", 1, 1)]),
        );
        fs::create_dir_all(column.join("scripts")).unwrap();
        fs::write(column.join("scripts/column.js"), "var c;").unwrap();
        install_library(&fx.libraries(), &library_json("H5P.Text", 1, 1, 2, 0, &[]));
        install_library(&fx.libraries(), &library_json("H5P.Unrelated", 1, 0, 0, 0, &[]));

        let store = fx.store();
        let path = Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Column 1.13"))
            .unwrap();

        assert_eq!(path, fx.exports().join("H5P.Column-1.13.4.h5p"));
        assert_eq!(
            entry_names(&path),
            vec![
                "H5P.Column-1.13/",
                "H5P.Column-1.13/library.json",
                "H5P.Column-1.13/scripts/",
                "H5P.Column-1.13/scripts/column.js",
                "H5P.Text-1.1/",
                "H5P.Text-1.1/library.json",
            ]
        );
    }

    #[test]
    fn test_missing_dependency_is_left_out() {
        let fx = Fixture::new();
        install_library(
            &fx.libraries(),
            &library_json("H5P.Column", 1, 13, 0, 1, &[("H5P.Missing", 9, 9)]),
        );

        let store = fx.store();
        let path = Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Column 1.13"))
            .unwrap();
        assert_eq!(
            entry_names(&path),
            vec!["H5P.Column-1.13/", "H5P.Column-1.13/library.json"]
        );
    }

    #[test]
    fn test_previous_export_is_replaced() {
        let fx = Fixture::new();
        install_library(&fx.libraries(), &library_json("H5P.Text", 1, 1, 2, 0, &[]));
        fs::create_dir_all(fx.exports()).unwrap();
        fs::write(fx.exports().join("H5P.Text-1.1.2.zip"), "stale").unwrap();
        fs::write(fx.exports().join("H5P.Text-1.1.2.h5p"), "stale").unwrap();
        fs::write(fx.exports().join("H5P.Text-1.1.20.h5p"), "other").unwrap();

        let store = fx.store();
        Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Text 1.1"))
            .unwrap();

        let mut names: Vec<String> = fs::read_dir(fx.exports())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["H5P.Text-1.1.2.h5p", "H5P.Text-1.1.20.h5p"]);
        assert_eq!(
            entry_names(&fx.exports().join("H5P.Text-1.1.2.h5p")),
            vec!["H5P.Text-1.1/", "H5P.Text-1.1/library.json"]
        );
    }

    #[test]
    fn test_export_leaves_no_scratch_behind() {
        let fx = Fixture::new();
        install_library(&fx.libraries(), &library_json("H5P.Text", 1, 1, 0, 0, &[]));

        let store = fx.store();
        Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Text 1.1"))
            .unwrap();
        assert!(fs::read_dir(fx.temp()).unwrap().next().is_none());
    }

    #[test]
    fn test_export_unknown_library_fails() {
        let fx = Fixture::new();
        let store = fx.store();
        let err = Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Gone 1.0"))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegistryError>(),
            Some(&RegistryError::LibraryNotInstalled("H5P.Gone 1.0".to_string()))
        );
        assert!(!fx.exports().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_library_aborts_export() {
        let fx = Fixture::new();
        let text = install_library(&fx.libraries(), &library_json("H5P.Text", 1, 1, 0, 0, &[]));
        std::os::unix::fs::symlink("/etc/passwd", text.join("passwd")).unwrap();

        let store = fx.store();
        let err = Exporter::new(&store, fx.exports(), fx.temp())
            .export(&id("H5P.Text 1.1"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::SymlinkRejected(_))
        ));
    }
}
