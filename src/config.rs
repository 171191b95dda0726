use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

const APP_DIR: &str = "h5p-registry";
const LIBRARIES_DIR: &str = "libraries";
const TEMP_DIR: &str = "tmp";
const EXPORT_DIR: &str = "exports";

/// The directories the registry works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Installed libraries, one folder per minor line.
    pub libraries_dir: PathBuf,
    /// Parent of scratch directories, and the only place file uploads may come from.
    pub temp_dir: PathBuf,
    /// Where exported archives are written.
    pub export_dir: PathBuf,
}

impl RegistryConfig {
    /// Lay the three directories out below `base`.
    pub fn from_base(base: &Path) -> Self {
        Self {
            libraries_dir: base.join(LIBRARIES_DIR),
            temp_dir: base.join(TEMP_DIR),
            export_dir: base.join(EXPORT_DIR),
        }
    }

    /// Build a config from optional overrides, filling the gaps from the
    /// default base directory.
    #[tracing::instrument(skip(runtime))]
    pub fn resolve<R: Runtime + ?Sized>(
        runtime: &R,
        libraries_dir: Option<PathBuf>,
        temp_dir: Option<PathBuf>,
        export_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let (Some(libraries_dir), Some(temp_dir), Some(export_dir)) =
            (libraries_dir.clone(), temp_dir.clone(), export_dir.clone())
        {
            return Ok(Self {
                libraries_dir,
                temp_dir,
                export_dir,
            });
        }

        let defaults = Self::from_base(&default_base_dir(runtime)?);
        Ok(Self {
            libraries_dir: libraries_dir.unwrap_or(defaults.libraries_dir),
            temp_dir: temp_dir.unwrap_or(defaults.temp_dir),
            export_dir: export_dir.unwrap_or(defaults.export_dir),
        })
    }

    /// Create every directory that does not exist yet.
    pub fn ensure_dirs<R: Runtime + ?Sized>(&self, runtime: &R) -> Result<()> {
        for dir in [&self.libraries_dir, &self.temp_dir, &self.export_dir] {
            runtime
                .create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        Ok(())
    }
}

/// `<data dir>/h5p-registry`, e.g. `~/.local/share/h5p-registry` on Linux.
#[tracing::instrument(skip(runtime))]
pub fn default_base_dir<R: Runtime + ?Sized>(runtime: &R) -> Result<PathBuf> {
    let base = runtime
        .data_dir()
        .context("Could not find the user data directory")?
        .join(APP_DIR);
    info!("Using registry directory: {}", base.display());
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    #[test]
    fn test_from_base_layout() {
        let config = RegistryConfig::from_base(Path::new("/srv/h5p"));
        assert_eq!(config.libraries_dir, PathBuf::from("/srv/h5p/libraries"));
        assert_eq!(config.temp_dir, PathBuf::from("/srv/h5p/tmp"));
        assert_eq!(config.export_dir, PathBuf::from("/srv/h5p/exports"));
    }

    #[test]
    fn test_resolve_uses_data_dir_for_missing_values() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_data_dir()
            .returning(|| Some(PathBuf::from("/home/user/.local/share")));

        let config =
            RegistryConfig::resolve(&runtime, Some(PathBuf::from("/srv/libs")), None, None).unwrap();

        assert_eq!(config.libraries_dir, PathBuf::from("/srv/libs"));
        assert_eq!(
            config.temp_dir,
            PathBuf::from("/home/user/.local/share/h5p-registry/tmp")
        );
        assert_eq!(
            config.export_dir,
            PathBuf::from("/home/user/.local/share/h5p-registry/exports")
        );
    }

    #[test]
    fn test_resolve_with_every_override_skips_data_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_data_dir().never();

        let config = RegistryConfig::resolve(
            &runtime,
            Some(PathBuf::from("/a")),
            Some(PathBuf::from("/b")),
            Some(PathBuf::from("/c")),
        )
        .unwrap();
        assert_eq!(config.temp_dir, PathBuf::from("/b"));
    }

    #[test]
    fn test_resolve_without_data_dir_fails() {
        let mut runtime = MockRuntime::new();
        runtime.expect_data_dir().returning(|| None);

        let result = RegistryConfig::resolve(&runtime, None, None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_ensure_dirs_creates_all_three() {
        let mut runtime = MockRuntime::new();
        let config = RegistryConfig::from_base(Path::new("/srv/h5p"));

        for dir in ["/srv/h5p/libraries", "/srv/h5p/tmp", "/srv/h5p/exports"] {
            runtime
                .expect_create_dir_all()
                .with(eq(PathBuf::from(dir)))
                .times(1)
                .returning(|_| Ok(()));
        }

        config.ensure_dirs(&runtime).unwrap();
    }
}
