use anyhow::Result;
use log::debug;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::runtime::Runtime;

use super::{open_store, parse_library};

/// Remove an installed minor line.
#[tracing::instrument(skip(runtime, config))]
pub fn remove<R: Runtime>(runtime: R, library: &str, config: &RegistryConfig) -> Result<()> {
    let identity = parse_library(library)?;
    if !identity.has_minor_line() {
        return Err(RegistryError::MalformedIdentity(library.to_string()).into());
    }
    let store = open_store(runtime, config)?;
    debug!("Using libraries dir: {:?}", store.libraries_dir());

    if !store.remove(&identity)? {
        return Err(RegistryError::LibraryNotInstalled(identity.to_string()).into());
    }
    println!("Removed {}", identity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use crate::test_utils::{install_library, library_json};
    use tempfile::tempdir;

    #[test]
    fn test_remove_installed_library() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::from_base(dir.path());
        let path = install_library(
            &config.libraries_dir,
            &library_json("H5P.Text", 1, 1, 0, 0, &[]),
        );

        remove(RealRuntime, "H5P.Text 1.1", &config).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_only_touches_requested_line() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::from_base(dir.path());
        let old = install_library(
            &config.libraries_dir,
            &library_json("H5P.Text", 1, 0, 0, 0, &[]),
        );
        let new = install_library(
            &config.libraries_dir,
            &library_json("H5P.Text", 1, 1, 0, 0, &[]),
        );

        remove(RealRuntime, "H5P.Text 1.0", &config).unwrap();
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn test_remove_missing_library_fails() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::from_base(dir.path());
        let err = remove(RealRuntime, "H5P.Text 1.1", &config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegistryError>(),
            Some(&RegistryError::LibraryNotInstalled("H5P.Text 1.1".to_string()))
        );
    }

    #[test]
    fn test_remove_requires_minor_line() {
        let dir = tempdir().unwrap();
        let config = RegistryConfig::from_base(dir.path());
        let err = remove(RealRuntime, "H5P.Text", &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::MalformedIdentity(_))
        ));
    }
}
