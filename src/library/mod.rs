//! Installed libraries
//!
//! This module provides the on-disk library layout: manifests, configuration
//! documents, directory discovery and the [`LibraryStore`] snapshot.

mod discovery;
mod manifest;
pub mod semantics;
mod store;

pub use discovery::find_library_dirs;
pub use manifest::{Dependency, LibraryManifest, MANIFEST_FILE};
pub use semantics::{SEMANTICS_FILE, optional_dependencies};
pub use store::{ICON_FILE, InstalledLibrary, LibraryStore, ListFilter};
