use std::path::PathBuf;
use thiserror::Error;

/// Failures a caller needs to tell apart from plain I/O errors.
///
/// They travel inside `anyhow::Error`; use `downcast_ref::<RegistryError>()`
/// to recover them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Malformed library identity {0:?}")]
    MalformedIdentity(String),

    #[error("Archive entry {0:?} escapes the extraction directory")]
    PathTraversal(String),

    #[error("Symbolic link rejected: {0:?}")]
    SymlinkRejected(PathBuf),

    #[error("Source file {0:?} is not inside the permitted temporary directory")]
    SourceOutsideTempDir(PathBuf),

    #[error("Source {0:?} is not a regular file")]
    NotARegularFile(PathBuf),

    #[error("Directory {dir:?} does not match library {identity}")]
    DirectoryMismatch { dir: String, identity: String },

    #[error("Library {0} is not installed")]
    LibraryNotInstalled(String),
}
