//! Zip archive handling for package upload and download.
//!
//! - `extract` - hardened extraction (path traversal and symlink rejection,
//!   permission normalization)
//! - `pack` - directory tree to zip archive

mod extract;
mod pack;

pub use extract::{DIR_MODE, FILE_MODE, ZipExtractor, secure_tree};
pub use pack::ZipPacker;
