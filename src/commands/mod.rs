//! Entry points behind the command line subcommands.
//!
//! Each command opens the store from a [`RegistryConfig`], does its work
//! through the library API and prints a short report on stdout.

use anyhow::Result;

use crate::config::RegistryConfig;
use crate::identity::Identity;
use crate::library::LibraryStore;
use crate::runtime::Runtime;

mod check;
mod deps;
mod export;
mod import;
mod remove;

pub use check::check;
pub use deps::deps;
pub use export::export;
pub use import::import;
pub use remove::remove;

fn open_store<R: Runtime>(runtime: R, config: &RegistryConfig) -> Result<LibraryStore<R>> {
    config.ensure_dirs(&runtime)?;
    LibraryStore::open(runtime, &config.libraries_dir)
}

fn parse_library(library: &str) -> Result<Identity> {
    Ok(library.parse::<Identity>()?)
}
