use anyhow::{Context, Result};
use log::debug;
use std::io::Read;
use std::path::Path;

use crate::config::RegistryConfig;
use crate::import::{ImportSource, Importer};
use crate::runtime::Runtime;

use super::open_store;

/// Import a `.h5p` archive from anywhere on disk.
///
/// The file is read into memory first, so it does not need to live inside
/// the temp directory.
#[tracing::instrument(skip(runtime, config))]
pub fn import<R: Runtime>(runtime: R, file: &Path, config: &RegistryConfig) -> Result<()> {
    let mut bytes = Vec::new();
    runtime
        .open(file)
        .with_context(|| format!("Failed to open {:?}", file))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {:?}", file))?;
    debug!("Read {} bytes from {:?}", bytes.len(), file);

    let store = open_store(runtime, config)?;
    let summary = Importer::new(&store, &config.temp_dir)
        .try_import(&ImportSource::Bytes(bytes))
        .with_context(|| format!("Failed to import {:?}", file))?;

    for folder in &summary.installed {
        println!("Installed {}", folder);
    }
    for folder in &summary.skipped {
        println!("Unchanged {}", folder);
    }
    Ok(())
}
