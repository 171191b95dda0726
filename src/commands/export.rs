use anyhow::Result;

use crate::config::RegistryConfig;
use crate::export::Exporter;
use crate::runtime::Runtime;

use super::{open_store, parse_library};

#[tracing::instrument(skip(runtime, config))]
pub fn export<R: Runtime>(runtime: R, library: &str, config: &RegistryConfig) -> Result<()> {
    let identity = parse_library(library)?;
    let store = open_store(runtime, config)?;
    let path = Exporter::new(&store, &config.export_dir, &config.temp_dir).export(&identity)?;
    println!("{}", path.display());
    Ok(())
}
