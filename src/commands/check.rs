use anyhow::{Result, bail};

use crate::config::RegistryConfig;
use crate::dependency::{DependencyResolver, Finding, Severity};
use crate::error::RegistryError;
use crate::runtime::Runtime;

use super::{open_store, parse_library};

/// Report conflicts, missing and outdated dependencies of a library.
///
/// Fails when any finding has [`Severity::Error`].
#[tracing::instrument(skip(runtime, config))]
pub fn check<R: Runtime>(
    runtime: R,
    library: &str,
    json: bool,
    config: &RegistryConfig,
) -> Result<()> {
    let findings = findings(runtime, library, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
    } else if findings.is_empty() {
        println!("{}: no problems found", library);
    } else {
        for finding in &findings {
            println!("{}", finding);
        }
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .count();
    if errors > 0 {
        bail!("{} has {} dependency error(s)", library, errors);
    }
    Ok(())
}

fn findings<R: Runtime>(runtime: R, library: &str, config: &RegistryConfig) -> Result<Vec<Finding>> {
    let identity = parse_library(library)?;
    let store = open_store(runtime, config)?;
    if store.get(&identity).is_none() {
        return Err(RegistryError::LibraryNotInstalled(identity.to_string()).into());
    }
    Ok(DependencyResolver::new(&store).check(&identity))
}
