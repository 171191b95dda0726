use anyhow::Result;
use std::collections::BTreeSet;

use crate::config::RegistryConfig;
use crate::dependency::{DependencyKind, DependencyResolver};
use crate::runtime::Runtime;

use super::{open_store, parse_library};

/// Print the direct dependencies of a library, or its whole closure.
#[tracing::instrument(skip(runtime, config))]
pub fn deps<R: Runtime>(
    runtime: R,
    library: &str,
    kind: DependencyKind,
    transitive: bool,
    config: &RegistryConfig,
) -> Result<()> {
    for line in dependency_lines(runtime, library, kind, transitive, config)? {
        println!("{}", line);
    }
    Ok(())
}

fn dependency_lines<R: Runtime>(
    runtime: R,
    library: &str,
    kind: DependencyKind,
    transitive: bool,
    config: &RegistryConfig,
) -> Result<BTreeSet<String>> {
    let identity = parse_library(library)?;
    let store = open_store(runtime, config)?;
    let resolver = DependencyResolver::new(&store);
    Ok(if transitive {
        resolver.transitive_closure(&identity)
    } else {
        resolver.direct_dependencies(&identity, kind)
    })
}
