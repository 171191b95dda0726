use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::identity::{Identity, compare_versions};
use crate::library::{LibraryStore, optional_dependencies};
use crate::runtime::Runtime;

use super::report::{
    Conflict, Finding, FindingKind, MissingDependencies, OutdatedDependency,
};

/// Which direct dependencies to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Declared in `library.json`, plus the library's own minor line.
    Mandatory,
    /// Named in `options` lists of `semantics.json`.
    Optional,
    All,
}

/// Dependency queries against a [`LibraryStore`] snapshot.
///
/// All results are minor-line strings (`"machineName major.minor"`); patch
/// never takes part in dependency matching.
pub struct DependencyResolver<'a, R: Runtime> {
    store: &'a LibraryStore<R>,
}

impl<'a, R: Runtime> DependencyResolver<'a, R> {
    pub fn new(store: &'a LibraryStore<R>) -> Self {
        Self { store }
    }

    /// Direct dependencies of `identity`. Empty if it is not installed.
    pub fn direct_dependencies(&self, identity: &Identity, kind: DependencyKind) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let Some(library) = self.store.get(identity) else {
            debug!("{} is not installed, no dependencies", identity);
            return result;
        };

        if matches!(kind, DependencyKind::Mandatory | DependencyKind::All) {
            result.insert(library.manifest.minor_line());
            result.extend(library.manifest.dependencies().map(|d| d.minor_line()));
        }

        if matches!(kind, DependencyKind::Optional | DependencyKind::All) {
            match self.store.load_semantics(identity) {
                Ok(Some(semantics)) => result.extend(optional_dependencies(&semantics)),
                Ok(None) => {}
                Err(e) => warn!("Ignoring semantics of {}: {:#}", identity, e),
            }
        }

        result
    }

    /// Every minor line reachable from `identity`, itself included.
    ///
    /// Works from a single worklist with a global visited set, so each minor
    /// line is expanded exactly once and cycles terminate. Lines that are not
    /// installed appear in the result but contribute no further edges.
    #[tracing::instrument(skip(self))]
    pub fn transitive_closure(&self, identity: &Identity) -> BTreeSet<String> {
        let root = self.normalize(identity);

        let mut closure = BTreeSet::from([root.clone()]);
        let mut checked: HashSet<String> = HashSet::new();
        let mut worklist = vec![root];

        while let Some(current) = worklist.pop() {
            if !checked.insert(current.clone()) {
                continue;
            }
            let Ok(current_identity) = Identity::parse(&current) else {
                warn!("Skipping malformed dependency {:?}", current);
                continue;
            };
            for dependency in self.direct_dependencies(&current_identity, DependencyKind::All) {
                if closure.insert(dependency.clone()) {
                    worklist.push(dependency);
                }
            }
        }

        debug!("Closure of {} has {} entries", identity, closure.len());
        closure
    }

    /// Machine names that appear with more than one minor line in the closure.
    pub fn detect_conflicts(&self, identity: &Identity) -> Vec<Conflict> {
        let mut by_name: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in self.transitive_closure(identity) {
            let Ok(parsed) = Identity::parse(&entry) else {
                continue;
            };
            if let Some(version) = parsed.version_string() {
                by_name.entry(parsed.machine_name).or_default().insert(version);
            }
        }

        by_name
            .into_iter()
            .filter(|(_, versions)| versions.len() > 1)
            .map(|(machine_name, versions)| {
                let mut versions: Vec<String> = versions.into_iter().collect();
                versions.sort_by(|a, b| compare_versions(a, b));
                Conflict {
                    machine_name,
                    versions,
                }
            })
            .collect()
    }

    /// Direct dependencies with no exact minor-line match installed.
    ///
    /// No fallback to another version of the same machine name is attempted.
    pub fn missing_dependencies(&self, identity: &Identity) -> MissingDependencies {
        let own = self.own_minor_line(identity);
        let mandatory = self.direct_dependencies(identity, DependencyKind::Mandatory);
        let optional = self.direct_dependencies(identity, DependencyKind::Optional);

        // A name that does not parse cannot be installed either
        let missing = |dependency: &String| -> bool {
            Some(dependency) != own.as_ref()
                && Identity::parse(dependency).ok().is_none_or(|d| !self.store.is_installed(&d))
        };

        MissingDependencies {
            mandatory: mandatory.iter().filter(|d| missing(*d)).cloned().collect(),
            optional: optional
                .iter()
                .filter(|d| !mandatory.contains(*d) && missing(*d))
                .cloned()
                .collect(),
        }
    }

    /// Direct dependencies pinned to an older minor line than the newest installed.
    pub fn outdated_dependency_use(&self, identity: &Identity) -> Vec<OutdatedDependency> {
        let own = self.own_minor_line(identity);
        let mut outdated = Vec::new();

        for dependency in self.direct_dependencies(identity, DependencyKind::All) {
            if Some(&dependency) == own.as_ref() {
                continue;
            }
            let Ok(parsed) = Identity::parse(&dependency) else {
                continue;
            };
            let (Some(used), Some(latest)) = (
                parsed.version_string(),
                self.store.find_latest(&parsed.machine_name),
            ) else {
                continue;
            };
            let latest = format!(
                "{}.{}",
                latest.manifest.major_version, latest.manifest.minor_version
            );
            if compare_versions(&used, &latest) == Ordering::Less {
                outdated.push(OutdatedDependency {
                    dependency: parsed.machine_name,
                    used,
                    latest,
                });
            }
        }

        outdated
    }

    /// Conflicts, missing and outdated dependencies as severity-tagged findings.
    #[tracing::instrument(skip(self))]
    pub fn check(&self, identity: &Identity) -> Vec<Finding> {
        let library = self.normalize(identity);
        let mut findings = Vec::new();

        for conflict in self.detect_conflicts(identity) {
            findings.push(Finding::new(&library, FindingKind::Conflict(conflict)));
        }

        let missing = self.missing_dependencies(identity);
        for dependency in missing.mandatory {
            findings.push(Finding::new(
                &library,
                FindingKind::MissingMandatory { dependency },
            ));
        }
        for dependency in missing.optional {
            findings.push(Finding::new(
                &library,
                FindingKind::MissingOptional { dependency },
            ));
        }

        for outdated in self.outdated_dependency_use(identity) {
            findings.push(Finding::new(&library, FindingKind::Outdated(outdated)));
        }

        findings
    }

    fn own_minor_line(&self, identity: &Identity) -> Option<String> {
        self.store.get(identity).map(|l| l.manifest.minor_line())
    }

    /// The installed minor line for `identity`, or its own text if not installed.
    fn normalize(&self, identity: &Identity) -> String {
        self.own_minor_line(identity)
            .or_else(|| identity.minor_line())
            .unwrap_or_else(|| identity.to_string())
    }
}
