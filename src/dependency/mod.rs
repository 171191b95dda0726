//! Dependency resolution
//!
//! Direct and transitive dependency sets, multi-version conflict detection,
//! and the missing/outdated checks, all computed against a
//! [`LibraryStore`](crate::library::LibraryStore) snapshot.

mod report;
mod resolver;

pub use report::{
    Conflict, Finding, FindingKind, MissingDependencies, OutdatedDependency, Severity,
};
pub use resolver::{DependencyKind, DependencyResolver};
