pub mod archive;
pub mod commands;
pub mod config;
pub mod dependency;
pub mod error;
pub mod export;
pub mod identity;
pub mod import;
pub mod library;
pub mod runtime;
pub mod scratch;

pub use config::RegistryConfig;
pub use dependency::{DependencyKind, DependencyResolver, Finding, Severity};
pub use error::RegistryError;
pub use export::Exporter;
pub use identity::{Identity, compare_versions, is_newer_patch};
pub use import::{ImportSource, ImportSummary, Importer};
pub use library::{LibraryManifest, LibraryStore, ListFilter};
pub use runtime::{RealRuntime, Runtime};
