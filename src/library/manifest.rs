use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::identity::{Identity, format_minor_line};
use crate::runtime::Runtime;

/// File name of the manifest inside every library directory.
pub const MANIFEST_FILE: &str = "library.json";

/// A dependency entry in `preloadedDependencies` / `editorDependencies`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

impl Dependency {
    pub fn new(machine_name: impl Into<String>, major_version: u32, minor_version: u32) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version,
            minor_version,
        }
    }

    pub fn minor_line(&self) -> String {
        format_minor_line(&self.machine_name, self.major_version, self.minor_version)
    }

    pub fn identity(&self) -> Identity {
        Identity::new(
            &self.machine_name,
            self.major_version,
            self.minor_version,
            None,
        )
    }
}

/// Contents of `library.json`.
///
/// Only identity and dependency fields drive the registry; everything else is
/// carried along so a manifest survives a load/save unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LibraryManifest {
    pub title: String,
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    #[serde(deserialize_with = "deserialize_flag")]
    pub runnable: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preloaded_dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editor_dependencies: Vec<Dependency>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `runnable` is 0/1 in practice, but some manifests use booleans.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(u8),
        Bool(bool),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Int(0) | Flag::Bool(false) => Ok(0),
        Flag::Int(1) | Flag::Bool(true) => Ok(1),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "runnable must be 0 or 1, got {}",
            other
        ))),
    }
}

impl LibraryManifest {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        let manifest: LibraryManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {:?}", path))?;
        Ok(manifest)
    }

    pub fn is_runnable(&self) -> bool {
        self.runnable == 1
    }

    /// Full identity including patch.
    pub fn identity(&self) -> Identity {
        Identity::new(
            &self.machine_name,
            self.major_version,
            self.minor_version,
            Some(self.patch_version),
        )
    }

    pub fn minor_line(&self) -> String {
        format_minor_line(&self.machine_name, self.major_version, self.minor_version)
    }

    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_version, self.minor_version, self.patch_version
        )
    }

    /// Preloaded then editor dependencies, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.preloaded_dependencies
            .iter()
            .chain(self.editor_dependencies.iter())
    }

    /// Whether `dir_name` is one of the two directory names this manifest may live in.
    pub fn matches_dir_name(&self, dir_name: &str) -> bool {
        let identity = self.identity();
        identity.dir_name().as_deref() == Some(dir_name)
            || identity.dir_name_with_patch().as_deref() == Some(dir_name)
    }
}
