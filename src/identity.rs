//! Library identities and version comparison.
//!
//! An identity is a machine name plus an optional `major.minor[.patch]`
//! version. Two textual forms exist: the uber name `"H5P.Foo 1.2"` used in
//! manifests and configuration documents, and the directory name
//! `"H5P.Foo-1.2"` used on disk.

use anyhow::Result;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::RegistryError;

/// Longest machine name accepted, in characters.
pub const MAX_MACHINE_NAME_LEN: usize = 255;

static MACHINE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-]+$").expect("valid machine name regex"));

/// `[\w.-]`, 1 to [`MAX_MACHINE_NAME_LEN`] characters.
pub fn is_valid_machine_name(name: &str) -> bool {
    name.chars().count() <= MAX_MACHINE_NAME_LEN && MACHINE_NAME.is_match(name)
}

/// Identity of a library. Missing version components stay `None`; nothing
/// is defaulted to 0 here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub machine_name: String,
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
}

impl Identity {
    pub fn new(machine_name: impl Into<String>, major: u32, minor: u32, patch: Option<u32>) -> Self {
        Self {
            machine_name: machine_name.into(),
            major: Some(major),
            minor: Some(minor),
            patch,
        }
    }

    /// Identity with no version at all.
    pub fn unversioned(machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            major: None,
            minor: None,
            patch: None,
        }
    }

    /// Parse `"machineName major.minor[.patch]"`.
    ///
    /// Splits on the first space. A bare machine name yields an identity with
    /// every version component set to `None`.
    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        let malformed = || RegistryError::MalformedIdentity(text.to_string());
        let (name, version) = match text.split_once(' ') {
            Some((name, version)) => (name, Some(version)),
            None => (text, None),
        };
        Self::build(name, version).ok_or_else(malformed)
    }

    /// Parse a directory name: `machineName-major.minor[.patch]`.
    pub fn from_dir_name(dir_name: &str) -> Result<Self, RegistryError> {
        let malformed = || RegistryError::MalformedIdentity(dir_name.to_string());
        let (name, version) = dir_name.rsplit_once('-').ok_or_else(malformed)?;
        let identity = Self::build(name, Some(version)).ok_or_else(malformed)?;
        if identity.major.is_none() || identity.minor.is_none() {
            return Err(malformed());
        }
        Ok(identity)
    }

    fn build(name: &str, version: Option<&str>) -> Option<Self> {
        if !is_valid_machine_name(name) {
            return None;
        }
        let mut parts = [None; 3];
        if let Some(version) = version {
            let components: Vec<&str> = version.split('.').collect();
            if components.len() > 3 {
                return None;
            }
            for (slot, component) in parts.iter_mut().zip(components) {
                *slot = Some(component.parse::<u32>().ok()?);
            }
        }
        Some(Self {
            machine_name: name.to_string(),
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }

    pub fn has_minor_line(&self) -> bool {
        self.major.is_some() && self.minor.is_some()
    }

    /// `"machineName major.minor"`, the granularity dependencies match at.
    pub fn minor_line(&self) -> Option<String> {
        Some(format_minor_line(&self.machine_name, self.major?, self.minor?))
    }

    /// Directory name without patch: `machineName-major.minor`.
    pub fn dir_name(&self) -> Option<String> {
        Some(format!(
            "{}-{}.{}",
            self.machine_name, self.major?, self.minor?
        ))
    }

    /// Directory name including patch, the secondary lookup form.
    pub fn dir_name_with_patch(&self) -> Option<String> {
        Some(format!(
            "{}-{}.{}.{}",
            self.machine_name, self.major?, self.minor?, self.patch?
        ))
    }

    /// Version text with whatever components are present.
    pub fn version_string(&self) -> Option<String> {
        let major = self.major?;
        Some(match (self.minor, self.patch) {
            (Some(minor), Some(patch)) => format!("{}.{}.{}", major, minor, patch),
            (Some(minor), None) => format!("{}.{}", major, minor),
            _ => major.to_string(),
        })
    }

    pub fn same_minor_line(&self, other: &Identity) -> bool {
        self.machine_name == other.machine_name
            && self.major == other.major
            && self.minor == other.minor
    }

    /// Drop the patch component.
    pub fn without_patch(&self) -> Self {
        Self {
            patch: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version_string() {
            Some(version) => write!(f, "{} {}", self.machine_name, version),
            None => write!(f, "{}", self.machine_name),
        }
    }
}

impl FromStr for Identity {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub fn format_minor_line(machine_name: &str, major: u32, minor: u32) -> String {
    format!("{} {}.{}", machine_name, major, minor)
}

fn components(version: &str) -> [u64; 3] {
    let mut parts = [0u64; 3];
    for (slot, component) in parts.iter_mut().zip(version.split('.')) {
        *slot = component.trim().parse().unwrap_or(0);
    }
    parts
}

/// Compare two `major.minor.patch` strings numerically.
///
/// Missing components count as 0, so `"1.2"` equals `"1.2.0"` and is less
/// than `"1.2.1"`. Non-numeric components also count as 0.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    components(a).cmp(&components(b))
}

/// True only when major and minor are identical and `candidate` has a
/// strictly greater patch than `old`.
pub fn is_newer_patch(old: &str, candidate: &str) -> bool {
    let [old_major, old_minor, old_patch] = components(old);
    let [major, minor, patch] = components(candidate);
    old_major == major && old_minor == minor && patch > old_patch
}
