use serde::Serialize;
use std::fmt;

/// How loudly a finding should be reported. None of them abort an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

/// One machine name required at more than one minor line within a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub machine_name: String,
    /// `major.minor` strings, ascending.
    pub versions: Vec<String>,
}

/// Direct dependencies that have no exact minor-line match installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingDependencies {
    pub mandatory: Vec<String>,
    pub optional: Vec<String>,
}

impl MissingDependencies {
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.optional.is_empty()
    }
}

/// A dependency pinned to an older minor line than the newest one installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedDependency {
    pub dependency: String,
    pub used: String,
    pub latest: String,
}

/// What a finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    Conflict(Conflict),
    MissingMandatory { dependency: String },
    MissingOptional { dependency: String },
    Outdated(OutdatedDependency),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    /// Library the finding was computed for.
    pub library: String,
    #[serde(flatten)]
    pub kind: FindingKind,
}

impl Finding {
    pub fn new(library: impl Into<String>, kind: FindingKind) -> Self {
        let severity = match &kind {
            FindingKind::Conflict(_) | FindingKind::MissingMandatory { .. } => Severity::Error,
            FindingKind::MissingOptional { .. } => Severity::Warning,
            FindingKind::Outdated(_) => Severity::Info,
        };
        Self {
            severity,
            library: library.into(),
            kind,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: ", self.severity, self.library)?;
        match &self.kind {
            FindingKind::Conflict(c) => write!(
                f,
                "{} is required in several versions ({})",
                c.machine_name,
                c.versions.join(", ")
            ),
            FindingKind::MissingMandatory { dependency } => {
                write!(f, "missing required dependency {}", dependency)
            }
            FindingKind::MissingOptional { dependency } => {
                write!(f, "missing optional dependency {}", dependency)
            }
            FindingKind::Outdated(o) => write!(
                f,
                "uses {} {} but {} is installed",
                o.dependency, o.used, o.latest
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_kind() {
        let missing = Finding::new(
            "H5P.Column 1.13",
            FindingKind::MissingMandatory {
                dependency: "X 9.9".to_string(),
            },
        );
        assert_eq!(missing.severity, Severity::Error);

        let optional = Finding::new(
            "H5P.Column 1.13",
            FindingKind::MissingOptional {
                dependency: "X 9.9".to_string(),
            },
        );
        assert_eq!(optional.severity, Severity::Warning);
        assert_eq!(
            optional.to_string(),
            "warning: H5P.Column 1.13: missing optional dependency X 9.9"
        );
    }

    #[test]
    fn test_finding_serializes_flat() {
        let finding = Finding::new(
            "Root 1.0",
            FindingKind::Conflict(Conflict {
                machine_name: "C".to_string(),
                versions: vec!["1.0".to_string(), "2.0".to_string()],
            }),
        );
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["severity"], "error");
        assert_eq!(value["kind"], "conflict");
        assert_eq!(value["machine_name"], "C");
    }
}
