//! Artifact coordinates

use crate::error::{GetrunError, GetrunResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The (group, artifact, version) triple identifying a resolvable module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl ArtifactCoordinate {
    /// Build a coordinate, rejecting empty fields.
    ///
    /// Versions are passed through untouched; malformed ones surface later
    /// as resolution problems.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> GetrunResult<Self> {
        let coord = Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        };

        for (field, value) in [
            ("group", &coord.group),
            ("artifact", &coord.artifact),
            ("version", &coord.version),
        ] {
            if value.trim().is_empty() {
                return Err(GetrunError::InvalidCoordinate(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        Ok(coord)
    }

    /// Synthetic node that depends on this coordinate
    pub fn caller(&self) -> Self {
        Self {
            group: self.group.clone(),
            artifact: format!("{}-caller", self.artifact),
            version: self.version.clone(),
        }
    }

    /// Whether the version names a snapshot build
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("-SNAPSHOT")
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}
