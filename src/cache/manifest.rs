//! Coordinate manifest for the artifact cache
//!
//! Records which coordinate populated the cache directory, so a later run
//! for a different coordinate is refused instead of silently launching the
//! wrong classpath.

use crate::coordinate::ArtifactCoordinate;
use crate::error::{GetrunError, GetrunResult};
use crate::resolve::ResolvedArtifactSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Manifest file name inside the cache directory
pub const MANIFEST_FILE: &str = ".getrun.toml";

/// What populated the cache directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// When resolution finished
    pub resolved_at: DateTime<Utc>,

    /// Retrieved file names, in classpath order
    pub files: Vec<String>,

    /// Root coordinate that was resolved
    pub coordinate: ArtifactCoordinate,
}

impl CacheManifest {
    pub fn new(coordinate: &ArtifactCoordinate, set: &ResolvedArtifactSet) -> Self {
        Self {
            resolved_at: Utc::now(),
            files: set
                .files()
                .iter()
                .filter_map(|f| f.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            coordinate: coordinate.clone(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Read the manifest; `None` if absent or unreadable
    pub async fn load(dir: &Path) -> Option<Self> {
        let path = Self::path(dir);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No cache manifest at {}: {}", path.display(), e);
                return None;
            }
        };

        match toml::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Ignoring unreadable cache manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the manifest into `dir`
    pub async fn save(&self, dir: &Path) -> GetrunResult<()> {
        let path = Self::path(dir);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .map_err(|e| GetrunError::io(format!("writing {}", path.display()), e))
    }

    pub fn matches(&self, coord: &ArtifactCoordinate) -> bool {
        self.coordinate == *coord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coord(version: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new("g", "a", version).unwrap()
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let set = ResolvedArtifactSet::new(vec![temp.path().join("g-a-jar-a-1.0.jar")]);
        let manifest = CacheManifest::new(&coord("1.0"), &set);

        manifest.save(temp.path()).await.unwrap();
        let loaded = CacheManifest::load(temp.path()).await.unwrap();

        assert_eq!(loaded, manifest);
        assert_eq!(loaded.files, ["g-a-jar-a-1.0.jar"]);
        assert!(loaded.matches(&coord("1.0")));
        assert!(!loaded.matches(&coord("2.0")));
    }

    #[tokio::test]
    async fn missing_manifest_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(CacheManifest::load(temp.path()).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_manifest_is_none() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(MANIFEST_FILE), "not = [valid").unwrap();
        assert!(CacheManifest::load(temp.path()).await.is_none());
    }

    #[test]
    fn manifest_is_not_an_archive() {
        assert!(!crate::resolve::is_archive(Path::new(MANIFEST_FILE)));
    }
}
