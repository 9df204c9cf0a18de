//! Artifact cache gate
//!
//! Decides on each run whether to resolve or to reuse the cache directory.
//!
//! | Cache directory | Manifest | Action |
//! |-----------------|----------|--------|
//! | absent | - | resolve, retrieve, write manifest |
//! | present | absent | reuse archives as-is |
//! | present | same coordinate | reuse archives |
//! | present | other coordinate | fail with `CacheMismatch` |
//!
//! Existence alone marks the cache as populated, even when it is empty.
//! The directory is not locked; concurrent runs against the same cache
//! directory are not supported.

pub mod manifest;

pub use manifest::{CacheManifest, MANIFEST_FILE};

use crate::coordinate::ArtifactCoordinate;
use crate::error::{GetrunError, GetrunResult};
use crate::resolve::{is_archive, ResolvedArtifactSet, Resolver};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// How the artifacts were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Resolver ran and populated the cache
    Resolved,
    /// Existing cache directory was reused
    Reused,
}

/// Resolve-or-reuse decision over a single cache directory
pub struct CacheGate<'a> {
    dir: PathBuf,
    resolver: &'a dyn Resolver,
    verify_coordinate: bool,
}

impl<'a> CacheGate<'a> {
    pub fn new(dir: impl Into<PathBuf>, resolver: &'a dyn Resolver) -> Self {
        Self {
            dir: dir.into(),
            resolver,
            verify_coordinate: true,
        }
    }

    /// Toggle the manifest check on reuse
    pub fn verify_coordinate(mut self, verify: bool) -> Self {
        self.verify_coordinate = verify;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the cache directory exists
    pub fn is_populated(&self) -> bool {
        self.dir.exists()
    }

    /// Archives for `coord`, resolving only when the cache is absent
    pub async fn obtain_artifacts(
        &self,
        coord: &ArtifactCoordinate,
    ) -> GetrunResult<ResolvedArtifactSet> {
        self.obtain(coord).await.map(|(set, _)| set)
    }

    /// Like [`obtain_artifacts`](Self::obtain_artifacts), also reporting which branch ran
    pub async fn obtain(
        &self,
        coord: &ArtifactCoordinate,
    ) -> GetrunResult<(ResolvedArtifactSet, CacheOutcome)> {
        if !self.is_populated() {
            info!("No cache at {}, resolving {}", self.dir.display(), coord);
            let set = self.resolver.resolve(coord, &self.dir).await?;

            let manifest = CacheManifest::new(coord, &set);
            if let Err(e) = manifest.save(&self.dir).await {
                warn!("Cache manifest not written: {}", e);
            }

            let archives = set.archives().cloned().collect();
            return Ok((ResolvedArtifactSet::new(archives), CacheOutcome::Resolved));
        }

        if self.verify_coordinate {
            if let Some(manifest) = CacheManifest::load(&self.dir).await {
                if !manifest.matches(coord) {
                    return Err(GetrunError::CacheMismatch {
                        cached: manifest.coordinate.to_string(),
                        requested: coord.to_string(),
                    });
                }
            }
        }

        info!("Reusing cache at {}", self.dir.display());
        let set = list_archives(&self.dir).await?;
        Ok((set, CacheOutcome::Reused))
    }

    /// Delete the cache directory so the next run resolves again
    pub async fn clear(&self) -> GetrunResult<()> {
        if !self.is_populated() {
            return Ok(());
        }
        fs::remove_dir_all(&self.dir)
            .await
            .map_err(|e| GetrunError::io(format!("removing {}", self.dir.display()), e))?;
        info!("Removed {}", self.dir.display());
        Ok(())
    }
}

/// Immediate archive entries of `dir`, in directory listing order
pub async fn list_archives(dir: &Path) -> GetrunResult<ResolvedArtifactSet> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| GetrunError::io(format!("listing {}", dir.display()), e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| GetrunError::io(format!("listing {}", dir.display()), e))?
    {
        let path = dir.join(entry.file_name());
        if is_archive(&path) {
            files.push(path);
        } else {
            debug!("Skipping non-archive {}", path.display());
        }
    }

    Ok(ResolvedArtifactSet::new(files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Resolver that records calls and writes the given files
    struct FakeResolver {
        calls: Mutex<Vec<ArtifactCoordinate>>,
        files: Vec<&'static str>,
        fail: bool,
    }

    impl FakeResolver {
        fn new(files: Vec<&'static str>) -> Self {
            Self {
                calls: Mutex::new(vec![]),
                files,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(vec![])
            }
        }

        fn calls(&self) -> Vec<ArtifactCoordinate> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Resolver for FakeResolver {
        async fn resolve(
            &self,
            coord: &ArtifactCoordinate,
            dest: &Path,
        ) -> GetrunResult<ResolvedArtifactSet> {
            self.calls.lock().unwrap().push(coord.clone());
            if self.fail {
                return Err(GetrunError::Resolution {
                    coordinate: coord.to_string(),
                    problems: vec!["module not found: g:a:1.0".to_string()],
                });
            }
            std::fs::create_dir_all(dest).unwrap();
            let mut files = vec![];
            for name in &self.files {
                let path = dest.join(name);
                std::fs::write(&path, b"PK").unwrap();
                files.push(path);
            }
            Ok(ResolvedArtifactSet::new(files))
        }
    }

    /// Resolver that must never run
    struct ForbiddenResolver;

    #[async_trait]
    impl Resolver for ForbiddenResolver {
        async fn resolve(
            &self,
            coord: &ArtifactCoordinate,
            _dest: &Path,
        ) -> GetrunResult<ResolvedArtifactSet> {
            panic!("resolver invoked for {} with a populated cache", coord);
        }
    }

    fn coord(version: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new("g", "a", version).unwrap()
    }

    #[tokio::test]
    async fn absent_cache_invokes_resolver_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        let resolver = FakeResolver::new(vec!["g-a-jar-a-1.0.jar", "readme.txt"]);

        let (set, outcome) = CacheGate::new(&dir, &resolver)
            .obtain(&coord("1.0"))
            .await
            .unwrap();

        assert_eq!(outcome, CacheOutcome::Resolved);
        assert_eq!(resolver.calls(), [coord("1.0")]);
        assert_eq!(set.files(), [dir.join("g-a-jar-a-1.0.jar")]);
        assert!(dir.join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn second_run_does_not_resolve() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        let resolver = FakeResolver::new(vec!["g-a-jar-a-1.0.jar"]);
        CacheGate::new(&dir, &resolver)
            .obtain_artifacts(&coord("1.0"))
            .await
            .unwrap();

        let (set, outcome) = CacheGate::new(&dir, &ForbiddenResolver)
            .obtain(&coord("1.0"))
            .await
            .unwrap();

        assert_eq!(outcome, CacheOutcome::Reused);
        assert_eq!(set.files(), [dir.join("g-a-jar-a-1.0.jar")]);
    }

    #[tokio::test]
    async fn populated_cache_filters_to_archives() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("g-a-jar-a-1.0.jar"), b"PK").unwrap();
        std::fs::write(dir.join("notes.txt"), b"hello").unwrap();

        let set = CacheGate::new(&dir, &ForbiddenResolver)
            .obtain_artifacts(&coord("1.0"))
            .await
            .unwrap();

        assert_eq!(set.files(), [dir.join("g-a-jar-a-1.0.jar")]);
    }

    #[tokio::test]
    async fn empty_cache_directory_counts_as_populated() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        std::fs::create_dir(&dir).unwrap();

        let set = CacheGate::new(&dir, &ForbiddenResolver)
            .obtain_artifacts(&coord("1.0"))
            .await
            .unwrap();

        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn mismatched_manifest_is_refused() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        let resolver = FakeResolver::new(vec!["g-a-jar-a-1.0.jar"]);
        CacheGate::new(&dir, &resolver)
            .obtain_artifacts(&coord("1.0"))
            .await
            .unwrap();

        let err = CacheGate::new(&dir, &ForbiddenResolver)
            .obtain_artifacts(&coord("2.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, GetrunError::CacheMismatch { .. }));

        // legacy behaviour when the check is disabled
        let set = CacheGate::new(&dir, &ForbiddenResolver)
            .verify_coordinate(false)
            .obtain_artifacts(&coord("2.0"))
            .await
            .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_propagates() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        let resolver = FakeResolver::failing();

        let err = CacheGate::new(&dir, &resolver)
            .obtain_artifacts(&coord("1.0"))
            .await
            .unwrap_err();

        assert_eq!(err.problems().len(), 1);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn clear_removes_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("artifacts");
        std::fs::create_dir(&dir).unwrap();

        let gate = CacheGate::new(&dir, &ForbiddenResolver);
        gate.clear().await.unwrap();
        assert!(!gate.is_populated());
        gate.clear().await.unwrap();
    }
}
