//! Dependency resolution
//!
//! `Resolver` is the capability the cache gate depends on: given a root
//! coordinate, produce the concrete archive files in a cache directory.
//! `MavenResolver` implements it over a [`RepositoryChain`]:
//!
//! 1. Walk the transitive graph from a synthetic caller node
//! 2. If any node is unresolved, report every problem and stop
//! 3. Otherwise retrieve all archives into the cache directory

pub mod graph;
pub mod pom;
pub mod retrieve;

pub use graph::{GraphWalker, ResolveReport, ResolvedNode};
pub use retrieve::{Retriever, RETRIEVE_PATTERN};

use crate::coordinate::ArtifactCoordinate;
use crate::error::{GetrunError, GetrunResult};
use crate::repository::RepositoryChain;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Suffix identifying archive files
pub const ARCHIVE_SUFFIX: &str = ".jar";

/// Whether a path names an archive file
pub fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ARCHIVE_SUFFIX))
}

/// Ordered file paths produced by resolution or found in the cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArtifactSet {
    files: Vec<PathBuf>,
}

impl ResolvedArtifactSet {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Only the archive entries, in order
    pub fn archives(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().filter(|f| is_archive(f))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Computes and retrieves the dependency set of a root coordinate
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `coord` and retrieve its archives into `dest`
    async fn resolve(
        &self,
        coord: &ArtifactCoordinate,
        dest: &Path,
    ) -> GetrunResult<ResolvedArtifactSet>;
}

/// Maven-repository resolver
pub struct MavenResolver {
    chain: Arc<RepositoryChain>,
    verify_checksums: bool,
}

impl MavenResolver {
    pub fn new(chain: RepositoryChain, verify_checksums: bool) -> Self {
        Self {
            chain: Arc::new(chain),
            verify_checksums,
        }
    }

    /// Blocking resolve + retrieve
    pub fn resolve_blocking(
        chain: &RepositoryChain,
        coord: &ArtifactCoordinate,
        dest: &Path,
        verify_checksums: bool,
    ) -> GetrunResult<ResolvedArtifactSet> {
        let report = GraphWalker::new(chain).resolve(coord);
        if report.has_errors() {
            return Err(GetrunError::Resolution {
                coordinate: coord.to_string(),
                problems: report.problems,
            });
        }

        for node in &report.nodes {
            debug!(
                "{}{} from {}",
                "  ".repeat(node.depth),
                node.coordinate,
                chain.location_of(&node.located)
            );
        }

        Retriever::new(chain, verify_checksums).retrieve(&report.nodes, dest)
    }
}

#[async_trait]
impl Resolver for MavenResolver {
    async fn resolve(
        &self,
        coord: &ArtifactCoordinate,
        dest: &Path,
    ) -> GetrunResult<ResolvedArtifactSet> {
        let chain = Arc::clone(&self.chain);
        let coord = coord.clone();
        let dest = dest.to_path_buf();
        let verify = self.verify_checksums;

        tokio::task::spawn_blocking(move || {
            Self::resolve_blocking(&chain, &coord, &dest, verify)
        })
        .await
        .map_err(|e| GetrunError::Internal(format!("resolver task failed: {}", e)))?
    }
}
