//! Retrieval of resolved archives into the cache directory
//!
//! Files are staged in a sibling `<cache>.partial` directory and moved into
//! place only when every archive was fetched, so a failed run never leaves
//! a half-populated cache behind that a later run would reuse.

use crate::error::{GetrunError, GetrunResult};
use crate::repository::RepositoryChain;
use crate::resolve::graph::ResolvedNode;
use crate::resolve::ResolvedArtifactSet;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Destination naming, in Ivy pattern notation
pub const RETRIEVE_PATTERN: &str = "[organization]-[module]-[type]-[artifact]-[revision].jar";

/// File name for a retrieved archive, following [`RETRIEVE_PATTERN`].
///
/// A classifier is appended to the revision so classified archives of the
/// same module do not overwrite each other. Every typed artifact is named
/// with the `.jar` suffix, whatever extension it was fetched with.
pub fn retrieved_file_name(node: &ResolvedNode) -> String {
    let coord = &node.coordinate;
    let revision = match node.classifier {
        Some(ref c) => format!("{}-{}", coord.version, c),
        None => coord.version.clone(),
    };
    format!(
        "{}-{}-{}-{}-{}.jar",
        coord.group, coord.artifact, node.dep_type, coord.artifact, revision
    )
}

/// Copies resolved archives from their serving repository to disk
pub struct Retriever<'a> {
    chain: &'a RepositoryChain,
    verify_checksums: bool,
}

impl<'a> Retriever<'a> {
    pub fn new(chain: &'a RepositoryChain, verify_checksums: bool) -> Self {
        Self {
            chain,
            verify_checksums,
        }
    }

    /// Retrieve every archive-bearing node into `dest`
    pub fn retrieve(&self, nodes: &[ResolvedNode], dest: &Path) -> GetrunResult<ResolvedArtifactSet> {
        let staging = staging_dir(dest);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| {
                GetrunError::io(format!("removing stale {}", staging.display()), e)
            })?;
        }
        fs::create_dir_all(&staging)
            .map_err(|e| GetrunError::io(format!("creating {}", staging.display()), e))?;

        let mut names = Vec::new();
        let mut problems = Vec::new();

        for node in nodes.iter().filter(|n| n.has_archive()) {
            match self.fetch_verified(node) {
                Ok(bytes) => {
                    let name = retrieved_file_name(node);
                    let target = staging.join(&name);
                    fs::write(&target, &bytes).map_err(|e| {
                        GetrunError::io(format!("writing {}", target.display()), e)
                    })?;
                    debug!("Retrieved {} ({} bytes)", name, bytes.len());
                    names.push(name);
                }
                Err(problem) => problems.push(problem),
            }
        }

        if !problems.is_empty() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!("Failed to clean up {}: {}", staging.display(), e);
            }
            let root = nodes
                .first()
                .map(|n| n.coordinate.to_string())
                .unwrap_or_default();
            return Err(GetrunError::Resolution {
                coordinate: root,
                problems,
            });
        }

        fs::rename(&staging, dest).map_err(|e| {
            GetrunError::io(
                format!("moving {} to {}", staging.display(), dest.display()),
                e,
            )
        })?;

        info!("Retrieved {} archive(s) into {}", names.len(), dest.display());
        Ok(ResolvedArtifactSet::new(
            names.into_iter().map(|n| dest.join(n)).collect(),
        ))
    }

    fn fetch_verified(&self, node: &ResolvedNode) -> Result<Vec<u8>, String> {
        let coord = &node.coordinate;
        let classifier = node.classifier.as_deref();

        let ext = node.extension();

        let bytes = match self
            .chain
            .fetch_artifact(&node.located, coord, classifier, ext)
        {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return Err(format!(
                    "artifact not found: {} in {}",
                    display_artifact(node),
                    node.located.repository
                ))
            }
            Err(e) => return Err(format!("{}: {}", display_artifact(node), e)),
        };

        if self.verify_checksums {
            let checksum_ext = format!("{}.sha256", ext);
            match self
                .chain
                .fetch_artifact(&node.located, coord, classifier, &checksum_ext)
            {
                Ok(Some(published)) => {
                    verify_sha256(&bytes, &published, &display_artifact(node))
                        .map_err(|e| e.to_string())?;
                }
                Ok(None) => debug!("No published checksum for {}", display_artifact(node)),
                Err(e) => warn!("Checksum lookup failed for {}: {}", display_artifact(node), e),
            }
        }

        Ok(bytes)
    }
}

fn display_artifact(node: &ResolvedNode) -> String {
    match node.classifier {
        Some(ref c) => format!("{}:{}", node.coordinate, c),
        None => node.coordinate.to_string(),
    }
}

/// `<cache>.partial` next to the cache directory
pub fn staging_dir(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "artifacts".into());
    name.push(".partial");
    dest.with_file_name(name)
}

/// Compare content against a published `.sha256` file (`<hex> [filename]`)
fn verify_sha256(bytes: &[u8], published: &[u8], file: &str) -> GetrunResult<()> {
    let published = String::from_utf8_lossy(published);
    let expected = published
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let actual = hex::encode(Sha256::digest(bytes));

    if expected == actual {
        Ok(())
    } else {
        Err(GetrunError::ChecksumMismatch {
            file: file.to_string(),
            expected,
            actual,
        })
    }
}
