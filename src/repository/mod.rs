//! Repository chain
//!
//! Artifact sources are queried in priority order; the first source that
//! holds a module wins, and its files are retrieved from that same source.
//!
//! Default chain:
//! 1. `mavenLocal` - `~/.m2/repository`
//! 2. `central` - Maven Central
//! 3. `sonaTypeSnapshots` - Sonatype OSS snapshot repository

mod file;
mod http;
pub mod metadata;

pub use file::FileRepository;
pub use http::HttpRepository;

use crate::coordinate::ArtifactCoordinate;
use crate::error::{GetrunError, GetrunResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Location used by sources that do not name one
pub const DEFAULT_ROOT: &str = "https://repo1.maven.org/maven2";

/// Sonatype OSS snapshot repository
pub const SONATYPE_SNAPSHOTS: &str = "https://s01.oss.sonatype.org/content/repositories/snapshots";

fn default_true() -> bool {
    true
}

/// A ranked artifact source, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySource {
    /// Name shown in logs and problem messages
    pub name: String,

    /// Root URL or `file://` path; `None` means [`DEFAULT_ROOT`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_uri: Option<String>,

    /// Maven 2 layout: dots in the group become directories
    #[serde(default = "default_true")]
    pub compatibility_mode: bool,

    /// Read POM descriptors for transitive dependencies
    #[serde(default = "default_true")]
    pub uses_descriptor_metadata: bool,
}

impl RepositorySource {
    pub fn new(name: impl Into<String>, location_uri: Option<String>) -> Self {
        Self {
            name: name.into(),
            location_uri,
            compatibility_mode: true,
            uses_descriptor_metadata: true,
        }
    }

    /// Effective root location
    pub fn location(&self) -> &str {
        self.location_uri.as_deref().unwrap_or(DEFAULT_ROOT)
    }

    /// Local store, primary registry, snapshot registry
    pub fn default_chain() -> Vec<Self> {
        let mut chain = Vec::with_capacity(3);
        if let Some(home) = dirs::home_dir() {
            let local = home.join(".m2").join("repository");
            chain.push(Self::new(
                "mavenLocal",
                Some(format!("file://{}", local.display())),
            ));
        }
        chain.push(Self::new("central", None));
        chain.push(Self::new(
            "sonaTypeSnapshots",
            Some(SONATYPE_SNAPSHOTS.to_string()),
        ));
        chain
    }
}

/// Transport for a single source
///
/// Paths are relative to the repository root and always use `/`.
pub trait Repository: Send + Sync {
    /// Human-readable location for messages
    fn location(&self) -> &str;

    /// Read a file; `Ok(None)` when the source does not have it
    fn fetch(&self, path: &str) -> GetrunResult<Option<Vec<u8>>>;
}

/// Open the transport for a configured source
pub fn open(source: &RepositorySource, timeout: Duration) -> GetrunResult<Box<dyn Repository>> {
    let location = source.location();
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpRepository::new(location, timeout)))
    } else if let Some(path) = location.strip_prefix("file://") {
        Ok(Box::new(FileRepository::new(path)))
    } else if !location.contains("://") {
        Ok(Box::new(FileRepository::new(location)))
    } else {
        Err(GetrunError::Repository {
            url: location.to_string(),
            reason: format!("unsupported scheme for repository '{}'", source.name),
        })
    }
}

/// Where a module was found
#[derive(Debug, Clone)]
pub struct Located {
    /// Index of the serving source in the chain
    pub index: usize,

    /// Name of the serving source
    pub repository: String,

    /// Version used in file names (timestamped for remote snapshots)
    pub file_version: String,

    /// POM bytes, absent for sources that skip descriptors
    pub descriptor: Option<Vec<u8>>,
}

struct ChainEntry {
    source: RepositorySource,
    repository: Box<dyn Repository>,
}

/// Ordered list of artifact sources
pub struct RepositoryChain {
    entries: Vec<ChainEntry>,
}

impl RepositoryChain {
    /// Build a chain from configured sources
    pub fn from_sources(sources: &[RepositorySource], timeout: Duration) -> GetrunResult<Self> {
        let mut chain = Self::empty();
        for source in sources {
            let repository = open(source, timeout)?;
            chain.push(source.clone(), repository);
        }
        Ok(chain)
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a source with an explicit transport
    pub fn push(&mut self, source: RepositorySource, repository: Box<dyn Repository>) {
        debug!(
            "Repository #{}: {} ({})",
            self.entries.len() + 1,
            source.name,
            repository.location()
        );
        self.entries.push(ChainEntry { source, repository });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source names in query order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.source.name.as_str()).collect()
    }

    /// Find the first source holding `coord`.
    ///
    /// A failing source is logged and skipped; its error is only returned if
    /// no later source has the module either.
    pub fn locate(&self, coord: &ArtifactCoordinate) -> GetrunResult<Option<Located>> {
        let mut first_failure = None;

        for (index, entry) in self.entries.iter().enumerate() {
            match self.locate_in(index, entry, coord) {
                Ok(Some(found)) => {
                    debug!("{} found in {}", coord, entry.source.name);
                    return Ok(Some(found));
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}: {}", entry.source.name, e);
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    fn locate_in(
        &self,
        index: usize,
        entry: &ChainEntry,
        coord: &ArtifactCoordinate,
    ) -> GetrunResult<Option<Located>> {
        let ext = if entry.source.uses_descriptor_metadata {
            "pom"
        } else {
            "jar"
        };
        let m2 = entry.source.compatibility_mode;

        let direct = artifact_path(coord, &coord.version, None, ext, m2);
        let mut hit = entry
            .repository
            .fetch(&direct)?
            .map(|bytes| (coord.version.clone(), bytes));

        if hit.is_none() && coord.is_snapshot() {
            let metadata_path = format!("{}/maven-metadata.xml", module_dir(coord, m2));
            if let Some(xml) = entry.repository.fetch(&metadata_path)? {
                if let Some(file_version) = metadata::snapshot_file_version(&xml, &coord.version)
                {
                    let path = artifact_path(coord, &file_version, None, ext, m2);
                    hit = entry
                        .repository
                        .fetch(&path)?
                        .map(|bytes| (file_version, bytes));
                }
            }
        }

        Ok(hit.map(|(file_version, bytes)| Located {
            index,
            repository: entry.source.name.clone(),
            file_version,
            descriptor: entry.source.uses_descriptor_metadata.then_some(bytes),
        }))
    }

    /// Fetch a file of a located module from the source that served it
    pub fn fetch_artifact(
        &self,
        located: &Located,
        coord: &ArtifactCoordinate,
        classifier: Option<&str>,
        ext: &str,
    ) -> GetrunResult<Option<Vec<u8>>> {
        let entry = self.entry(located)?;
        let path = artifact_path(
            coord,
            &located.file_version,
            classifier,
            ext,
            entry.source.compatibility_mode,
        );
        entry.repository.fetch(&path)
    }

    /// Location of the serving source, for messages
    pub fn location_of(&self, located: &Located) -> String {
        self.entries
            .get(located.index)
            .map(|e| e.repository.location().to_string())
            .unwrap_or_default()
    }

    fn entry(&self, located: &Located) -> GetrunResult<&ChainEntry> {
        self.entries.get(located.index).ok_or_else(|| {
            GetrunError::Internal(format!("no repository at index {}", located.index))
        })
    }
}

/// Directory holding all files of one module version
pub fn module_dir(coord: &ArtifactCoordinate, compatibility_mode: bool) -> String {
    let group = if compatibility_mode {
        coord.group.replace('.', "/")
    } else {
        coord.group.clone()
    };
    format!("{}/{}/{}", group, coord.artifact, coord.version)
}

/// Path of a module file relative to the repository root
pub fn artifact_path(
    coord: &ArtifactCoordinate,
    file_version: &str,
    classifier: Option<&str>,
    ext: &str,
    compatibility_mode: bool,
) -> String {
    let classifier = classifier.map(|c| format!("-{}", c)).unwrap_or_default();
    format!(
        "{}/{}-{}{}.{}",
        module_dir(coord, compatibility_mode),
        coord.artifact,
        file_version,
        classifier,
        ext
    )
}
