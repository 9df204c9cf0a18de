//! `maven-metadata.xml` handling for remote snapshot builds

use crate::xml;
use tracing::debug;

/// File version for the latest build of a `-SNAPSHOT` version.
///
/// Remote repositories store snapshots as `artifact-1.0-20240101.101010-3.jar`;
/// the timestamp and build number come from the version-level metadata.
pub fn snapshot_file_version(metadata: &[u8], version: &str) -> Option<String> {
    let text = std::str::from_utf8(metadata).ok()?;
    let doc = match roxmltree::Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("Unparseable snapshot metadata for {}: {}", version, e);
            return None;
        }
    };

    let snapshot = xml::descend(doc.root_element(), &["versioning", "snapshot"])?;
    let timestamp = xml::child_text(snapshot, "timestamp")?;
    let build_number = xml::child_text(snapshot, "buildNumber")?;

    let base = version.strip_suffix("SNAPSHOT")?;
    Some(format!("{}{}-{}", base, timestamp, build_number))
}
