//! Classpath construction from the artifact cache

use crate::resolve::ResolvedArtifactSet;
use std::path::Path;

/// Separator the JVM launcher expects on this platform
pub const CLASSPATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Join the archive entries of `files` as `<cache dir>/<file name>`.
///
/// Entries stay relative to the working directory, so the child must be
/// started in the same directory as the invoker. Order follows `files`.
pub fn build_classpath(cache_dir: &Path, files: &ResolvedArtifactSet) -> String {
    let dir = cache_dir.to_string_lossy();
    let dir = dir.trim_end_matches(['/', '\\']);

    files
        .archives()
        .filter_map(|f| f.file_name())
        .map(|name| format!("{}/{}", dir, name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(&CLASSPATH_SEPARATOR.to_string())
}

/// Split a classpath back into its entries
pub fn split_classpath(classpath: &str) -> Vec<&str> {
    if classpath.is_empty() {
        return vec![];
    }
    classpath.split(CLASSPATH_SEPARATOR).collect()
}
