//! Local filesystem repository (e.g. `~/.m2/repository`)

use crate::error::{GetrunError, GetrunResult};
use crate::repository::Repository;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Repository rooted at a local directory
pub struct FileRepository {
    root: PathBuf,
    location: String,
}

impl FileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            location: format!("file://{}", root.display()),
            root,
        }
    }
}

impl Repository for FileRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn fetch(&self, path: &str) -> GetrunResult<Option<Vec<u8>>> {
        let full = self.root.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GetrunError::io(format!("reading {}", full.display()), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_existing_file() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("org/example/lib/1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("lib-1.0.pom"), "<project/>").unwrap();

        let repo = FileRepository::new(temp.path());
        let bytes = repo.fetch("org/example/lib/1.0/lib-1.0.pom").unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"<project/>"[..]));
    }

    #[test]
    fn missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let repo = FileRepository::new(temp.path());
        assert!(repo.fetch("nope/nope.pom").unwrap().is_none());
    }

    #[test]
    fn location_is_file_uri() {
        let repo = FileRepository::new("/tmp/repo");
        assert_eq!(repo.location(), "file:///tmp/repo");
    }
}
