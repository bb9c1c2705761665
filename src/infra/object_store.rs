// ============================================================
// Layer 6 — Object Store
// ============================================================
// Destination for staged arrays. The stager only sees the
// ObjectStore trait; this file provides the filesystem-backed
// implementation used for local runs and for buckets mounted
// into the filesystem.
//
// Accepted destinations:
//   /data/mnist            plain path
//   file:///data/mnist     file URI
// Anything else with a scheme (s3://, gs://, ...) is rejected
// up front as a configuration error.

use std::{fs, path::PathBuf};

use crate::domain::error::{ConfigError, DataError};
use crate::domain::traits::ObjectStore;

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build a store from a destination string given on the command line.
    pub fn from_destination(destination: &str) -> Result<Self, ConfigError> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(ConfigError::UnsupportedDestination(destination.to_string()));
        }
        if let Some(path) = destination.strip_prefix("file://") {
            return Ok(Self::new(path));
        }
        if destination.contains("://") {
            return Err(ConfigError::UnsupportedDestination(destination.to_string()));
        }
        Ok(Self::new(destination))
    }

    pub fn path_of(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), DataError> {
        let target = self.path_of(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| DataError::Io { path: parent.to_path_buf(), source })?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        fs::write(&partial, bytes).map_err(|source| DataError::Io { path: partial.clone(), source })?;
        fs::rename(&partial, &target).map_err(|source| DataError::Io { path: target.clone(), source })?;
        Ok(())
    }

    fn uri(&self, key: &str) -> String {
        format!("file://{}", self.path_of(key).display())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_destination_parsing() {
        assert_eq!(LocalObjectStore::from_destination("/tmp/x").unwrap().path_of(""), Path::new("/tmp/x"));
        assert_eq!(LocalObjectStore::from_destination("file:///tmp/y").unwrap().path_of(""), Path::new("/tmp/y"));
        assert!(matches!(
            LocalObjectStore::from_destination("s3://bucket/mnist"),
            Err(ConfigError::UnsupportedDestination(_))
        ));
    }

    #[test]
    fn test_put_creates_prefix_and_overwrites() {
        let dir   = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store.put("mnist/train/train_data.npy", b"first").unwrap();
        store.put("mnist/train/train_data.npy", b"second").unwrap();

        let path = dir.path().join("mnist").join("train").join("train_data.npy");
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(store.uri("mnist/train/train_data.npy").starts_with("file://"));
    }
}
