//! Per-request scratch directory.
//!
//! PDFium opens documents by path, so an uploaded PDF is staged on disk before
//! rasterisation. Each request gets its own directory under the system temp
//! dir; nothing is shared between requests and nothing outlives the request.
//! The directory is removed when the [`RequestWorkspace`] is dropped, on the
//! success path and on every error path alike.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Owns one request's temporary directory.
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: Option<TempDir>,
}

impl RequestWorkspace {
    /// Create a fresh, uniquely named directory (`pdfjpg-XXXXXX`).
    pub fn new() -> Result<Self, ConvertError> {
        let dir = tempfile::Builder::new()
            .prefix("pdfjpg-")
            .tempdir()
            .map_err(ConvertError::Workspace)?;
        debug!("Workspace created at {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match self.dir {
            Some(ref dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Write `bytes` to `name` inside the workspace and return its path.
    ///
    /// `name` is a fixed internal name, never the client's filename, so
    /// uploads cannot steer where files land.
    pub fn stage(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let path = self.path().join(name);
        std::fs::write(&path, bytes).map_err(ConvertError::Workspace)?;
        debug!("Staged {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Workspace {} removed", path.display()),
                Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_writes_inside_workspace() {
        let ws = RequestWorkspace::new().unwrap();
        let path = ws.stage("upload.pdf", b"%PDF-1.7").unwrap();
        assert!(path.starts_with(ws.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let ws = RequestWorkspace::new().unwrap();
        ws.stage("upload.pdf", b"data").unwrap();
        let root = ws.path().to_path_buf();
        assert!(root.is_dir());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn workspaces_are_distinct() {
        let a = RequestWorkspace::new().unwrap();
        let b = RequestWorkspace::new().unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("pdfjpg-"));
    }
}
