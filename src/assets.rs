//! File-backed asset store for event images
//!
//! Images live under `<storage_dir>/uploads`. The store hands back relative
//! paths that event rows reference; deletion is fire-and-forget so a missing
//! or locked file never fails a record mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::error::PortalError;

/// Asset store rooted at the uploads directory
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Create the store, ensuring the uploads directory exists
    pub fn new(root: PathBuf) -> Result<Self, PortalError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store raw bytes under a sanitized, collision-free name.
    ///
    /// Returns the relative path to reference from an event row.
    pub async fn store(&self, name: &str, data: &[u8]) -> Result<String, PortalError> {
        let name = sanitize_name(name)?;
        let prefix: u32 = rand::thread_rng().gen();
        let file_name = format!("{:08x}-{}", prefix, name);
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, data).await?;

        info!(file = %file_name, size = data.len(), "Stored asset");
        Ok(file_name)
    }

    /// Read an asset back by its relative path
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, PortalError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PortalError::NotFound(format!("asset {name}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an asset, logging failure instead of propagating it
    pub async fn delete(&self, name: &str) {
        let path = match self.resolve(name) {
            Ok(p) => p,
            Err(e) => {
                warn!(asset = %name, error = %e, "Refusing to delete asset");
                return;
            }
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(asset = %name, "Deleted asset"),
            Err(e) => warn!(asset = %name, error = %e, "Asset deletion failed"),
        }
    }

    /// Fire-and-forget deletion from a non-async or response-critical path
    pub fn spawn_delete(self: &Arc<Self>, name: String) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.delete(&name).await;
        });
    }

    /// Resolve a relative asset path, rejecting traversal outside the root
    fn resolve(&self, name: &str) -> Result<PathBuf, PortalError> {
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(PortalError::Validation(format!(
                "invalid asset name: {name}"
            )));
        }
        Ok(self.root.join(name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep the original extension and a recognizable stem, drop everything risky
fn sanitize_name(name: &str) -> Result<String, PortalError> {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(|c| c == '.' || c == '_' || c == '-').is_empty() {
        return Err(PortalError::Validation(format!(
            "invalid asset name: {name}"
        )));
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_read_delete() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::new(tmp.path().join("uploads")).unwrap();

        let name = store.store("fiesta poster.jpg", b"jpeg-bytes").await.unwrap();
        assert!(name.ends_with("fiesta_poster.jpg"));

        let data = store.read(&name).await.unwrap();
        assert_eq!(data, b"jpeg-bytes");

        store.delete(&name).await;
        assert!(store.read(&name).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::new(tmp.path().join("uploads")).unwrap();
        // must not panic or error
        store.delete("ghost.png").await;
    }

    #[test]
    fn test_traversal_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::new(tmp.path().join("uploads")).unwrap();
        assert!(store.resolve("../../etc/passwd").is_err());
        assert!(store.resolve("a/b.png").is_err());
    }
}
