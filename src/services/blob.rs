// src/services/blob.rs

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Storage for uploaded binaries, addressed by opaque file refs.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores the bytes and returns the new file ref.
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// Removes the blob. Returns false when nothing was stored under the ref.
    async fn delete(&self, file_ref: &str) -> Result<bool, AppError>;

    /// Public URL of the blob.
    fn url_for(&self, file_ref: &str) -> String;
}

/// Blobs kept in a local directory and served statically under `public_url`.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    fn path_for(&self, file_ref: &str) -> Result<PathBuf, AppError> {
        if !is_valid_ref(file_ref) {
            return Err(AppError::validation("file_ref", "Invalid file reference"));
        }
        Ok(self.root.join(file_ref))
    }
}

/// Refs are generated by `store`: a uuid plus an optional short extension.
fn is_valid_ref(file_ref: &str) -> bool {
    !file_ref.is_empty()
        && file_ref.len() <= 64
        && !file_ref.starts_with('.')
        && file_ref
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !file_ref.contains("..")
}

/// Lowercased alphanumeric extension of the uploaded name, if any.
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let file_ref = match extension_of(file_name) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        tokio::fs::write(self.root.join(&file_ref), bytes)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        tracing::info!(file_ref = %file_ref, size = bytes.len(), "Stored blob");
        Ok(file_ref)
    }

    async fn delete(&self, file_ref: &str) -> Result<bool, AppError> {
        let path = self.path_for(file_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }

    fn url_for(&self, file_ref: &str) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), file_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_cannot_escape_the_root() {
        assert!(is_valid_ref("0b6f7a3e-1c1d-4d7e-9a53-0c1f2b3c4d5e.pdf"));
        assert!(!is_valid_ref("../etc/passwd"));
        assert!(!is_valid_ref("a/b"));
        assert!(!is_valid_ref(".hidden"));
        assert!(!is_valid_ref(""));
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension_of("Notes.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("evil.p$p"), None);
    }

    #[test]
    fn url_joins_public_prefix() {
        let blobs = LocalBlobStorage::new("uploads", "https://cdn.example.org/files/");
        assert_eq!(blobs.url_for("x.png"), "https://cdn.example.org/files/x.png");
    }

    #[tokio::test]
    async fn store_then_delete() {
        let root = std::env::temp_dir().join(format!("blobs-{}", uuid::Uuid::new_v4()));
        let blobs = LocalBlobStorage::new(&root, "/files");

        let file_ref = blobs.store("lecture.pdf", b"%PDF-1.4").await.unwrap();
        assert!(file_ref.ends_with(".pdf"));
        assert!(root.join(&file_ref).exists());

        assert!(blobs.delete(&file_ref).await.unwrap());
        assert!(!blobs.delete(&file_ref).await.unwrap());

        let _ = std::fs::remove_dir_all(root);
    }
}
