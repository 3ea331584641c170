//! # tm-media-local
//! trailmate/crates/tm-plugins/tm-media-local/src/lib.rs
//! Local filesystem implementation of `MediaStore`.
//! Uploads land under a root directory at the caller's path and are served
//! back under a public URL prefix.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tm_core::error::{AppError, Result};
use tm_core::traits::MediaStore;
use tokio::fs;
use tracing::{info, warn};

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "http://localhost:8080/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves a relative object path below the root. Absolute paths and
    /// parent traversal are refused.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let rel = Path::new(path);
        if path.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root_path.join(rel))
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path.trim_start_matches('/'))
    }

    async fn write_object(&self, target: &Path, data: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(target, data)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        Ok(())
    }
}

/// Sniffs the image container and warns when it disagrees with the extension.
fn check_format(data: &[u8], path: &str) {
    let Ok(format) = image::guess_format(data) else {
        warn!(path, "upload is not a recognised image container");
        return;
    };
    let by_extension = mime_guess::from_path(path).first();
    let sniffed = format.to_mime_type();
    if let Some(expected) = by_extension {
        if expected.essence_str() != sniffed {
            warn!(path, %expected, sniffed, "image extension does not match its contents");
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, data: Bytes, path: &str, content_type: &mime::Mime) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::UploadFailure("empty upload".into()));
        }
        if content_type.type_() != mime::IMAGE {
            return Err(AppError::UploadFailure(format!(
                "unsupported content type {content_type}"
            )));
        }
        let target = self
            .resolve(path)
            .ok_or_else(|| AppError::UploadFailure(format!("invalid object path {path:?}")))?;

        check_format(&data, path);

        self.write_object(&target, &data)
            .await
            .map_err(|e| AppError::UploadFailure(format!("{e:#}")))?;

        let url = self.url_for(path);
        info!(path, bytes = data.len(), %url, "media uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[tokio::test]
    async fn upload_writes_file_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            LocalMediaStore::new(dir.path().to_path_buf(), "http://localhost/media/".into());

        let url = store
            .upload(Bytes::from_static(PNG_MAGIC), "rescues/u1_1700000000000.png", &mime::IMAGE_PNG)
            .await
            .unwrap();

        assert_eq!(url, "http://localhost/media/rescues/u1_1700000000000.png");
        let written = std::fs::read(dir.path().join("rescues/u1_1700000000000.png")).unwrap();
        assert_eq!(written, PNG_MAGIC);
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".into());
        for bad in ["../escape.png", "/etc/passwd", ""] {
            let err = store
                .upload(Bytes::from_static(PNG_MAGIC), bad, &mime::IMAGE_PNG)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::UploadFailure(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn non_images_and_empty_bodies_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media".into());
        assert!(store
            .upload(Bytes::new(), "a.png", &mime::IMAGE_PNG)
            .await
            .is_err());
        assert!(store
            .upload(Bytes::from_static(b"hello"), "a.txt", &mime::TEXT_PLAIN)
            .await
            .is_err());
    }
}
