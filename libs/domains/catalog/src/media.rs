//! Media storage for category and product images.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::upload::UploadedImage;

/// Storage directory for product images
pub const PRODUCT_IMAGE_DIR: &str = "products";

/// Persists uploaded files and renders stored paths as URLs.
///
/// Stored paths are relative (`products/<uuid>-photo.png`) so the database
/// never depends on where the media root lives.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store `file` under `dir`, returning its relative path
    async fn save(&self, dir: &str, file: &UploadedImage) -> CatalogResult<String>;

    async fn delete(&self, path: &str) -> CatalogResult<()>;

    /// Public URL for a stored path, relative to the site root
    fn url(&self, path: &str) -> String;
}

/// Filesystem-backed storage served by the API under `base_url`
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a stored path inside the root, refusing anything that escapes it
    fn resolve(&self, path: &str) -> CatalogResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(CatalogError::Storage(format!("Invalid media path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

/// Keep the last path segment and a conservative character set.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    // Keep stored names well under filesystem limits, preserving the extension
    const MAX_STEM: usize = 100;
    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() <= 10 => (stem, Some(ext)),
        _ => (cleaned, None),
    };
    let stem: String = stem.chars().take(MAX_STEM).collect();
    let stem = if stem.is_empty() { "image".to_string() } else { stem };

    match ext {
        Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
        None => stem,
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, dir: &str, file: &UploadedImage) -> CatalogResult<String> {
        let relative = format!(
            "{}/{}-{}",
            dir.trim_matches('/'),
            Uuid::now_v7(),
            sanitize_file_name(&file.file_name)
        );
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CatalogError::Storage(format!("Failed to create media dir: {}", e)))?;
        }
        tokio::fs::write(&target, &file.data)
            .await
            .map_err(|e| CatalogError::Storage(format!("Failed to write {}: {}", relative, e)))?;

        tracing::debug!(path = %relative, bytes = file.data.len(), "Stored media file");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> CatalogResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CatalogError::Storage(format!("Failed to delete {}: {}", path, e))),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
