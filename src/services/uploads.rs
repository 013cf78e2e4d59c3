use crate::errors::ServiceError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const FALLBACK_FILE_NAME: &str = "upload";

/// URL prefix the upload directory is served under, independent of where the
/// directory lives on disk
pub const PUBLIC_PREFIX: &str = "uploads";

/// Uploaded product image as received from a multipart form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Writes uploaded files into a single directory that is also served statically
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores the file as `<unix-millis>-<original name>` and returns the
    /// public URL path it is served from, e.g.
    /// `uploads/1700000000000-photo.png`.
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    pub async fn save(&self, upload: &ImageUpload) -> Result<String, ServiceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::UploadError(format!("create {}: {}", self.dir.display(), e)))?;

        let stored_name = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            base_name(&upload.file_name)
        );
        let target = self.dir.join(&stored_name);

        tokio::fs::write(&target, &upload.bytes)
            .await
            .map_err(|e| ServiceError::UploadError(format!("write {}: {}", target.display(), e)))?;

        let image_url = format!("{}/{}", PUBLIC_PREFIX, stored_name);
        info!(image_url = %image_url, "Stored uploaded image");
        Ok(image_url)
    }

    /// Disk location of a URL returned by [`UploadStore::save`]
    pub fn path_for(&self, image_url: &str) -> Option<PathBuf> {
        let stored_name = image_url
            .trim_start_matches('/')
            .strip_prefix(PUBLIC_PREFIX)?
            .strip_prefix('/')?;
        if matches!(stored_name, "" | "." | "..") || stored_name.contains(['/', '\\']) {
            return None;
        }
        Some(self.dir.join(stored_name))
    }

    /// Removes a stored file whose record was never persisted. Failures are
    /// logged and otherwise ignored.
    pub async fn discard(&self, image_url: &str) {
        let Some(path) = self.path_for(image_url) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove orphaned upload");
        }
    }
}

/// Final path component of a client-supplied file name
fn base_name(original: &str) -> String {
    original
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}
