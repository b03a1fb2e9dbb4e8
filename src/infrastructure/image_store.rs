//! Canonical and upload-ready image folders, and the per-record
//! dedup/persistence step: `CHECK -> {SKIP | DOWNLOAD -> COPY}`.
//!
//! The canonical folder holds at most one image per artifact key and is the
//! source of truth for dedup checks across runs. The upload-ready folder
//! holds a renamed copy (`{uuid4}_{key}.jpg`) for every freshly downloaded
//! image, destined for the object-store bulk upload.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::domain::record::ProductTable;
use crate::infrastructure::http_client::ImageFetcher;

/// File name of the column-oriented JSON dump inside the canonical folder.
pub const JSON_DUMP_FILE: &str = "link_and_product_data.json";

/// Terminal state of the dedup gate for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// Canonical image already existed; nothing written.
    Skipped,
    /// Image was downloaded and copied into the upload folder.
    Downloaded,
}

/// Per-run image storage rooted at `{base}/{label}` (canonical) and
/// `{base}/{label}_for_upload` (upload-ready).
pub struct ImageStore {
    label: String,
    canonical_dir: PathBuf,
    upload_dir: PathBuf,
}

impl ImageStore {
    /// Create both folders idempotently and return the store handle.
    pub async fn create(base_path: &Path, label: &str) -> Result<Self> {
        let canonical_dir = base_path.join(label);
        let upload_dir = base_path.join(format!("{label}_for_upload"));

        for dir in [&canonical_dir, &upload_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
                info!("Created directory: {}", dir.display());
            }
        }

        Ok(Self {
            label: label.to_string(),
            canonical_dir,
            upload_dir,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn canonical_dir(&self) -> &Path {
        &self.canonical_dir
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Canonical path for an artifact key.
    pub fn canonical_image_path(&self, artifact_key: &str) -> PathBuf {
        self.canonical_dir.join(format!("{artifact_key}.jpg"))
    }

    /// Dedup check: does a canonical image already exist for this key?
    pub fn contains(&self, artifact_key: &str) -> bool {
        self.canonical_image_path(artifact_key).exists()
    }

    /// Run the dedup gate for one record.
    ///
    /// On a fresh key: download the image source into the canonical folder,
    /// then copy it into the upload folder under `{upload_prefix}_{key}.jpg`.
    /// A download failure aborts the run (propagated, not swallowed).
    pub async fn persist(
        &self,
        fetcher: &dyn ImageFetcher,
        artifact_key: &str,
        image_src: &str,
        upload_prefix: &str,
    ) -> Result<DedupOutcome> {
        if self.contains(artifact_key) {
            debug!("Canonical image exists for '{artifact_key}', skipping download");
            return Ok(DedupOutcome::Skipped);
        }

        let bytes = fetcher
            .fetch(image_src)
            .await
            .with_context(|| format!("Failed to download image for '{artifact_key}'"))?;

        let canonical_path = self.canonical_image_path(artifact_key);
        fs::write(&canonical_path, &bytes).await.with_context(|| {
            format!("Failed to write canonical image: {}", canonical_path.display())
        })?;

        let upload_path = self
            .upload_dir
            .join(format!("{upload_prefix}_{artifact_key}.jpg"));
        fs::copy(&canonical_path, &upload_path).await.with_context(|| {
            format!("Failed to copy image to upload folder: {}", upload_path.display())
        })?;

        debug!("Downloaded '{artifact_key}' ({} bytes)", bytes.len());
        Ok(DedupOutcome::Downloaded)
    }

    /// Serialize the full record table to the canonical folder, overwriting
    /// any previous dump.
    pub async fn dump_json(&self, table: &ProductTable) -> Result<PathBuf> {
        let path = self.canonical_dir.join(JSON_DUMP_FILE);
        let json = serde_json::to_string(table).context("Failed to serialize record table")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write JSON dump: {}", path.display()))?;
        info!("Wrote record table to {}", path.display());
        Ok(path)
    }
}
