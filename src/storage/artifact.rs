use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedArtifact {
    pub url: String,
}

/// Object-storage upload of a local file under a key prefix.
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, path: &Path, content_type: &str, key_prefix: &str) -> Result<UploadedArtifact>;
}

/// Uploads through the storage gateway as a multipart form with the fields
/// `file`, `content_type` and `key_prefix`; the gateway answers `{"url": ...}`.
pub struct HttpArtifactUploader {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpArtifactUploader {
    pub fn new(client: reqwest::Client, upload_url: String) -> Self {
        Self { client, upload_url }
    }
}

#[async_trait]
impl ArtifactUploader for HttpArtifactUploader {
    async fn upload(&self, path: &Path, content_type: &str, key_prefix: &str) -> Result<UploadedArtifact> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid artifact path: {}", path.display()))?
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read artifact {}: {}", path.display(), e))?;

        info!("Uploading {} ({} bytes) to {}/{}", path.display(), bytes.len(), key_prefix, filename);

        let part = Part::bytes(bytes).file_name(filename).mime_str(content_type)?;
        let form = Form::new()
            .text("content_type", content_type.to_string())
            .text("key_prefix", key_prefix.to_string())
            .part("file", part);

        let response = self.client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Upload request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Upload failed with status {}: {}", status, body));
        }

        let artifact = response.json::<UploadedArtifact>().await?;
        info!("Uploaded {} to {}", path.display(), artifact.url);
        Ok(artifact)
    }
}
