//! Release backend client: artifact upload and version drafts.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::ReleaseConfig;
use crate::context::ArtifactType;
use crate::error::{ReleaseError, Result};

/// One artifact upload.
#[derive(Clone)]
pub struct UploadRequest {
    pub package_name: String,
    pub artifact_type: ArtifactType,
    pub path: PathBuf,
    pub token: String,
}

impl std::fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRequest")
            .field("package_name", &self.package_name)
            .field("artifact_type", &self.artifact_type)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Remote side of a release.
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    /// Upload an artifact; returns the response body.
    async fn upload(&self, request: &UploadRequest) -> Result<String>;

    /// Create a version draft from exactly the supplied `fields`.
    async fn create_version_draft(
        &self,
        package_name: &str,
        token: &str,
        fields: &Map<String, Value>,
    ) -> Result<String>;
}

/// `reqwest`-based [`ReleaseBackend`].
pub struct HttpReleaseBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpReleaseBackend {
    pub fn new(config: &ReleaseConfig, http: reqwest::Client) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn upload_url(&self, package_name: &str, artifact_type: ArtifactType) -> String {
        format!(
            "{}/public/v1/application/{package_name}/upload/{}",
            self.base_url,
            artifact_type.extension()
        )
    }

    pub fn version_url(&self, package_name: &str) -> String {
        format!("{}/public/v1/application/{package_name}/version", self.base_url)
    }

    async fn finish(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ReleaseError::Backend {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ReleaseBackend for HttpReleaseBackend {
    #[instrument(skip_all, fields(package = %request.package_name))]
    async fn upload(&self, request: &UploadRequest) -> Result<String> {
        let bytes = tokio::fs::read(&request.path).await?;
        let file_name = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("artifact.{}", request.artifact_type.extension()));
        debug!(size_bytes = bytes.len(), file = %file_name, "uploading artifact");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let response = self
            .http
            .post(self.upload_url(&request.package_name, request.artifact_type))
            .bearer_auth(&request.token)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        let body = Self::finish(response).await?;
        info!("artifact uploaded");
        Ok(body)
    }

    #[instrument(skip_all, fields(package = %package_name, fields = fields.len()))]
    async fn create_version_draft(
        &self,
        package_name: &str,
        token: &str,
        fields: &Map<String, Value>,
    ) -> Result<String> {
        let response = self
            .http
            .post(self.version_url(package_name))
            .bearer_auth(token)
            .json(fields)
            .send()
            .await?;

        let body = Self::finish(response).await?;
        info!("version draft created");
        Ok(body)
    }
}
