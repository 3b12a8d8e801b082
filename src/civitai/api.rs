use crate::error::HttpError;
use crate::http::RetryingClient;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

/// Resolved download information for one model version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub filename: String,
    pub download_url: String,
    /// Lower-cased SHA-256, when the API publishes one
    pub expected_hash: Option<String>,
}

impl ModelDescriptor {
    /// Download URL with the API token attached as a query parameter
    pub fn authorized_url(&self, token: Option<&str>) -> Result<String, HttpError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(self.download_url.clone()),
        };

        let mut url = Url::parse(&self.download_url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", self.download_url)))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url.into())
    }
}

#[derive(Debug, Deserialize)]
struct ModelVersion {
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    name: Option<String>,
    /// Absent or `null` when the API has not hashed the file
    #[serde(default)]
    hashes: Option<FileHashes>,
}

#[derive(Debug, Deserialize)]
struct FileHashes {
    #[serde(rename = "SHA256")]
    sha256: Option<String>,
}

/// Why a lookup produced no descriptor. Only ever logged.
#[derive(Debug, thiserror::Error)]
enum ResolveError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("no files listed")]
    NoFiles,
    #[error("unusable filename {0:?}")]
    BadFilename(Option<String>),
}

/// Civitai model-version metadata lookups
#[derive(Debug)]
pub struct MetadataResolver {
    client: RetryingClient,
    api_base: String,
    download_base: String,
    timeout: Duration,
}

impl MetadataResolver {
    #[must_use]
    pub fn new(
        client: RetryingClient,
        api_base: impl Into<String>,
        download_base: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            download_base: download_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn metadata_url(&self, model_id: &str) -> String {
        format!("{}/model-versions/{model_id}", self.api_base)
    }

    #[must_use]
    pub fn download_url(&self, model_id: &str) -> String {
        format!(
            "{}/models/{model_id}?type=Model&format=SafeTensor",
            self.download_base
        )
    }

    /// Look up `model_id`. Every failure degrades to `None`; the cause is
    /// logged at debug level.
    pub async fn resolve(&self, model_id: &str, token: Option<&str>) -> Option<ModelDescriptor> {
        match self.try_resolve(model_id, token).await {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::debug!("Metadata lookup failed for model {model_id}: {e}");
                None
            }
        }
    }

    async fn try_resolve(
        &self,
        model_id: &str,
        token: Option<&str>,
    ) -> Result<ModelDescriptor, ResolveError> {
        let url = self.metadata_url(model_id);
        tracing::debug!("Fetching metadata from: {url}");

        let bearer = token.map(str::trim).filter(|t| !t.is_empty());
        let response = self.client.get(&url, bearer, self.timeout).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolveError::Status(status));
        }

        let body = response.text().await.map_err(HttpError::from)?;
        let version: ModelVersion =
            serde_json::from_str(&body).map_err(|e| ResolveError::Json(e.to_string()))?;

        let file = version.files.into_iter().next().ok_or(ResolveError::NoFiles)?;

        let filename = match file.name {
            Some(name) if is_plain_filename(&name) => name,
            other => return Err(ResolveError::BadFilename(other)),
        };

        let expected_hash = file
            .hashes
            .and_then(|h| h.sha256)
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty());

        Ok(ModelDescriptor {
            filename,
            download_url: self.download_url(model_id),
            expected_hash,
        })
    }
}

/// A single path component that stays inside its directory
fn is_plain_filename(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
