//! App Center distribution backend
//!
//! Thin typed wrapper over the release upload and symbol upload endpoints.
//! The sequencing (chunk loop, status polling) lives in
//! [`crate::services::UploadService`].

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{failure, HttpClient};
use crate::error::UploadError;

pub const DEFAULT_API_URL: &str = "https://api.appcenter.ms";
pub const INSTALL_URL: &str = "https://install.appcenter.ms";

/// An app on the backend, `owner/app`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRef {
    pub owner: String,
    pub app: String,
}

impl AppRef {
    pub fn new(owner: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            app: app.into(),
        }
    }

    /// Public install page of a release
    pub fn install_url(&self, release_id: u64) -> String {
        format!(
            "{}/orgs/{}/apps/{}/releases/{}",
            INSTALL_URL, self.owner, self.app, release_id
        )
    }
}

/// Response to creating a release upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUpload {
    pub id: String,
    pub upload_domain: String,
    pub token: String,
    pub package_asset_id: String,
}

/// Response to `set_metadata`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadMetadata {
    pub chunk_size: u64,
    #[serde(default)]
    pub chunk_list: Vec<u64>,
}

/// Backend lifecycle of an uploaded binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    UploadStarted,
    UploadFinished,
    UploadCanceled,
    ReadyToBePublished,
    MalwareDetected,
    Error,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadStarted => "uploadStarted",
            Self::UploadFinished => "uploadFinished",
            Self::UploadCanceled => "uploadCanceled",
            Self::ReadyToBePublished => "readyToBePublished",
            Self::MalwareDetected => "malwareDetected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response to polling an upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadRelease {
    pub upload_status: ReleaseStatus,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub release_distinct_id: Option<u64>,
}

/// Response to beginning a symbol upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolUpload {
    pub symbol_upload_id: String,
    pub upload_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolUploadStatus {
    Committed,
    Aborted,
}

#[derive(Debug, Serialize)]
struct UploadStatusBody<'a> {
    upload_status: &'a str,
}

#[derive(Debug, Serialize)]
struct Destination<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchReleaseBody<'a> {
    destinations: Vec<Destination<'a>>,
    mandatory_update: bool,
    notify_testers: bool,
    release_notes: &'a str,
}

#[derive(Debug, Serialize)]
struct BeginSymbolUploadBody<'a> {
    symbol_type: &'a str,
    file_name: &'a str,
}

#[derive(Debug, Serialize)]
struct FinishSymbolUploadBody {
    status: SymbolUploadStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Distribution backend endpoints
#[async_trait]
pub trait DistributionBackend: Send + Sync {
    async fn new_upload(&self, app: &AppRef) -> Result<NewUpload, UploadError>;

    async fn set_metadata(
        &self,
        upload: &NewUpload,
        file_name: &str,
        file_size: u64,
    ) -> Result<UploadMetadata, UploadError>;

    /// `block_number` is 1-based
    async fn upload_chunk(
        &self,
        upload: &NewUpload,
        block_number: u32,
        chunk: Vec<u8>,
    ) -> Result<(), UploadError>;

    async fn finish_upload(&self, upload: &NewUpload) -> Result<(), UploadError>;

    async fn update_upload_status(
        &self,
        app: &AppRef,
        upload_id: &str,
        status: ReleaseStatus,
    ) -> Result<(), UploadError>;

    async fn get_upload_release(
        &self,
        app: &AppRef,
        upload_id: &str,
    ) -> Result<UploadRelease, UploadError>;

    /// Assign distribution groups to a release
    async fn distribute_release(
        &self,
        app: &AppRef,
        release_id: u64,
        groups: &[String],
    ) -> Result<(), UploadError>;

    async fn begin_symbol_upload(
        &self,
        app: &AppRef,
        file_name: &str,
    ) -> Result<SymbolUpload, UploadError>;

    async fn upload_symbol_blob(&self, upload_url: &str, file: &Path) -> Result<(), UploadError>;

    async fn finish_symbol_upload(
        &self,
        app: &AppRef,
        symbol_upload_id: &str,
        status: SymbolUploadStatus,
    ) -> Result<(), UploadError>;
}

/// App Center REST client
pub struct AppCenterClient {
    http: HttpClient,
    base_url: String,
    api_token: String,
}

impl AppCenterClient {
    pub fn new(http: HttpClient, api_token: impl Into<String>) -> Self {
        Self::with_base_url(http, DEFAULT_API_URL, api_token)
    }

    pub fn with_base_url(
        http: HttpClient,
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    fn app_url(&self, app: &AppRef, path: &str) -> String {
        format!(
            "{}/v0.1/apps/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&app.owner),
            urlencoding::encode(&app.app),
            path
        )
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, UploadError> {
        let response = self.http.send(builder).await?;
        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(UploadError::Backend {
                status,
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    async fn send_json<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, UploadError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let body = self.send(builder).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| UploadError::MalformedResponse(format!("{}: {}", e, body)))
    }
}

/// Prefer the backend's own message over the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(detail), ..
        }) => detail.message,
        Ok(ErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => body.to_string(),
    }
}

fn upload_query(upload: &NewUpload, path: &str, query: &[(&str, String)]) -> String {
    let mut url = format!(
        "{}/upload/{}/{}?",
        upload.upload_domain.trim_end_matches('/'),
        path,
        upload.package_asset_id
    );
    let pairs: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    url.push_str(&pairs.join("&"));
    url
}

#[async_trait]
impl DistributionBackend for AppCenterClient {
    async fn new_upload(&self, app: &AppRef) -> Result<NewUpload, UploadError> {
        let url = self.app_url(app, "uploads/releases");
        self.send_json(
            self.http
                .inner()
                .post(&url)
                .header("X-API-Token", &self.api_token),
        )
        .await
    }

    async fn set_metadata(
        &self,
        upload: &NewUpload,
        file_name: &str,
        file_size: u64,
    ) -> Result<UploadMetadata, UploadError> {
        let url = upload_query(
            upload,
            "set_metadata",
            &[
                ("content_type", "application/octet-stream".to_string()),
                ("file_name", file_name.to_string()),
                ("file_size", file_size.to_string()),
                ("token", upload.token.clone()),
            ],
        );
        self.send_json(
            self.http
                .inner()
                .post(&url)
                .header("X-API-Token", &self.api_token)
                .header("Accept", "application/json"),
        )
        .await
    }

    async fn upload_chunk(
        &self,
        upload: &NewUpload,
        block_number: u32,
        chunk: Vec<u8>,
    ) -> Result<(), UploadError> {
        let url = upload_query(
            upload,
            "upload_chunk",
            &[
                ("block_number", block_number.to_string()),
                ("token", upload.token.clone()),
            ],
        );
        let size = chunk.len();
        self.send(
            self.http
                .inner()
                .post(&url)
                .header("Content-Type", "application/octet-stream")
                .body(chunk),
        )
        .await?;
        debug!(block_number, size, "Uploaded chunk");
        Ok(())
    }

    async fn finish_upload(&self, upload: &NewUpload) -> Result<(), UploadError> {
        let url = upload_query(upload, "finished", &[("token", upload.token.clone())]);
        self.send(
            self.http
                .inner()
                .post(&url)
                .header("X-API-Token", &self.api_token)
                .header("Accept", "application/json"),
        )
        .await?;
        Ok(())
    }

    async fn update_upload_status(
        &self,
        app: &AppRef,
        upload_id: &str,
        status: ReleaseStatus,
    ) -> Result<(), UploadError> {
        let url = self.app_url(app, &format!("uploads/releases/{}", upload_id));
        self.send(
            self.http
                .inner()
                .patch(&url)
                .header("X-API-Token", &self.api_token)
                .json(&UploadStatusBody {
                    upload_status: status.as_str(),
                }),
        )
        .await?;
        Ok(())
    }

    async fn get_upload_release(
        &self,
        app: &AppRef,
        upload_id: &str,
    ) -> Result<UploadRelease, UploadError> {
        let url = self.app_url(app, &format!("uploads/releases/{}", upload_id));
        self.send_json(
            self.http
                .inner()
                .get(&url)
                .header("X-API-Token", &self.api_token),
        )
        .await
    }

    async fn distribute_release(
        &self,
        app: &AppRef,
        release_id: u64,
        groups: &[String],
    ) -> Result<(), UploadError> {
        let url = self.app_url(app, &format!("releases/{}", release_id));
        let body = PatchReleaseBody {
            destinations: groups.iter().map(|name| Destination { name }).collect(),
            mandatory_update: false,
            notify_testers: false,
            release_notes: "",
        };
        self.send(
            self.http
                .inner()
                .patch(&url)
                .header("X-API-Token", &self.api_token)
                .header("Accept", "application/json")
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn begin_symbol_upload(
        &self,
        app: &AppRef,
        file_name: &str,
    ) -> Result<SymbolUpload, UploadError> {
        let url = self.app_url(app, "symbol_uploads");
        self.send_json(
            self.http
                .inner()
                .post(&url)
                .header("X-API-Token", &self.api_token)
                .header("Accept", "application/json")
                .json(&BeginSymbolUploadBody {
                    symbol_type: "Apple",
                    file_name,
                }),
        )
        .await
    }

    async fn upload_symbol_blob(&self, upload_url: &str, file: &Path) -> Result<(), UploadError> {
        let data = tokio::fs::read(file).await?;
        self.send(
            self.http
                .inner()
                .put(upload_url)
                .header("x-ms-blob-type", "BlockBlob")
                .body(data),
        )
        .await?;
        Ok(())
    }

    async fn finish_symbol_upload(
        &self,
        app: &AppRef,
        symbol_upload_id: &str,
        status: SymbolUploadStatus,
    ) -> Result<(), UploadError> {
        let url = self.app_url(app, &format!("symbol_uploads/{}", symbol_upload_id));
        self.send(
            self.http
                .inner()
                .patch(&url)
                .header("X-API-Token", &self.api_token)
                .header("Accept", "application/json")
                .json(&FinishSymbolUploadBody { status }),
        )
        .await?;
        Ok(())
    }
}
