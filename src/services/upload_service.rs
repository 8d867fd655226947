//! Upload service - binary and debug symbol uploads to the distribution backend
//!
//! A release upload runs through a fixed sequence:
//!
//! ```text
//! new upload → set metadata → chunk 1..n → finish → status uploadFinished
//!   → poll until readyToBePublished → assign distribution groups
//! ```
//!
//! Chunks are sent strictly in order. Polling is bounded by [`PollPolicy`];
//! it never retries a failed session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::error::UploadError;
use crate::infrastructure::appcenter::{
    AppRef, DistributionBackend, NewUpload, ReleaseStatus, SymbolUploadStatus, UploadRelease,
};

/// Largest chunk size accepted from the backend
pub const MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Fraction-complete callback, called after every chunk
pub type Progress<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// How long to wait for the backend to process an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 12,
        }
    }
}

/// One in-flight release upload
#[derive(Debug)]
pub struct UploadSession {
    upload: NewUpload,
    chunk_size: u64,
    total_chunks: u64,
    current_chunk: u32,
}

impl UploadSession {
    fn new(upload: NewUpload, chunk_size: u64, total_chunks: u64) -> Self {
        Self {
            upload,
            chunk_size,
            total_chunks: total_chunks.max(1),
            current_chunk: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.upload.id
    }

    /// Fraction of chunks sent so far
    pub fn progress(&self) -> f64 {
        (self.current_chunk as f64 / self.total_chunks as f64).min(1.0)
    }
}

/// Service for uploading builds to the distribution backend
pub struct UploadService {
    backend: Arc<dyn DistributionBackend>,
    poll: PollPolicy,
}

impl UploadService {
    pub fn new(backend: Arc<dyn DistributionBackend>) -> Self {
        Self {
            backend,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Upload an ipa, wait for processing and distribute it. Returns the
    /// install URL of the new release.
    pub async fn upload_release(
        &self,
        app: &AppRef,
        ipa: &Path,
        distribution_groups: &[String],
        progress: Progress<'_>,
    ) -> Result<String, UploadError> {
        info!("Creating new release...");
        let upload = self.backend.new_upload(app).await?;

        info!("Setting release metadata...");
        let file_size = tokio::fs::metadata(ipa).await?.len();
        let file_name = ipa
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = self
            .backend
            .set_metadata(&upload, &file_name, file_size)
            .await?;
        if metadata.chunk_size == 0 || metadata.chunk_size > MAX_CHUNK_SIZE {
            return Err(UploadError::MalformedResponse(format!(
                "chunk_size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE, metadata.chunk_size
            )));
        }
        let total_chunks = if metadata.chunk_list.is_empty() {
            file_size.div_ceil(metadata.chunk_size)
        } else {
            metadata.chunk_list.len() as u64
        };

        let mut session = UploadSession::new(upload, metadata.chunk_size, total_chunks);
        info!("Uploading...");
        self.upload_chunks(&mut session, ipa, progress).await?;

        info!("Updating release status to complete...");
        self.backend
            .update_upload_status(app, session.id(), ReleaseStatus::UploadFinished)
            .await?;

        info!("Fetching upload release...");
        let release = self.poll_release(app, session.id()).await?;
        let release_id = release.release_distinct_id.ok_or_else(|| {
            UploadError::ReleaseFailed(format!(
                "API contract broken for status: {}",
                release.upload_status
            ))
        })?;

        info!("Setting distribution groups...");
        self.backend
            .distribute_release(app, release_id, distribution_groups)
            .await?;

        Ok(app.install_url(release_id))
    }

    /// Read `chunk_size` blocks until an empty read, then finish the upload
    async fn upload_chunks(
        &self,
        session: &mut UploadSession,
        path: &Path,
        progress: Progress<'_>,
    ) -> Result<(), UploadError> {
        let mut file = File::open(path).await?;

        loop {
            let mut chunk = Vec::new();
            (&mut file)
                .take(session.chunk_size)
                .read_to_end(&mut chunk)
                .await?;

            if chunk.is_empty() {
                self.backend.finish_upload(&session.upload).await?;
                return Ok(());
            }

            session.current_chunk += 1;
            info!(
                "Uploading chunk {} of {}...",
                session.current_chunk, session.total_chunks
            );
            self.backend
                .upload_chunk(&session.upload, session.current_chunk, chunk)
                .await?;
            progress(session.progress());
        }
    }

    /// Wait for the backend to finish processing. Sleeps before every poll.
    pub async fn poll_release(
        &self,
        app: &AppRef,
        upload_id: &str,
    ) -> Result<UploadRelease, UploadError> {
        let mut last_status = ReleaseStatus::UploadFinished;

        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;
            let release = self.backend.get_upload_release(app, upload_id).await?;
            last_status = release.upload_status;

            match release.upload_status {
                ReleaseStatus::UploadStarted | ReleaseStatus::UploadFinished => {
                    info!(
                        attempt,
                        status = %release.upload_status,
                        "Fetching upload release (retrying in {}s)...",
                        self.poll.interval.as_secs()
                    );
                }
                ReleaseStatus::UploadCanceled | ReleaseStatus::MalwareDetected => {
                    return Err(UploadError::ReleaseFailed(
                        release.upload_status.to_string(),
                    ));
                }
                ReleaseStatus::Error => {
                    let message = release.error_details.unwrap_or_else(|| {
                        format!("API contract broken for status: {}", release.upload_status)
                    });
                    return Err(UploadError::ReleaseFailed(message));
                }
                ReleaseStatus::ReadyToBePublished => return Ok(release),
            }
        }

        Err(UploadError::ReleaseTimeout {
            attempts: self.poll.max_attempts,
            last_status: last_status.to_string(),
        })
    }

    /// Upload a dSYM zip. A failed blob upload marks the symbol upload
    /// aborted and is reported through the returned status, not as an error.
    pub async fn upload_symbols(
        &self,
        app: &AppRef,
        zip: &Path,
    ) -> Result<SymbolUploadStatus, UploadError> {
        info!("Uploading dSYMs...");
        let file_name = zip
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let symbols = self.backend.begin_symbol_upload(app, &file_name).await?;

        let status = match self
            .backend
            .upload_symbol_blob(&symbols.upload_url, zip)
            .await
        {
            Ok(()) => SymbolUploadStatus::Committed,
            Err(e) => {
                warn!(error = %e, "dSYM upload failed, aborting symbol upload");
                SymbolUploadStatus::Aborted
            }
        };

        self.backend
            .finish_symbol_upload(app, &symbols.symbol_upload_id, status)
            .await?;
        info!("Uploading dSYMs finished with status {:?}", status);
        Ok(status)
    }
}
