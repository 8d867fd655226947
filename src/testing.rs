//! In-memory gateway fakes for service tests
//!
//! Every fake records the calls it receives, in order, as short strings such
//! as `"archive Live"` so tests can assert on the sequence.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::adf::Comment;
use crate::domain::slack::Message;
use crate::domain::{ExportOptions, GitBranch, SchemeLocation, SimulatorInfo};
use crate::error::{
    GitError, ProjectError, ReleaseError, ServiceError, ToolError, UploadError,
};
use crate::infrastructure::appcenter::{
    AppRef, DistributionBackend, NewUpload, ReleaseStatus, SymbolUpload, SymbolUploadStatus,
    UploadMetadata, UploadRelease,
};
use crate::infrastructure::atlassian::{IssueTracker, NewPage, Wiki};
use crate::infrastructure::build_number::BuildNumberProvider;
use crate::infrastructure::git::VersionControl;
use crate::infrastructure::github::{PullRequest, PullRequestLookup};
use crate::infrastructure::slack::ChatClient;
use crate::infrastructure::xcode::{AppStoreUpload, BuildTool};

fn http_error(service: &'static str) -> ServiceError {
    ServiceError::Http {
        service,
        status: 500,
        body: "boom".to_string(),
    }
}

fn record(log: &Mutex<Vec<String>>, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub struct FakeGit {
    pub clean: bool,
    pub branch: String,
    pub fail_push: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn on(branch: &str) -> Self {
        Self {
            clean: true,
            branch: branch.to_string(),
            fail_push: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionControl for FakeGit {
    async fn is_clean(&self) -> Result<bool, GitError> {
        Ok(self.clean)
    }

    async fn current_branch(&self) -> Result<GitBranch, GitError> {
        Ok(GitBranch::new(&self.branch))
    }

    async fn commit(&self, subject: &str, body: Option<&str>) -> Result<(), GitError> {
        match body {
            Some(body) => record(&self.calls, format!("commit {} | {}", subject, body)),
            None => record(&self.calls, format!("commit {}", subject)),
        }
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        record(&self.calls, format!("push {} {}", remote, branch));
        if self.fail_push {
            return Err(GitError::CommandFailed {
                command: "git push".to_string(),
            });
        }
        Ok(())
    }
}

pub struct FakeBuildTool {
    pub version: String,
    pub build_number: Mutex<u64>,
    pub simulators: Vec<SimulatorInfo>,
    pub coverage: Option<f64>,
    /// Fail the first call whose record starts with this prefix
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBuildTool {
    pub fn new(version: &str, build_number: u64) -> Self {
        Self {
            version: version.to_string(),
            build_number: Mutex::new(build_number),
            simulators: vec![SimulatorInfo {
                udid: "AAAA-0001".to_string(),
                name: "iPhone 15".to_string(),
                runtime: "iOS-17-0".to_string(),
            }],
            coverage: Some(0.5),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.fail_on = Some(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn invoke(&self, entry: String) -> Result<(), ToolError> {
        let fail = matches!(&self.fail_on, Some(prefix) if entry.starts_with(prefix.as_str()));
        record(&self.calls, entry.clone());
        if fail {
            return Err(ToolError::InvocationFailed {
                command: entry,
                exit_code: Some(65),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BuildTool for FakeBuildTool {
    async fn app_version(
        &self,
        _project: &Path,
        _target: &str,
        _configuration: &str,
    ) -> Result<String, ProjectError> {
        Ok(self.version.clone())
    }

    async fn build_number(
        &self,
        _project: &Path,
        _target: &str,
        _configuration: &str,
    ) -> Result<u64, ProjectError> {
        Ok(*self.build_number.lock().unwrap())
    }

    async fn set_build_number(
        &self,
        _project: &Path,
        _target: &str,
        build_number: u64,
    ) -> Result<(), ProjectError> {
        record(&self.calls, format!("set_build_number {}", build_number));
        *self.build_number.lock().unwrap() = build_number;
        Ok(())
    }

    async fn resolve_simulators(
        &self,
        _runtimes: &[String],
        _preferred_names: &[String],
    ) -> Result<Vec<SimulatorInfo>, ReleaseError> {
        Ok(self.simulators.clone())
    }

    async fn test(
        &self,
        _location: &SchemeLocation,
        scheme: &str,
        simulator: &SimulatorInfo,
        output_dir: &Path,
    ) -> Result<PathBuf, ToolError> {
        self.invoke(format!("test {} {}", scheme, simulator.udid))?;
        Ok(output_dir.join(format!("{}-{}-TestResults", scheme, simulator.runtime)))
    }

    async fn line_coverage(&self, _result_bundle: &Path, target: &str) -> Result<Option<f64>, ToolError> {
        record(&self.calls, format!("coverage {}", target));
        Ok(self.coverage)
    }

    async fn build(&self, _location: &SchemeLocation, scheme: &str) -> Result<(), ToolError> {
        self.invoke(format!("build {}", scheme))
    }

    async fn archive(
        &self,
        _location: &SchemeLocation,
        scheme: &str,
        _archive_path: &Path,
    ) -> Result<(), ToolError> {
        self.invoke(format!("archive {}", scheme))
    }

    async fn write_export_options(&self, options: &ExportOptions, path: &Path) -> Result<(), ToolError> {
        self.invoke(format!(
            "export_options {} {}",
            options.method.as_str(),
            path.display()
        ))
    }

    async fn export_archive(
        &self,
        archive_path: &Path,
        _export_dir: &Path,
        _export_options: &Path,
    ) -> Result<(), ToolError> {
        self.invoke(format!("export {}", archive_path.display()))
    }

    async fn zip(&self, dir: &Path, zip: &Path) -> Result<(), ToolError> {
        self.invoke(format!("zip {}", dir.display()))?;
        std::fs::write(zip, b"dsyms")?;
        Ok(())
    }

    async fn upload_package(&self, upload: &AppStoreUpload) -> Result<(), ToolError> {
        self.invoke(format!(
            "altool {} {} {}",
            upload.bundle_id, upload.bundle_short_version, upload.bundle_version
        ))
    }
}

pub struct FakeBackend {
    pub chunk_size: u64,
    /// Statuses returned by successive polls; the last one repeats
    pub statuses: Mutex<VecDeque<UploadRelease>>,
    pub fail_symbol_blob: bool,
    pub calls: Mutex<Vec<String>>,
    pub chunks: Mutex<Vec<(u32, usize)>>,
}

impl FakeBackend {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            statuses: Mutex::new(VecDeque::from([ready(7)])),
            fail_symbol_blob: false,
            calls: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(self, statuses: Vec<UploadRelease>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("poll")).count()
    }
}

pub fn status(status: ReleaseStatus) -> UploadRelease {
    UploadRelease {
        upload_status: status,
        error_details: None,
        release_distinct_id: None,
    }
}

pub fn ready(release_id: u64) -> UploadRelease {
    UploadRelease {
        upload_status: ReleaseStatus::ReadyToBePublished,
        error_details: None,
        release_distinct_id: Some(release_id),
    }
}

#[async_trait]
impl DistributionBackend for FakeBackend {
    async fn new_upload(&self, app: &AppRef) -> Result<NewUpload, UploadError> {
        record(&self.calls, format!("new_upload {}", app.app));
        Ok(NewUpload {
            id: format!("upload-{}", app.app),
            upload_domain: "https://upload.example.com".to_string(),
            token: "token".to_string(),
            package_asset_id: "asset".to_string(),
        })
    }

    async fn set_metadata(
        &self,
        _upload: &NewUpload,
        file_name: &str,
        file_size: u64,
    ) -> Result<UploadMetadata, UploadError> {
        record(&self.calls, format!("set_metadata {} {}", file_name, file_size));
        let chunks = file_size.div_ceil(self.chunk_size.max(1));
        Ok(UploadMetadata {
            chunk_size: self.chunk_size,
            chunk_list: (1..=chunks).collect(),
        })
    }

    async fn upload_chunk(
        &self,
        _upload: &NewUpload,
        block_number: u32,
        chunk: Vec<u8>,
    ) -> Result<(), UploadError> {
        self.chunks.lock().unwrap().push((block_number, chunk.len()));
        Ok(())
    }

    async fn finish_upload(&self, _upload: &NewUpload) -> Result<(), UploadError> {
        record(&self.calls, "finish_upload");
        Ok(())
    }

    async fn update_upload_status(
        &self,
        _app: &AppRef,
        _upload_id: &str,
        status: ReleaseStatus,
    ) -> Result<(), UploadError> {
        record(&self.calls, format!("update_status {}", status));
        Ok(())
    }

    async fn get_upload_release(
        &self,
        _app: &AppRef,
        _upload_id: &str,
    ) -> Result<UploadRelease, UploadError> {
        let mut statuses = self.statuses.lock().unwrap();
        let release = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        let release = release.unwrap_or_else(|| status(ReleaseStatus::UploadStarted));
        record(&self.calls, format!("poll {}", release.upload_status));
        Ok(release)
    }

    async fn distribute_release(
        &self,
        app: &AppRef,
        release_id: u64,
        groups: &[String],
    ) -> Result<(), UploadError> {
        record(
            &self.calls,
            format!("distribute {} {} [{}]", app.app, release_id, groups.join(",")),
        );
        Ok(())
    }

    async fn begin_symbol_upload(
        &self,
        app: &AppRef,
        file_name: &str,
    ) -> Result<SymbolUpload, UploadError> {
        record(&self.calls, format!("begin_symbols {} {}", app.app, file_name));
        Ok(SymbolUpload {
            symbol_upload_id: "sym-1".to_string(),
            upload_url: "https://blob.example.com/sym-1".to_string(),
        })
    }

    async fn upload_symbol_blob(&self, _upload_url: &str, file: &Path) -> Result<(), UploadError> {
        record(&self.calls, "upload_symbols");
        if self.fail_symbol_blob {
            return Err(UploadError::Backend {
                status: 503,
                message: "blob store unavailable".to_string(),
            });
        }
        if !file.exists() {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "zip missing",
            )));
        }
        Ok(())
    }

    async fn finish_symbol_upload(
        &self,
        _app: &AppRef,
        _symbol_upload_id: &str,
        status: SymbolUploadStatus,
    ) -> Result<(), UploadError> {
        record(&self.calls, format!("finish_symbols {:?}", status));
        Ok(())
    }
}

pub struct FakeTracker {
    pub fail: bool,
    pub transitions: Mutex<Vec<(String, String)>>,
    pub comments: Mutex<Vec<(String, Comment)>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            fail: false,
            transitions: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn comments(&self) -> Vec<(String, Comment)> {
        self.comments.lock().unwrap().clone()
    }

    pub fn transitions(&self) -> Vec<(String, String)> {
        self.transitions.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    fn base_url(&self) -> &str {
        "https://example.atlassian.net"
    }

    async fn transition(&self, ticket: &str, transition_id: &str) -> Result<(), ServiceError> {
        if self.fail {
            return Err(http_error("Jira"));
        }
        self.transitions
            .lock()
            .unwrap()
            .push((ticket.to_string(), transition_id.to_string()));
        Ok(())
    }

    async fn comment(&self, ticket: &str, comment: &Comment) -> Result<(), ServiceError> {
        self.comments
            .lock()
            .unwrap()
            .push((ticket.to_string(), comment.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeWiki {
    pub pages: Mutex<Vec<NewPage>>,
}

#[async_trait]
impl Wiki for FakeWiki {
    async fn create_page(&self, page: &NewPage) -> Result<String, ServiceError> {
        self.pages.lock().unwrap().push(page.clone());
        Ok("https://example.atlassian.net/wiki/spaces/PD/pages/1".to_string())
    }
}

#[derive(Default)]
pub struct FakeChat {
    pub fail: bool,
    pub messages: Mutex<Vec<Message>>,
}

impl FakeChat {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn post(&self, message: &Message) -> Result<(), ServiceError> {
        if self.fail {
            return Err(http_error("Slack"));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct FakeBuildNumbers {
    pub next: u64,
    pub requests: Mutex<Vec<String>>,
}

impl FakeBuildNumbers {
    pub fn new(next: u64) -> Self {
        Self {
            next,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BuildNumberProvider for FakeBuildNumbers {
    async fn next_build_number(&self, number_id: &str) -> Result<u64, ServiceError> {
        self.requests.lock().unwrap().push(number_id.to_string());
        Ok(self.next)
    }
}

#[derive(Default)]
pub struct FakePullRequests {
    pub pull_requests: Vec<PullRequest>,
    pub lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl PullRequestLookup for FakePullRequests {
    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<PullRequest>, ServiceError> {
        self.lookups
            .lock()
            .unwrap()
            .push(format!("{}/{} {}", owner, repo, branch));
        Ok(self.pull_requests.clone())
    }
}
