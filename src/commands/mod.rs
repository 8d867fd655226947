//! Command implementations
//!
//! Every command loads the manifest and environment into a [`Context`], which
//! builds the concrete adapters and hands them to the services. Credentials
//! a stage needs but the environment lacks are passed on as the
//! [`PreconditionError`] the stage reports once it runs.

pub mod release;
pub mod simulators;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::config::environment::{
    ALTOOL_API_ISSUER, ALTOOL_API_KEY, ALTOOL_PASSWORD, ALTOOL_USERNAME, APPCENTER_API_TOKEN,
    APPCENTER_OWNER_NAME, ATLASSIAN_BASE_URL, ATLASSIAN_TOKEN, ATLASSIAN_USERNAME,
    BUILD_NUMBER_API_TOKEN, BUILD_NUMBER_API_URL, CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID,
    CONFLUENCE_RELEASE_NOTES_SPACE_ID, GITHUB_TOKEN, JIRA_QA_COLUMN_ID, SLACK_WEBHOOK_URL,
};
use crate::config::{self, EnvironmentSettings, ManifestConfig};
use crate::error::PreconditionError;
use crate::infrastructure::{
    AltoolAuth, AppCenterClient, AtlassianClient, BuildNumberClient, BuildNumberProvider,
    BuildTool, ChatClient, GitClient, GitHubClient, HttpClient, HttpSettings, ProcessRunner,
    PullRequestLookup, SlackWebhook, VersionControl, XcodeClient,
};
use crate::redact::Redactor;
use crate::services::{
    ConfluenceTarget, JiraTarget, NotificationService, ReleaseNotesService, ReleaseService,
    UploadService,
};

/// Everything a command needs to build its services
pub struct Context {
    pub manifest: ManifestConfig,
    pub env: EnvironmentSettings,
    redactor: Redactor,
    runner: ProcessRunner,
    http: HttpClient,
}

impl Context {
    /// Load the manifest and environment. Secrets are registered with the
    /// redactor before any adapter exists.
    pub fn load(config_path: Option<&Path>, redactor: Redactor, log_requests: bool) -> Result<Self> {
        let manifest = config::load_manifest(config_path)?;
        let env = EnvironmentSettings::from_env();
        for secret in env.secret_values() {
            redactor.redact(secret);
        }
        if let Some(webhook) = env.get(SLACK_WEBHOOK_URL) {
            redactor.redact_url(webhook);
        }

        let http = HttpClient::new(HttpSettings::default().with_log_requests(log_requests))
            .context("Failed to create HTTP client")?;
        let runner = ProcessRunner::new(redactor.clone());
        debug!("Loaded manifest for target {}", manifest.target);

        Ok(Self {
            manifest,
            env,
            redactor,
            runner,
            http,
        })
    }

    /// Git runs in the directory holding the Xcode project
    pub fn git(&self) -> Arc<dyn VersionControl> {
        let dir = match self.manifest.project.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Arc::new(GitClient::in_dir(self.runner.clone(), dir))
    }

    pub fn build_tool(&self) -> Arc<dyn BuildTool> {
        Arc::new(XcodeClient::new(self.runner.clone()))
    }

    /// Progress bars only outside CI
    pub fn show_progress(&self) -> bool {
        !self.env.is_ci()
    }

    fn atlassian(&self) -> Result<Arc<AtlassianClient>, PreconditionError> {
        let base_url = self.env.require(ATLASSIAN_BASE_URL)?;
        let username = self.env.require(ATLASSIAN_USERNAME)?;
        let token = self.env.require(ATLASSIAN_TOKEN)?;
        let client = AtlassianClient::new(self.http.clone(), base_url, username, token);
        self.redactor.redact(client.authorization());
        Ok(Arc::new(client))
    }

    fn jira(&self) -> Result<JiraTarget, PreconditionError> {
        let transition_id = self.env.require(JIRA_QA_COLUMN_ID)?.to_string();
        Ok(JiraTarget {
            tracker: self.atlassian()?,
            transition_id,
        })
    }

    fn confluence(&self) -> Result<ConfluenceTarget, PreconditionError> {
        let space_id = self.env.require(CONFLUENCE_RELEASE_NOTES_SPACE_ID)?.to_string();
        let parent_page_id = self
            .env
            .require(CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID)?
            .to_string();
        Ok(ConfluenceTarget {
            wiki: self.atlassian()?,
            space_id,
            parent_page_id,
        })
    }

    fn slack(&self) -> Result<Arc<dyn ChatClient>, PreconditionError> {
        let url = self.env.require(SLACK_WEBHOOK_URL)?;
        Ok(Arc::new(SlackWebhook::new(self.http.clone(), url)))
    }

    fn github(&self) -> Result<Arc<dyn PullRequestLookup>, PreconditionError> {
        let token = self.env.require(GITHUB_TOKEN)?;
        Ok(Arc::new(GitHubClient::new(self.http.clone(), token)))
    }

    fn build_numbers(&self) -> Result<Arc<dyn BuildNumberProvider>, PreconditionError> {
        let url = self.env.require(BUILD_NUMBER_API_URL)?;
        let token = self.env.require(BUILD_NUMBER_API_TOKEN)?;
        Ok(Arc::new(BuildNumberClient::new(self.http.clone(), url, token)))
    }

    /// API key credentials win over username and password
    fn altool(&self) -> Result<AltoolAuth, PreconditionError> {
        if let (Some(key), Some(issuer)) = (
            self.env.get(ALTOOL_API_KEY),
            self.env.get(ALTOOL_API_ISSUER),
        ) {
            return Ok(AltoolAuth::ApiKey {
                key: key.to_string(),
                issuer: issuer.to_string(),
            });
        }
        Ok(AltoolAuth::Password {
            username: self.env.require(ALTOOL_USERNAME)?.to_string(),
            password: self.env.require(ALTOOL_PASSWORD)?.to_string(),
        })
    }

    /// The distribution backend needs both the token and the owner
    fn app_center_owner(&self) -> Result<String, PreconditionError> {
        self.env.require(APPCENTER_API_TOKEN)?;
        Ok(self.env.require(APPCENTER_OWNER_NAME)?.to_string())
    }

    pub fn release_service(&self) -> Result<ReleaseService> {
        let git = self.git();
        let backend = AppCenterClient::new(
            self.http.clone(),
            self.env.get(APPCENTER_API_TOKEN).unwrap_or_default(),
        );
        let notifications = NotificationService::new(git.clone(), self.jira(), self.slack())
            .with_jira_base_url(self.env.get(ATLASSIAN_BASE_URL).map(str::to_string));
        let release_notes = ReleaseNotesService::new(self.confluence(), self.github());

        let uploads = UploadService::new(Arc::new(backend))
            .with_poll_policy(self.manifest.upload.poll_policy()?);

        let mut service = ReleaseService::new(
            git,
            self.build_tool(),
            uploads,
            notifications,
            release_notes,
        )
        .with_build_numbers(self.build_numbers())
        .with_app_center_owner(self.app_center_owner())
        .with_altool(self.altool())
        .with_progress(self.show_progress());
        if let Some(dir) = &self.manifest.temp_dir {
            service = service.with_temp_dir(dir);
        }
        Ok(service)
    }
}
