//! Git operations
//!
//! Handles the repository checks and mutations a release needs: clean-tree
//! precondition, current branch, version bump commit and push.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::process::{Invocation, ProcessRunner};
use crate::domain::GitBranch;
use crate::error::{GitError, ToolError};
use crate::tools::{get_tool_path, tools};

/// Version control operations used by the release pipeline
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// No uncommitted changes to tracked files
    async fn is_clean(&self) -> Result<bool, GitError>;

    async fn current_branch(&self) -> Result<GitBranch, GitError>;

    /// Commit all tracked changes
    async fn commit(&self, subject: &str, body: Option<&str>) -> Result<(), GitError>;

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;
}

/// Client for git operations
pub struct GitClient {
    runner: ProcessRunner,
    /// Working directory for git commands
    working_dir: PathBuf,
}

impl GitClient {
    /// Create a git client for the repository containing `path`
    pub fn in_dir(runner: ProcessRunner, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            working_dir: path.into(),
        }
    }

    fn git<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(get_tool_path(tools::GIT))
            .args(args)
            .current_dir(self.working_dir.clone())
    }

    async fn capture(&self, invocation: Invocation) -> Result<String, GitError> {
        self.runner
            .capture(&invocation)
            .await
            .map_err(|e| map_tool_error(&invocation, e))
    }

    async fn stream(&self, invocation: Invocation) -> Result<(), GitError> {
        self.runner
            .stream(&invocation)
            .await
            .map_err(|e| map_tool_error(&invocation, e))
    }
}

fn map_tool_error(invocation: &Invocation, err: ToolError) -> GitError {
    match err {
        ToolError::Spawn { source, .. } => GitError::Io(source),
        ToolError::Io(source) => GitError::Io(source),
        _ => GitError::CommandFailed {
            command: invocation.display(),
        },
    }
}

#[async_trait]
impl VersionControl for GitClient {
    async fn is_clean(&self) -> Result<bool, GitError> {
        let status = self.capture(self.git(["status", "--porcelain", "--untracked-files=no"])).await;
        match status {
            Ok(output) => Ok(output.trim().is_empty()),
            Err(GitError::CommandFailed { .. }) => Err(GitError::NotARepository),
            Err(e) => Err(e),
        }
    }

    async fn current_branch(&self) -> Result<GitBranch, GitError> {
        let name = self.capture(self.git(["branch", "--show-current"])).await?;
        Ok(GitBranch::new(name.trim()))
    }

    async fn commit(&self, subject: &str, body: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["commit".to_string(), "-a".to_string(), "-m".to_string(), subject.to_string()];
        if let Some(body) = body {
            args.push("-m".to_string());
            args.push(body.to_string());
        }
        self.stream(self.git(args)).await?;
        info!("Committed \"{}\"", subject);
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.stream(self.git(["push", remote, branch])).await?;
        info!("Pushed {} to {}", branch, remote);
        Ok(())
    }
}
