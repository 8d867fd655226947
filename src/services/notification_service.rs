//! Notification service - Jira ticket updates and Slack build summaries
//!
//! Both calls are independent and best-effort from the pipeline's point of
//! view: the orchestrator records their failures instead of aborting.

use std::sync::Arc;

use tracing::info;

use crate::domain::adf::{Comment, Node};
use crate::domain::slack::{build_summary_message, INSTALL_INSTRUCTION};
use crate::domain::{ExportMethod, InstallLink};
use crate::error::{PreconditionError, ServiceError};
use crate::infrastructure::atlassian::IssueTracker;
use crate::infrastructure::git::VersionControl;
use crate::infrastructure::slack::ChatClient;

/// Jira client plus the transition that moves a ticket to QA
#[derive(Clone)]
pub struct JiraTarget {
    pub tracker: Arc<dyn IssueTracker>,
    pub transition_id: String,
}

/// What happened on the Jira side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JiraUpdate {
    /// Release branches have no ticket
    SkippedReleaseBranch,
    Updated { ticket: String, comments: usize },
}

/// Service for posting release notifications
pub struct NotificationService {
    git: Arc<dyn VersionControl>,
    jira: Result<JiraTarget, PreconditionError>,
    jira_base_url: Option<String>,
    chat: Result<Arc<dyn ChatClient>, PreconditionError>,
}

impl NotificationService {
    /// Unconfigured targets are given as the precondition that is missing
    pub fn new(
        git: Arc<dyn VersionControl>,
        jira: Result<JiraTarget, PreconditionError>,
        chat: Result<Arc<dyn ChatClient>, PreconditionError>,
    ) -> Self {
        let jira_base_url = jira
            .as_ref()
            .ok()
            .map(|target| target.tracker.base_url().to_string());
        Self {
            git,
            jira,
            jira_base_url,
            chat,
        }
    }

    /// Base URL for Slack's Jira link when Jira itself is not configured
    pub fn with_jira_base_url(mut self, base_url: Option<String>) -> Self {
        if self.jira_base_url.is_none() {
            self.jira_base_url = base_url;
        }
        self
    }

    /// Move the branch's ticket to QA and comment with the build details
    pub async fn update_jira(
        &self,
        summary: &str,
        links: &[InstallLink],
    ) -> Result<JiraUpdate, ServiceError> {
        let jira = self.jira.as_ref().map_err(Clone::clone)?;
        info!("Updating Jira...");

        let branch = self.git.current_branch().await?;
        if branch.is_release() {
            info!("{} is a release branch, no ticket to update", branch);
            return Ok(JiraUpdate::SkippedReleaseBranch);
        }
        let ticket = branch.ticket()?;

        jira.tracker.transition(ticket, &jira.transition_id).await?;
        info!("{} status updated to 'In QA'", ticket);

        let comments = jira_comments(summary, links);
        for comment in &comments {
            jira.tracker.comment(ticket, comment).await?;
        }
        info!("Comment with build details added to {}", ticket);

        Ok(JiraUpdate::Updated {
            ticket: ticket.to_string(),
            comments: comments.len(),
        })
    }

    /// Post the build summary with install links to Slack
    pub async fn post_slack_summary(
        &self,
        summary: &str,
        method: ExportMethod,
        links: &[InstallLink],
    ) -> Result<(), ServiceError> {
        let chat = self.chat.as_ref().map_err(Clone::clone)?;
        info!("Slacking build summary...");

        let branch = self.git.current_branch().await.ok();
        let ticket = branch
            .as_ref()
            .filter(|b| !b.is_release())
            .and_then(|b| b.ticket().ok());
        let jira = match (self.jira_base_url.as_deref(), ticket) {
            (Some(base_url), Some(ticket)) => Some((base_url, ticket)),
            _ => None,
        };

        let message = build_summary_message(summary, method, links, jira);
        chat.post(&message).await
    }
}

/// One summary comment without links, otherwise one comment per install link
pub fn jira_comments(summary: &str, links: &[InstallLink]) -> Vec<Comment> {
    if links.is_empty() {
        return vec![Comment::new(vec![Node::paragraph(vec![Node::text(
            summary,
        )])])];
    }

    links
        .iter()
        .map(|link| {
            Comment::new(vec![
                Node::paragraph(vec![Node::text(summary)]),
                Node::paragraph(vec![Node::emphasis(INSTALL_INSTRUCTION)]),
                Node::paragraph(vec![Node::link(
                    &link.flavour.label_including_release,
                    &link.url,
                )]),
            ])
        })
        .collect()
}
