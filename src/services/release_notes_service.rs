//! Release notes - Confluence page for release branches, pull request link
//! for everything else

use std::sync::Arc;

use tracing::info;

use crate::domain::xml::escape;
use crate::domain::{GitBranch, GitHubRepo};
use crate::error::{PreconditionError, ServiceError};
use crate::infrastructure::atlassian::{NewPage, Wiki};
use crate::infrastructure::github::PullRequestLookup;

/// Confluence space and parent page release notes are created under
#[derive(Clone)]
pub struct ConfluenceTarget {
    pub wiki: Arc<dyn Wiki>,
    pub space_id: String,
    pub parent_page_id: String,
}

/// What the notes describe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNotesInput {
    /// `v<version> (<build>)`
    pub title: String,
    /// Flavour labels, comma separated
    pub environments: String,
    pub distribution_method: String,
    pub github: Option<GitHubRepo>,
}

pub struct ReleaseNotesService {
    confluence: Result<ConfluenceTarget, PreconditionError>,
    github: Result<Arc<dyn PullRequestLookup>, PreconditionError>,
}

impl ReleaseNotesService {
    pub fn new(
        confluence: Result<ConfluenceTarget, PreconditionError>,
        github: Result<Arc<dyn PullRequestLookup>, PreconditionError>,
    ) -> Self {
        Self { confluence, github }
    }

    /// Release branches cannot publish notes without a Confluence target.
    /// Checked before anything is built.
    pub fn check_ready(&self, branch: &GitBranch) -> Result<(), PreconditionError> {
        if branch.is_release() {
            self.confluence.as_ref().map_err(Clone::clone)?;
        }
        Ok(())
    }

    pub async fn publish(
        &self,
        branch: &GitBranch,
        input: &ReleaseNotesInput,
    ) -> Result<(), ServiceError> {
        info!("Preparing release notes...");

        if branch.is_release() {
            let confluence = self.confluence.as_ref().map_err(Clone::clone)?;
            let page = NewPage {
                space_id: confluence.space_id.clone(),
                parent_id: confluence.parent_page_id.clone(),
                title: input.title.clone(),
                storage: storage_content(branch, input),
            };
            let url = confluence.wiki.create_page(&page).await?;
            info!("Branch: {}\n{}", branch, url);
            return Ok(());
        }

        let Some(repo) = &input.github else {
            info!("No GitHub repository configured, skipping pull request lookup");
            return Ok(());
        };
        let github = self.github.as_ref().map_err(Clone::clone)?;
        let pull_requests = github
            .pull_requests(&repo.owner, &repo.repo, branch.name())
            .await?;
        match pull_requests.first() {
            Some(pr) => info!("Branch name: {}\n{}", branch, pr.html_url),
            None => info!("No pull request found."),
        }
        Ok(())
    }
}

/// Confluence storage format body
fn storage_content(branch: &GitBranch, input: &ReleaseNotesInput) -> String {
    [
        ("Branch", branch.name()),
        ("Environments", input.environments.as_str()),
        ("Distribution method", input.distribution_method.as_str()),
    ]
    .iter()
    .map(|(label, value)| format!("<p><strong>{}:</strong> {}</p>", label, escape(value)))
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::github::PullRequest;
    use crate::testing::{FakePullRequests, FakeWiki};

    fn input() -> ReleaseNotesInput {
        ReleaseNotesInput {
            title: "v1.2.0 (345)".to_string(),
            environments: "Live, Staging <QA>".to_string(),
            distribution_method: "App Store".to_string(),
            github: Some(GitHubRepo {
                owner: "example".to_string(),
                repo: "example-ios".to_string(),
            }),
        }
    }

    fn confluence(wiki: Arc<FakeWiki>) -> Result<ConfluenceTarget, PreconditionError> {
        Ok(ConfluenceTarget {
            wiki,
            space_id: "123".to_string(),
            parent_page_id: "678".to_string(),
        })
    }

    fn missing(name: &str) -> PreconditionError {
        PreconditionError::MissingEnvironment(name.to_string())
    }

    #[tokio::test]
    async fn test_release_branch_creates_page() {
        let wiki = Arc::new(FakeWiki::default());
        let service = ReleaseNotesService::new(confluence(wiki.clone()), Err(missing("GITHUB_TOKEN")));

        service
            .publish(&GitBranch::new("release/1.2.0/ios"), &input())
            .await
            .unwrap();

        let pages = wiki.pages.lock().unwrap().clone();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "v1.2.0 (345)");
        assert_eq!(pages[0].parent_id, "678");
        assert_eq!(
            pages[0].storage,
            "<p><strong>Branch:</strong> release/1.2.0/ios</p>\n\
             <p><strong>Environments:</strong> Live, Staging &lt;QA&gt;</p>\n\
             <p><strong>Distribution method:</strong> App Store</p>"
        );
    }

    #[tokio::test]
    async fn test_feature_branch_looks_up_pull_request() {
        let github = Arc::new(FakePullRequests {
            pull_requests: vec![PullRequest {
                id: 1,
                html_url: "https://github.com/example/example-ios/pull/1".to_string(),
            }],
            ..Default::default()
        });
        let service = ReleaseNotesService::new(
            Err(missing("CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID")),
            Ok(github.clone() as Arc<dyn PullRequestLookup>),
        );

        service
            .publish(&GitBranch::new("feature/PR-1/ios"), &input())
            .await
            .unwrap();

        assert_eq!(
            github.lookups.lock().unwrap().clone(),
            vec!["example/example-ios feature/PR-1/ios".to_string()]
        );
    }

    #[test]
    fn test_release_branch_requires_confluence() {
        let service = ReleaseNotesService::new(
            Err(missing("CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID")),
            Err(missing("GITHUB_TOKEN")),
        );
        assert_eq!(
            service.check_ready(&GitBranch::new("release/1.2.0/ios")),
            Err(missing("CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID"))
        );
        assert_eq!(service.check_ready(&GitBranch::new("feature/PR-1/ios")), Ok(()));
    }
}
