//! GitHub pull request lookup

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{failure, HttpClient};
use crate::error::ServiceError;

const GITHUB: &str = "GitHub";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub html_url: String,
}

#[async_trait]
pub trait PullRequestLookup: Send + Sync {
    /// Open pull requests whose head is `owner:branch`
    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<PullRequest>, ServiceError>;
}

pub struct GitHubClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(http: HttpClient, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
        }
    }
}

fn pulls_url(base_url: &str, owner: &str, repo: &str, branch: &str) -> String {
    format!(
        "{}/repos/{}/{}/pulls?head={}",
        base_url,
        owner,
        repo,
        urlencoding::encode(&format!("{}:{}", owner, branch))
    )
}

#[async_trait]
impl PullRequestLookup for GitHubClient {
    async fn pull_requests(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<PullRequest>, ServiceError> {
        let url = pulls_url(&self.base_url, owner, repo, branch);
        let transport = |source| ServiceError::Transport {
            service: GITHUB,
            source,
        };

        let response = self
            .http
            .send(
                self.http
                    .inner()
                    .get(&url)
                    .header("Authorization", format!("token {}", self.token))
                    .header("Accept", "application/vnd.github+json")
                    .header("User-Agent", concat!("flightdeck/", env!("CARGO_PKG_VERSION"))),
            )
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(ServiceError::Http {
                service: GITHUB,
                status,
                body,
            });
        }

        response.json().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulls_url_encodes_head() {
        assert_eq!(
            pulls_url(DEFAULT_API_URL, "example", "example-ios", "feature/PR-1/ios"),
            "https://api.github.com/repos/example/example-ios/pulls?head=example%3Afeature%2FPR-1%2Fios"
        );
    }
}
