//! Atlassian Cloud: Jira issues and Confluence pages
//!
//! One client, basic auth with `user:token`, used through two traits so the
//! notification and release-notes services only see what they need.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::http::{failure, HttpClient};
use crate::domain::adf::Comment;
use crate::error::ServiceError;

const JIRA: &str = "Jira";
const CONFLUENCE: &str = "Confluence";

/// Issue tracker operations
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Site URL, used to build `/browse/<ticket>` links
    fn base_url(&self) -> &str;

    async fn transition(&self, ticket: &str, transition_id: &str) -> Result<(), ServiceError>;

    async fn comment(&self, ticket: &str, comment: &Comment) -> Result<(), ServiceError>;
}

/// A page to create in a Confluence space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub space_id: String,
    pub parent_id: String,
    pub title: String,
    /// Confluence storage format (XHTML)
    pub storage: String,
}

/// Wiki operations
#[async_trait]
pub trait Wiki: Send + Sync {
    /// Create a page and return its web URL
    async fn create_page(&self, page: &NewPage) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct TransitionBody<'a> {
    transition: TransitionId<'a>,
}

#[derive(Debug, Serialize)]
struct TransitionId<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageBody<'a> {
    space_id: &'a str,
    status: &'a str,
    title: &'a str,
    parent_id: &'a str,
    body: PageContent<'a>,
}

#[derive(Debug, Serialize)]
struct PageContent<'a> {
    representation: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(rename = "_links", default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    webui: Option<String>,
}

/// Jira and Confluence REST client
pub struct AtlassianClient {
    http: HttpClient,
    base_url: String,
    authorization: String,
}

impl AtlassianClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, username: &str, token: &str) -> Self {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, token));
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", credentials),
        }
    }

    /// Basic auth header value, registered with the redactor by callers
    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    async fn post<B: Serialize + Sync>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .send(
                self.http
                    .inner()
                    .post(&url)
                    .header("Authorization", &self.authorization)
                    .json(body),
            )
            .await
            .map_err(|source| ServiceError::Transport { service, source })?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(ServiceError::Http {
                service,
                status,
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl IssueTracker for AtlassianClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn transition(&self, ticket: &str, transition_id: &str) -> Result<(), ServiceError> {
        let path = format!(
            "/rest/api/3/issue/{}/transitions?expand=transitions.fields",
            urlencoding::encode(ticket)
        );
        let body = TransitionBody {
            transition: TransitionId { id: transition_id },
        };
        self.post(JIRA, &path, &body).await?;
        Ok(())
    }

    async fn comment(&self, ticket: &str, comment: &Comment) -> Result<(), ServiceError> {
        let path = format!("/rest/api/3/issue/{}/comment", urlencoding::encode(ticket));
        self.post(JIRA, &path, comment).await?;
        Ok(())
    }
}

#[async_trait]
impl Wiki for AtlassianClient {
    async fn create_page(&self, page: &NewPage) -> Result<String, ServiceError> {
        let body = PageBody {
            space_id: &page.space_id,
            status: "current",
            title: &page.title,
            parent_id: &page.parent_id,
            body: PageContent {
                representation: "storage",
                value: &page.storage,
            },
        };
        let response = self.post(CONFLUENCE, "/wiki/api/v2/pages", &body).await?;
        let text = response
            .text()
            .await
            .map_err(|source| ServiceError::Transport {
                service: CONFLUENCE,
                source,
            })?;
        let links = serde_json::from_str::<PageResponse>(&text)
            .map(|r| r.links)
            .unwrap_or_default();
        Ok(page_url(&self.base_url, &links))
    }
}

fn page_url(base_url: &str, links: &PageLinks) -> String {
    let base = links
        .base
        .clone()
        .unwrap_or_else(|| format!("{}/wiki", base_url));
    format!("{}{}", base, links.webui.as_deref().unwrap_or_default())
}
