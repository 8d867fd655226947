//! Build-number service
//!
//! Hands out monotonically increasing build numbers per counter id:
//! `POST <base>/number/next` with form field `number_id`, answered with a
//! bare JSON integer.

use async_trait::async_trait;

use super::http::{failure, HttpClient};
use crate::error::ServiceError;

const BUILD_NUMBER: &str = "Build number service";

#[async_trait]
pub trait BuildNumberProvider: Send + Sync {
    async fn next_build_number(&self, number_id: &str) -> Result<u64, ServiceError>;
}

pub struct BuildNumberClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl BuildNumberClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl BuildNumberProvider for BuildNumberClient {
    async fn next_build_number(&self, number_id: &str) -> Result<u64, ServiceError> {
        let url = format!("{}/number/next", self.base_url);
        let transport = |source| ServiceError::Transport {
            service: BUILD_NUMBER,
            source,
        };

        let response = self
            .http
            .send(
                self.http
                    .inner()
                    .post(&url)
                    .header("Authorization", &self.token)
                    .form(&[("number_id", number_id)]),
            )
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let (status, body) = failure(response).await;
            return Err(ServiceError::Http {
                service: BUILD_NUMBER,
                status,
                body,
            });
        }

        let body = response.text().await.map_err(transport)?;
        parse_build_number(&body).ok_or_else(|| ServiceError::Http {
            service: BUILD_NUMBER,
            status: 200,
            body: format!("expected an integer, got '{}'", body.trim()),
        })
    }
}

fn parse_build_number(body: &str) -> Option<u64> {
    serde_json::from_str::<u64>(body.trim()).ok()
}
