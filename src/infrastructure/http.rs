//! Shared HTTP plumbing for the service adapters
//!
//! Every adapter owns an [`HttpClient`], built from [`HttpSettings`]. When
//! `log_requests` is on, each request is logged before it is sent: method,
//! URL, headers (credentials masked) and body.

use std::time::Duration;

use reqwest::{Client, Request, RequestBuilder, Response};
use tracing::info;

use crate::redact::REDACTED;

/// Headers whose values are never logged
const SENSITIVE_HEADERS: &[&str] = &["authorization", "x-api-token"];

/// HTTP behaviour shared by all adapters
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Log every outgoing request
    pub log_requests: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            log_requests: false,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSettings {
    pub fn with_log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }
}

/// reqwest client plus request logging
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    settings: HttpSettings,
}

impl HttpClient {
    pub fn new(settings: HttpSettings) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Build, log and send
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let request = builder.build()?;
        if self.settings.log_requests {
            for line in describe(&request) {
                info!("{}", line);
            }
        }
        self.client.execute(request).await
    }
}

fn describe(request: &Request) -> Vec<String> {
    let mut lines = vec![format!("{} {}", request.method(), request.url())];

    if request.headers().is_empty() {
        lines.push(" No Headers".to_string());
    }
    for (name, value) in request.headers() {
        let value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        lines.push(format!(" {}={}", name, value));
    }

    match request.body().and_then(|b| b.as_bytes()) {
        Some(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => lines.push(format!(" Body UTF-8: {}", text)),
            Err(_) => lines.push(format!(" Body size: {}", bytes.len())),
        },
        None => lines.push(" No Body".to_string()),
    }
    lines
}

/// Status and body text of a failed response
pub async fn failure(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_masks_credentials() {
        let client = Client::new();
        let request = client
            .post("https://api.example.com/v0.1/apps/org/app/uploads/releases")
            .header("X-API-Token", "secret-token")
            .header("Accept", "application/json")
            .body("{}")
            .build()
            .unwrap();

        let lines = describe(&request);
        assert_eq!(
            lines[0],
            "POST https://api.example.com/v0.1/apps/org/app/uploads/releases"
        );
        assert!(lines.contains(&" x-api-token=[REDACTED]".to_string()));
        assert!(lines.contains(&" accept=application/json".to_string()));
        assert!(lines.contains(&" Body UTF-8: {}".to_string()));
        assert!(!lines.iter().any(|l| l.contains("secret-token")));
    }

    #[test]
    fn test_describe_binary_body() {
        let request = Client::new()
            .post("https://upload.example.com/upload/upload_chunk/1")
            .body(vec![0xff, 0xfe, 0x00])
            .build()
            .unwrap();
        let lines = describe(&request);
        assert_eq!(lines.last().unwrap(), " Body size: 3");
    }
}
