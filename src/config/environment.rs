//! Environment settings
//!
//! Credentials and service endpoints come from the process environment. All
//! of them are optional at load time; each stage asks for what it needs with
//! [`EnvironmentSettings::require`], which treats blank values as missing.

use std::collections::HashMap;

use crate::error::PreconditionError;

pub const APPCENTER_OWNER_NAME: &str = "APPCENTER_OWNER_NAME";
pub const APPCENTER_API_TOKEN: &str = "APPCENTER_API_TOKEN";
pub const ALTOOL_USERNAME: &str = "ALTOOL_USERNAME";
pub const ALTOOL_PASSWORD: &str = "ALTOOL_PASSWORD";
pub const ALTOOL_API_KEY: &str = "ALTOOL_API_KEY";
pub const ALTOOL_API_ISSUER: &str = "ALTOOL_API_ISSUER";
pub const JIRA_QA_COLUMN_ID: &str = "JIRA_QA_COLUMN_ID";
pub const ATLASSIAN_USERNAME: &str = "ATLASSIAN_USERNAME";
pub const ATLASSIAN_TOKEN: &str = "ATLASSIAN_TOKEN";
pub const ATLASSIAN_BASE_URL: &str = "ATLASSIAN_BASE_URL";
pub const CONFLUENCE_RELEASE_NOTES_SPACE_ID: &str = "CONFLUENCE_RELEASE_NOTES_SPACE_ID";
pub const CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID: &str = "CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID";
pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const BUILD_NUMBER_API_URL: &str = "BUILD_NUMBER_API_URL";
pub const BUILD_NUMBER_API_TOKEN: &str = "BUILD_NUMBER_API_TOKEN";
pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const CI: &str = "CI";

const KNOWN: &[&str] = &[
    APPCENTER_OWNER_NAME,
    APPCENTER_API_TOKEN,
    ALTOOL_USERNAME,
    ALTOOL_PASSWORD,
    ALTOOL_API_KEY,
    ALTOOL_API_ISSUER,
    JIRA_QA_COLUMN_ID,
    ATLASSIAN_USERNAME,
    ATLASSIAN_TOKEN,
    ATLASSIAN_BASE_URL,
    CONFLUENCE_RELEASE_NOTES_SPACE_ID,
    CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID,
    SLACK_WEBHOOK_URL,
    BUILD_NUMBER_API_URL,
    BUILD_NUMBER_API_TOKEN,
    GITHUB_TOKEN,
    CI,
];

/// Values that must never reach the log output
pub const SECRETS: &[&str] = &[
    APPCENTER_API_TOKEN,
    ALTOOL_PASSWORD,
    ALTOOL_API_KEY,
    ATLASSIAN_TOKEN,
    SLACK_WEBHOOK_URL,
    BUILD_NUMBER_API_TOKEN,
    GITHUB_TOKEN,
];

/// Snapshot of the environment variables flightdeck reads
#[derive(Debug, Clone, Default)]
pub struct EnvironmentSettings {
    values: HashMap<String, String>,
}

impl EnvironmentSettings {
    pub fn from_env() -> Self {
        let values = KNOWN
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::from_map(values)
    }

    /// Build from an explicit map. Blank values are dropped.
    pub fn from_map(values: HashMap<String, String>) -> Self {
        let values = values
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, PreconditionError> {
        self.get(name)
            .ok_or_else(|| PreconditionError::MissingEnvironment(name.to_string()))
    }

    /// Running under CI; progress bars are hidden
    pub fn is_ci(&self) -> bool {
        matches!(self.get(CI), Some(v) if v != "0" && !v.eq_ignore_ascii_case("false"))
    }

    /// Secret values currently set, for registration with the redactor
    pub fn secret_values(&self) -> impl Iterator<Item = &str> {
        SECRETS.iter().filter_map(|key| self.get(key))
    }
}
