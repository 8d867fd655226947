//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Process execution (xcodebuild, xcrun, ditto, git)
//! - Xcode project metadata and simulators
//! - App Center distribution backend
//! - Atlassian (Jira, Confluence)
//! - Slack webhook
//! - Build-number service and GitHub
//!
//! Each external system sits behind a trait so services can be tested with
//! in-memory fakes.

pub mod appcenter;
pub mod atlassian;
pub mod build_number;
pub mod git;
pub mod github;
pub mod http;
pub mod process;
pub mod slack;
pub mod xcode;

// Re-export commonly used types
pub use appcenter::AppCenterClient;
pub use atlassian::AtlassianClient;
pub use build_number::{BuildNumberClient, BuildNumberProvider};
pub use git::{GitClient, VersionControl};
pub use github::{GitHubClient, PullRequestLookup};
pub use http::{HttpClient, HttpSettings};
pub use process::ProcessRunner;
pub use slack::{ChatClient, SlackWebhook};
pub use xcode::{AltoolAuth, BuildTool, XcodeClient};
