//! Centralized error types for flightdeck
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for a release run.
///
/// Every fatal failure of the pipeline surfaces as exactly one of these.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Tool invocation failed: {0}")]
    Tool(#[from] ToolError),

    #[error("Simulator error: {0}")]
    Simulator(#[from] SimulatorError),

    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Version control error: {0}")]
    Git(#[from] GitError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Conditions checked before anything is built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Uncommitted changes detected")]
    DirtyWorkingTree,

    #[error("Required environment variable missing: {0}")]
    MissingEnvironment(String),

    #[error("Branch '{0}' does not follow the <type>/<ticket>/<suffix> naming convention")]
    WrongBranchNamingConvention(String),

    #[error("Invalid release request: {0}")]
    InvalidRequest(String),
}

/// External tool (xcodebuild, xcrun, ditto) errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("`{command}` exited with code {}", describe_exit(.exit_code))]
    InvocationFailed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Output of `{command}` is not valid UTF-8")]
    OutputNotUtf8 { command: String },

    #[error("Unexpected output from `{command}`: {message}")]
    MalformedOutput { command: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "<signal>".to_string())
}

/// Simulator discovery errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("Unsupported platform '{platform}'. Supported platforms: {supported}")]
    UnsupportedPlatform { platform: String, supported: String },

    #[error("Non-integer version '{0}' is not supported")]
    UnsupportedVersion(String),

    #[error("No simulators found under devices key '{0}'")]
    NoSimulatorsForRuntime(String),
}

/// Project metadata (pbxproj) errors
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Target '{0}' not found in project")]
    TargetNotFound(String),

    #[error("Build configuration '{configuration}' not found for target '{target}'")]
    ConfigurationNotFound {
        target: String,
        configuration: String,
    },

    #[error("Target '{0}' has no build configurations to update")]
    NoBuildConfigurations(String),

    #[error("MARKETING_VERSION not set for target '{0}'")]
    VersionNotFound(String),

    #[error("CURRENT_PROJECT_VERSION not set for target '{0}'")]
    BuildNumberNotFound(String),

    #[error("CURRENT_PROJECT_VERSION '{0}' is not an integer")]
    BuildNumberNotInteger(String),

    #[error("Failed to parse project file at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("Project file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Distribution backend upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Release failed: {0}")]
    ReleaseFailed(String),

    #[error("Release not ready after {attempts} status checks (last status: {last_status})")]
    ReleaseTimeout { attempts: u32, last_status: String },

    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository")]
    NotARepository,

    #[error("Git command failed: {command}")]
    CommandFailed { command: String },

    #[error("Failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Issue tracker, chat, build-number and other auxiliary HTTP service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{service} returned {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Request to {service} failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Git(#[from] GitError),
}
