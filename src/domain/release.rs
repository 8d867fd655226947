//! Release domain types
//!
//! A release is described by an immutable [`ReleaseRequest`], validated when
//! it is built, and executed as a sequence of [`ReleaseStep`]s whose outcomes
//! are collected into a [`ReleaseReport`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::export::{ExportMethod, Thinning};
use super::flavour::{AppFlavour, FlavourProfile};
use crate::error::PreconditionError;

/// Individual steps in a release workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStep {
    /// Run unit tests on simulators
    Test,
    /// Fetch or accept the build number and write it into the project
    BuildNumber,
    /// Publish release notes or look up the pull request
    ReleaseNotes,
    /// Commit and push the version bump
    Commit,
    /// Build the scheme for a generic device
    Build,
    /// Archive the scheme
    Archive,
    /// Upload debug symbols
    Symbols,
    /// Export the archive to an ipa
    Export,
    /// Upload the binary to the distribution backend or App Store
    Deploy,
    /// Transition and comment on the Jira ticket
    Jira,
    /// Post the build summary to Slack
    Slack,
}

impl ReleaseStep {
    /// Get human-readable name for the step
    pub fn name(&self) -> &'static str {
        match self {
            Self::Test => "Test",
            Self::BuildNumber => "Build Number",
            Self::ReleaseNotes => "Release Notes",
            Self::Commit => "Commit",
            Self::Build => "Build",
            Self::Archive => "Archive",
            Self::Symbols => "Symbols",
            Self::Export => "Export",
            Self::Deploy => "Deploy",
            Self::Jira => "Jira",
            Self::Slack => "Slack",
        }
    }

    /// Get emoji for the step
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Test => "🧪",
            Self::BuildNumber => "🔢",
            Self::ReleaseNotes => "📝",
            Self::Commit => "📌",
            Self::Build => "🔨",
            Self::Archive => "📦",
            Self::Symbols => "🐛",
            Self::Export => "📤",
            Self::Deploy => "🚀",
            Self::Jira => "🎫",
            Self::Slack => "💬",
        }
    }
}

/// Where the build number comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildNumberSource {
    /// Ask the build-number service for the next number of this counter
    Fetch { number_id: String },
    /// Use the given number
    Local(u64),
    /// Keep the number already in the project
    Current,
}

/// Stages to leave out of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipFlags {
    pub test: bool,
    pub deploy: bool,
    pub jira: bool,
    pub slack: bool,
}

/// Project container the schemes are built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeLocation {
    Project(PathBuf),
    Workspace(PathBuf),
}

impl SchemeLocation {
    /// `-project <path>` or `-workspace <path>`
    pub fn xcodebuild_args(&self) -> [String; 2] {
        match self {
            Self::Project(path) => ["-project".to_string(), path.display().to_string()],
            Self::Workspace(path) => ["-workspace".to_string(), path.display().to_string()],
        }
    }
}

/// Test stage parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub scheme: String,
    pub simulator_runtimes: Vec<String>,
    pub preferred_simulator_names: Vec<String>,
    /// Coverage target, e.g. `Example.app`
    pub coverage_target: String,
}

/// GitHub repository used to look up pull requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

/// Immutable description of one release run
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    project: PathBuf,
    scheme_location: SchemeLocation,
    target: String,
    configuration: String,
    bundle_display_name: String,
    base_bundle_id: String,
    team_id: String,
    export_method: ExportMethod,
    thinning: Thinning,
    flavours: Vec<FlavourProfile>,
    build_number: BuildNumberSource,
    output_dir: PathBuf,
    test_plan: TestPlan,
    build_job_info: Option<String>,
    github: Option<GitHubRepo>,
    skip: SkipFlags,
}

impl ReleaseRequest {
    pub fn builder(
        project: impl Into<PathBuf>,
        target: impl Into<String>,
        export_method: ExportMethod,
    ) -> ReleaseRequestBuilder {
        ReleaseRequestBuilder::new(project, target, export_method)
    }

    /// `.xcodeproj` holding the version metadata
    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn scheme_location(&self) -> &SchemeLocation {
        &self.scheme_location
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Build configuration the version is read from and archives are built with
    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    pub fn bundle_display_name(&self) -> &str {
        &self.bundle_display_name
    }

    pub fn base_bundle_id(&self) -> &str {
        &self.base_bundle_id
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn export_method(&self) -> ExportMethod {
        self.export_method
    }

    pub fn thinning(&self) -> &Thinning {
        &self.thinning
    }

    pub fn flavours(&self) -> &[FlavourProfile] {
        &self.flavours
    }

    pub fn build_number(&self) -> &BuildNumberSource {
        &self.build_number
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn test_plan(&self) -> &TestPlan {
        &self.test_plan
    }

    pub fn build_job_info(&self) -> Option<&str> {
        self.build_job_info.as_deref()
    }

    pub fn github(&self) -> Option<&GitHubRepo> {
        self.github.as_ref()
    }

    pub fn skip(&self) -> SkipFlags {
        self.skip
    }

    /// Labels of all flavours, joined for summaries
    pub fn flavour_labels(&self) -> String {
        self.flavours
            .iter()
            .map(|p| p.flavour.label_including_release.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Builder for [`ReleaseRequest`]. `build()` validates every field at once.
#[derive(Debug, Clone)]
pub struct ReleaseRequestBuilder {
    project: PathBuf,
    workspace: Option<PathBuf>,
    target: String,
    configuration: String,
    bundle_display_name: String,
    base_bundle_id: String,
    team_id: String,
    export_method: ExportMethod,
    thinning: Thinning,
    flavours: Vec<FlavourProfile>,
    build_number: BuildNumberSource,
    output_dir: PathBuf,
    test_plan: TestPlan,
    build_job_info: Option<String>,
    github: Option<GitHubRepo>,
    skip: SkipFlags,
}

impl ReleaseRequestBuilder {
    fn new(
        project: impl Into<PathBuf>,
        target: impl Into<String>,
        export_method: ExportMethod,
    ) -> Self {
        let target = target.into();
        Self {
            project: project.into(),
            workspace: None,
            configuration: "Release".to_string(),
            bundle_display_name: target.clone(),
            base_bundle_id: String::new(),
            team_id: String::new(),
            export_method,
            thinning: Thinning::None,
            flavours: Vec::new(),
            build_number: BuildNumberSource::Current,
            output_dir: PathBuf::from("build"),
            test_plan: TestPlan {
                scheme: target.clone(),
                simulator_runtimes: Vec::new(),
                preferred_simulator_names: Vec::new(),
                coverage_target: format!("{}.app", target),
            },
            build_job_info: None,
            github: None,
            skip: SkipFlags::default(),
            target,
        }
    }

    /// Builder: build schemes from a workspace instead of the project
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Builder: set build configuration
    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = configuration.into();
        self
    }

    /// Builder: set the product name used for the exported ipa
    pub fn with_bundle_display_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_display_name = name.into();
        self
    }

    /// Builder: set signing identity
    pub fn with_signing(mut self, base_bundle_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        self.base_bundle_id = base_bundle_id.into();
        self.team_id = team_id.into();
        self
    }

    /// Builder: set thinning
    pub fn with_thinning(mut self, thinning: Thinning) -> Self {
        self.thinning = thinning;
        self
    }

    /// Builder: set flavours
    pub fn with_flavours(mut self, flavours: Vec<FlavourProfile>) -> Self {
        self.flavours = flavours;
        self
    }

    /// Builder: set build number source
    pub fn with_build_number(mut self, source: BuildNumberSource) -> Self {
        self.build_number = source;
        self
    }

    /// Builder: set output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder: set test stage parameters
    pub fn with_test_plan(mut self, plan: TestPlan) -> Self {
        self.test_plan = plan;
        self
    }

    /// Builder: set CI job description appended to the version bump commit
    pub fn with_build_job_info(mut self, info: Option<String>) -> Self {
        self.build_job_info = info.filter(|i| !i.trim().is_empty());
        self
    }

    /// Builder: set GitHub repository
    pub fn with_github(mut self, github: Option<GitHubRepo>) -> Self {
        self.github = github;
        self
    }

    /// Builder: set skip flags
    pub fn with_skip(mut self, skip: SkipFlags) -> Self {
        self.skip = skip;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.project.as_os_str().is_empty() {
            errors.push("Project path is required".to_string());
        }
        if self.target.trim().is_empty() {
            errors.push("Target is required".to_string());
        }
        if self.configuration.trim().is_empty() {
            errors.push("Build configuration is required".to_string());
        }
        if self.bundle_display_name.trim().is_empty() {
            errors.push("Bundle display name is required".to_string());
        }
        if self.flavours.is_empty() {
            errors.push("At least one flavour is required".to_string());
        }
        for profile in &self.flavours {
            if profile.flavour.name.trim().is_empty() {
                errors.push("Flavour name is required".to_string());
            }
            if profile.flavour.label_including_release.trim().is_empty() {
                errors.push(format!(
                    "Flavour '{}' needs a label including the release stage",
                    profile.flavour.name
                ));
            }
            let needs_app_name = self.export_method.uses_distribution_backend() && !self.skip.deploy;
            if needs_app_name && profile.app_center_app_name.is_none() {
                errors.push(format!(
                    "Flavour '{}' needs an App Center app name for {} builds",
                    profile.flavour.name, self.export_method
                ));
            }
            let needs_apple_id = self.export_method == ExportMethod::AppStore && !self.skip.deploy;
            if needs_apple_id && profile.app_apple_id.is_none() {
                errors.push(format!(
                    "Flavour '{}' needs an App Store Apple id for app-store builds",
                    profile.flavour.name
                ));
            }
        }
        if let BuildNumberSource::Fetch { number_id } = &self.build_number {
            if number_id.trim().is_empty() {
                errors.push("Build number id is required when fetching".to_string());
            }
        }
        if !self.skip.test {
            if self.test_plan.scheme.trim().is_empty() {
                errors.push("Test scheme is required".to_string());
            }
            if self.test_plan.simulator_runtimes.is_empty() {
                errors.push("At least one simulator runtime is required for tests".to_string());
            }
        }
        if let Some(github) = &self.github {
            if github.owner.trim().is_empty() || github.repo.trim().is_empty() {
                errors.push("GitHub owner and repo must both be set".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and freeze. Development builds never touch Jira.
    pub fn build(self) -> Result<ReleaseRequest, PreconditionError> {
        self.validate()
            .map_err(|errors| PreconditionError::InvalidRequest(errors.join("; ")))?;

        let mut skip = self.skip;
        if self.export_method == ExportMethod::Development {
            skip.jira = true;
        }
        let scheme_location = match self.workspace {
            Some(workspace) => SchemeLocation::Workspace(workspace),
            None => SchemeLocation::Project(self.project.clone()),
        };

        Ok(ReleaseRequest {
            project: self.project,
            scheme_location,
            target: self.target,
            configuration: self.configuration,
            bundle_display_name: self.bundle_display_name,
            base_bundle_id: self.base_bundle_id,
            team_id: self.team_id,
            export_method: self.export_method,
            thinning: self.thinning,
            flavours: self.flavours,
            build_number: self.build_number,
            output_dir: self.output_dir,
            test_plan: self.test_plan,
            build_job_info: self.build_job_info,
            github: self.github,
            skip,
        })
    }
}

/// Result of a release step execution
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: ReleaseStep,
    /// Flavour the step ran for, if it is per flavour
    pub flavour: Option<String>,
    pub success: bool,
    pub duration: Duration,
    pub message: Option<String>,
}

impl StepResult {
    pub fn success(step: ReleaseStep, duration: Duration) -> Self {
        Self {
            step,
            flavour: None,
            success: true,
            duration,
            message: None,
        }
    }

    pub fn failure(step: ReleaseStep, duration: Duration, message: impl Into<String>) -> Self {
        Self {
            step,
            flavour: None,
            success: false,
            duration,
            message: Some(message.into()),
        }
    }

    pub fn for_flavour(mut self, flavour: &AppFlavour) -> Self {
        self.flavour = Some(flavour.name.clone());
        self
    }
}

/// Install link produced by a distribution backend upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLink {
    pub flavour: AppFlavour,
    pub url: String,
}

/// Outcome of a completed run. Best-effort failures are recorded, not raised.
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub version: String,
    pub build_number: u64,
    pub steps: Vec<StepResult>,
    pub install_links: Vec<InstallLink>,
    pub summary: Option<String>,
}

impl ReleaseReport {
    pub fn new(run_id: Uuid, version: impl Into<String>, build_number: u64) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            version: version.into(),
            build_number,
            steps: Vec::new(),
            install_links: Vec::new(),
            summary: None,
        }
    }

    pub fn record(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| !s.success)
    }

    #[cfg(test)]
    pub fn ran(&self, step: ReleaseStep) -> bool {
        self.steps.iter().any(|s| s.step == step)
    }
}

/// One-line description of a finished deploy
pub fn build_summary(method: ExportMethod, version: &str, build_number: u64, labels: &str) -> String {
    format!(
        "{} build v{} ({}) for {} uploaded to {}",
        method.display_text(),
        version,
        build_number,
        labels,
        method.install_provider()
    )
}

/// Subject of the version bump commit and title of the release notes page
pub fn version_title(version: &str, build_number: u64) -> String {
    format!("v{} ({})", version, build_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> FlavourProfile {
        let mut profile = FlavourProfile::new(AppFlavour::new(
            name,
            "",
            name,
            format!("{} (Beta)", name),
        ));
        profile.app_center_app_name = Some(format!("example-{}", name.to_lowercase()));
        profile.app_apple_id = Some("123456".to_string());
        profile
    }

    fn builder(method: ExportMethod) -> ReleaseRequestBuilder {
        ReleaseRequest::builder("Example.xcodeproj", "Example", method)
            .with_flavours(vec![profile("Live"), profile("Staging")])
            .with_skip(SkipFlags {
                test: true,
                ..Default::default()
            })
    }

    #[test]
    fn test_release_request_builder() {
        let request = builder(ExportMethod::AdHoc)
            .with_workspace("Example.xcworkspace")
            .with_build_number(BuildNumberSource::Fetch {
                number_id: "example-ios".to_string(),
            })
            .build()
            .unwrap();

        assert_eq!(request.target(), "Example");
        assert_eq!(
            request.scheme_location(),
            &SchemeLocation::Workspace(PathBuf::from("Example.xcworkspace"))
        );
        assert_eq!(request.project(), Path::new("Example.xcodeproj"));
        assert_eq!(request.flavour_labels(), "Live (Beta), Staging (Beta)");
    }

    #[test]
    fn test_release_request_validation() {
        let result = ReleaseRequest::builder("Example.xcodeproj", "", ExportMethod::AdHoc)
            .with_bundle_display_name("Example")
            .with_build_number(BuildNumberSource::Fetch {
                number_id: " ".to_string(),
            })
            .build();

        let PreconditionError::InvalidRequest(message) = result.unwrap_err() else {
            panic!("expected InvalidRequest");
        };
        assert!(message.contains("Target is required"));
        assert!(message.contains("At least one flavour"));
        assert!(message.contains("Build number id"));
        assert!(message.contains("simulator runtime"));
    }

    #[test]
    fn test_distribution_backend_needs_app_name() {
        let mut bare = profile("Live");
        bare.app_center_app_name = None;
        let errors = builder(ExportMethod::Enterprise)
            .with_flavours(vec![bare])
            .validate()
            .unwrap_err();
        assert!(errors.iter().any(|e| e.contains("App Center app name")));
    }

    #[test]
    fn test_development_forces_skip_jira() {
        let request = builder(ExportMethod::Development).build().unwrap();
        assert!(request.skip().jira);
        assert!(!request.skip().slack);

        let request = builder(ExportMethod::AdHoc).build().unwrap();
        assert!(!request.skip().jira);
    }

    #[test]
    fn test_build_summary() {
        assert_eq!(
            build_summary(ExportMethod::AdHoc, "2.4.0", 812, "Live (Beta), Staging (Beta)"),
            "Ad hoc build v2.4.0 (812) for Live (Beta), Staging (Beta) uploaded to AppCenter"
        );
        assert_eq!(version_title("2.4.0", 812), "v2.4.0 (812)");
    }
}
