//! Release manifest (`flightdeck.yaml`).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{
    AppFlavour, BuildNumberSource, ExportMethod, FlavourProfile, GitHubRepo, ReleaseRequest,
    SchemeLocation, SkipFlags, TestPlan, Thinning,
};
use crate::error::PreconditionError;
use crate::services::upload_service::PollPolicy;

/// Project-level release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Path to the `.xcodeproj` holding version metadata
    pub project: PathBuf,

    /// Optional `.xcworkspace` used for building
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// App target name
    pub target: String,

    /// Product name of the exported ipa (defaults to the target)
    #[serde(default)]
    pub bundle_display_name: Option<String>,

    /// Build configuration to read the version from and archive with
    #[serde(default = "default_configuration")]
    pub configuration: String,

    #[serde(default)]
    pub team_id: String,

    #[serde(default)]
    pub base_bundle_id: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Where dSYM zips are staged (OS temp dir when unset)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Counter id on the build-number service
    #[serde(default)]
    pub build_number_id: Option<String>,

    #[serde(default)]
    pub thinning: Thinning,

    #[serde(default)]
    pub test: TestConfig,

    #[serde(default)]
    pub github: Option<GitHubConfig>,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub flavours: Vec<FlavourConfig>,
}

fn default_configuration() -> String {
    "Release".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build")
}

/// Unit test stage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Scheme to test (defaults to the target)
    #[serde(default)]
    pub scheme: Option<String>,

    /// Runtimes such as `iOS-17-0`
    #[serde(default)]
    pub simulator_runtimes: Vec<String>,

    #[serde(default)]
    pub preferred_simulator_names: Vec<String>,
}

/// Distribution backend processing wait
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Time between status checks, e.g. `10s`
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

fn default_poll_interval() -> String {
    "10s".to_string()
}

fn default_max_poll_attempts() -> u32 {
    12
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl UploadConfig {
    pub fn poll_policy(&self) -> Result<PollPolicy, PreconditionError> {
        let interval = humantime::parse_duration(&self.poll_interval).map_err(|e| {
            PreconditionError::InvalidRequest(format!(
                "upload.poll_interval '{}': {}",
                self.poll_interval, e
            ))
        })?;
        if self.max_poll_attempts == 0 {
            return Err(PreconditionError::InvalidRequest(
                "upload.max_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(PollPolicy {
            interval,
            max_attempts: self.max_poll_attempts,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
}

/// One flavour and how it is signed and distributed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavourConfig {
    pub name: String,

    pub label: String,

    /// Defaults to the label
    #[serde(default)]
    pub label_including_release: Option<String>,

    #[serde(default)]
    pub bundle_id_suffix: String,

    #[serde(default)]
    pub app_center_app_name: Option<String>,

    #[serde(default)]
    pub app_apple_id: Option<String>,

    #[serde(default)]
    pub distribution_groups: Vec<String>,

    /// Full scheme name override
    #[serde(default)]
    pub scheme: Option<String>,

    /// Provisioning profile name per export method
    #[serde(default)]
    pub provisioning_profiles: HashMap<ExportMethod, String>,
}

impl FlavourConfig {
    pub fn to_profile(&self) -> FlavourProfile {
        let label_including_release = self
            .label_including_release
            .clone()
            .unwrap_or_else(|| self.label.clone());
        let mut profile = FlavourProfile::new(AppFlavour::new(
            &self.name,
            &self.bundle_id_suffix,
            &self.label,
            label_including_release,
        ));
        profile.app_center_app_name = self.app_center_app_name.clone();
        profile.app_apple_id = self.app_apple_id.clone();
        profile.distribution_groups = self.distribution_groups.clone();
        profile.scheme = self.scheme.clone();
        profile.provisioning_profiles = self
            .provisioning_profiles
            .iter()
            .map(|(method, name)| (*method, name.clone()))
            .collect();
        profile
    }
}

/// Per-run choices that do not live in the manifest
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Flavour names to build; empty builds all
    pub flavours: Vec<String>,
    /// Explicit build number, otherwise fetched with `build_number_id`
    pub build_number: Option<u64>,
    /// Keep the project's build number instead of fetching one
    pub keep_build_number: bool,
    pub skip: SkipFlags,
    pub build_job_info: Option<String>,
}

impl ManifestConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.project.as_os_str().is_empty() {
            errors.push("project is required".to_string());
        }
        if self.target.trim().is_empty() {
            errors.push("target is required".to_string());
        }
        if self.flavours.is_empty() {
            errors.push("at least one flavour is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for flavour in &self.flavours {
            if !seen.insert(flavour.name.as_str()) {
                errors.push(format!("flavour '{}' is defined twice", flavour.name));
            }
            if flavour.label.trim().is_empty() {
                errors.push(format!("flavour '{}' needs a label", flavour.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Workspace when one is configured, the project otherwise
    pub fn scheme_location(&self) -> SchemeLocation {
        match &self.workspace {
            Some(workspace) => SchemeLocation::Workspace(workspace.clone()),
            None => SchemeLocation::Project(self.project.clone()),
        }
    }

    pub fn test_plan(&self) -> TestPlan {
        TestPlan {
            scheme: self
                .test
                .scheme
                .clone()
                .unwrap_or_else(|| self.target.clone()),
            simulator_runtimes: self.test.simulator_runtimes.clone(),
            preferred_simulator_names: self.test.preferred_simulator_names.clone(),
            coverage_target: format!("{}.app", self.target),
        }
    }

    /// Combine the manifest with per-run options into a validated request
    pub fn release_request(
        &self,
        method: ExportMethod,
        options: &RunOptions,
    ) -> Result<ReleaseRequest, PreconditionError> {
        let unknown: Vec<&str> = options
            .flavours
            .iter()
            .filter(|name| !self.flavours.iter().any(|f| &f.name == *name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(PreconditionError::InvalidRequest(format!(
                "unknown flavour(s): {}",
                unknown.join(", ")
            )));
        }

        let flavours = self
            .flavours
            .iter()
            .filter(|f| options.flavours.is_empty() || options.flavours.contains(&f.name))
            .map(FlavourConfig::to_profile)
            .collect();

        let build_number = match (options.build_number, &self.build_number_id) {
            (Some(number), _) => BuildNumberSource::Local(number),
            (None, _) if options.keep_build_number => BuildNumberSource::Current,
            (None, Some(id)) => BuildNumberSource::Fetch {
                number_id: id.clone(),
            },
            (None, None) => {
                return Err(PreconditionError::InvalidRequest(
                    "either --build-number or build_number_id in the manifest is required"
                        .to_string(),
                ))
            }
        };

        let mut builder = ReleaseRequest::builder(&self.project, &self.target, method)
            .with_configuration(&self.configuration)
            .with_bundle_display_name(
                self.bundle_display_name
                    .clone()
                    .unwrap_or_else(|| self.target.clone()),
            )
            .with_signing(&self.base_bundle_id, &self.team_id)
            .with_thinning(self.thinning.clone())
            .with_flavours(flavours)
            .with_build_number(build_number)
            .with_output_dir(&self.output_dir)
            .with_test_plan(self.test_plan())
            .with_build_job_info(options.build_job_info.clone())
            .with_github(self.github.as_ref().map(|g| GitHubRepo {
                owner: g.owner.clone(),
                repo: g.repo.clone(),
            }))
            .with_skip(options.skip);

        if let Some(workspace) = &self.workspace {
            builder = builder.with_workspace(workspace);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
project: Example.xcodeproj
workspace: Example.xcworkspace
target: Example
bundle_display_name: Example
team_id: ABCDE12345
base_bundle_id: com.example.app
build_number_id: example-ios
test:
  scheme: ExampleTests
  simulator_runtimes: [iOS-17-0]
  preferred_simulator_names: ["iPhone 15"]
github:
  owner: example
  repo: example-ios
flavours:
  - name: Live
    label: Live
    label_including_release: Live (Beta)
    app_center_app_name: example-live
    distribution_groups: [QA]
    provisioning_profiles:
      ad-hoc: Example Live AdHoc
  - name: Staging
    label: Staging
    bundle_id_suffix: .staging
    app_center_app_name: example-staging
"#;

    fn manifest() -> ManifestConfig {
        serde_yaml::from_str(MANIFEST).unwrap()
    }

    #[test]
    fn test_parse_manifest_defaults() {
        let config = manifest();
        assert_eq!(config.configuration, "Release");
        assert_eq!(config.output_dir, PathBuf::from("build"));
        assert_eq!(config.thinning, Thinning::None);
        assert_eq!(config.upload.poll_policy().unwrap(), PollPolicy::default());
        assert!(config.validate().is_ok());

        let staging = config.flavours[1].to_profile();
        assert_eq!(staging.flavour.label_including_release, "Staging");
        assert_eq!(staging.flavour.bundle_id("com.example.app"), "com.example.app.staging");
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let mut config = manifest();
        config.target = String::new();
        config.flavours.push(config.flavours[0].clone());
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_release_request_fetches_build_number_by_default() {
        let request = manifest()
            .release_request(ExportMethod::AdHoc, &RunOptions::default())
            .unwrap();
        assert_eq!(
            request.build_number(),
            &BuildNumberSource::Fetch {
                number_id: "example-ios".to_string()
            }
        );
        assert_eq!(request.flavours().len(), 2);
        assert_eq!(request.test_plan().scheme, "ExampleTests");
    }

    #[test]
    fn test_release_request_filters_flavours() {
        let options = RunOptions {
            flavours: vec!["Staging".to_string()],
            build_number: Some(42),
            ..Default::default()
        };
        let request = manifest()
            .release_request(ExportMethod::AdHoc, &options)
            .unwrap();
        assert_eq!(request.flavours().len(), 1);
        assert_eq!(request.build_number(), &BuildNumberSource::Local(42));
    }

    #[test]
    fn test_poll_interval_override() {
        let upload: UploadConfig =
            serde_yaml::from_str("poll_interval: 1m 30s\nmax_poll_attempts: 4").unwrap();
        let policy = upload.poll_policy().unwrap();
        assert_eq!(policy.interval, std::time::Duration::from_secs(90));
        assert_eq!(policy.max_attempts, 4);

        let broken = UploadConfig {
            poll_interval: "soon".to_string(),
            ..Default::default()
        };
        assert!(broken.poll_policy().is_err());
    }

    #[test]
    fn test_keep_build_number_without_counter() {
        let mut config = manifest();
        config.build_number_id = None;
        let options = RunOptions {
            keep_build_number: true,
            ..Default::default()
        };
        let request = config
            .release_request(ExportMethod::AdHoc, &options)
            .unwrap();
        assert_eq!(request.build_number(), &BuildNumberSource::Current);
        assert!(matches!(
            config.release_request(ExportMethod::AdHoc, &RunOptions::default()),
            Err(PreconditionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_unknown_flavour_is_rejected() {
        let options = RunOptions {
            flavours: vec!["Dev".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            manifest().release_request(ExportMethod::AdHoc, &options),
            Err(PreconditionError::InvalidRequest(msg)) if msg.contains("Dev")
        ));
    }
}
