//! Xcode toolchain gateway
//!
//! Wraps `xcodebuild`, `xcrun` (simctl, xccov, altool) and `ditto`, plus the
//! project metadata store. Tool paths honour `{TOOL}_BIN` overrides.

pub mod project;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::process::{Invocation, ProcessRunner};
use crate::domain::simulator::{resolve_simulators, SimctlList};
use crate::domain::{ExportOptions, SchemeLocation, SimulatorInfo};
use crate::error::{ProjectError, ReleaseError, ToolError};
use crate::tools::{get_tool_path, is_tool_available, tools};
use project::ProjectFile;

/// Destination for device builds and archives
pub const GENERIC_IOS_DESTINATION: &str = "generic/platform=iOS";

/// App Store Connect credentials for `altool`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltoolAuth {
    Password { username: String, password: String },
    ApiKey { key: String, issuer: String },
}

impl AltoolAuth {
    fn args(&self) -> [&str; 4] {
        match self {
            Self::Password { username, password } => ["-u", username, "-p", password],
            Self::ApiKey { key, issuer } => ["--apiKey", key, "--apiIssuer", issuer],
        }
    }
}

/// An exported ipa bound for TestFlight
#[derive(Debug, Clone)]
pub struct AppStoreUpload {
    pub ipa: PathBuf,
    pub apple_id: String,
    pub bundle_version: String,
    pub bundle_short_version: String,
    pub bundle_id: String,
    pub auth: AltoolAuth,
}

/// Build toolchain operations used by the release pipeline
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn app_version(
        &self,
        project: &Path,
        target: &str,
        configuration: &str,
    ) -> Result<String, ProjectError>;

    async fn build_number(
        &self,
        project: &Path,
        target: &str,
        configuration: &str,
    ) -> Result<u64, ProjectError>;

    /// Write the build number into every configuration of `target`
    async fn set_build_number(
        &self,
        project: &Path,
        target: &str,
        build_number: u64,
    ) -> Result<(), ProjectError>;

    /// One simulator per runtime, in runtime order
    async fn resolve_simulators(
        &self,
        runtimes: &[String],
        preferred_names: &[String],
    ) -> Result<Vec<SimulatorInfo>, ReleaseError>;

    /// Run tests and return the result bundle path (without `.xcresult`)
    async fn test(
        &self,
        location: &SchemeLocation,
        scheme: &str,
        simulator: &SimulatorInfo,
        output_dir: &Path,
    ) -> Result<PathBuf, ToolError>;

    /// Line coverage of `target` in a result bundle, if reported
    async fn line_coverage(&self, result_bundle: &Path, target: &str) -> Result<Option<f64>, ToolError>;

    async fn build(&self, location: &SchemeLocation, scheme: &str) -> Result<(), ToolError>;

    async fn archive(
        &self,
        location: &SchemeLocation,
        scheme: &str,
        archive_path: &Path,
    ) -> Result<(), ToolError>;

    async fn write_export_options(&self, options: &ExportOptions, path: &Path) -> Result<(), ToolError>;

    async fn export_archive(
        &self,
        archive_path: &Path,
        export_dir: &Path,
        export_options: &Path,
    ) -> Result<(), ToolError>;

    /// Zip the contents of `dir` into `zip`
    async fn zip(&self, dir: &Path, zip: &Path) -> Result<(), ToolError>;

    async fn upload_package(&self, upload: &AppStoreUpload) -> Result<(), ToolError>;
}

/// Client for the Xcode command line tools
pub struct XcodeClient {
    runner: ProcessRunner,
}

impl XcodeClient {
    pub fn new(runner: ProcessRunner) -> Self {
        Self { runner }
    }

    fn xcodebuild(&self) -> Invocation {
        Invocation::new(get_tool_path(tools::XCODEBUILD))
    }

    fn xcrun(&self) -> Invocation {
        Invocation::new(get_tool_path(tools::XCRUN))
    }

    /// Pipe through xcbeautify when it is installed
    async fn run_xcodebuild(&self, invocation: Invocation) -> Result<(), ToolError> {
        if is_tool_available(tools::XCBEAUTIFY) {
            let filter = Invocation::new(get_tool_path(tools::XCBEAUTIFY));
            self.runner.stream_through(&invocation, &filter).await
        } else {
            debug!("xcbeautify not found, streaming raw xcodebuild output");
            self.runner.stream(&invocation).await
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetCoverage {
    name: String,
    line_coverage: f64,
}

/// Pick `target` out of `xccov view --report --only-targets --json` output
pub fn parse_line_coverage(output: &str, target: &str) -> Option<f64> {
    output
        .lines()
        .filter_map(|line| serde_json::from_str::<Vec<TargetCoverage>>(line).ok())
        .flatten()
        .find(|item| item.name == target)
        .map(|item| item.line_coverage)
}

#[async_trait]
impl BuildTool for XcodeClient {
    async fn app_version(
        &self,
        project: &Path,
        target: &str,
        configuration: &str,
    ) -> Result<String, ProjectError> {
        ProjectFile::open(project)?.marketing_version(target, configuration)
    }

    async fn build_number(
        &self,
        project: &Path,
        target: &str,
        configuration: &str,
    ) -> Result<u64, ProjectError> {
        ProjectFile::open(project)?.build_number(target, configuration)
    }

    async fn set_build_number(
        &self,
        project: &Path,
        target: &str,
        build_number: u64,
    ) -> Result<(), ProjectError> {
        let mut file = ProjectFile::open(project)?;
        file.set_build_number(target, build_number)?;
        file.save()
    }

    async fn resolve_simulators(
        &self,
        runtimes: &[String],
        preferred_names: &[String],
    ) -> Result<Vec<SimulatorInfo>, ReleaseError> {
        info!("Getting list of simulators...");
        let invocation = self.xcrun().args(["simctl", "list", "--json"]);
        let output = self.runner.capture(&invocation).await?;
        let list: SimctlList =
            serde_json::from_str(&output).map_err(|e| ToolError::MalformedOutput {
                command: invocation.display(),
                message: e.to_string(),
            })?;
        Ok(resolve_simulators(runtimes, preferred_names, &list)?)
    }

    async fn test(
        &self,
        location: &SchemeLocation,
        scheme: &str,
        simulator: &SimulatorInfo,
        output_dir: &Path,
    ) -> Result<PathBuf, ToolError> {
        let result_bundle = output_dir.join(format!("{}-{}-TestResults", scheme, simulator.runtime));
        let invocation = self
            .xcodebuild()
            .arg("test")
            .args(location.xcodebuild_args())
            .option("scheme", scheme)
            .option("destination", simulator.destination())
            .option("resultBundlePath", result_bundle.display().to_string());
        self.run_xcodebuild(invocation).await?;
        Ok(result_bundle)
    }

    async fn line_coverage(&self, result_bundle: &Path, target: &str) -> Result<Option<f64>, ToolError> {
        let invocation = self.xcrun().args([
            "xccov".to_string(),
            "view".to_string(),
            "--report".to_string(),
            "--only-targets".to_string(),
            "--json".to_string(),
            format!("{}.xcresult", result_bundle.display()),
        ]);
        let output = self.runner.capture(&invocation).await?;
        Ok(parse_line_coverage(&output, target))
    }

    async fn build(&self, location: &SchemeLocation, scheme: &str) -> Result<(), ToolError> {
        let invocation = self
            .xcodebuild()
            .arg("build")
            .args(location.xcodebuild_args())
            .option("scheme", scheme)
            .option("destination", GENERIC_IOS_DESTINATION);
        self.run_xcodebuild(invocation).await
    }

    async fn archive(
        &self,
        location: &SchemeLocation,
        scheme: &str,
        archive_path: &Path,
    ) -> Result<(), ToolError> {
        let invocation = self
            .xcodebuild()
            .arg("archive")
            .args(location.xcodebuild_args())
            .option("scheme", scheme)
            .option("destination", GENERIC_IOS_DESTINATION)
            .option("sdk", "iphoneos")
            .option("archivePath", archive_path.display().to_string());
        self.run_xcodebuild(invocation).await
    }

    async fn write_export_options(&self, options: &ExportOptions, path: &Path) -> Result<(), ToolError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, options.to_plist()).await?;
        Ok(())
    }

    async fn export_archive(
        &self,
        archive_path: &Path,
        export_dir: &Path,
        export_options: &Path,
    ) -> Result<(), ToolError> {
        let invocation = self
            .xcodebuild()
            .arg("-exportArchive")
            .option("archivePath", archive_path.display().to_string())
            .option("exportPath", export_dir.display().to_string())
            .option("exportOptionsPlist", export_options.display().to_string());
        self.run_xcodebuild(invocation).await
    }

    async fn zip(&self, dir: &Path, zip: &Path) -> Result<(), ToolError> {
        let invocation = Invocation::new(get_tool_path(tools::DITTO))
            .args(["-c", "-k", "--sequesterRsrc"])
            .arg(dir.display().to_string())
            .arg(zip.display().to_string());
        self.runner.stream(&invocation).await
    }

    async fn upload_package(&self, upload: &AppStoreUpload) -> Result<(), ToolError> {
        if let AltoolAuth::Password { password, .. } = &upload.auth {
            self.runner.redactor().redact(password.as_str());
        }
        info!("Uploading ipa using Application Loader...");
        let invocation = self
            .xcrun()
            .arg("altool")
            .arg("--upload-package")
            .arg(upload.ipa.display().to_string())
            .args(["--type", "ios"])
            .args(["--apple-id", upload.apple_id.as_str()])
            .args(["--bundle-version", upload.bundle_version.as_str()])
            .args(["--bundle-short-version-string", upload.bundle_short_version.as_str()])
            .args(["--bundle-id", upload.bundle_id.as_str()])
            .args(upload.auth.args());
        self.runner.stream(&invocation).await
    }
}
