//! CLI definitions for flightdeck
//!
//! This module contains all CLI argument parsing structures using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ExportMethod;

#[derive(Parser)]
#[command(
    name = "flightdeck",
    version,
    about = "Release pipeline for iOS apps",
    long_about = "Tests, versions, builds, archives and distributes iOS app flavours.\n\
                  Uploads to App Center or App Store Connect, then updates Jira and Slack."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to flightdeck.yaml (searched upwards from the working directory by default)
    #[arg(long, global = true, env = "FLIGHTDECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log method, URL, headers and body size of every HTTP request
    #[arg(long, global = true)]
    pub log_requests: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Test, bump the build number, commit, then build and deploy every flavour
    Release(ReleaseArgs),

    /// Build and deploy every flavour with the project's current build number
    BuildDeploy(DeployArgs),

    /// Run unit tests on the configured simulators and write a coverage report
    Test,

    /// Show the simulator each runtime resolves to
    Simulators {
        /// Runtime such as iOS-17-0 (can be specified multiple times)
        #[arg(long = "runtime")]
        runtimes: Vec<String>,

        /// Preferred device name, in order (can be specified multiple times)
        #[arg(long = "prefer")]
        preferred: Vec<String>,
    },
}

#[derive(Args)]
pub struct DeployArgs {
    /// Distribution channel
    #[arg(long, value_enum)]
    pub export_method: ExportMethod,

    /// Flavour to build (can be specified multiple times; default: all)
    #[arg(long = "flavour")]
    pub flavours: Vec<String>,

    /// Stop after exporting
    #[arg(long)]
    pub skip_deploy: bool,

    /// Do not transition or comment on the Jira ticket
    #[arg(long)]
    pub skip_jira: bool,

    /// Do not post the build summary to Slack
    #[arg(long)]
    pub skip_slack: bool,

    /// CI job description added to the version bump commit
    #[arg(long, env = "BUILD_JOB_INFO")]
    pub build_job_info: Option<String>,
}

#[derive(Args)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Use this build number instead of fetching the next one
    #[arg(long)]
    pub build_number: Option<u64>,

    /// Do not run unit tests
    #[arg(long)]
    pub skip_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_release() {
        let cli = Cli::parse_from([
            "flightdeck",
            "release",
            "--export-method",
            "ad-hoc",
            "--flavour",
            "Live",
            "--flavour",
            "Staging",
            "--build-number",
            "812",
            "--skip-test",
        ]);
        let Commands::Release(args) = cli.command else {
            panic!("expected release");
        };
        assert_eq!(args.deploy.export_method, ExportMethod::AdHoc);
        assert_eq!(args.deploy.flavours, vec!["Live", "Staging"]);
        assert_eq!(args.build_number, Some(812));
        assert!(args.skip_test);
        assert!(!args.deploy.skip_deploy);
    }

    #[test]
    fn test_export_method_alias() {
        let cli = Cli::parse_from(["flightdeck", "build-deploy", "--export-method", "appstore"]);
        let Commands::BuildDeploy(args) = cli.command else {
            panic!("expected build-deploy");
        };
        assert_eq!(args.export_method, ExportMethod::AppStore);
    }
}
