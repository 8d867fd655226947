//! `release` and `build-deploy` commands

use anyhow::Result;
use tracing::warn;

use super::Context;
use crate::cli::{DeployArgs, ReleaseArgs};
use crate::config::RunOptions;
use crate::domain::{ReleaseReport, SkipFlags};
use crate::ui;

/// Full release: tests, build number bump, commit, build and deploy
pub async fn execute(ctx: &Context, args: ReleaseArgs) -> Result<()> {
    let options = run_options(
        &args.deploy,
        SkipFlags {
            test: args.skip_test,
            ..skip_flags(&args.deploy)
        },
        args.build_number,
        false,
    );
    let request = ctx
        .manifest
        .release_request(args.deploy.export_method, &options)?;

    let report = ctx.release_service()?.prepare_and_release(&request).await?;
    finish(&report);
    Ok(())
}

/// Build and deploy with the build number already in the project
pub async fn execute_build_deploy(ctx: &Context, args: DeployArgs) -> Result<()> {
    let options = run_options(&args, skip_flags(&args), None, true);
    let request = ctx.manifest.release_request(args.export_method, &options)?;

    let report = ctx.release_service()?.build_and_deploy(&request).await?;
    finish(&report);
    Ok(())
}

fn skip_flags(args: &DeployArgs) -> SkipFlags {
    SkipFlags {
        test: true,
        deploy: args.skip_deploy,
        jira: args.skip_jira,
        slack: args.skip_slack,
    }
}

fn run_options(
    args: &DeployArgs,
    skip: SkipFlags,
    build_number: Option<u64>,
    keep_build_number: bool,
) -> RunOptions {
    RunOptions {
        flavours: args.flavours.clone(),
        build_number,
        keep_build_number,
        skip,
        build_job_info: args.build_job_info.clone(),
    }
}

fn finish(report: &ReleaseReport) {
    let failures: Vec<_> = report.failures().collect();
    for failure in &failures {
        let message = failure.message.as_deref().unwrap_or("unknown error");
        match &failure.flavour {
            Some(flavour) => warn!("{} ({}) failed: {}", failure.step.name(), flavour, message),
            None => warn!("{} failed: {}", failure.step.name(), message),
        }
    }

    if failures.is_empty() {
        match &report.summary {
            Some(summary) => ui::print_success(summary),
            None => ui::print_success(&format!("Release {} finished", report.run_id)),
        }
    } else {
        ui::print_warning(&format!(
            "Release {} finished with {} best-effort step(s) failed",
            report.run_id,
            failures.len()
        ));
    }
}
