//! Test service - unit tests on simulators plus code coverage report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{SchemeLocation, TestPlan};
use crate::error::{ReleaseError, ToolError};
use crate::infrastructure::xcode::BuildTool;

pub const COVERAGE_FILE: &str = "CodeCoveragePercentage.json";

#[derive(Debug, Serialize)]
struct CoverageReport {
    #[serde(rename = "line-rate")]
    line_rate: f64,
}

pub struct TestService {
    build_tool: Arc<dyn BuildTool>,
}

impl TestService {
    pub fn new(build_tool: Arc<dyn BuildTool>) -> Self {
        Self { build_tool }
    }

    /// Run the plan on one simulator per runtime. Coverage is taken from the
    /// first run only. Returns the result bundle paths.
    pub async fn run(
        &self,
        location: &SchemeLocation,
        plan: &TestPlan,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ReleaseError> {
        info!("Testing app...");
        let simulators = self
            .build_tool
            .resolve_simulators(&plan.simulator_runtimes, &plan.preferred_simulator_names)
            .await?;

        let mut bundles = Vec::with_capacity(simulators.len());
        for (index, simulator) in simulators.iter().enumerate() {
            info!("Testing on {} ({})", simulator.name, simulator.runtime);
            let bundle = self
                .build_tool
                .test(location, &plan.scheme, simulator, output_dir)
                .await?;

            if index == 0 {
                self.write_coverage(&bundle, &plan.coverage_target, output_dir)
                    .await?;
            }
            bundles.push(bundle);
        }
        Ok(bundles)
    }

    async fn write_coverage(
        &self,
        bundle: &Path,
        target: &str,
        output_dir: &Path,
    ) -> Result<(), ToolError> {
        let Some(line_rate) = self.build_tool.line_coverage(bundle, target).await? else {
            warn!("No coverage reported for {}", target);
            return Ok(());
        };

        let path = output_dir.join(COVERAGE_FILE);
        let json = serde_json::to_string(&CoverageReport { line_rate }).map_err(|e| {
            ToolError::MalformedOutput {
                command: "xccov".to_string(),
                message: e.to_string(),
            }
        })?;
        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::write(&path, json).await?;
        info!("Line coverage of {}: {:.1}%", target, line_rate * 100.0);
        Ok(())
    }
}
