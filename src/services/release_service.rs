//! Release service - orchestrates the release workflow
//!
//! This service coordinates all steps of a release:
//! tests, build number, release notes, version commit, then per flavour
//! build, archive, symbols, export and deploy, then Jira and Slack.
//!
//! Fatal steps stop the run. Symbols, release notes and notifications are
//! best-effort: their failures are recorded in the [`ReleaseReport`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::notification_service::NotificationService;
use super::release_notes_service::{ReleaseNotesInput, ReleaseNotesService};
use super::test_service::TestService;
use super::upload_service::UploadService;
use crate::config::environment::{ALTOOL_USERNAME, APPCENTER_OWNER_NAME, BUILD_NUMBER_API_URL};
use crate::domain::release::{build_summary, version_title};
use crate::domain::{
    AppConfiguration, AppFlavour, BuildArtifactPaths, BuildNumberSource, ExportMethod,
    InstallLink, ReleaseReport, ReleaseRequest, ReleaseStep, StepResult,
};
use crate::error::{PreconditionError, ReleaseError};
use crate::infrastructure::appcenter::{AppRef, SymbolUploadStatus};
use crate::infrastructure::build_number::BuildNumberProvider;
use crate::infrastructure::git::VersionControl;
use crate::infrastructure::xcode::{AltoolAuth, AppStoreUpload, BuildTool};
use crate::ui::{self, UploadProgress};

const REMOTE: &str = "origin";

/// Service for orchestrating releases
pub struct ReleaseService {
    git: Arc<dyn VersionControl>,
    build_tool: Arc<dyn BuildTool>,
    uploads: UploadService,
    notifications: NotificationService,
    release_notes: ReleaseNotesService,
    build_numbers: Result<Arc<dyn BuildNumberProvider>, PreconditionError>,
    app_center_owner: Result<String, PreconditionError>,
    altool: Result<AltoolAuth, PreconditionError>,
    temp_dir: PathBuf,
    show_progress: bool,
}

impl ReleaseService {
    /// Create a release service. Optional collaborators start out as missing
    /// and are supplied with the `with_*` builders.
    pub fn new(
        git: Arc<dyn VersionControl>,
        build_tool: Arc<dyn BuildTool>,
        uploads: UploadService,
        notifications: NotificationService,
        release_notes: ReleaseNotesService,
    ) -> Self {
        Self {
            git,
            build_tool,
            uploads,
            notifications,
            release_notes,
            build_numbers: Err(missing(BUILD_NUMBER_API_URL)),
            app_center_owner: Err(missing(APPCENTER_OWNER_NAME)),
            altool: Err(missing(ALTOOL_USERNAME)),
            temp_dir: std::env::temp_dir(),
            show_progress: false,
        }
    }

    pub fn with_build_numbers(
        mut self,
        build_numbers: Result<Arc<dyn BuildNumberProvider>, PreconditionError>,
    ) -> Self {
        self.build_numbers = build_numbers;
        self
    }

    pub fn with_app_center_owner(mut self, owner: Result<String, PreconditionError>) -> Self {
        self.app_center_owner = owner;
        self
    }

    pub fn with_altool(mut self, auth: Result<AltoolAuth, PreconditionError>) -> Self {
        self.altool = auth;
        self
    }

    /// Directory the dSYM zips are staged in
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Draw a progress bar during binary uploads
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Full release: test, bump and commit the build number, then build and
    /// deploy every flavour and notify.
    pub async fn prepare_and_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<ReleaseReport, ReleaseError> {
        let mut report = ReleaseReport::new(Uuid::new_v4(), String::new(), 0);
        self.print_header("Release", request, &report);

        let result = self.release(request, &mut report).await;
        self.finish(report, result)
    }

    /// Build and deploy with the build number already in the project
    pub async fn build_and_deploy(
        &self,
        request: &ReleaseRequest,
    ) -> Result<ReleaseReport, ReleaseError> {
        let mut report = ReleaseReport::new(Uuid::new_v4(), String::new(), 0);
        self.print_header("Build & Deploy", request, &report);

        let result = self.deploy_only(request, &mut report).await;
        self.finish(report, result)
    }

    async fn release(
        &self,
        request: &ReleaseRequest,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        if !self.git.is_clean().await? {
            return Err(PreconditionError::DirtyWorkingTree.into());
        }
        let branch = self.git.current_branch().await?;
        self.release_notes.check_ready(&branch)?;
        self.check_deploy_ready(request)?;
        if let BuildNumberSource::Fetch { .. } = request.build_number() {
            self.build_numbers.as_ref().map_err(Clone::clone)?;
        }

        let skip = request.skip();
        if skip.test {
            info!("Skipping tests");
        } else {
            let tests = TestService::new(self.build_tool.clone());
            run_step(report, ReleaseStep::Test, None, async {
                tests
                    .run(
                        request.scheme_location(),
                        request.test_plan(),
                        request.output_dir(),
                    )
                    .await
                    .map(|_| ())
            })
            .await?;
        }

        let version = self
            .build_tool
            .app_version(request.project(), request.target(), request.configuration())
            .await?;
        report.version = version.clone();

        let build_number = run_step(report, ReleaseStep::BuildNumber, None, async {
            let build_number = match request.build_number() {
                BuildNumberSource::Fetch { number_id } => {
                    let provider = self.build_numbers.as_ref().map_err(Clone::clone)?;
                    provider.next_build_number(number_id).await?
                }
                BuildNumberSource::Local(number) => *number,
                BuildNumberSource::Current => {
                    self.build_tool
                        .build_number(request.project(), request.target(), request.configuration())
                        .await?
                }
            };
            info!("Setting build number to {}", build_number);
            self.build_tool
                .set_build_number(request.project(), request.target(), build_number)
                .await?;
            Ok::<_, ReleaseError>(build_number)
        })
        .await?;
        report.build_number = build_number;

        let title = version_title(&version, build_number);
        let notes = ReleaseNotesInput {
            title: title.clone(),
            environments: request.flavour_labels(),
            distribution_method: request.export_method().display_text().to_string(),
            github: request.github().cloned(),
        };
        best_effort(report, ReleaseStep::ReleaseNotes, None, async {
            self.release_notes
                .publish(&branch, &notes)
                .await
                .map_err(ReleaseError::from)
        })
        .await;

        run_step(report, ReleaseStep::Commit, None, async {
            info!("Committing version bump {}", title);
            self.git.commit(&title, request.build_job_info()).await?;
            self.git.push(REMOTE, branch.name()).await?;
            Ok::<_, ReleaseError>(())
        })
        .await?;

        self.deploy_flavours(request, report).await?;
        self.notify(request, report).await;
        Ok(())
    }

    async fn deploy_only(
        &self,
        request: &ReleaseRequest,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        self.check_deploy_ready(request)?;

        report.version = self
            .build_tool
            .app_version(request.project(), request.target(), request.configuration())
            .await?;
        report.build_number = self
            .build_tool
            .build_number(request.project(), request.target(), request.configuration())
            .await?;

        self.deploy_flavours(request, report).await?;
        self.notify(request, report).await;
        Ok(())
    }

    /// Credentials the deploy stage needs, checked before anything is built
    fn check_deploy_ready(&self, request: &ReleaseRequest) -> Result<(), PreconditionError> {
        if request.skip().deploy {
            return Ok(());
        }
        let method = request.export_method();
        if method.uses_distribution_backend() {
            self.app_center_owner.as_ref().map_err(Clone::clone)?;
        }
        if method == ExportMethod::AppStore {
            self.altool.as_ref().map_err(Clone::clone)?;
        }
        Ok(())
    }

    async fn deploy_flavours(
        &self,
        request: &ReleaseRequest,
        report: &mut ReleaseReport,
    ) -> Result<(), ReleaseError> {
        let method = request.export_method();
        let location = request.scheme_location();

        for profile in request.flavours() {
            let app = profile.app_configuration(
                method,
                request.base_bundle_id(),
                request.team_id(),
                request.thinning().clone(),
            );
            let flavour = &app.flavour;
            let paths = BuildArtifactPaths::new(
                request.output_dir(),
                flavour,
                method,
                request.bundle_display_name(),
            );
            info!("Building {} with scheme {}", flavour.label, app.scheme);

            run_step(report, ReleaseStep::Build, Some(flavour), async {
                self.build_tool
                    .build(location, &app.scheme)
                    .await
                    .map_err(ReleaseError::from)
            })
            .await?;

            run_step(report, ReleaseStep::Archive, Some(flavour), async {
                self.build_tool
                    .archive(location, &app.scheme, &paths.archive)
                    .await
                    .map_err(ReleaseError::from)
            })
            .await?;

            if method.uploads_symbols() {
                best_effort(report, ReleaseStep::Symbols, Some(flavour), async {
                    self.upload_symbols(&app, &paths).await
                })
                .await;
            }

            run_step(report, ReleaseStep::Export, Some(flavour), async {
                self.build_tool
                    .write_export_options(&app.export_options, &paths.export_options)
                    .await?;
                self.build_tool
                    .export_archive(&paths.archive, &paths.export_dir, &paths.export_options)
                    .await?;
                Ok::<_, ReleaseError>(())
            })
            .await?;

            if request.skip().deploy {
                continue;
            }
            let (version, build_number) = (report.version.clone(), report.build_number);
            let link = run_step(report, ReleaseStep::Deploy, Some(flavour), async {
                self.deploy(request, &app, &paths, &version, build_number)
                    .await
            })
            .await?;
            report.install_links.extend(link);
        }

        Ok(())
    }

    /// Zip the archive's dSYMs and send them to the distribution backend
    async fn upload_symbols(
        &self,
        app: &AppConfiguration,
        paths: &BuildArtifactPaths,
    ) -> Result<(), ReleaseError> {
        let Some(app_name) = &app.app_center_app_name else {
            warn!(
                "No App Center app name for {}, skipping dSYM upload",
                app.flavour.name
            );
            return Ok(());
        };
        let owner = self.app_center_owner.as_ref().map_err(Clone::clone)?;

        let zip = paths.dsyms_zip(&self.temp_dir);
        self.build_tool.zip(&paths.dsyms_dir(), &zip).await?;
        let _cleanup = scopeguard::guard(zip.clone(), |zip| {
            if let Err(e) = std::fs::remove_file(&zip) {
                warn!(error = %e, "Failed to delete {}", zip.display());
            }
        });

        let status = self
            .uploads
            .upload_symbols(&AppRef::new(owner, app_name), &zip)
            .await?;
        if status == SymbolUploadStatus::Aborted {
            warn!("dSYM upload for {} was aborted", app.flavour.name);
        }
        Ok(())
    }

    async fn deploy(
        &self,
        request: &ReleaseRequest,
        app: &AppConfiguration,
        paths: &BuildArtifactPaths,
        version: &str,
        build_number: u64,
    ) -> Result<Option<InstallLink>, ReleaseError> {
        let method = request.export_method();

        if method == ExportMethod::AppStore {
            let auth = self.altool.as_ref().map_err(Clone::clone)?;
            let apple_id = app.app_apple_id.clone().ok_or_else(|| {
                PreconditionError::InvalidRequest(format!(
                    "flavour '{}' has no App Store Apple id",
                    app.flavour.name
                ))
            })?;
            info!("Uploading {} to App Store Connect...", paths.ipa.display());
            self.build_tool
                .upload_package(&AppStoreUpload {
                    ipa: paths.ipa.clone(),
                    apple_id,
                    bundle_version: build_number.to_string(),
                    bundle_short_version: version.to_string(),
                    bundle_id: app.bundle_id.clone(),
                    auth: auth.clone(),
                })
                .await?;
            return Ok(None);
        }

        if !method.uses_distribution_backend() {
            info!("Development build exported to {}", paths.export_dir.display());
            return Ok(None);
        }

        let owner = self.app_center_owner.as_ref().map_err(Clone::clone)?;
        let app_name = app.app_center_app_name.as_deref().ok_or_else(|| {
            PreconditionError::InvalidRequest(format!(
                "flavour '{}' has no App Center app name",
                app.flavour.name
            ))
        })?;

        let progress = UploadProgress::new(&app.flavour.label, self.show_progress);
        let url = self
            .uploads
            .upload_release(
                &AppRef::new(owner, app_name),
                &paths.ipa,
                &app.distribution_groups,
                &|fraction: f64| progress.set_fraction(fraction),
            )
            .await;
        progress.finish();

        Ok(Some(InstallLink {
            flavour: app.flavour.clone(),
            url: url?,
        }))
    }

    async fn notify(&self, request: &ReleaseRequest, report: &mut ReleaseReport) {
        let skip = request.skip();
        if skip.deploy {
            info!("Skipping deploy, no notifications sent");
            return;
        }

        for link in &report.install_links {
            info!("{}: {}", link.flavour.label_including_release, link.url);
        }
        let method = request.export_method();
        let summary = build_summary(
            method,
            &report.version,
            report.build_number,
            &request.flavour_labels(),
        );
        info!("{}", summary);
        report.summary = Some(summary.clone());
        let links = report.install_links.clone();

        if skip.jira {
            info!("Skipping Jira");
        } else {
            best_effort(report, ReleaseStep::Jira, None, async {
                self.notifications
                    .update_jira(&summary, &links)
                    .await
                    .map(|_| ())
                    .map_err(ReleaseError::from)
            })
            .await;
        }

        if skip.slack {
            info!("Skipping Slack");
        } else {
            best_effort(report, ReleaseStep::Slack, None, async {
                self.notifications
                    .post_slack_summary(&summary, method, &links)
                    .await
                    .map_err(ReleaseError::from)
            })
            .await;
        }
    }

    fn finish(
        &self,
        report: ReleaseReport,
        result: Result<(), ReleaseError>,
    ) -> Result<ReleaseReport, ReleaseError> {
        match result {
            Ok(()) => {
                self.print_summary(&report, None);
                Ok(report)
            }
            Err(e) => {
                let failed = report
                    .steps
                    .last()
                    .filter(|s| !s.success)
                    .map(|s| s.step.name())
                    .unwrap_or("preconditions");
                self.print_summary(&report, Some(failed));
                Err(e)
            }
        }
    }

    fn print_header(&self, title: &str, request: &ReleaseRequest, report: &ReleaseReport) {
        ui::print_header(&format!("{}: {}", title, request.target()));
        info!(
            "Run: {} (started {})",
            report.run_id,
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        info!("Export method: {}", request.export_method());
        info!("Flavours: {}", request.flavour_labels());
        println!();
    }

    fn print_summary(&self, report: &ReleaseReport, failed_at: Option<&str>) {
        println!();
        println!(
            "{}",
            "════════════════════════════════════════════════════════════".bright_blue()
        );

        let title = version_title(&report.version, report.build_number);
        match failed_at {
            None => println!(
                "{}",
                format!("✅ Release completed: {}", title)
                    .bright_green()
                    .bold()
            ),
            Some(step) => println!(
                "{}",
                format!("❌ Release failed at {}: {}", step, title)
                    .bright_red()
                    .bold()
            ),
        }

        println!();
        for result in &report.steps {
            let status = if result.success { "✅" } else { "❌" };
            let flavour = result
                .flavour
                .as_deref()
                .map(|f| format!(" [{}]", f))
                .unwrap_or_default();
            println!(
                "   {} {}{} ({:.1}s)",
                status,
                result.step.name(),
                flavour,
                result.duration.as_secs_f64()
            );
        }
        for link in &report.install_links {
            println!("   🔗 {}: {}", link.flavour.label_including_release, link.url);
        }
        println!();
    }
}

fn missing(name: &str) -> PreconditionError {
    PreconditionError::MissingEnvironment(name.to_string())
}

/// Run one step, timing it and recording the outcome
async fn run_step<T>(
    report: &mut ReleaseReport,
    step: ReleaseStep,
    flavour: Option<&AppFlavour>,
    work: impl Future<Output = Result<T, ReleaseError>>,
) -> Result<T, ReleaseError> {
    info!("{} Starting: {}", step.emoji(), step.name());

    let start = Instant::now();
    let result = work.await;
    let duration = start.elapsed();

    let mut outcome = match &result {
        Ok(_) => {
            info!(
                "{} {} completed in {:.1}s",
                "✅".green(),
                step.name(),
                duration.as_secs_f64()
            );
            StepResult::success(step, duration)
        }
        Err(e) => {
            error!("{} {} failed: {}", "❌".red(), step.name(), e);
            StepResult::failure(step, duration, e.to_string())
        }
    };
    if let Some(flavour) = flavour {
        outcome = outcome.for_flavour(flavour);
    }
    report.record(outcome);
    result
}

/// Like [`run_step`], but a failure is recorded and the run continues
async fn best_effort<T>(
    report: &mut ReleaseReport,
    step: ReleaseStep,
    flavour: Option<&AppFlavour>,
    work: impl Future<Output = Result<T, ReleaseError>>,
) -> Option<T> {
    match run_step(report, step, flavour, work).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "{} failed, continuing", step.name());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlavourProfile, SkipFlags, TestPlan};
    use crate::error::{GitError, ToolError};
    use crate::infrastructure::github::PullRequestLookup;
    use crate::infrastructure::slack::ChatClient;
    use crate::services::notification_service::JiraTarget;
    use crate::services::release_notes_service::ConfluenceTarget;
    use crate::services::upload_service::PollPolicy;
    use crate::testing::{
        FakeBackend, FakeBuildNumbers, FakeBuildTool, FakeChat, FakeGit, FakePullRequests,
        FakeTracker, FakeWiki,
    };
    use std::time::Duration;
    use tempfile::TempDir;

    const BRANCH: &str = "feature/PR-1234/ios";

    struct Fixture {
        git: Arc<FakeGit>,
        tool: Arc<FakeBuildTool>,
        backend: Arc<FakeBackend>,
        tracker: Arc<FakeTracker>,
        chat: Arc<FakeChat>,
        wiki: Arc<FakeWiki>,
        numbers: Arc<FakeBuildNumbers>,
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                git: Arc::new(FakeGit::on(BRANCH)),
                tool: Arc::new(FakeBuildTool::new("1.2.0", 41)),
                backend: Arc::new(FakeBackend::new(4)),
                tracker: Arc::new(FakeTracker::new()),
                chat: Arc::new(FakeChat::default()),
                wiki: Arc::new(FakeWiki::default()),
                numbers: Arc::new(FakeBuildNumbers::new(345)),
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn service(&self) -> ReleaseService {
            let uploads = UploadService::new(self.backend.clone()).with_poll_policy(PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 3,
            });
            let notifications = NotificationService::new(
                self.git.clone(),
                Ok(JiraTarget {
                    tracker: self.tracker.clone(),
                    transition_id: "31".to_string(),
                }),
                Ok(self.chat.clone() as Arc<dyn ChatClient>),
            );
            let release_notes = ReleaseNotesService::new(
                Ok(ConfluenceTarget {
                    wiki: self.wiki.clone(),
                    space_id: "123".to_string(),
                    parent_page_id: "678".to_string(),
                }),
                Ok(Arc::new(FakePullRequests::default()) as Arc<dyn PullRequestLookup>),
            );

            ReleaseService::new(
                self.git.clone(),
                self.tool.clone(),
                uploads,
                notifications,
                release_notes,
            )
            .with_build_numbers(Ok(self.numbers.clone() as Arc<dyn BuildNumberProvider>))
            .with_app_center_owner(Ok("example-org".to_string()))
            .with_altool(Ok(AltoolAuth::Password {
                username: "ci@example.com".to_string(),
                password: "app-specific".to_string(),
            }))
            .with_temp_dir(self.dir.path())
        }

        fn request(&self, method: ExportMethod, skip: SkipFlags) -> ReleaseRequest {
            let mut live = FlavourProfile::new(AppFlavour::new("Live", "", "Live", "Live (Beta)"));
            live.app_center_app_name = Some("example-live".to_string());
            live.app_apple_id = Some("1234567890".to_string());
            live.distribution_groups = vec!["QA".to_string()];

            let request = ReleaseRequest::builder("Example.xcodeproj", "Example", method)
                .with_signing("com.example.app", "ABCDE12345")
                .with_flavours(vec![live])
                .with_build_number(BuildNumberSource::Fetch {
                    number_id: "example-ios".to_string(),
                })
                .with_output_dir(self.dir.path().join("build"))
                .with_test_plan(TestPlan {
                    scheme: "ExampleTests".to_string(),
                    simulator_runtimes: vec!["iOS-17-0".to_string()],
                    preferred_simulator_names: vec!["iPhone 15".to_string()],
                    coverage_target: "Example.app".to_string(),
                })
                .with_build_job_info(Some("Build #12".to_string()))
                .with_skip(skip)
                .build()
                .unwrap();

            let paths = BuildArtifactPaths::new(
                request.output_dir(),
                &request.flavours()[0].flavour,
                method,
                request.bundle_display_name(),
            );
            std::fs::create_dir_all(&paths.export_dir).unwrap();
            std::fs::write(&paths.ipa, b"0123456789").unwrap();
            request
        }
    }

    fn kinds(calls: &[String]) -> Vec<&str> {
        calls
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_release_runs_steps_in_order() {
        let fixture = Fixture::new();
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        let calls = fixture.tool.calls();
        assert_eq!(
            kinds(&calls),
            vec![
                "test",
                "coverage",
                "set_build_number",
                "build",
                "archive",
                "zip",
                "export_options",
                "export",
            ]
        );
        assert!(calls.contains(&"set_build_number 345".to_string()));
        assert!(calls.contains(&"build LiveAdhoc".to_string()));
        assert_eq!(
            fixture.git.calls(),
            vec![
                "commit v1.2.0 (345) | Build #12".to_string(),
                format!("push origin {}", BRANCH),
            ]
        );
        assert_eq!(fixture.numbers.requests.lock().unwrap().clone(), vec!["example-ios"]);

        let backend = fixture.backend.calls();
        assert_eq!(backend[0], "begin_symbols example-live Live-adhoc-dSYMs.zip");
        assert!(backend.contains(&"finish_symbols Committed".to_string()));
        assert!(backend.contains(&"set_metadata Example.ipa 10".to_string()));
        assert_eq!(backend.last().unwrap(), "distribute example-live 7 [QA]");
        assert!(!fixture.dir.path().join("Live-adhoc-dSYMs.zip").exists());

        assert_eq!(report.version, "1.2.0");
        assert_eq!(report.build_number, 345);
        assert_eq!(
            report.install_links[0].url,
            AppRef::new("example-org", "example-live").install_url(7)
        );
        assert_eq!(
            report.summary.as_deref(),
            Some("Ad hoc build v1.2.0 (345) for Live (Beta) uploaded to AppCenter")
        );
        assert_eq!(fixture.tracker.transitions().len(), 1);
        assert_eq!(fixture.chat.messages().len(), 1);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn test_development_skips_symbols_and_distribution() {
        let fixture = Fixture::new();
        let skip = SkipFlags {
            test: true,
            ..Default::default()
        };
        let request = fixture.request(ExportMethod::Development, skip);

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        assert!(fixture.backend.calls().is_empty());
        assert!(!fixture.tool.calls().iter().any(|c| c.starts_with("zip")));
        assert!(!report.ran(ReleaseStep::Symbols));
        assert!(report.install_links.is_empty());
        assert!(fixture.tracker.transitions().is_empty());
        assert_eq!(fixture.chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_symbol_packaging_failure_is_not_fatal() {
        let fixture = Fixture {
            tool: Arc::new(FakeBuildTool::new("1.2.0", 41).failing_on("zip")),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        let failures: Vec<_> = report.failures().map(|s| s.step).collect();
        assert_eq!(failures, vec![ReleaseStep::Symbols]);
        assert_eq!(report.install_links.len(), 1);
        assert!(fixture
            .backend
            .calls()
            .iter()
            .all(|c| !c.starts_with("begin_symbols")));
    }

    #[tokio::test]
    async fn test_aborted_symbol_upload_still_deploys() {
        let mut backend = FakeBackend::new(4);
        backend.fail_symbol_blob = true;
        let fixture = Fixture {
            backend: Arc::new(backend),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        assert!(fixture
            .backend
            .calls()
            .contains(&"finish_symbols Aborted".to_string()));
        assert_eq!(report.failures().count(), 0);
        assert_eq!(report.install_links.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_failure_aborts_release() {
        let fixture = Fixture {
            tool: Arc::new(FakeBuildTool::new("1.2.0", 41).failing_on("archive")),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let err = fixture
            .service()
            .prepare_and_release(&request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::Tool(ToolError::InvocationFailed { .. })
        ));
        assert!(!fixture.tool.calls().iter().any(|c| c.starts_with("export")));
        assert!(fixture.backend.calls().is_empty());
        assert!(fixture.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_is_fatal() {
        let mut git = FakeGit::on(BRANCH);
        git.fail_push = true;
        let fixture = Fixture {
            git: Arc::new(git),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let err = fixture
            .service()
            .prepare_and_release(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, ReleaseError::Git(GitError::CommandFailed { .. })));
        assert!(!fixture.tool.calls().iter().any(|c| c.starts_with("build")));
    }

    #[tokio::test]
    async fn test_dirty_tree_stops_before_anything_runs() {
        let mut git = FakeGit::on(BRANCH);
        git.clean = false;
        let fixture = Fixture {
            git: Arc::new(git),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let err = fixture
            .service()
            .prepare_and_release(&request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::Precondition(PreconditionError::DirtyWorkingTree)
        ));
        assert!(fixture.tool.calls().is_empty());
        assert!(fixture.git.calls().is_empty());
    }

    #[tokio::test]
    async fn test_release_branch_requires_confluence() {
        let fixture = Fixture {
            git: Arc::new(FakeGit::on("release/1.2.0/ios")),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());
        let mut service = fixture.service();
        service.release_notes = ReleaseNotesService::new(
            Err(missing("CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID")),
            Err(missing("GITHUB_TOKEN")),
        );

        let err = service.prepare_and_release(&request).await.unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::Precondition(PreconditionError::MissingEnvironment(ref name))
                if name == "CONFLUENCE_RELEASE_NOTES_PARENT_PAGE_ID"
        ));
        assert!(fixture.tool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failures_are_recorded() {
        let mut tracker = FakeTracker::new();
        tracker.fail = true;
        let fixture = Fixture {
            tracker: Arc::new(tracker),
            chat: Arc::new(FakeChat {
                fail: true,
                ..Default::default()
            }),
            ..Fixture::new()
        };
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        let failures: Vec<_> = report.failures().map(|s| s.step).collect();
        assert_eq!(failures, vec![ReleaseStep::Jira, ReleaseStep::Slack]);
        assert_eq!(report.install_links.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_deploy_sends_nothing() {
        let fixture = Fixture::new();
        let skip = SkipFlags {
            test: true,
            deploy: true,
            ..Default::default()
        };
        let request = fixture.request(ExportMethod::AdHoc, skip);

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        assert!(!report.ran(ReleaseStep::Deploy));
        assert!(report.summary.is_none());
        assert!(fixture
            .backend
            .calls()
            .iter()
            .all(|c| !c.starts_with("new_upload")));
        assert!(fixture.chat.messages().is_empty());
        assert!(fixture.tracker.transitions().is_empty());
    }

    #[tokio::test]
    async fn test_app_store_uploads_with_altool() {
        let fixture = Fixture::new();
        let skip = SkipFlags {
            test: true,
            jira: true,
            ..Default::default()
        };
        let request = fixture.request(ExportMethod::AppStore, skip);

        let report = fixture.service().prepare_and_release(&request).await.unwrap();

        assert!(fixture
            .tool
            .calls()
            .contains(&"altool com.example.app 1.2.0 345".to_string()));
        assert!(fixture
            .backend
            .calls()
            .iter()
            .all(|c| !c.starts_with("new_upload")));
        assert!(report.install_links.is_empty());
        assert_eq!(
            report.summary.as_deref(),
            Some("Appstore build v1.2.0 (345) for Live (Beta) uploaded to TestFlight")
        );
    }

    #[tokio::test]
    async fn test_missing_app_center_owner_fails_before_build() {
        let fixture = Fixture::new();
        let request = fixture.request(ExportMethod::Enterprise, SkipFlags::default());
        let service = fixture
            .service()
            .with_app_center_owner(Err(missing(APPCENTER_OWNER_NAME)));

        let err = service.prepare_and_release(&request).await.unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::Precondition(PreconditionError::MissingEnvironment(_))
        ));
        assert!(fixture.tool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_build_and_deploy_uses_current_build_number() {
        let fixture = Fixture::new();
        let request = fixture.request(ExportMethod::AdHoc, SkipFlags::default());

        let report = fixture.service().build_and_deploy(&request).await.unwrap();

        assert_eq!(report.build_number, 41);
        assert!(fixture.git.calls().is_empty());
        assert!(fixture.numbers.requests.lock().unwrap().is_empty());
        assert_eq!(
            kinds(&fixture.tool.calls()),
            vec!["build", "archive", "zip", "export_options", "export"]
        );
        assert_eq!(report.install_links.len(), 1);
    }
}
