//! Suite runner: resolves configuration and scenarios, drives the executor

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use navsmoke::{
    catalog, EnvironmentFactory, HarnessConfig, LaunchOptions, Report, ReportFormat, Reporter, Scenario,
    ScenarioExecutor,
};

use crate::commands::{RunArgs, SourceArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Harness configuration from file, then environment, then flags
pub fn harness_config(source: &SourceArgs) -> CliResult<HarnessConfig> {
    let config = match &source.config {
        Some(path) => HarnessConfig::load(path)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?,
        None => HarnessConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(url) = &source.base_url {
        config = config.with_base_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

/// `harness_config` plus the run-only flags
pub fn run_config(args: &RunArgs) -> CliResult<HarnessConfig> {
    let mut config = harness_config(&args.source)?;
    if let Some(jobs) = args.jobs {
        config = config.with_concurrency(jobs);
    }
    if args.headed {
        config = config.with_headless(false);
    }
    if let Some(path) = &args.chromium_path {
        config.chromium_path = Some(path.clone());
    }
    if let Some(ms) = args.step_timeout {
        if ms == 0 {
            return Err(CliError::invalid_argument("--step-timeout must be positive"));
        }
        config = config.with_step_timeout(Duration::from_millis(ms));
    }
    if args.no_screenshots {
        config = config.with_screenshots(false);
    }
    config.validate()?;
    Ok(config)
}

/// Scenarios from `--scenarios` or the built-in suite, narrowed by `--filter`
pub fn select_scenarios(source: &SourceArgs, config: &HarnessConfig) -> CliResult<Vec<Scenario>> {
    let scenarios = match &source.scenarios {
        Some(path) => navsmoke::load_scenarios(path)?,
        None => catalog::all(config),
    };
    Ok(match source.filter.as_deref() {
        Some(filter) => scenarios.into_iter().filter(|s| s.matches_filter(filter)).collect(),
        None => scenarios,
    })
}

/// Render `report` to `output`, or to stdout when none is given
pub fn emit_report(report: &Report, format: ReportFormat, output: Option<&Path>) -> CliResult<()> {
    let rendered = report
        .render(format)
        .map_err(|e| CliError::report_generation(e.to_string()))?;
    match output {
        Some(path) => std::fs::write(path, rendered)
            .map_err(|e| CliError::report_generation(format!("{}: {e}", path.display()))),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
async fn launch(options: &LaunchOptions) -> CliResult<Arc<dyn EnvironmentFactory>> {
    let factory = navsmoke::ChromiumFactory::launch(options).await?;
    Ok(Arc::new(factory))
}

#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
async fn launch(options: &LaunchOptions) -> CliResult<Arc<dyn EnvironmentFactory>> {
    tracing::debug!(headless = options.headless, "no browser driver compiled in");
    Err(CliError::BrowserUnavailable)
}

/// Runs a suite and reports progress on stderr
#[derive(Debug)]
pub struct SuiteRunner {
    progress: ProgressReporter,
}

impl SuiteRunner {
    /// Create a new runner
    #[must_use]
    pub fn new(cli: &CliConfig) -> Self {
        let progress = ProgressReporter::new(cli.use_color(), cli.verbosity.is_quiet())
            .with_verbose(cli.verbosity.is_verbose());
        Self { progress }
    }

    /// Run the selected scenarios against a freshly launched browser
    pub async fn run(&mut self, args: &RunArgs) -> CliResult<Report> {
        let config = run_config(args)?;
        let scenarios = select_scenarios(&args.source, &config)?;

        let mut reporter = Reporter::new();
        reporter.start();
        if scenarios.is_empty() {
            self.progress.warning("No scenarios match");
            return Ok(reporter.summarize());
        }

        let mut options = LaunchOptions::from_config(&config);
        if args.no_sandbox {
            options = options.with_no_sandbox();
        }
        let factory = launch(&options).await?;
        self.run_with(factory, config, scenarios, reporter).await
    }

    /// Run `scenarios` with an already created factory
    pub async fn run_with(
        &mut self,
        factory: Arc<dyn EnvironmentFactory>,
        config: HarnessConfig,
        scenarios: Vec<Scenario>,
        mut reporter: Reporter,
    ) -> CliResult<Report> {
        self.progress.info(&format!(
            "{} scenario(s) against {} at {}",
            scenarios.len(),
            config.base_url,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        tracing::info!(
            scenarios = scenarios.len(),
            concurrency = config.effective_concurrency(),
            base_url = %config.base_url,
            "suite started"
        );

        let executor = ScenarioExecutor::new(factory, config);
        self.progress.start_progress(scenarios.len() as u64, "running");
        let progress = &self.progress;
        executor
            .run_all_with(scenarios, &mut reporter, |report| progress.scenario_done(report))
            .await;
        self.progress.finish();

        let report = reporter.summarize();
        tracing::info!(
            passed = report.passed,
            partial = report.partial,
            failed = report.failed,
            "suite finished"
        );
        self.progress.summary(&report);
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use navsmoke::mock::MockFactory;
    use navsmoke::{ElementSnapshot, Outcome};
    use std::path::PathBuf;

    fn source() -> SourceArgs {
        SourceArgs::default()
    }

    fn run_args(source: SourceArgs) -> RunArgs {
        RunArgs {
            source,
            format: crate::commands::FormatArg::Text,
            output: None,
            jobs: None,
            headed: false,
            chromium_path: None,
            no_sandbox: false,
            step_timeout: None,
            no_screenshots: false,
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_flags_override_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("navsmoke.yaml");
            std::fs::write(&path, "base_url: https://staging.navigator.ba/\nconcurrency: 2\n").unwrap();

            let mut source = source();
            source.config = Some(path.clone());
            let config = harness_config(&source).unwrap();
            assert_eq!(config.concurrency, 2);

            source.base_url = Some("http://localhost:8080/".into());
            let mut args = run_args(source);
            args.jobs = Some(6);
            args.headed = true;
            args.step_timeout = Some(2500);
            args.no_screenshots = true;
            let config = run_config(&args).unwrap();
            assert_eq!(config.base_url, "http://localhost:8080/");
            assert_eq!(config.concurrency, 6);
            assert!(!config.headless);
            assert_eq!(config.step_timeout_ms, 2500);
            assert!(!config.screenshot_on_failure);
        }

        #[test]
        fn test_missing_config_file() {
            let mut source = source();
            source.config = Some(PathBuf::from("/nonexistent/navsmoke.yaml"));
            let err = harness_config(&source).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
            assert!(err.to_string().contains("/nonexistent/navsmoke.yaml"));
        }

        #[test]
        fn test_invalid_base_url_rejected() {
            let mut source = source();
            source.base_url = Some("navigator.ba".into());
            assert!(harness_config(&source).is_err());
        }

        #[test]
        fn test_zero_step_timeout_rejected() {
            let mut args = run_args(source());
            args.step_timeout = Some(0);
            let err = run_config(&args).unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
            assert!(err.to_string().contains("--step-timeout"));
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_builtin_suite() {
            let config = HarnessConfig::default();
            assert_eq!(select_scenarios(&source(), &config).unwrap().len(), catalog::SCENARIO_IDS.len());
        }

        #[test]
        fn test_filter_by_tag() {
            let mut source = source();
            source.filter = Some("mobile".into());
            let scenarios = select_scenarios(&source, &HarnessConfig::default()).unwrap();
            assert_eq!(scenarios.len(), 1);
            assert_eq!(scenarios[0].id, "TC031");
        }

        #[test]
        fn test_scenario_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("smoke.yaml");
            std::fs::write(
                &path,
                "- { id: X1, title: Only, steps: [ { navigate: {} } ] }\n",
            )
            .unwrap();
            let mut source = source();
            source.scenarios = Some(path);
            let scenarios = select_scenarios(&source, &HarnessConfig::default()).unwrap();
            assert_eq!(scenarios.len(), 1);
            assert_eq!(scenarios[0].id, "X1");
        }
    }

    mod emit_tests {
        use super::*;

        #[test]
        fn test_write_report_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("report.xml");
            let mut reporter = Reporter::new();
            reporter.record("TC002", Outcome::Passed);
            emit_report(&reporter.summarize(), ReportFormat::Junit, Some(&path)).unwrap();
            let xml = std::fs::read_to_string(&path).unwrap();
            assert!(xml.contains("<testsuite"));
            assert!(xml.contains("TC002"));
        }

        #[test]
        fn test_unwritable_output() {
            let report = Reporter::new().summarize();
            let err = emit_report(&report, ReportFormat::Json, Some(Path::new("/nonexistent/dir/r.json")))
                .unwrap_err();
            assert!(matches!(err, CliError::ReportGeneration { .. }));
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_run_with_mock_factory() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element(".leaflet-container", ElementSnapshot::visible());
            }));
            let config = HarnessConfig::default().with_screenshots(false);
            let scenarios = vec![catalog::map_display()];
            let mut runner = SuiteRunner::new(&CliConfig::new().with_verbosity(crate::Verbosity::Quiet));

            let report = runner
                .run_with(factory, config, scenarios, Reporter::new())
                .await
                .unwrap();
            assert_eq!(report.total, 1);
            assert!(report.success());
        }

        #[tokio::test]
        async fn test_empty_selection_skips_launch() {
            let mut source = source();
            source.filter = Some("TC999".into());
            let mut runner = SuiteRunner::new(&CliConfig::new().with_verbosity(crate::Verbosity::Quiet));
            let report = runner.run(&run_args(source)).await.unwrap();
            assert_eq!(report.total, 0);
            assert!(report.success());
        }
    }
}
