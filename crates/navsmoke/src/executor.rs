//! Scenario execution.
//!
//! [`ScenarioExecutor::run`] gives a scenario its own [`TestEnvironment`],
//! executes the steps strictly in order and turns whatever happens into an
//! [`Outcome`]. The environment is torn down exactly once on every path,
//! including a scenario timeout and a panic inside a step.
//!
//! [`ScenarioExecutor::run_all`] fans scenarios out over the tokio runtime,
//! bounded by the configured concurrency.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::condition::{Condition, ExchangeLog};
use crate::config::HarnessConfig;
use crate::context::{EnvironmentConfig, ScenarioState, TestEnvironment};
use crate::dispatch::ActionDispatcher;
use crate::driver::EnvironmentFactory;
use crate::reporter::Reporter;
use crate::result::{SmokeError, SmokeResult};
use crate::scenario::{ActionKind, Scenario, Severity, Step, StepKind};
use crate::wait::{Poller, WaitOptions};

const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(5);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A step that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    /// 1-based step number; `None` for failures outside any step
    pub step: Option<usize>,
    /// Step label
    pub label: String,
    /// Severity of the failed step
    pub severity: Severity,
    /// Error kind, e.g. `TimeoutExceeded`
    pub kind: String,
    /// Error message
    pub message: String,
    /// Last observation, when the error carried one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    /// PNG captured at failure time
    #[serde(skip)]
    pub screenshot: Option<Vec<u8>>,
}

impl StepFailure {
    /// Failure of step `index` (0-based) with `err`
    #[must_use]
    pub fn from_error(index: usize, step: &Step, err: &SmokeError) -> Self {
        Self {
            step: Some(index + 1),
            label: step.describe(),
            severity: step.severity,
            kind: err.kind().to_string(),
            message: err.to_string(),
            observation: err.observation().map(str::to_string),
            screenshot: None,
        }
    }

    /// Failure before or after the steps (setup, definition)
    #[must_use]
    pub fn setup(label: &str, err: &SmokeError) -> Self {
        Self {
            step: None,
            label: label.to_string(),
            severity: Severity::Required,
            kind: err.kind().to_string(),
            message: err.to_string(),
            observation: err.observation().map(str::to_string),
            screenshot: None,
        }
    }

    /// Where the failure happened
    #[must_use]
    pub fn location(&self) -> String {
        match self.step {
            Some(step) => format!("step {step} ({})", self.label),
            None => self.label.clone(),
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Every step succeeded
    Passed,
    /// A required step failed (or the environment broke)
    Failed {
        /// The aborting failure
        failure: StepFailure,
        /// Optional failures recorded before the abort
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        optional_failures: Vec<StepFailure>,
    },
    /// Only optional steps failed
    Partial {
        /// The optional failures
        optional_failures: Vec<StepFailure>,
    },
}

impl Outcome {
    /// Terminal state the outcome corresponds to
    #[must_use]
    pub const fn state(&self) -> ScenarioState {
        match self {
            Self::Passed => ScenarioState::Passed,
            Self::Failed { .. } => ScenarioState::Failed,
            Self::Partial { .. } => ScenarioState::Partial,
        }
    }

    /// Whether a required step failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The aborting failure, if any
    #[must_use]
    pub const fn failure(&self) -> Option<&StepFailure> {
        match self {
            Self::Failed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Optional failures recorded
    #[must_use]
    pub fn optional_failures(&self) -> &[StepFailure] {
        match self {
            Self::Passed => &[],
            Self::Failed {
                optional_failures, ..
            }
            | Self::Partial { optional_failures } => optional_failures,
        }
    }

    fn from_parts(failure: Option<StepFailure>, optional_failures: Vec<StepFailure>) -> Self {
        match failure {
            Some(failure) => Self::Failed {
                failure,
                optional_failures,
            },
            None if optional_failures.is_empty() => Self::Passed,
            None => Self::Partial { optional_failures },
        }
    }
}

/// Everything recorded about one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario id
    pub id: String,
    /// Scenario title
    pub title: String,
    /// Outcome
    pub outcome: Outcome,
    /// Steps that ran to completion
    pub steps_run: usize,
    /// Steps defined
    pub steps_total: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Environment the scenario ran in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Uuid>,
}

impl ScenarioReport {
    /// Wall time
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Progress shared between the step loop and the code that survives its
/// cancellation
#[derive(Debug, Default)]
struct RunLog {
    current: Option<(usize, String, Severity)>,
    optional: Vec<StepFailure>,
    steps_run: usize,
}

fn lock(log: &Mutex<RunLog>) -> std::sync::MutexGuard<'_, RunLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Runs scenarios against environments from a factory
#[derive(Clone)]
pub struct ScenarioExecutor {
    factory: Arc<dyn EnvironmentFactory>,
    config: HarnessConfig,
    dispatcher: ActionDispatcher,
}

impl std::fmt::Debug for ScenarioExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioExecutor")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl ScenarioExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(factory: Arc<dyn EnvironmentFactory>, config: HarnessConfig) -> Self {
        let dispatcher = ActionDispatcher::new(config.wait_options())
            .with_base_url(config.base_url.clone())
            .with_navigation_timeout(config.navigation_timeout());
        Self {
            factory,
            config,
            dispatcher,
        }
    }

    /// Configuration in effect
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `scenario` in the suite default environment merged with its override
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let environment = match &scenario.environment {
            Some(overrides) => self.config.environment.merge(overrides),
            None => self.config.environment.clone(),
        };
        self.run(scenario, &environment).await
    }

    /// Run `scenario` in a fresh environment built from `environment`
    pub async fn run(&self, scenario: &Scenario, environment: &EnvironmentConfig) -> ScenarioReport {
        let span = tracing::info_span!("scenario", id = %scenario.id);
        self.run_inner(scenario, environment).instrument(span).await
    }

    async fn run_inner(&self, scenario: &Scenario, environment: &EnvironmentConfig) -> ScenarioReport {
        let started = Instant::now();
        let mut state = ScenarioState::Pending;
        advance(&mut state, ScenarioState::Running);
        tracing::info!(title = %scenario.title, steps = scenario.steps.len(), "scenario started");

        let report = |outcome: Outcome, steps_run: usize, environment: Option<Uuid>| ScenarioReport {
            id: scenario.id.clone(),
            title: scenario.title.clone(),
            outcome,
            steps_run,
            steps_total: scenario.steps.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            environment,
        };

        if let Err(err) = scenario.validate() {
            let outcome = Outcome::from_parts(Some(StepFailure::setup("scenario definition", &err)), vec![]);
            advance(&mut state, outcome.state());
            tracing::error!(error = %err, "scenario rejected");
            return report(outcome, 0, None);
        }

        let budget = scenario
            .scenario_timeout()
            .unwrap_or_else(|| self.config.scenario_timeout());
        let env = match self.create_environment(environment.clone(), budget).await {
            Ok(env) => env,
            Err(err) => {
                tracing::error!(error = %err, "environment creation failed");
                let outcome = Outcome::from_parts(Some(StepFailure::setup("environment setup", &err)), vec![]);
                advance(&mut state, outcome.state());
                return report(outcome, 0, None);
            }
        };

        let log = Mutex::new(RunLog::default());
        let remaining = budget.saturating_sub(started.elapsed());
        let steps = tokio::time::timeout(remaining, self.execute_steps(scenario, &env, &log));
        let result = AssertUnwindSafe(steps).catch_unwind().await;

        let mut failure = match result {
            Ok(Ok(failure)) => failure,
            Ok(Err(_)) => {
                let err = SmokeError::TimeoutExceeded {
                    waited_for: format!("scenario {}", scenario.id),
                    ms: budget.as_millis() as u64,
                    last_observation: "scenario budget exhausted".to_string(),
                };
                tracing::error!(budget_ms = budget.as_millis() as u64, "scenario timed out");
                Some(failure_at_current(&log, &err))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, "scenario panicked");
                let mut failure = failure_at_current(
                    &log,
                    &SmokeError::InvalidState {
                        message: format!("panic: {message}"),
                    },
                );
                failure.kind = "Panic".to_string();
                Some(failure)
            }
        };

        if let Some(failure) = failure.as_mut() {
            if self.config.screenshot_on_failure && failure.severity == Severity::Required {
                failure.screenshot = capture_screenshot(&env).await;
            }
        }

        match tokio::time::timeout(TEARDOWN_TIMEOUT, env.teardown()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "teardown failed"),
            Err(_) => tracing::warn!("teardown timed out"),
        }

        let (optional, steps_run) = {
            let mut log = lock(&log);
            (std::mem::take(&mut log.optional), log.steps_run)
        };
        let outcome = Outcome::from_parts(failure, optional);
        advance(&mut state, outcome.state());
        let report = report(outcome, steps_run, Some(env.id()));
        tracing::info!(
            outcome = %state,
            steps_run = report.steps_run,
            duration_ms = report.duration_ms,
            "scenario finished"
        );
        report
    }

    /// Execute steps in order; returns the aborting failure, if any
    /// Create an environment within `budget`.
    ///
    /// Creation runs on its own task and is never cancelled midway: an
    /// environment that shows up after the deadline is torn down in the
    /// background so its browser context is released.
    async fn create_environment(
        &self,
        environment: EnvironmentConfig,
        budget: Duration,
    ) -> SmokeResult<TestEnvironment> {
        let factory = Arc::clone(&self.factory);
        let mut creation = tokio::spawn(
            async move { TestEnvironment::create(factory.as_ref(), environment).await }.in_current_span(),
        );
        let waited = tokio::time::timeout(budget, &mut creation).await;
        match waited {
            Ok(Ok(created)) => created,
            Ok(Err(join)) => Err(SmokeError::fatal(format!("environment creation aborted: {join}"))),
            Err(_) => {
                tokio::spawn(
                    async move {
                        if let Ok(Ok(env)) = creation.await {
                            tracing::warn!(
                                environment = %env.id(),
                                "tearing down environment created after its deadline"
                            );
                            if let Err(err) = env.teardown().await {
                                tracing::warn!(error = %err, "late environment teardown failed");
                            }
                        }
                    }
                    .in_current_span(),
                );
                Err(SmokeError::fatal(format!(
                    "environment not ready within {}ms",
                    budget.as_millis()
                )))
            }
        }
    }

    async fn execute_steps(
        &self,
        scenario: &Scenario,
        env: &TestEnvironment,
        log: &Mutex<RunLog>,
    ) -> Option<StepFailure> {
        let mut exchanges = ExchangeLog::new();
        for (index, step) in scenario.steps.iter().enumerate() {
            let label = step.describe();
            lock(log).current = Some((index, label.clone(), step.severity));
            tracing::debug!(step = index + 1, %label, severity = %step.severity, "step started");

            match self.execute_step(env, step, &mut exchanges).await {
                Ok(()) => tracing::debug!(step = index + 1, "step passed"),
                Err(err) if err.is_fatal() || !step.is_optional() => {
                    tracing::debug!(step = index + 1, error = %err, "step failed");
                    return Some(StepFailure::from_error(index, step, &err));
                }
                Err(err) => {
                    tracing::warn!(step = index + 1, %label, error = %err, "optional step failed");
                    lock(log).optional.push(StepFailure::from_error(index, step, &err));
                }
            }
            lock(log).steps_run += 1;
        }
        None
    }

    async fn execute_step(
        &self,
        env: &TestEnvironment,
        step: &Step,
        exchanges: &mut ExchangeLog,
    ) -> SmokeResult<()> {
        match &step.kind {
            StepKind::Navigate { url, expect_status } => {
                let result = self
                    .dispatcher
                    .perform(env, &ActionKind::Navigate(url.clone()), None)
                    .await?;
                let Some(expect) = expect_status else {
                    return Ok(());
                };
                let status = result.navigation.and_then(|n| n.status);
                match status {
                    Some(status) if expect.contains(status) => Ok(()),
                    other => Err(SmokeError::AssertionFailed {
                        message: format!("document status in {expect}"),
                        observation: other.map_or_else(
                            || "no status reported".to_string(),
                            |s| format!("status={s}"),
                        ),
                    }),
                }
            }
            StepKind::Locate { target, scope } => {
                let locator = match scope {
                    Some(scope) => scope.within(target),
                    None => target.clone(),
                };
                let condition = Condition::Attached(locator.clone());
                let outcome = self
                    .await_condition(env, &condition, None, exchanges)
                    .await;
                match outcome {
                    Err(SmokeError::TimeoutExceeded { ms, .. }) => Err(SmokeError::TargetNotFound {
                        selector: locator.to_string(),
                        ms,
                    }),
                    other => other,
                }
            }
            StepKind::Act { target, action } => self
                .dispatcher
                .perform(env, action, target.as_ref())
                .await
                .map(|_| ()),
            StepKind::ActAndAwaitExchange {
                target,
                action,
                exchange,
                name,
                expect,
            } => {
                let result = self
                    .dispatcher
                    .perform_awaiting(env, action, target.as_ref(), exchange)
                    .await?;
                let observed = result.exchange.ok_or_else(|| SmokeError::InvalidState {
                    message: format!("no exchange recorded for {exchange}"),
                })?;
                if let Some(name) = name {
                    exchanges.insert(name.clone(), observed.clone());
                }
                if expect.contains(observed.status) {
                    Ok(())
                } else {
                    Err(SmokeError::AssertionFailed {
                        message: format!("{exchange} status in {expect}"),
                        observation: observed.to_string(),
                    })
                }
            }
            StepKind::AwaitCondition {
                condition,
                timeout_ms,
            } => self.await_condition(env, condition, *timeout_ms, exchanges).await,
            StepKind::Assert { condition } => {
                let observation = condition.evaluate(env.driver(), exchanges).await?;
                if observation.satisfied {
                    Ok(())
                } else {
                    Err(SmokeError::AssertionFailed {
                        message: condition.to_string(),
                        observation: observation.detail,
                    })
                }
            }
        }
    }

    async fn await_condition(
        &self,
        env: &TestEnvironment,
        condition: &Condition,
        timeout_ms: Option<u64>,
        exchanges: &ExchangeLog,
    ) -> SmokeResult<()> {
        let mut options: WaitOptions = self.config.wait_options();
        if let Some(timeout_ms) = timeout_ms {
            options = options.with_timeout(timeout_ms);
        }
        let driver = env.driver();
        let outcome = Poller::new(options)
            .await_condition(&condition.to_string(), move || {
                condition.evaluate(driver, exchanges)
            })
            .await?;
        tracing::debug!(
            condition = %condition,
            polls = outcome.polls,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "condition satisfied"
        );
        Ok(())
    }

    /// Run every scenario, at most `concurrency` at a time, recording each
    /// report as it completes. Returns the reports in definition order.
    pub async fn run_all(&self, scenarios: Vec<Scenario>, reporter: &mut Reporter) -> Vec<ScenarioReport> {
        self.run_all_with(scenarios, reporter, |_| {}).await
    }

    /// [`run_all`](Self::run_all) with a callback invoked per completed scenario
    pub async fn run_all_with(
        &self,
        scenarios: Vec<Scenario>,
        reporter: &mut Reporter,
        mut on_complete: impl FnMut(&ScenarioReport),
    ) -> Vec<ScenarioReport> {
        let permits = Arc::new(Semaphore::new(self.config.effective_concurrency().max(1)));
        let total = scenarios.len();
        let mut tasks = JoinSet::new();

        for (index, scenario) in scenarios.into_iter().enumerate() {
            let executor = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let run = AssertUnwindSafe(executor.run_scenario(&scenario)).catch_unwind().await;
                let report = run.unwrap_or_else(|payload| {
                    let err = SmokeError::InvalidState {
                        message: format!("panic: {}", panic_message(payload.as_ref())),
                    };
                    ScenarioReport {
                        id: scenario.id.clone(),
                        title: scenario.title.clone(),
                        outcome: Outcome::from_parts(Some(StepFailure::setup("executor", &err)), vec![]),
                        steps_run: 0,
                        steps_total: scenario.steps.len(),
                        duration_ms: 0,
                        environment: None,
                    }
                });
                (index, report)
            });
        }

        let mut slots: Vec<Option<ScenarioReport>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => {
                    on_complete(&report);
                    reporter.record_report(report.clone());
                    slots[index] = Some(report);
                }
                Err(err) => tracing::error!(error = %err, "scenario task did not complete"),
            }
        }

        if let Err(err) = self.factory.shutdown().await {
            tracing::warn!(error = %err, "factory shutdown failed");
        }
        slots.into_iter().flatten().collect()
    }
}

fn advance(state: &mut ScenarioState, next: ScenarioState) {
    match state.transition(next) {
        Ok(next) => *state = next,
        Err(err) => tracing::error!(error = %err, "illegal scenario transition"),
    }
}

fn failure_at_current(log: &Mutex<RunLog>, err: &SmokeError) -> StepFailure {
    let current = lock(log).current.clone();
    match current {
        Some((index, label, _)) => StepFailure {
            step: Some(index + 1),
            label,
            severity: Severity::Required,
            kind: err.kind().to_string(),
            message: err.to_string(),
            observation: err.observation().map(str::to_string),
            screenshot: None,
        },
        None => StepFailure::setup("before first step", err),
    }
}

async fn capture_screenshot(env: &TestEnvironment) -> Option<Vec<u8>> {
    match tokio::time::timeout(SCREENSHOT_TIMEOUT, env.driver().screenshot()).await {
        Ok(Ok(png)) => Some(png),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "failure screenshot not captured");
            None
        }
        Err(_) => {
            tracing::warn!("failure screenshot timed out");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::ElementSnapshot;
    use crate::locator::Locator;
    use crate::mock::{MockEffect, MockFactory, MockFault};
    use crate::network::{ExchangeMatcher, HttpMethod, NetworkExchange, StatusClass};

    fn loc(s: &str) -> Locator {
        Locator::parse(s).unwrap()
    }

    fn config() -> HarnessConfig {
        HarnessConfig::default()
            .with_step_timeout(Duration::from_millis(500))
            .with_poll_interval(Duration::from_millis(50))
            .with_navigation_timeout(Duration::from_secs(2))
            .with_screenshots(false)
    }

    fn executor(factory: &Arc<MockFactory>, config: HarnessConfig) -> ScenarioExecutor {
        ScenarioExecutor::new(factory.clone(), config)
    }

    fn map_page(factory: MockFactory) -> Arc<MockFactory> {
        Arc::new(factory.with_script(|page| {
            page.set_element(".leaflet-container", ElementSnapshot::visible());
            page.set_element("button.zoom-in", ElementSnapshot::visible());
        }))
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_from_parts() {
            assert_eq!(Outcome::from_parts(None, vec![]), Outcome::Passed);
            let err = SmokeError::fatal("gone");
            let failure = StepFailure::setup("environment setup", &err);
            assert!(Outcome::from_parts(None, vec![failure.clone()]).state() == ScenarioState::Partial);
            let failed = Outcome::from_parts(Some(failure.clone()), vec![failure]);
            assert!(failed.is_failed());
            assert_eq!(failed.optional_failures().len(), 1);
        }

        #[test]
        fn test_outcome_serializes_with_status_tag() {
            let json = serde_json::to_string(&Outcome::Passed).unwrap();
            assert_eq!(json, r#"{"status":"PASSED"}"#);
        }

        #[test]
        fn test_failure_location() {
            let err = SmokeError::TargetNotFound {
                selector: "#x".into(),
                ms: 10,
            };
            let step = Step::new(StepKind::Locate {
                target: loc("#x"),
                scope: None,
            });
            let failure = StepFailure::from_error(2, &step, &err);
            assert_eq!(failure.step, Some(3));
            assert_eq!(failure.kind, "TargetNotFound");
            assert!(failure.location().starts_with("step 3"));
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_all_required_steps_pass() {
            let factory = map_page(MockFactory::new());
            let scenario = Scenario::new("TC002", "Map display")
                .navigate("")
                .await_condition(Condition::visible(loc(".leaflet-container")))
                .click(loc("button.zoom-in"));

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            assert_eq!(report.outcome, Outcome::Passed);
            assert_eq!(report.steps_run, 3);
            assert_eq!(report.steps_total, 3);
            assert!(report.environment.is_some());
            assert_eq!(factory.total_closes(), 1);
            assert!(factory.pages()[0].was_called("navigate:https://www.navigator.ba/"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_required_timeout_aborts_remaining_steps() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element("button", ElementSnapshot::visible());
            }));
            let scenario = Scenario::new("TC002", "Map display")
                .navigate("")
                .await_condition(Condition::visible(loc(".leaflet-container")))
                .click(loc("button"));

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.step, Some(2));
            assert_eq!(failure.kind, "TimeoutExceeded");
            assert!(failure.observation.as_deref().unwrap().contains("count=0"));
            assert_eq!(report.steps_run, 1);
            let page = &factory.pages()[0];
            assert!(!page.was_called("click"));
            assert_eq!(page.close_count(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_optional_failure_is_partial_and_continues() {
            let factory = map_page(MockFactory::new());
            let scenario = Scenario::new("TC010", "Place details")
                .navigate("")
                .await_within(
                    Condition::visible(loc(".email")),
                    Duration::from_millis(200),
                )
                .optional()
                .click(loc("button.zoom-in"));

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            match &report.outcome {
                Outcome::Partial { optional_failures } => {
                    assert_eq!(optional_failures.len(), 1);
                    assert_eq!(optional_failures[0].step, Some(2));
                    assert_eq!(optional_failures[0].severity, Severity::Optional);
                }
                other => panic!("expected PARTIAL, got {other:?}"),
            }
            assert!(factory.pages()[0].was_called("click:button.zoom-in"));
            assert_eq!(report.steps_run, 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_fatal_error_aborts_optional_step() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element("button", ElementSnapshot::visible());
                page.inject_fault("click", MockFault::Fatal("target crashed".into()));
            }));
            let scenario = Scenario::new("TC003", "Zoom")
                .click(loc("button"))
                .optional()
                .navigate("");

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.kind, "FatalEnvironmentError");
            assert_eq!(failure.step, Some(1));
            assert!(!factory.pages()[0].was_called("navigate"));
            assert_eq!(factory.total_closes(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scenario_timeout_tears_down_once() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element("button", ElementSnapshot::visible());
                page.inject_fault("click", MockFault::Hang);
            }));
            let scenario = Scenario::new("TC004", "Drag")
                .navigate("")
                .click(loc("button"))
                .timeout(Duration::from_secs(1));

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.kind, "TimeoutExceeded");
            assert_eq!(failure.step, Some(2));
            assert_eq!(factory.total_closes(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_panic_in_step_is_caught() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element("button", ElementSnapshot::visible());
                page.inject_fault("click", MockFault::Panic("driver bug".into()));
            }));
            let scenario = Scenario::new("TC003", "Zoom").click(loc("button"));

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.kind, "Panic");
            assert!(failure.message.contains("driver bug"));
            assert_eq!(factory.total_closes(), 1);
        }

        #[tokio::test]
        async fn test_environment_creation_failure() {
            let factory = Arc::new(MockFactory::new().failing_with("no browser"));
            let scenario = Scenario::new("TC001", "Home").navigate("");

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.step, None);
            assert_eq!(failure.label, "environment setup");
            assert!(report.environment.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_late_environment_is_torn_down() {
            let factory = Arc::new(MockFactory::new().with_create_delay(Duration::from_millis(300)));
            let scenario = Scenario::new("TC002", "Map")
                .await_condition(Condition::visible(loc(".leaflet-container")));
            let config = config().with_scenario_timeout(Duration::from_millis(100));

            let report = executor(&factory, config).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.step, None);
            assert!(failure.message.contains("environment not ready within 100ms"));
            assert_eq!(factory.created(), 0);

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(factory.created(), 1);
            assert_eq!(factory.total_closes(), 1);
        }

        #[tokio::test]
        async fn test_invalid_scenario_never_creates_environment() {
            let factory = Arc::new(MockFactory::new());
            let scenario = Scenario::new("TC000", "Empty");

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            assert!(report.outcome.is_failed());
            assert_eq!(factory.created(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_screenshot_attached_to_required_failure() {
            let factory = Arc::new(MockFactory::new());
            let scenario = Scenario::new("TC002", "Map")
                .await_condition(Condition::visible(loc(".leaflet-container")));

            let report = executor(&factory, config().with_screenshots(true))
                .run_scenario(&scenario)
                .await;

            let failure = report.outcome.failure().unwrap();
            assert!(failure.screenshot.as_ref().is_some_and(|png| png.starts_with(b"\x89PNG")));
            let history = factory.pages()[0].history();
            let shot = history.iter().position(|op| op == "screenshot").unwrap();
            let close = history.iter().position(|op| op == "close").unwrap();
            assert!(shot < close);
        }

        #[tokio::test]
        async fn test_navigation_status_checked() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_navigation(Some(503), None);
            }));
            let scenario =
                Scenario::new("TC001", "Home").navigate_expecting("", StatusClass::Success);

            let report = executor(&factory, config()).run_scenario(&scenario).await;

            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.kind, "AssertionFailed");
            assert_eq!(failure.observation.as_deref(), Some("status=503"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_locate_within_scope() {
            let factory = Arc::new(MockFactory::new().with_script(|page| {
                page.set_element(".popup >> h1", ElementSnapshot::visible());
            }));
            let found = Scenario::new("TC010", "Details").step(Step::new(StepKind::Locate {
                target: loc("h1"),
                scope: Some(loc(".popup")),
            }));
            let missing = Scenario::new("TC010", "Details").locate(loc(".nowhere"));

            let exec = executor(&factory, config());
            assert_eq!(exec.run_scenario(&found).await.outcome, Outcome::Passed);
            let report = exec.run_scenario(&missing).await;
            assert_eq!(report.outcome.failure().unwrap().kind, "TargetNotFound");
        }
    }

    mod exchange_tests {
        use super::*;

        fn create_place(status: u16) -> Arc<MockFactory> {
            submit_sends(HttpMethod::Post, status)
        }

        fn submit_sends(method: HttpMethod, status: u16) -> Arc<MockFactory> {
            Arc::new(MockFactory::new().with_script(move |page| {
                page.set_element("button[type=submit]", ElementSnapshot::visible());
                page.on_click(
                    "button[type=submit]",
                    MockEffect::Exchange(NetworkExchange::new(
                        "https://www.navigator.ba/api/places/",
                        method,
                        status,
                    )),
                );
            }))
        }

        fn scenario() -> Scenario {
            Scenario::new("TC020", "Create place")
                .click_and_await(
                    loc("button[type=submit]"),
                    ExchangeMatcher::new("/places/", HttpMethod::Post),
                    "create",
                    StatusClass::Success,
                )
                .assert(Condition::exchange_status("create", StatusClass::Success))
        }

        #[tokio::test]
        async fn test_success_status_passes() {
            let factory = create_place(201);
            let report = executor(&factory, config()).run_scenario(&scenario()).await;
            assert_eq!(report.outcome, Outcome::Passed);
        }

        #[tokio::test]
        async fn test_server_error_fails() {
            let factory = create_place(500);
            let report = executor(&factory, config()).run_scenario(&scenario()).await;
            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.step, Some(1));
            assert_eq!(failure.kind, "AssertionFailed");
            assert!(failure.observation.as_deref().unwrap().contains("500"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_cors_preflight_is_not_the_post() {
            let factory = submit_sends(HttpMethod::Options, 204);
            let report = executor(&factory, config()).run_scenario(&scenario()).await;
            let failure = report.outcome.failure().unwrap();
            assert_eq!(failure.step, Some(1));
            assert_eq!(failure.kind, "TimeoutExceeded");
        }
    }

    mod suite_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_run_all_isolates_and_orders() {
            let factory = map_page(MockFactory::new());
            let scenarios = vec![
                Scenario::new("TC001", "Home").navigate(""),
                Scenario::new("TC002", "Map").await_condition(Condition::visible(loc(".leaflet-container"))),
                Scenario::new("TC099", "Missing").await_condition(Condition::visible(loc(".absent"))),
            ];
            let mut reporter = Reporter::new();
            let mut seen = 0;

            let reports = executor(&factory, config().with_concurrency(2))
                .run_all_with(scenarios, &mut reporter, |_| seen += 1)
                .await;

            assert_eq!(seen, 3);
            let ids: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, ["TC001", "TC002", "TC099"]);
            let mut envs: Vec<_> = reports.iter().filter_map(|r| r.environment).collect();
            envs.sort();
            envs.dedup();
            assert_eq!(envs.len(), 3);
            assert_eq!(factory.created(), 3);
            assert_eq!(factory.total_closes(), 3);

            let summary = reporter.summarize();
            assert_eq!(summary.passed, 2);
            assert_eq!(summary.failed, 1);
        }
    }
}
