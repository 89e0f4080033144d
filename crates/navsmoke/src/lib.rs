//! navsmoke: asynchronous UI-assertion runner for browser smoke tests
//!
//! Scenarios are ordered lists of steps (navigate, locate, act, await a
//! condition, assert) executed against a remote, asynchronously rendering
//! page. Every wait is bounded and every failure carries what was last
//! observed.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌────────────────┐   ┌────────────────┐
//! │ Scenario      │──►│ Action         │──►│ PageDriver     │
//! │ Executor      │   │ Dispatcher     │   │ (chromium/mock)│
//! │ (per-scenario │   └───────┬────────┘   └───────▲────────┘
//! │  environment) │           │ readiness          │
//! │               │   ┌───────▼────────┐           │
//! │               │──►│ Condition      │───────────┘
//! └──────┬────────┘   │ Poller         │
//!        │            └────────────────┘
//!        ▼
//! ┌───────────────┐
//! │ Reporter      │  text / JSON / JUnit
//! └───────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use navsmoke::mock::MockFactory;
//! use navsmoke::{Condition, ElementSnapshot, HarnessConfig, Locator, Outcome, Scenario, ScenarioExecutor};
//!
//! # tokio_test_block(async {
//! let factory = Arc::new(MockFactory::new().with_script(|page| {
//!     page.set_element(".leaflet-container", ElementSnapshot::visible());
//! }));
//! let executor = ScenarioExecutor::new(factory, HarnessConfig::default());
//! let scenario = Scenario::new("TC002", "Map display")
//!     .navigate("")
//!     .await_condition(Condition::visible(Locator::new(".leaflet-container")));
//!
//! let report = executor.run_scenario(&scenario).await;
//! assert_eq!(report.outcome, Outcome::Passed);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]

mod browser;
mod condition;
mod config;
mod context;
mod dispatch;
mod driver;
mod executor;
mod locator;
mod network;
mod reporter;
mod result;
mod scenario;
mod wait;

/// Built-in navigator.ba smoke suite
pub mod catalog;

/// Scripted page driver and environment factory
pub mod mock;

/// YAML scenario files
pub mod spec_file;

pub use browser::LaunchOptions;
#[cfg(feature = "browser")]
pub use browser::{ChromiumFactory, ChromiumPage};
pub use condition::{Condition, ExchangeLog};
pub use config::{
    HarnessConfig, LanguageStrings, PlaceForm, SiteExpectations, DEFAULT_BASE_URL,
    DEFAULT_SCENARIO_TIMEOUT_MS, ENV_BASE_URL, ENV_CHROMIUM_PATH, ENV_CONFIG,
};
pub use context::{
    DevicePreset, EnvironmentConfig, Geolocation, ScenarioState, TestEnvironment, Viewport,
};
pub use dispatch::{ActionDispatcher, ActionResult};
pub use driver::{
    ElementSnapshot, EnvironmentFactory, NavigationResponse, OptionChoice, PageDriver,
    PointerEvent, PointerKind,
};
pub use executor::{Outcome, ScenarioExecutor, ScenarioReport, StepFailure};
pub use locator::{BoundingBox, Locator, Pick, Point, Selector};
pub use network::{
    ExchangeMatcher, ExchangeWatch, HttpMethod, NetworkExchange, StatusClass, UrlPattern,
};
pub use reporter::{Report, ReportFormat, Reporter};
pub use result::{SmokeError, SmokeResult};
pub use scenario::{ActionKind, Scenario, Severity, Step, StepKind};
pub use spec_file::{load_scenarios, ScenarioFile};
pub use wait::{
    await_condition, Observation, Poller, WaitOptions, WaitOutcome, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};
