//! Harness configuration.
//!
//! Loaded from YAML, then overridden by environment variables and finally by
//! command-line flags. Every field has a default, so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::{EnvironmentConfig, Geolocation};
use crate::network::StatusClass;
use crate::result::{SmokeError, SmokeResult};
use crate::wait::{
    WaitOptions, DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Site the built-in catalog targets by default
pub const DEFAULT_BASE_URL: &str = "https://www.navigator.ba/";

/// Default scenario budget (2 minutes)
pub const DEFAULT_SCENARIO_TIMEOUT_MS: u64 = 120_000;

/// Overrides the base URL
pub const ENV_BASE_URL: &str = "NAVSMOKE_BASE_URL";

/// Path of the configuration file
pub const ENV_CONFIG: &str = "NAVSMOKE_CONFIG";

/// Chromium executable
pub const ENV_CHROMIUM_PATH: &str = "CHROMIUM_PATH";

/// UI strings for one interface language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageStrings {
    /// `data-ga-label` of the language switch link
    pub code: String,
    /// Placeholder of the search input
    pub search_placeholder: String,
    /// Navigation entry for creating a place
    pub create_place: String,
    /// Navigation entry for feedback
    pub feedback: String,
}

/// Values typed into the create-place form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceForm {
    /// Place name
    pub name: String,
    /// City
    pub city: String,
    /// Postal code
    pub zip_code: String,
    /// Street
    pub street: String,
    /// House number
    pub house_number: String,
    /// Description
    pub description: String,
    /// Opening time
    pub opens: String,
    /// Closing time
    pub closes: String,
    /// Phone number
    pub phone: String,
    /// Website
    pub website: String,
    /// Email
    pub email: String,
}

impl Default for PlaceForm {
    fn default() -> Self {
        Self {
            name: "Test Place Name".to_string(),
            city: "Sarajevo".to_string(),
            zip_code: "71000".to_string(),
            street: "Titova".to_string(),
            house_number: "5A".to_string(),
            description: "This is a test place created by automated test.".to_string(),
            opens: "08:00".to_string(),
            closes: "16:00".to_string(),
            phone: "033222333".to_string(),
            website: "http://testplace.ba".to_string(),
            email: "info@testplace.ba".to_string(),
        }
    }
}

/// What the site under test is expected to show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteExpectations {
    /// Expected status of the home document
    pub home_status: StatusClass,
    /// Fragment the home page lands on
    pub home_url_suffix: String,
    /// Term searched for; results must contain it literally
    pub search_term: String,
    /// Category filtered by
    pub category: String,
    /// Expected status of the create-place request
    pub create_status: StatusClass,
    /// Fixed location granted to geolocation scenarios
    pub geolocation: Geolocation,
    /// Locale of geolocation scenarios
    pub locale: String,
    /// English UI strings
    pub english: LanguageStrings,
    /// Bosnian UI strings
    pub bosnian: LanguageStrings,
    /// Create-place form data
    pub place: PlaceForm,
}

impl Default for SiteExpectations {
    fn default() -> Self {
        Self {
            home_status: StatusClass::Success,
            home_url_suffix: "#/categories".to_string(),
            search_term: "Mrvica".to_string(),
            category: "food".to_string(),
            create_status: StatusClass::Success,
            geolocation: Geolocation::new(43.8563, 18.4131),
            locale: "en-US".to_string(),
            english: LanguageStrings {
                code: "en".to_string(),
                search_placeholder: "Search street or place".to_string(),
                create_place: "Create Place".to_string(),
                feedback: "Suggest features - Report a problem".to_string(),
            },
            bosnian: LanguageStrings {
                code: "bs".to_string(),
                search_placeholder: "Traži ulicu ili objekat".to_string(),
                create_place: "Kreiraj objekat".to_string(),
                feedback: "Predloži ideju - Pošalji komentar".to_string(),
            },
            place: PlaceForm::default(),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Base URL relative navigations resolve against
    pub base_url: String,
    /// Default budget for conditions and readiness waits
    pub step_timeout_ms: u64,
    /// Poll interval for conditions
    pub poll_interval_ms: u64,
    /// Budget for page loads and network exchanges
    pub navigation_timeout_ms: u64,
    /// Budget for a whole scenario
    pub scenario_timeout_ms: u64,
    /// Scenarios run at once (0 = number of CPUs)
    pub concurrency: usize,
    /// Capture a screenshot when a required step fails
    pub screenshot_on_failure: bool,
    /// Run the browser without a window
    pub headless: bool,
    /// Chromium executable override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromium_path: Option<String>,
    /// Environment every scenario starts from
    pub environment: EnvironmentConfig,
    /// Expected site content
    pub expectations: SiteExpectations,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            step_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            scenario_timeout_ms: DEFAULT_SCENARIO_TIMEOUT_MS,
            concurrency: 4,
            screenshot_on_failure: true,
            headless: true,
            chromium_path: None,
            environment: EnvironmentConfig::default(),
            expectations: SiteExpectations::default(),
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML
    ///
    /// # Errors
    ///
    /// `Yaml` on malformed input or unknown keys.
    pub fn from_yaml_str(yaml: &str) -> SmokeResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Yaml` when it does not parse.
    pub fn load(path: impl AsRef<Path>) -> SmokeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded harness config");
        Ok(config)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// `Yaml` if serialization fails.
    pub fn to_yaml(&self) -> SmokeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(path) = lookup(ENV_CHROMIUM_PATH).filter(|v| !v.trim().is_empty()) {
            self.chromium_path = Some(path);
        }
        self
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set step timeout
    #[must_use]
    pub const fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set scenario timeout
    #[must_use]
    pub const fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set concurrency
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable failure screenshots
    #[must_use]
    pub const fn with_screenshots(mut self, enabled: bool) -> Self {
        self.screenshot_on_failure = enabled;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the default environment
    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = environment;
        self
    }

    /// Wait options for conditions and readiness
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout_ms: self.step_timeout_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }

    /// Navigation budget
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Scenario budget
    #[must_use]
    pub const fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario_timeout_ms)
    }

    /// Concurrency with 0 resolved to the number of CPUs
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.concurrency
        }
    }

    /// Reject unusable values
    ///
    /// # Errors
    ///
    /// `Config` describing the first problem.
    pub fn validate(&self) -> SmokeResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SmokeError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        for (name, value) in [
            ("step_timeout_ms", self.step_timeout_ms),
            ("navigation_timeout_ms", self.navigation_timeout_ms),
            ("scenario_timeout_ms", self.scenario_timeout_ms),
        ] {
            if value == 0 {
                return Err(SmokeError::config(format!("{name} must be positive")));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(SmokeError::config("poll_interval_ms must be positive"));
        }
        Ok(())
    }
}
