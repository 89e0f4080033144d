//! Isolated test environments.
//!
//! Every scenario runs in its own [`TestEnvironment`]: a fresh page with its
//! own cookies and storage, created from an [`EnvironmentConfig`] and torn
//! down exactly once when the scenario ends.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::driver::{EnvironmentFactory, PageDriver};
use crate::locator::Point;
use crate::result::{SmokeError, SmokeResult};

/// Default viewport width
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
    }
}

/// Geolocation coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    /// Latitude
    pub latitude: f64,
    /// Longitude
    pub longitude: f64,
    /// Accuracy in meters
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

const fn default_accuracy() -> f64 {
    10.0
}

impl Geolocation {
    /// Coordinates with the default accuracy
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: default_accuracy(),
        }
    }
}

/// Named device emulation presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DevicePreset {
    /// iPhone 11 (375x812)
    #[serde(rename = "iphone-11")]
    Iphone11,
    /// Pixel 5 (393x851)
    #[serde(rename = "pixel-5")]
    Pixel5,
    /// Desktop 1280x720
    #[serde(rename = "desktop-720p")]
    Desktop720p,
    /// Desktop 1920x1080
    #[serde(rename = "desktop-1080p")]
    Desktop1080p,
}

impl DevicePreset {
    /// All presets
    pub const ALL: [Self; 4] = [
        Self::Iphone11,
        Self::Pixel5,
        Self::Desktop720p,
        Self::Desktop1080p,
    ];

    /// Preset name as used in configuration files
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Iphone11 => "iphone-11",
            Self::Pixel5 => "pixel-5",
            Self::Desktop720p => "desktop-720p",
            Self::Desktop1080p => "desktop-1080p",
        }
    }

    /// Viewport of the device
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        match self {
            Self::Iphone11 => Viewport::new(375, 812),
            Self::Pixel5 => Viewport::new(393, 851),
            Self::Desktop720p => Viewport::new(1280, 720),
            Self::Desktop1080p => Viewport::new(1920, 1080),
        }
    }

    /// User agent the device reports
    #[must_use]
    pub const fn user_agent(&self) -> &'static str {
        match self {
            Self::Iphone11 => {
                "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1"
            }
            Self::Pixel5 => {
                "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36"
            }
            Self::Desktop720p | Self::Desktop1080p => {
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            }
        }
    }

    /// Whether the device is a phone or tablet
    #[must_use]
    pub const fn is_mobile(&self) -> bool {
        matches!(self, Self::Iphone11 | Self::Pixel5)
    }

    /// Device pixel ratio
    #[must_use]
    pub const fn device_scale_factor(&self) -> f64 {
        match self {
            Self::Iphone11 => 2.0,
            Self::Pixel5 => 2.75,
            Self::Desktop720p | Self::Desktop1080p => 1.0,
        }
    }

    /// Environment config emulating the device
    #[must_use]
    pub fn config(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            device: Some(*self),
            ..EnvironmentConfig::default()
        }
        .resolved()
    }
}

impl FromStr for DevicePreset {
    type Err = SmokeError;

    fn from_str(s: &str) -> SmokeResult<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SmokeError::config(format!("unknown device preset: {s}")))
    }
}

impl fmt::Display for DevicePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a test environment is set up.
///
/// Every field is optional so a scenario override can be layered over the
/// suite default with [`EnvironmentConfig::merge`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EnvironmentConfig {
    /// Device preset applied beneath explicit fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DevicePreset>,
    /// Viewport size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    /// User agent override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Locale (e.g. `en-US`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Granted browser permissions (e.g. `geolocation`)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Fixed geolocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    /// Emulate a mobile device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<bool>,
    /// Device pixel ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
}

impl EnvironmentConfig {
    /// Create an empty config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate a device preset
    #[must_use]
    pub const fn with_device(mut self, device: DevicePreset) -> Self {
        self.device = Some(device);
        self
    }

    /// Set viewport size
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport::new(width, height));
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set locale
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Grant a permission
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }

    /// Set geolocation
    #[must_use]
    pub const fn with_geolocation(mut self, latitude: f64, longitude: f64) -> Self {
        self.geolocation = Some(Geolocation::new(latitude, longitude));
        self
    }

    /// Layer `overrides` on top of `self`; permissions accumulate
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        let mut permissions = self.permissions.clone();
        for permission in &overrides.permissions {
            if !permissions.contains(permission) {
                permissions.push(permission.clone());
            }
        }
        Self {
            device: overrides.device.or(self.device),
            viewport: overrides.viewport.or(self.viewport),
            user_agent: overrides
                .user_agent
                .clone()
                .or_else(|| self.user_agent.clone()),
            locale: overrides.locale.clone().or_else(|| self.locale.clone()),
            permissions,
            geolocation: overrides.geolocation.or(self.geolocation),
            mobile: overrides.mobile.or(self.mobile),
            device_scale_factor: overrides.device_scale_factor.or(self.device_scale_factor),
        }
    }

    /// Fill unset fields from the device preset
    #[must_use]
    pub fn resolved(&self) -> Self {
        let Some(device) = self.device else {
            return self.clone();
        };
        Self {
            viewport: self.viewport.or(Some(device.viewport())),
            user_agent: self
                .user_agent
                .clone()
                .or_else(|| Some(device.user_agent().to_string())),
            mobile: self.mobile.or(Some(device.is_mobile())),
            device_scale_factor: self
                .device_scale_factor
                .or(Some(device.device_scale_factor())),
            ..self.clone()
        }
    }

    /// Effective viewport
    #[must_use]
    pub fn viewport_or_default(&self) -> Viewport {
        self.resolved().viewport.unwrap_or_default()
    }

    /// Whether the config grants a permission
    #[must_use]
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Lifecycle of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScenarioState {
    /// Not started
    Pending,
    /// Steps executing
    Running,
    /// Every step succeeded
    Passed,
    /// A required step failed
    Failed,
    /// Only optional steps failed
    Partial,
}

impl ScenarioState {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Partial)
    }

    /// Move to `next`, rejecting anything but PENDING -> RUNNING -> terminal
    ///
    /// # Errors
    ///
    /// `InvalidState` on an illegal transition.
    pub fn transition(self, next: Self) -> SmokeResult<Self> {
        match (self, next) {
            (Self::Pending, Self::Running) => Ok(next),
            (Self::Running, n) if n.is_terminal() => Ok(next),
            _ => Err(SmokeError::InvalidState {
                message: format!("cannot move scenario from {self} to {next}"),
            }),
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Partial => "PARTIAL",
        };
        f.pad(s)
    }
}

/// An isolated page owned by one scenario
pub struct TestEnvironment {
    id: Uuid,
    config: EnvironmentConfig,
    driver: Box<dyn PageDriver>,
    input_lock: Mutex<Point>,
    torn_down: AtomicBool,
}

impl fmt::Debug for TestEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestEnvironment")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

impl TestEnvironment {
    /// Create a fresh environment through `factory`
    ///
    /// # Errors
    ///
    /// Whatever the factory reports; a factory failure is fatal for the scenario.
    pub async fn create(
        factory: &dyn EnvironmentFactory,
        config: EnvironmentConfig,
    ) -> SmokeResult<Self> {
        let config = config.resolved();
        let driver = factory.create(&config).await?;
        let env = Self::with_driver(driver, config);
        tracing::debug!(environment = %env.id, "environment created");
        Ok(env)
    }

    /// Wrap an existing driver
    #[must_use]
    pub fn with_driver(driver: Box<dyn PageDriver>, config: EnvironmentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            driver,
            input_lock: Mutex::new(Point::new(0.0, 0.0)),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Unique environment id
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Config the environment was created with
    #[must_use]
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// The page driver
    #[must_use]
    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    /// Serialise input for the lifetime of the guard. The guarded value is
    /// the last pointer position.
    pub async fn lock_input(&self) -> MutexGuard<'_, Point> {
        self.input_lock.lock().await
    }

    /// Whether teardown already ran
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Close the page. Only the first call reaches the driver.
    ///
    /// Returns `Ok(false)` when the environment was already torn down.
    ///
    /// # Errors
    ///
    /// The driver's close error on the first call.
    pub async fn teardown(&self) -> SmokeResult<bool> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        tracing::debug!(environment = %self.id, "tearing down environment");
        self.driver.close().await?;
        Ok(true)
    }
}
