//! Scenario and step definitions.
//!
//! A [`Scenario`] is an immutable, ordered list of [`Step`]s identified by a
//! stable id such as `TC007`. Each step carries a [`Severity`] fixed when the
//! scenario is defined: a required step aborts the scenario when it fails, an
//! optional one is recorded and skipped over.
//!
//! ```
//! use navsmoke::{Condition, Locator, Scenario};
//!
//! let map = Locator::new(".leaflet-container");
//! let scenario = Scenario::new("TC002", "Map display")
//!     .navigate("")
//!     .await_condition(Condition::visible(map));
//! assert_eq!(scenario.steps.len(), 2);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::context::EnvironmentConfig;
use crate::driver::OptionChoice;
use crate::locator::{Locator, Point};
use crate::network::{ExchangeMatcher, StatusClass};
use crate::result::{SmokeError, SmokeResult};

/// How a step failure affects its scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Failure aborts the scenario
    #[default]
    Required,
    /// Failure is recorded; the scenario continues
    Optional,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::Optional => f.write_str("optional"),
        }
    }
}

/// A single user-level action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Load a URL (relative URLs resolve against the base URL)
    Navigate(String),
    /// Click the target
    Click,
    /// Replace the target's value
    Fill(String),
    /// Press a key, on the target when one is given
    PressKey(String),
    /// Move the pointer to a point, relative to the target's centre when one is given
    PointerMove(Point),
    /// Press the primary button at the pointer position
    PointerDown,
    /// Release the primary button at the pointer position
    PointerUp,
    /// Pick an option of a `<select>`
    SelectOption(OptionChoice),
    /// Press on the target's centre, move by the offset, release
    Drag {
        /// Horizontal offset
        dx: f64,
        /// Vertical offset
        dy: f64,
    },
}

impl ActionKind {
    /// Whether the action cannot run without a target
    #[must_use]
    pub const fn requires_target(&self) -> bool {
        matches!(
            self,
            Self::Click | Self::Fill(_) | Self::SelectOption(_) | Self::Drag { .. }
        )
    }

    /// Short action name for errors and logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Navigate(_) => "navigate",
            Self::Click => "click",
            Self::Fill(_) => "fill",
            Self::PressKey(_) => "press",
            Self::PointerMove(_) => "pointer move",
            Self::PointerDown => "pointer down",
            Self::PointerUp => "pointer up",
            Self::SelectOption(_) => "select",
            Self::Drag { .. } => "drag",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url) => write!(f, "navigate to {url:?}"),
            Self::Fill(text) => write!(f, "fill {text:?}"),
            Self::PressKey(key) => write!(f, "press {key}"),
            Self::PointerMove(p) => write!(f, "pointer move to ({}, {})", p.x, p.y),
            Self::SelectOption(choice) => write!(f, "select {choice}"),
            Self::Drag { dx, dy } => write!(f, "drag by ({dx}, {dy})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Load a page and optionally check the document status
    Navigate {
        /// Absolute or base-relative URL
        #[serde(default)]
        url: String,
        /// Expected main-document status class
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect_status: Option<StatusClass>,
    },
    /// Wait until a locator resolves to at least one element
    Locate {
        /// Selector chain
        target: Locator,
        /// Optional scope the target is searched within
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<Locator>,
    },
    /// Perform an action
    Act {
        /// Element acted on
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Locator>,
        /// The action
        action: ActionKind,
    },
    /// Perform an action and wait for the network exchange it triggers
    ActAndAwaitExchange {
        /// Element acted on
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Locator>,
        /// The action
        action: ActionKind,
        /// Exchange to wait for
        exchange: ExchangeMatcher,
        /// Name under which later steps can refer to the exchange
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Expected response status class
        #[serde(default)]
        expect: StatusClass,
    },
    /// Poll a condition until it holds
    AwaitCondition {
        /// The predicate
        condition: Condition,
        /// Budget override in milliseconds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Evaluate a condition once
    Assert {
        /// The predicate
        condition: Condition,
    },
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate { url, .. } if url.is_empty() => f.write_str("navigate to base URL"),
            Self::Navigate { url, .. } => write!(f, "navigate to {url}"),
            Self::Locate {
                target,
                scope: Some(scope),
            } => write!(f, "locate {target} within {scope}"),
            Self::Locate { target, .. } => write!(f, "locate {target}"),
            Self::Act {
                target: Some(target),
                action,
            } => write!(f, "{action} on {target}"),
            Self::Act { action, .. } => write!(f, "{action}"),
            Self::ActAndAwaitExchange {
                target, exchange, action, ..
            } => match target {
                Some(target) => write!(f, "{action} on {target} awaiting {exchange}"),
                None => write!(f, "{action} awaiting {exchange}"),
            },
            Self::AwaitCondition { condition, .. } => write!(f, "await {condition}"),
            Self::Assert { condition } => write!(f, "assert {condition}"),
        }
    }
}

/// One step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// What the step does
    #[serde(flatten)]
    pub kind: StepKind,
    /// Failure handling
    #[serde(default)]
    pub severity: Severity,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Step {
    /// Required step
    #[must_use]
    pub const fn new(kind: StepKind) -> Self {
        Self {
            kind,
            severity: Severity::Required,
            label: None,
        }
    }

    /// Mark optional
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.severity = Severity::Optional;
        self
    }

    /// Set label
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label, or a description derived from the step kind
    #[must_use]
    pub fn describe(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.kind.to_string())
    }

    /// Whether the step is optional
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self.severity, Severity::Optional)
    }
}

/// A named sequence of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable id, e.g. `TC001`
    pub id: String,
    /// Title
    pub title: String,
    /// Free-form tags used by filters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Environment override layered over the suite default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentConfig>,
    /// Scenario-level budget in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Steps, executed in order
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Empty scenario
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tags: Vec::new(),
            environment: None,
            timeout_ms: None,
            steps: Vec::new(),
        }
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Run in a specific environment
    #[must_use]
    pub fn environment(mut self, config: EnvironmentConfig) -> Self {
        self.environment = Some(config);
        self
    }

    /// Scenario-level timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    fn push(self, kind: StepKind) -> Self {
        self.step(Step::new(kind))
    }

    /// Mark the last step optional
    #[must_use]
    pub fn optional(mut self) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.severity = Severity::Optional;
        }
        self
    }

    /// Label the last step
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.label = Some(label.into());
        }
        self
    }

    /// Navigate to a URL
    #[must_use]
    pub fn navigate(self, url: impl Into<String>) -> Self {
        self.push(StepKind::Navigate {
            url: url.into(),
            expect_status: None,
        })
    }

    /// Navigate and check the document status
    #[must_use]
    pub fn navigate_expecting(self, url: impl Into<String>, status: StatusClass) -> Self {
        self.push(StepKind::Navigate {
            url: url.into(),
            expect_status: Some(status),
        })
    }

    /// Wait for a locator to resolve
    #[must_use]
    pub fn locate(self, target: Locator) -> Self {
        self.push(StepKind::Locate {
            target,
            scope: None,
        })
    }

    /// Perform any action
    #[must_use]
    pub fn act(self, target: Option<Locator>, action: ActionKind) -> Self {
        self.push(StepKind::Act { target, action })
    }

    /// Click
    #[must_use]
    pub fn click(self, target: Locator) -> Self {
        self.act(Some(target), ActionKind::Click)
    }

    /// Fill an input
    #[must_use]
    pub fn fill(self, target: Locator, text: impl Into<String>) -> Self {
        self.act(Some(target), ActionKind::Fill(text.into()))
    }

    /// Press a key on an element
    #[must_use]
    pub fn press(self, target: Locator, key: impl Into<String>) -> Self {
        self.act(Some(target), ActionKind::PressKey(key.into()))
    }

    /// Select an option
    #[must_use]
    pub fn select(self, target: Locator, choice: OptionChoice) -> Self {
        self.act(Some(target), ActionKind::SelectOption(choice))
    }

    /// Drag from the target's centre by an offset
    #[must_use]
    pub fn drag(self, target: Locator, dx: f64, dy: f64) -> Self {
        self.act(Some(target), ActionKind::Drag { dx, dy })
    }

    /// Click and wait for the exchange it triggers
    #[must_use]
    pub fn click_and_await(
        self,
        target: Locator,
        exchange: ExchangeMatcher,
        name: impl Into<String>,
        expect: StatusClass,
    ) -> Self {
        self.push(StepKind::ActAndAwaitExchange {
            target: Some(target),
            action: ActionKind::Click,
            exchange,
            name: Some(name.into()),
            expect,
        })
    }

    /// Poll a condition with the default budget
    #[must_use]
    pub fn await_condition(self, condition: Condition) -> Self {
        self.push(StepKind::AwaitCondition {
            condition,
            timeout_ms: None,
        })
    }

    /// Poll a condition with an explicit budget
    #[must_use]
    pub fn await_within(self, condition: Condition, timeout: Duration) -> Self {
        self.push(StepKind::AwaitCondition {
            condition,
            timeout_ms: Some(timeout.as_millis() as u64),
        })
    }

    /// Evaluate a condition once
    #[must_use]
    pub fn assert(self, condition: Condition) -> Self {
        self.push(StepKind::Assert { condition })
    }

    /// Scenario budget, if any
    #[must_use]
    pub fn scenario_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Whether the scenario matches a filter (id, title or tag, case-insensitive)
    #[must_use]
    pub fn matches_filter(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.id.to_lowercase().contains(&needle)
            || self.title.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.eq_ignore_ascii_case(filter))
    }

    /// Reject scenarios that cannot run
    ///
    /// # Errors
    ///
    /// `Config` describing the first problem found.
    pub fn validate(&self) -> SmokeResult<()> {
        if self.id.trim().is_empty() {
            return Err(SmokeError::config("scenario id must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(SmokeError::config(format!("{} has no steps", self.id)));
        }
        let mut exchange_names: Vec<&str> = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            let at = |message: String| {
                SmokeError::config(format!("{} step {}: {message}", self.id, index + 1))
            };
            match &step.kind {
                StepKind::Act { target, action }
                | StepKind::ActAndAwaitExchange { target, action, .. } => {
                    if action.requires_target() && target.is_none() {
                        return Err(at(format!("{} needs a target", action.name())));
                    }
                }
                StepKind::AwaitCondition { condition, .. } | StepKind::Assert { condition } => {
                    condition.validate().map_err(|e| at(e.to_string()))?;
                    if let Condition::ExchangeStatus { name, .. } = condition {
                        if !exchange_names.contains(&name.as_str()) {
                            return Err(at(format!("exchange {name:?} is not captured earlier")));
                        }
                    }
                }
                StepKind::Navigate { .. } | StepKind::Locate { .. } => {}
            }
            if let StepKind::ActAndAwaitExchange {
                name: Some(name), ..
            } = &step.kind
            {
                exchange_names.push(name);
            }
        }
        Ok(())
    }
}
