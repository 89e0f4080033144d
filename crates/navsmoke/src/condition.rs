//! Predicates over live page state.
//!
//! A [`Condition`] is plain data so scenarios can be declared in code or
//! loaded from YAML. Evaluating it asks the driver for a fresh snapshot and
//! turns it into an [`Observation`]; the poller decides how often.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::network::{NetworkExchange, StatusClass, UrlPattern};
use crate::result::{SmokeError, SmokeResult};
use crate::wait::Observation;

/// Exchanges captured earlier in a scenario, by step-assigned name
pub type ExchangeLog = HashMap<String, NetworkExchange>;

/// A predicate evaluated against the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// First match is rendered
    Visible(Locator),
    /// Nothing matches, or the first match is not rendered
    Hidden(Locator),
    /// First match is not disabled
    Enabled(Locator),
    /// At least one element matches
    Attached(Locator),
    /// First match's text contains a substring
    TextContains {
        /// Element to read
        target: Locator,
        /// Expected substring
        text: String,
    },
    /// First match has non-whitespace text
    TextNotEmpty(Locator),
    /// An attribute of the first match matches a regex
    AttributeMatches {
        /// Element to read
        target: Locator,
        /// Attribute name
        name: String,
        /// Regular expression
        pattern: String,
    },
    /// At least `count` elements match
    CountAtLeast {
        /// Elements to count
        target: Locator,
        /// Minimum count
        count: usize,
    },
    /// Every match has an attribute containing a substring
    EveryAttributeContains {
        /// Elements to read
        target: Locator,
        /// Attribute name
        name: String,
        /// Expected substring
        needle: String,
    },
    /// Current URL matches a pattern
    UrlMatches(UrlPattern),
    /// A named exchange captured earlier has a status in the class
    ExchangeStatus {
        /// Exchange name
        name: String,
        /// Expected status class
        #[serde(default)]
        expect: StatusClass,
    },
}

impl Condition {
    /// `target` is visible
    #[must_use]
    pub const fn visible(target: Locator) -> Self {
        Self::Visible(target)
    }

    /// `target` is hidden or absent
    #[must_use]
    pub const fn hidden(target: Locator) -> Self {
        Self::Hidden(target)
    }

    /// `target` is enabled
    #[must_use]
    pub const fn enabled(target: Locator) -> Self {
        Self::Enabled(target)
    }

    /// `target` contains `text`
    #[must_use]
    pub fn text_contains(target: Locator, text: impl Into<String>) -> Self {
        Self::TextContains {
            target,
            text: text.into(),
        }
    }

    /// `target` has an attribute matching `pattern`
    #[must_use]
    pub fn attribute_matches(
        target: Locator,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self::AttributeMatches {
            target,
            name: name.into(),
            pattern: pattern.into(),
        }
    }

    /// Every match of `target` has `name` containing `needle`
    #[must_use]
    pub fn every_attribute_contains(
        target: Locator,
        name: impl Into<String>,
        needle: impl Into<String>,
    ) -> Self {
        Self::EveryAttributeContains {
            target,
            name: name.into(),
            needle: needle.into(),
        }
    }

    /// Named exchange status is in `expect`
    #[must_use]
    pub fn exchange_status(name: impl Into<String>, expect: StatusClass) -> Self {
        Self::ExchangeStatus {
            name: name.into(),
            expect,
        }
    }

    /// Locator the condition inspects, if any
    #[must_use]
    pub const fn target(&self) -> Option<&Locator> {
        match self {
            Self::Visible(t)
            | Self::Hidden(t)
            | Self::Enabled(t)
            | Self::Attached(t)
            | Self::TextNotEmpty(t)
            | Self::TextContains { target: t, .. }
            | Self::AttributeMatches { target: t, .. }
            | Self::CountAtLeast { target: t, .. }
            | Self::EveryAttributeContains { target: t, .. } => Some(t),
            Self::UrlMatches(_) | Self::ExchangeStatus { .. } => None,
        }
    }

    /// Reject malformed conditions before anything runs
    ///
    /// # Errors
    ///
    /// `Config` when a regex does not compile.
    pub fn validate(&self) -> SmokeResult<()> {
        match self {
            Self::AttributeMatches { pattern, .. } | Self::UrlMatches(UrlPattern::Regex(pattern)) => {
                compile(pattern).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Evaluate once against the page
    ///
    /// # Errors
    ///
    /// Driver errors pass through unchanged so the poller can classify them.
    pub async fn evaluate(
        &self,
        driver: &dyn PageDriver,
        exchanges: &ExchangeLog,
    ) -> SmokeResult<Observation> {
        match self {
            Self::Visible(target) => {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(snap.visible, snap.describe()))
            }
            Self::Hidden(target) => {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(
                    !snap.attached() || !snap.visible,
                    snap.describe(),
                ))
            }
            Self::Enabled(target) => {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(
                    snap.attached() && snap.enabled,
                    snap.describe(),
                ))
            }
            Self::Attached(target) => {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(snap.attached(), snap.describe()))
            }
            Self::TextContains { target, text } => {
                let snap = driver.inspect(target).await?;
                let found = snap.text.as_deref().is_some_and(|t| t.contains(text.as_str()));
                Ok(Observation::from_check(found, snap.describe()))
            }
            Self::TextNotEmpty(target) => {
                let snap = driver.inspect(target).await?;
                let found = snap.text.as_deref().is_some_and(|t| !t.trim().is_empty());
                Ok(Observation::from_check(found, snap.describe()))
            }
            Self::AttributeMatches {
                target,
                name,
                pattern,
            } => {
                let re = compile(pattern)?;
                let values = driver.attribute_values(target, name).await?;
                let first = values.into_iter().next().flatten();
                let detail = match &first {
                    Some(value) => format!("{name}={value:?}"),
                    None => format!("{name} missing"),
                };
                let ok = first.as_deref().is_some_and(|v| re.is_match(v));
                Ok(Observation::from_check(ok, detail))
            }
            Self::CountAtLeast { target, count } => {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(snap.count >= *count, snap.describe()))
            }
            Self::EveryAttributeContains {
                target,
                name,
                needle,
            } => {
                let values = driver.attribute_values(target, name).await?;
                if values.is_empty() {
                    return Ok(Observation::pending("count=0"));
                }
                let offending: Vec<String> = values
                    .iter()
                    .filter(|v| !v.as_deref().is_some_and(|v| v.contains(needle.as_str())))
                    .map(|v| format!("{:?}", v.as_deref().unwrap_or("")))
                    .collect();
                let detail = if offending.is_empty() {
                    format!("all {} {name} values contain {needle:?}", values.len())
                } else {
                    format!(
                        "{} of {} {name} values lack {needle:?}: {}",
                        offending.len(),
                        values.len(),
                        offending.join(", ")
                    )
                };
                Ok(Observation::from_check(offending.is_empty(), detail))
            }
            Self::UrlMatches(pattern) => {
                if let UrlPattern::Regex(raw) = pattern {
                    compile(raw)?;
                }
                let url = driver.current_url().await?;
                Ok(Observation::from_check(pattern.matches(&url), format!("url={url}")))
            }
            Self::ExchangeStatus { name, expect } => match exchanges.get(name) {
                Some(exchange) => Ok(Observation::from_check(
                    expect.contains(exchange.status),
                    exchange.to_string(),
                )),
                None => Err(SmokeError::InvalidState {
                    message: format!("no exchange named {name:?} was captured"),
                }),
            },
        }
    }
}

fn compile(pattern: &str) -> SmokeResult<Regex> {
    Regex::new(pattern).map_err(|e| SmokeError::config(format!("invalid regex {pattern:?}: {e}")))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible(t) => write!(f, "{t} visible"),
            Self::Hidden(t) => write!(f, "{t} hidden"),
            Self::Enabled(t) => write!(f, "{t} enabled"),
            Self::Attached(t) => write!(f, "{t} attached"),
            Self::TextContains { target, text } => write!(f, "{target} contains {text:?}"),
            Self::TextNotEmpty(t) => write!(f, "{t} has text"),
            Self::AttributeMatches {
                target,
                name,
                pattern,
            } => write!(f, "{target} [{name}] =~ /{pattern}/"),
            Self::CountAtLeast { target, count } => write!(f, "at least {count} x {target}"),
            Self::EveryAttributeContains {
                target,
                name,
                needle,
            } => write!(f, "every {target} [{name}] contains {needle:?}"),
            Self::UrlMatches(pattern) => write!(f, "{pattern}"),
            Self::ExchangeStatus { name, expect } => write!(f, "exchange {name:?} status {expect}"),
        }
    }
}
