//! Action dispatch.
//!
//! [`ActionDispatcher::perform`] waits until its target is actionable, issues
//! the action once, and reports what happened. Readiness is polled through
//! the [`Poller`]; the action itself is never retried. Input actions hold the
//! environment's input lock so composite gestures such as a drag reach the
//! page as one uninterrupted sequence.

use std::time::Duration;

use tokio::time::Instant;

use crate::context::TestEnvironment;
use crate::driver::{ElementSnapshot, NavigationResponse, PointerEvent};
use crate::locator::{Locator, Point};
use crate::network::{ExchangeMatcher, NetworkExchange};
use crate::result::{SmokeError, SmokeResult};
use crate::scenario::ActionKind;
use crate::wait::{Observation, Poller, WaitOptions, DEFAULT_NAVIGATION_TIMEOUT_MS};

/// Outcome of one dispatched action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// What was done
    pub description: String,
    /// Wall time including readiness polling
    pub elapsed: Duration,
    /// Readiness evaluations before dispatch
    pub polls: usize,
    /// Navigation response, for navigations
    pub navigation: Option<NavigationResponse>,
    /// Exchange observed, for actions awaiting one
    pub exchange: Option<NetworkExchange>,
}

/// What "actionable" means for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    /// Rendered
    Visible,
    /// Rendered and enabled
    Interactive,
    /// Rendered, enabled and accepting text
    Editable,
}

impl Readiness {
    const fn for_action(action: &ActionKind) -> Self {
        match action {
            ActionKind::Fill(_) => Self::Editable,
            ActionKind::Click | ActionKind::SelectOption(_) => Self::Interactive,
            _ => Self::Visible,
        }
    }

    const fn holds(self, snap: &ElementSnapshot) -> bool {
        let visible = snap.count > 0 && snap.visible;
        match self {
            Self::Visible => visible,
            Self::Interactive => visible && snap.enabled,
            Self::Editable => visible && snap.enabled && snap.editable,
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Interactive => "visible and enabled",
            Self::Editable => "editable",
        }
    }
}

/// Issues actions against a test environment
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    readiness: WaitOptions,
    navigation_timeout: Duration,
    base_url: String,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(WaitOptions::default())
    }
}

impl ActionDispatcher {
    /// Dispatcher polling readiness with `readiness`
    #[must_use]
    pub fn new(readiness: WaitOptions) -> Self {
        Self {
            readiness,
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            base_url: String::new(),
        }
    }

    /// Resolve relative navigation URLs against `base_url`
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Budget for page loads and network exchanges
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Readiness wait options
    #[must_use]
    pub const fn readiness(&self) -> &WaitOptions {
        &self.readiness
    }

    /// Absolute URL for `url`
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        let absolute = ["http://", "https://", "about:", "data:", "file://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));
        if absolute || self.base_url.is_empty() {
            return url.to_string();
        }
        if url.is_empty() {
            return self.base_url.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// Perform `action`, on `target` when given
    ///
    /// # Errors
    ///
    /// `TargetNotFound` when the target never resolves, `TimeoutExceeded`
    /// when it resolves but never becomes actionable, `ActionRejected` when
    /// the page refuses the action, `FatalEnvironment` when the page is gone.
    pub async fn perform(
        &self,
        env: &TestEnvironment,
        action: &ActionKind,
        target: Option<&Locator>,
    ) -> SmokeResult<ActionResult> {
        let start = Instant::now();
        let description = match target {
            Some(target) => format!("{action} on {target}"),
            None => action.to_string(),
        };

        if let ActionKind::Navigate(url) = action {
            let navigation = self.navigate(env, url).await?;
            return Ok(ActionResult {
                description,
                elapsed: start.elapsed(),
                polls: 0,
                navigation: Some(navigation),
                exchange: None,
            });
        }

        let polls = match target {
            Some(target) => self.await_actionable(env, target, Readiness::for_action(action)).await?,
            None if action.requires_target() => {
                return Err(SmokeError::config(format!("{} needs a target", action.name())));
            }
            None => 0,
        };

        self.dispatch(env, action, target).await?;

        let elapsed = start.elapsed();
        tracing::debug!(
            environment = %env.id(),
            action = %description,
            polls,
            elapsed_ms = elapsed.as_millis() as u64,
            "action dispatched"
        );
        Ok(ActionResult {
            description,
            elapsed,
            polls,
            navigation: None,
            exchange: None,
        })
    }

    /// Perform `action` and wait for the exchange it triggers.
    ///
    /// The exchange listener is registered before the action is dispatched,
    /// so a response arriving immediately is not missed.
    ///
    /// # Errors
    ///
    /// Anything [`perform`](Self::perform) returns, or `TimeoutExceeded`
    /// when no matching exchange completes within the navigation budget.
    pub async fn perform_awaiting(
        &self,
        env: &TestEnvironment,
        action: &ActionKind,
        target: Option<&Locator>,
        matcher: &ExchangeMatcher,
    ) -> SmokeResult<ActionResult> {
        let start = Instant::now();
        let mut watch = env.driver().watch_exchanges(matcher.clone()).await?;
        let mut result = self.perform(env, action, target).await?;
        let exchange = watch.next_match(self.navigation_timeout).await?;
        tracing::debug!(environment = %env.id(), %exchange, "exchange observed");
        result.exchange = Some(exchange);
        result.elapsed = start.elapsed();
        Ok(result)
    }

    async fn navigate(&self, env: &TestEnvironment, url: &str) -> SmokeResult<NavigationResponse> {
        let url = self.resolve_url(url);
        let outcome = tokio::time::timeout(self.navigation_timeout, env.driver().navigate(&url)).await;
        match outcome {
            Ok(Ok(response)) => {
                tracing::debug!(environment = %env.id(), %url, status = ?response.status, "page loaded");
                Ok(response)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SmokeError::TimeoutExceeded {
                waited_for: format!("load of {url}"),
                ms: self.navigation_timeout.as_millis() as u64,
                last_observation: "load event not fired".to_string(),
            }),
        }
    }

    /// Poll until `target` satisfies `readiness`; returns the number of polls
    async fn await_actionable(
        &self,
        env: &TestEnvironment,
        target: &Locator,
        readiness: Readiness,
    ) -> SmokeResult<usize> {
        let driver = env.driver();
        let waited_for = format!("{target} {}", readiness.describe());
        let outcome = Poller::new(self.readiness)
            .await_condition(&waited_for, move || async move {
                let snap = driver.inspect(target).await?;
                Ok(Observation::from_check(readiness.holds(&snap), snap.describe()))
            })
            .await;
        match outcome {
            Ok(outcome) => Ok(outcome.polls),
            Err(SmokeError::TimeoutExceeded {
                ms,
                last_observation,
                ..
            }) if last_observation == "count=0" => Err(SmokeError::TargetNotFound {
                selector: target.to_string(),
                ms,
            }),
            Err(err) => Err(err),
        }
    }

    async fn dispatch(
        &self,
        env: &TestEnvironment,
        action: &ActionKind,
        target: Option<&Locator>,
    ) -> SmokeResult<()> {
        let driver = env.driver();
        let selector = target.map(ToString::to_string).unwrap_or_default();
        let rejected = |err: SmokeError| reject(action, &selector, err);
        let mut pointer = env.lock_input().await;

        match (action, target) {
            (ActionKind::Click, Some(target)) => driver.click(target).await.map_err(rejected),
            (ActionKind::Fill(text), Some(target)) => {
                driver.fill(target, text).await.map_err(rejected)
            }
            (ActionKind::PressKey(key), target) => {
                driver.press_key(target, key).await.map_err(rejected)
            }
            (ActionKind::SelectOption(choice), Some(target)) => {
                driver.select_option(target, choice).await.map_err(rejected)
            }
            (ActionKind::PointerMove(offset), target) => {
                let point = match target {
                    Some(target) => self.center_of(env, action, target).await?.offset(offset.x, offset.y),
                    None => *offset,
                };
                driver
                    .pointer(PointerEvent::move_to(point))
                    .await
                    .map_err(rejected)?;
                *pointer = point;
                Ok(())
            }
            (ActionKind::PointerDown | ActionKind::PointerUp, target) => {
                let point = match target {
                    Some(target) => self.center_of(env, action, target).await?,
                    None => *pointer,
                };
                let event = if matches!(action, ActionKind::PointerDown) {
                    PointerEvent::down(point)
                } else {
                    PointerEvent::up(point)
                };
                driver.pointer(event).await.map_err(rejected)?;
                *pointer = point;
                Ok(())
            }
            (ActionKind::Drag { dx, dy }, Some(target)) => {
                let from = self.center_of(env, action, target).await?;
                let to = from.offset(*dx, *dy);
                let sequence = [
                    PointerEvent::move_to(from),
                    PointerEvent::down(from),
                    PointerEvent::move_to(to),
                    PointerEvent::up(to),
                ];
                for (i, event) in sequence.into_iter().enumerate() {
                    if let Err(err) = driver.pointer(event).await {
                        // Leave the button released if the press already went through
                        if i >= 2 {
                            if let Err(release) = driver.pointer(PointerEvent::up(to)).await {
                                tracing::warn!(error = %release, "pointer release after failed drag");
                            }
                        }
                        return Err(rejected(err));
                    }
                }
                *pointer = to;
                Ok(())
            }
            (ActionKind::Navigate(_), _) => Err(SmokeError::InvalidState {
                message: "navigation is not an input action".to_string(),
            }),
            (action, None) => Err(SmokeError::config(format!("{} needs a target", action.name()))),
        }
    }

    async fn center_of(
        &self,
        env: &TestEnvironment,
        action: &ActionKind,
        target: &Locator,
    ) -> SmokeResult<Point> {
        let snap = env
            .driver()
            .inspect(target)
            .await
            .map_err(|err| reject(action, &target.to_string(), err))?;
        snap.bounding_box
            .filter(|b| b.has_area())
            .map(|b| b.center())
            .ok_or_else(|| SmokeError::ActionRejected {
                action: action.name().to_string(),
                selector: target.to_string(),
                reason: "element has no bounding box".to_string(),
            })
    }
}

/// Dispatch-time failures are never retried: recoverable driver errors
/// become rejections, fatal ones pass through.
fn reject(action: &ActionKind, selector: &str, err: SmokeError) -> SmokeError {
    match err {
        SmokeError::Remote { message } => SmokeError::ActionRejected {
            action: action.name().to_string(),
            selector: selector.to_string(),
            reason: message,
        },
        SmokeError::TargetNotFound { .. } => SmokeError::ActionRejected {
            action: action.name().to_string(),
            selector: selector.to_string(),
            reason: "element detached before dispatch".to_string(),
        },
        other => other,
    }
}
