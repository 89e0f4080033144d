//! Scripted in-memory pages for testing scenarios without a browser.
//!
//! A [`MockPage`] holds element snapshots that can change over time or in
//! response to actions, records every driver call, and can be told to fail,
//! hang or panic on specific operations. [`MockFactory`] hands out a fresh
//! page per environment and keeps a handle to each for later inspection.
//!
//! Operation keys have the form `kind:detail`, e.g. `click:button.save`,
//! `press:Enter`, `navigate:https://example.test/`. Faults and effects
//! registered under a bare kind (`navigate`) apply to every operation of
//! that kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::context::EnvironmentConfig;
use crate::driver::{
    ElementSnapshot, EnvironmentFactory, NavigationResponse, OptionChoice, PageDriver,
    PointerEvent, PointerKind,
};
use crate::locator::Locator;
use crate::network::{ExchangeMatcher, ExchangeWatch, NetworkExchange};
use crate::result::{SmokeError, SmokeResult};

static NEXT_PAGE_ID: AtomicUsize = AtomicUsize::new(1);

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Failure injected into an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFault {
    /// Recoverable driver error
    Remote(String),
    /// The page refuses the action
    Reject(String),
    /// The environment breaks
    Fatal(String),
    /// The driver call panics
    Panic(String),
    /// The driver call never completes
    Hang,
}

/// State change applied after an operation succeeds
#[derive(Debug, Clone)]
pub enum MockEffect {
    /// Replace the snapshot of a locator
    Show {
        /// Locator in textual form
        locator: String,
        /// New state
        snapshot: ElementSnapshot,
    },
    /// Replace the attribute values of a locator
    Attributes {
        /// Locator in textual form
        locator: String,
        /// Attribute name
        name: String,
        /// One value per matched element
        values: Vec<Option<String>>,
    },
    /// Complete a network exchange
    Exchange(NetworkExchange),
    /// Change the current URL
    SetUrl(String),
}

impl MockEffect {
    /// Show `snapshot` for `locator`
    #[must_use]
    pub fn show(locator: &str, snapshot: ElementSnapshot) -> Self {
        Self::Show {
            locator: locator.to_string(),
            snapshot,
        }
    }
}

#[derive(Debug)]
struct Timed {
    at: Duration,
    snapshot: ElementSnapshot,
}

#[derive(Debug)]
struct Fault {
    fault: MockFault,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    navigation_status: Option<u16>,
    landing_url: Option<String>,
    elements: HashMap<String, Vec<Timed>>,
    attributes: HashMap<(String, String), Vec<Option<String>>>,
    effects: HashMap<String, Vec<MockEffect>>,
    faults: HashMap<String, Fault>,
    watchers: Vec<mpsc::UnboundedSender<NetworkExchange>>,
    history: Vec<String>,
    close_count: usize,
}

#[derive(Debug)]
struct Shared {
    id: usize,
    created: Instant,
    config: EnvironmentConfig,
    state: Mutex<PageState>,
}

/// A scripted page
#[derive(Debug, Clone)]
pub struct MockPage {
    shared: Arc<Shared>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

fn key(raw: &str) -> String {
    Locator::parse(raw).map_or_else(|_| raw.to_string(), |l| l.to_string())
}

fn kind_of(op: &str) -> &str {
    op.split_once(':').map_or(op, |(kind, _)| kind)
}

impl MockPage {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EnvironmentConfig::default())
    }

    /// Create an empty page that remembers the config it was built for
    #[must_use]
    pub fn with_config(config: EnvironmentConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed),
                created: Instant::now(),
                config,
                state: Mutex::new(PageState {
                    navigation_status: Some(200),
                    url: "about:blank".to_string(),
                    ..PageState::default()
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn elapsed(&self) -> Duration {
        self.shared.created.elapsed()
    }

    /// Process-unique page id
    #[must_use]
    pub fn id(&self) -> usize {
        self.shared.id
    }

    /// Config the page was created with
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.shared.config
    }

    /// Set the element state for a locator from now on
    pub fn set_element(&self, locator: &str, snapshot: ElementSnapshot) {
        let at = self.elapsed();
        self.state()
            .elements
            .insert(key(locator), vec![Timed { at, snapshot }]);
    }

    /// Switch the element state for a locator once `delay` has passed
    pub fn set_element_after(&self, locator: &str, delay: Duration, snapshot: ElementSnapshot) {
        let at = self.elapsed() + delay;
        let mut state = self.state();
        let entries = state.elements.entry(key(locator)).or_default();
        entries.push(Timed { at, snapshot });
        entries.sort_by_key(|t| t.at);
    }

    /// Set one attribute value per matched element
    pub fn set_attributes(&self, locator: &str, name: &str, values: Vec<Option<String>>) {
        self.state()
            .attributes
            .insert((key(locator), name.to_string()), values);
    }

    /// Status and final URL reported by every navigation
    pub fn set_navigation(&self, status: Option<u16>, landing_url: Option<&str>) {
        let mut state = self.state();
        state.navigation_status = status;
        state.landing_url = landing_url.map(str::to_string);
    }

    /// Apply `effect` whenever an operation matching `op` succeeds
    pub fn on(&self, op: &str, effect: MockEffect) {
        self.state()
            .effects
            .entry(op.to_string())
            .or_default()
            .push(effect);
    }

    /// Apply `effect` after a click on `locator`
    pub fn on_click(&self, locator: &str, effect: MockEffect) {
        self.on(&format!("click:{}", key(locator)), effect);
    }

    /// Apply `effect` after pressing `key_name`
    pub fn on_key(&self, key_name: &str, effect: MockEffect) {
        self.on(&format!("press:{key_name}"), effect);
    }

    /// Fail every operation matching `op`
    pub fn inject_fault(&self, op: &str, fault: MockFault) {
        self.state().faults.insert(
            normalize_op(op),
            Fault {
                fault,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` operations matching `op`
    pub fn inject_fault_times(&self, op: &str, fault: MockFault, times: usize) {
        self.state().faults.insert(
            normalize_op(op),
            Fault {
                fault,
                remaining: Some(times),
            },
        );
    }

    /// Every operation recorded so far
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }

    /// Whether any recorded operation starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.state().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Number of times `close` was called
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    fn snapshot_of(&self, locator: &str) -> ElementSnapshot {
        let now = self.elapsed();
        self.state()
            .elements
            .get(locator)
            .and_then(|entries| entries.iter().rev().find(|t| t.at <= now))
            .map(|t| t.snapshot.clone())
            .unwrap_or_default()
    }

    /// Record `op`, then honour any injected fault
    async fn gate(&self, op: &str) -> SmokeResult<()> {
        let fault = {
            let mut state = self.state();
            state.history.push(op.to_string());
            if state.close_count > 0 && kind_of(op) != "close" {
                return Err(SmokeError::fatal(format!("{op} on a closed page")));
            }
            let slot = if state.faults.contains_key(op) {
                Some(op.to_string())
            } else if state.faults.contains_key(kind_of(op)) {
                Some(kind_of(op).to_string())
            } else {
                None
            };
            slot.and_then(|slot| {
                let entry = state.faults.get_mut(&slot)?;
                let fault = entry.fault.clone();
                match entry.remaining {
                    Some(0) => None,
                    Some(ref mut n) => {
                        *n -= 1;
                        Some(fault)
                    }
                    None => Some(fault),
                }
            })
        };
        match fault {
            None => Ok(()),
            Some(MockFault::Remote(message)) => Err(SmokeError::remote(message)),
            Some(MockFault::Fatal(message)) => Err(SmokeError::fatal(message)),
            Some(MockFault::Reject(reason)) => {
                let (action, selector) = op.split_once(':').unwrap_or((op, ""));
                Err(SmokeError::ActionRejected {
                    action: action.to_string(),
                    selector: selector.to_string(),
                    reason,
                })
            }
            Some(MockFault::Panic(message)) => panic!("{message}"),
            Some(MockFault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn apply_effects(&self, op: &str) {
        let effects: Vec<MockEffect> = {
            let state = self.state();
            [op, kind_of(op)]
                .iter()
                .take(if kind_of(op) == op { 1 } else { 2 })
                .filter_map(|k| state.effects.get(*k))
                .flatten()
                .cloned()
                .collect()
        };
        for effect in effects {
            match effect {
                MockEffect::Show { locator, snapshot } => self.set_element(&locator, snapshot),
                MockEffect::Attributes {
                    locator,
                    name,
                    values,
                } => self.set_attributes(&locator, &name, values),
                MockEffect::Exchange(exchange) => {
                    self.state()
                        .watchers
                        .retain(|tx| tx.send(exchange.clone()).is_ok());
                }
                MockEffect::SetUrl(url) => self.state().url = url,
            }
        }
    }

    fn require_attached(&self, action: &str, locator: &Locator) -> SmokeResult<ElementSnapshot> {
        let snapshot = self.snapshot_of(&locator.to_string());
        if snapshot.attached() {
            Ok(snapshot)
        } else {
            Err(SmokeError::ActionRejected {
                action: action.to_string(),
                selector: locator.to_string(),
                reason: "element is not attached".to_string(),
            })
        }
    }
}

fn normalize_op(op: &str) -> String {
    match op.split_once(':') {
        Some((kind, detail)) if matches!(kind, "click" | "fill" | "inspect" | "select" | "attr") => {
            format!("{kind}:{}", key(detail))
        }
        _ => op.to_string(),
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> SmokeResult<NavigationResponse> {
        let op = format!("navigate:{url}");
        self.gate(&op).await?;
        let response = {
            let mut state = self.state();
            state.url = state.landing_url.clone().unwrap_or_else(|| url.to_string());
            NavigationResponse {
                status: state.navigation_status,
                url: state.url.clone(),
            }
        };
        self.apply_effects(&op);
        Ok(response)
    }

    async fn current_url(&self) -> SmokeResult<String> {
        self.gate("url").await?;
        Ok(self.state().url.clone())
    }

    async fn inspect(&self, locator: &Locator) -> SmokeResult<ElementSnapshot> {
        let locator = locator.to_string();
        self.gate(&format!("inspect:{locator}")).await?;
        Ok(self.snapshot_of(&locator))
    }

    async fn attribute_values(
        &self,
        locator: &Locator,
        name: &str,
    ) -> SmokeResult<Vec<Option<String>>> {
        let locator = locator.to_string();
        self.gate(&format!("attr:{locator}")).await?;
        Ok(self
            .state()
            .attributes
            .get(&(locator, name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn click(&self, locator: &Locator) -> SmokeResult<()> {
        let op = format!("click:{locator}");
        self.gate(&op).await?;
        self.require_attached("click", locator)?;
        self.apply_effects(&op);
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> SmokeResult<()> {
        let op = format!("fill:{locator}");
        self.gate(&op).await?;
        let snapshot = self.require_attached("fill", locator)?;
        self.set_element(&locator.to_string(), snapshot.with_text(text));
        self.apply_effects(&op);
        Ok(())
    }

    async fn press_key(&self, locator: Option<&Locator>, key_name: &str) -> SmokeResult<()> {
        let op = format!("press:{key_name}");
        self.gate(&op).await?;
        if let Some(locator) = locator {
            self.require_attached("press", locator)?;
        }
        self.apply_effects(&op);
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, choice: &OptionChoice) -> SmokeResult<()> {
        let op = format!("select:{locator}");
        self.gate(&op).await?;
        self.require_attached("select", locator)?;
        self.state().history.push(format!("selected:{choice}"));
        self.apply_effects(&op);
        Ok(())
    }

    async fn pointer(&self, event: PointerEvent) -> SmokeResult<()> {
        let kind = match event.kind {
            PointerKind::Move => "move",
            PointerKind::Down => "down",
            PointerKind::Up => "up",
        };
        let op = format!("pointer:{kind}@{},{}", event.point.x, event.point.y);
        self.gate(&op).await?;
        self.apply_effects(&format!("pointer:{kind}"));
        Ok(())
    }

    async fn watch_exchanges(&self, matcher: ExchangeMatcher) -> SmokeResult<ExchangeWatch> {
        self.gate(&format!("watch:{matcher}")).await?;
        let (tx, watch) = ExchangeWatch::channel(matcher);
        self.state().watchers.push(tx);
        Ok(watch)
    }

    async fn screenshot(&self) -> SmokeResult<Vec<u8>> {
        self.gate("screenshot").await?;
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn close(&self) -> SmokeResult<()> {
        {
            let mut state = self.state();
            state.close_count += 1;
            state.watchers.clear();
        }
        self.gate("close").await
    }
}

type Script = Arc<dyn Fn(&MockPage) + Send + Sync>;

/// Factory producing scripted pages
#[derive(Default)]
pub struct MockFactory {
    script: Option<Script>,
    create_error: Option<String>,
    create_delay: Option<Duration>,
    pages: Mutex<Vec<MockPage>>,
}

impl fmt::Debug for MockFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockFactory")
            .field("scripted", &self.script.is_some())
            .field("create_error", &self.create_error)
            .field("create_delay", &self.create_delay)
            .field("created", &self.created())
            .finish()
    }
}

impl MockFactory {
    /// Factory producing empty pages
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `script` on every page before handing it out
    #[must_use]
    pub fn with_script(mut self, script: impl Fn(&MockPage) + Send + Sync + 'static) -> Self {
        self.script = Some(Arc::new(script));
        self
    }

    /// Make every `create` fail with a fatal error
    #[must_use]
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.create_error = Some(message.into());
        self
    }

    /// Make every `create` take `delay` before the page exists
    #[must_use]
    pub const fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    fn pages_guard(&self) -> MutexGuard<'_, Vec<MockPage>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of pages created
    #[must_use]
    pub fn created(&self) -> usize {
        self.pages_guard().len()
    }

    /// Handles to every page created so far
    #[must_use]
    pub fn pages(&self) -> Vec<MockPage> {
        self.pages_guard().clone()
    }

    /// Sum of `close` calls across pages
    #[must_use]
    pub fn total_closes(&self) -> usize {
        self.pages_guard().iter().map(MockPage::close_count).sum()
    }
}

#[async_trait]
impl EnvironmentFactory for MockFactory {
    async fn create(&self, config: &EnvironmentConfig) -> SmokeResult<Box<dyn PageDriver>> {
        if let Some(message) = &self.create_error {
            return Err(SmokeError::fatal(message.clone()));
        }
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        let page = MockPage::with_config(config.clone());
        if let Some(script) = &self.script {
            script(&page);
        }
        self.pages_guard().push(page.clone());
        Ok(Box::new(page))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::network::HttpMethod;

    fn loc(s: &str) -> Locator {
        Locator::parse(s).unwrap()
    }

    mod page_tests {
        use super::*;

        #[tokio::test]
        async fn test_records_history() {
            let page = MockPage::new();
            page.set_element("button", ElementSnapshot::visible());
            page.navigate("https://example.test/").await.unwrap();
            page.click(&loc("button")).await.unwrap();
            assert!(page.was_called("navigate:https://example.test/"));
            assert!(page.was_called("click:button"));
            assert!(!page.was_called("fill"));
        }

        #[tokio::test]
        async fn test_landing_url() {
            let page = MockPage::new();
            page.set_navigation(Some(200), Some("https://example.test/#/categories"));
            let response = page.navigate("https://example.test/").await.unwrap();
            assert_eq!(response.status, Some(200));
            assert_eq!(page.current_url().await.unwrap(), "https://example.test/#/categories");
        }

        #[tokio::test(start_paused = true)]
        async fn test_element_appears_after_delay() {
            let page = MockPage::new();
            page.set_element_after(".popup", Duration::from_millis(300), ElementSnapshot::visible());
            assert!(!page.inspect(&loc(".popup")).await.unwrap().visible);
            tokio::time::sleep(Duration::from_millis(350)).await;
            assert!(page.inspect(&loc(".popup")).await.unwrap().visible);
        }

        #[tokio::test]
        async fn test_click_effect_reveals_element() {
            let page = MockPage::new();
            page.set_element("button.search", ElementSnapshot::visible());
            page.on_click(
                "button.search",
                MockEffect::show(".results", ElementSnapshot::visible().with_count(4)),
            );
            page.click(&loc("button.search")).await.unwrap();
            assert_eq!(page.inspect(&loc(".results")).await.unwrap().count, 4);
        }

        #[tokio::test]
        async fn test_click_missing_element_is_rejected() {
            let page = MockPage::new();
            let err = page.click(&loc("button")).await.unwrap_err();
            assert_eq!(err.kind(), "ActionRejected");
        }

        #[tokio::test]
        async fn test_fault_times_then_recovers() {
            let page = MockPage::new();
            page.inject_fault_times("inspect", MockFault::Remote("detached".into()), 2);
            assert!(page.inspect(&loc("a")).await.is_err());
            assert!(page.inspect(&loc("a")).await.is_err());
            assert!(page.inspect(&loc("a")).await.is_ok());
        }

        #[tokio::test]
        async fn test_fault_on_specific_locator() {
            let page = MockPage::new();
            page.set_element("a", ElementSnapshot::visible());
            page.set_element("b", ElementSnapshot::visible());
            page.inject_fault("click:b", MockFault::Reject("covered".into()));
            assert!(page.click(&loc("a")).await.is_ok());
            let err = page.click(&loc("b")).await.unwrap_err();
            assert!(err.to_string().contains("covered"));
        }

        #[tokio::test]
        async fn test_exchange_effect_reaches_watch() {
            let page = MockPage::new();
            page.set_element("button[type=submit]", ElementSnapshot::visible());
            page.on_click(
                "button[type=submit]",
                MockEffect::Exchange(NetworkExchange::new(
                    "https://example.test/api/places/",
                    HttpMethod::Post,
                    201,
                )),
            );
            let mut watch = page
                .watch_exchanges(ExchangeMatcher::new("/places/", HttpMethod::Post))
                .await
                .unwrap();
            page.click(&loc("button[type=submit]")).await.unwrap();
            let exchange = watch.next_match(Duration::from_secs(1)).await.unwrap();
            assert_eq!(exchange.status, 201);
        }

        #[tokio::test]
        async fn test_closed_page_is_fatal() {
            let page = MockPage::new();
            page.close().await.unwrap();
            assert!(page.inspect(&loc("a")).await.unwrap_err().is_fatal());
            assert_eq!(page.close_count(), 1);
        }
    }

    mod factory_tests {
        use super::*;

        #[tokio::test]
        async fn test_script_runs_per_page() {
            let factory = MockFactory::new().with_script(|page| {
                page.set_element(".leaflet-container", ElementSnapshot::visible());
            });
            let a = factory.create(&EnvironmentConfig::new()).await.unwrap();
            let b = factory.create(&EnvironmentConfig::new()).await.unwrap();
            assert!(a.inspect(&loc(".leaflet-container")).await.unwrap().visible);
            assert!(b.inspect(&loc(".leaflet-container")).await.unwrap().visible);
            let pages = factory.pages();
            assert_eq!(pages.len(), 2);
            assert_ne!(pages[0].id(), pages[1].id());
        }

        #[tokio::test]
        async fn test_failing_factory() {
            let factory = MockFactory::new().failing_with("chromium not found");
            let err = factory.create(&EnvironmentConfig::new()).await.err().unwrap();
            assert!(err.is_fatal());
            assert_eq!(factory.created(), 0);
        }
    }
}
