//! Chromium control over the DevTools protocol.
//!
//! With the `browser` feature, [`ChromiumFactory`] launches one Chromium per
//! suite and hands every environment a fresh incognito browser context, so
//! cookies and storage never leak between scenarios. Emulation (viewport,
//! user agent, locale, geolocation, permissions) is applied to the context
//! before the first navigation.
//!
//! Without the feature only [`LaunchOptions`] is available.

use crate::config::HarnessConfig;
use crate::result::SmokeResult;

/// How Chromium is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Run without a window
    pub headless: bool,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Extra command line switches
    pub args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Options taken from the harness configuration
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            headless: config.headless,
            chromium_path: config.chromium_path.clone(),
            ..Self::default()
        }
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Append a command line switch
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Key definition used for `Input.dispatchKeyEvent`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: i64,
    pub text: Option<String>,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl KeyDefinition {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        let named = |key: &str, code: &str, key_code: i64, text: Option<&str>| Self {
            key: key.to_string(),
            code: code.to_string(),
            key_code,
            text: text.map(str::to_string),
        };
        let def = match name {
            "Enter" => named("Enter", "Enter", 13, Some("\r")),
            "Tab" => named("Tab", "Tab", 9, None),
            "Escape" => named("Escape", "Escape", 27, None),
            "Backspace" => named("Backspace", "Backspace", 8, None),
            "ArrowUp" => named("ArrowUp", "ArrowUp", 38, None),
            "ArrowDown" => named("ArrowDown", "ArrowDown", 40, None),
            "ArrowLeft" => named("ArrowLeft", "ArrowLeft", 37, None),
            "ArrowRight" => named("ArrowRight", "ArrowRight", 39, None),
            other => {
                let mut chars = other.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                let upper = c.to_ascii_uppercase();
                let code = if c.is_ascii_alphabetic() {
                    format!("Key{upper}")
                } else if c.is_ascii_digit() {
                    format!("Digit{c}")
                } else {
                    String::new()
                };
                Self {
                    key: c.to_string(),
                    code,
                    key_code: i64::from(u32::from(upper)),
                    text: Some(c.to_string()),
                }
            }
        };
        Some(def)
    }
}

/// Status of the last navigation; an unreadable status is reported as unknown
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn navigation_status(result: SmokeResult<Option<u16>>) -> Option<u16> {
    result.unwrap_or_else(|err| {
        tracing::debug!(error = %err, "navigation status unavailable");
        None
    })
}

/// JavaScript returning a snapshot of the first match of `elements`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn inspect_script(elements: &str) -> String {
    format!(
        "(() => {{ const els = {elements}; const el = els[0]; \
         if (!el) return {{ count: 0, visible: false, enabled: false, editable: false, text: null, bounding_box: null }}; \
         const r = el.getBoundingClientRect(); const s = window.getComputedStyle(el); \
         const visible = r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; \
         const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true'; \
         const editable = enabled && !el.readOnly && (el.isContentEditable || ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName)); \
         return {{ count: els.length, visible, enabled, editable, text: el.textContent, \
         bounding_box: {{ x: r.x, y: r.y, width: r.width, height: r.height }} }}; }})()"
    )
}

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::cast_possible_truncation)]
mod cdp {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex as StdMutex, PoisonError};

    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::browser::{
        BrowserContextId, GrantPermissionsParams, PermissionType,
    };
    use chromiumoxide::cdp::browser_protocol::emulation::{
        SetDeviceMetricsOverrideParams, SetGeolocationOverrideParams, SetLocaleOverrideParams,
        SetUserAgentOverrideParams,
    };
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
        DispatchMouseEventType, MouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::network::{
        EnableParams, EventRequestWillBeSent, EventResponseReceived,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::cdp::browser_protocol::target::{
        CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
    };
    use chromiumoxide::page::Page;
    use futures::StreamExt;
    use tokio::sync::{mpsc, Mutex};
    use tokio::task::JoinHandle;

    use super::{inspect_script, navigation_status, KeyDefinition, LaunchOptions};
    use crate::context::EnvironmentConfig;
    use crate::driver::{
        ElementSnapshot, EnvironmentFactory, NavigationResponse, OptionChoice, PageDriver,
        PointerEvent, PointerKind,
    };
    use crate::locator::{js_str, BoundingBox, Locator, Point};
    use crate::network::{ExchangeCorrelator, ExchangeMatcher, ExchangeWatch, NetworkExchange};
    use crate::result::{SmokeError, SmokeResult};

    type Watchers = Arc<StdMutex<Vec<mpsc::UnboundedSender<NetworkExchange>>>>;

    /// CDP failures that mean the browser or the connection is gone
    fn classify(context: &str, err: impl std::fmt::Display) -> SmokeError {
        let message = format!("{context}: {err}");
        let lower = message.to_lowercase();
        let fatal = ["channel", "websocket", "connection", "browser closed", "target closed", "crash"];
        if fatal.iter().any(|needle| lower.contains(needle)) {
            SmokeError::fatal(message)
        } else {
            SmokeError::remote(message)
        }
    }

    fn permission(name: &str) -> SmokeResult<PermissionType> {
        match name {
            "geolocation" => Ok(PermissionType::Geolocation),
            "notifications" => Ok(PermissionType::Notifications),
            "camera" => Ok(PermissionType::VideoCapture),
            "microphone" => Ok(PermissionType::AudioCapture),
            "clipboard-read" | "clipboard-write" => Ok(PermissionType::ClipboardReadWrite),
            other => Err(SmokeError::config(format!("unsupported permission {other}"))),
        }
    }

    /// Launches Chromium once and creates an incognito context per environment
    #[derive(Debug)]
    pub struct ChromiumFactory {
        browser: Arc<Mutex<Browser>>,
        handler: JoinHandle<()>,
    }

    impl ChromiumFactory {
        /// Launch the browser
        pub async fn launch(options: &LaunchOptions) -> SmokeResult<Self> {
            let mut builder = BrowserConfig::builder();
            if !options.headless {
                builder = builder.with_head();
            }
            if !options.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(path) = &options.chromium_path {
                builder = builder.chrome_executable(path);
            }
            for arg in &options.args {
                builder = builder.arg(arg.as_str());
            }
            let config = builder.build().map_err(SmokeError::fatal)?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| SmokeError::fatal(format!("browser launch failed: {e}")))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(err) = event {
                        tracing::debug!(error = %err, "cdp handler stopped");
                        break;
                    }
                }
            });
            tracing::info!(headless = options.headless, "chromium launched");

            Ok(Self {
                browser: Arc::new(Mutex::new(browser)),
                handler,
            })
        }

        async fn open(&self, config: &EnvironmentConfig) -> SmokeResult<ChromiumPage> {
            let context_id = self
                .browser
                .lock()
                .await
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(|e| classify("create browser context", e))?
                .result
                .browser_context_id;

            match self.prepare(context_id.clone(), config).await {
                Ok(page) => Ok(page),
                Err(err) => {
                    // Disposing the context closes any page already opened in it
                    let disposed = self
                        .browser
                        .lock()
                        .await
                        .execute(DisposeBrowserContextParams::new(context_id))
                        .await;
                    if let Err(e) = disposed {
                        tracing::warn!(error = %e, "failed to dispose browser context");
                    }
                    Err(err)
                }
            }
        }

        async fn prepare(
            &self,
            context_id: BrowserContextId,
            config: &EnvironmentConfig,
        ) -> SmokeResult<ChromiumPage> {
            let browser = self.browser.lock().await;
            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(SmokeError::fatal)?;
            let page = browser
                .new_page(target)
                .await
                .map_err(|e| classify("create page", e))?;

            let permissions = config
                .permissions
                .iter()
                .map(|p| permission(p))
                .collect::<SmokeResult<Vec<_>>>()?;
            if !permissions.is_empty() {
                let grant = GrantPermissionsParams::builder()
                    .permissions(permissions)
                    .browser_context_id(context_id.clone())
                    .build()
                    .map_err(SmokeError::fatal)?;
                browser
                    .execute(grant)
                    .await
                    .map_err(|e| classify("grant permissions", e))?;
            }
            drop(browser);

            emulate(&page, config).await?;
            let watchers: Watchers = Arc::default();
            let network = observe_network(&page, Arc::clone(&watchers)).await?;

            Ok(ChromiumPage {
                page,
                context_id,
                browser: Arc::clone(&self.browser),
                watchers,
                network,
                button_down: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl EnvironmentFactory for ChromiumFactory {
        async fn create(&self, config: &EnvironmentConfig) -> SmokeResult<Box<dyn PageDriver>> {
            Ok(Box::new(self.open(config).await?))
        }

        async fn shutdown(&self) -> SmokeResult<()> {
            let mut browser = self.browser.lock().await;
            let closed = browser.close().await;
            self.handler.abort();
            closed.map(|_| ()).map_err(|e| classify("close browser", e))
        }
    }

    async fn emulate(page: &Page, config: &EnvironmentConfig) -> SmokeResult<()> {
        let viewport = config.viewport_or_default();
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(config.device_scale_factor.unwrap_or(1.0))
            .mobile(config.mobile.unwrap_or(false))
            .build()
            .map_err(SmokeError::fatal)?;
        page.execute(metrics)
            .await
            .map_err(|e| classify("set device metrics", e))?;

        if let Some(user_agent) = &config.user_agent {
            let mut params = SetUserAgentOverrideParams::new(user_agent.clone());
            params.accept_language.clone_from(&config.locale);
            page.execute(params)
                .await
                .map_err(|e| classify("set user agent", e))?;
        }
        if let Some(locale) = &config.locale {
            let params = SetLocaleOverrideParams::builder().locale(locale.clone()).build();
            page.execute(params)
                .await
                .map_err(|e| classify("set locale", e))?;
        }
        if let Some(geo) = config.geolocation {
            let params = SetGeolocationOverrideParams::builder()
                .latitude(geo.latitude)
                .longitude(geo.longitude)
                .accuracy(geo.accuracy)
                .build();
            page.execute(params)
                .await
                .map_err(|e| classify("set geolocation", e))?;
        }
        Ok(())
    }

    /// Pair requests with their responses and fan completed exchanges out
    /// to the registered watchers
    async fn observe_network(page: &Page, watchers: Watchers) -> SmokeResult<JoinHandle<()>> {
        page.execute(EnableParams::default())
            .await
            .map_err(|e| classify("enable network", e))?;
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| classify("listen for requests", e))?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| classify("listen for responses", e))?;

        Ok(tokio::spawn(async move {
            let mut pairs = ExchangeCorrelator::default();
            loop {
                let exchange = tokio::select! {
                    biased;
                    Some(event) = requests.next() => {
                        pairs.request(event.request_id.inner(), &event.request.method)
                    }
                    Some(event) = responses.next() => pairs.response(
                        event.request_id.inner(),
                        &event.response.url,
                        event.response.status as u16,
                    ),
                    else => break,
                };
                if let Some(exchange) = exchange {
                    publish(&watchers, exchange);
                }
            }
        }))
    }

    fn publish(watchers: &Watchers, exchange: NetworkExchange) {
        tracing::trace!(%exchange, "exchange completed");
        watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(exchange.clone()).is_ok());
    }

    /// A page living in its own browser context
    #[derive(Debug)]
    pub struct ChromiumPage {
        page: Page,
        context_id: BrowserContextId,
        browser: Arc<Mutex<Browser>>,
        watchers: Watchers,
        network: JoinHandle<()>,
        button_down: AtomicBool,
    }

    impl ChromiumPage {
        async fn eval<T: serde::de::DeserializeOwned>(&self, context: &str, script: String) -> SmokeResult<T> {
            self.page
                .evaluate(script)
                .await
                .map_err(|e| classify(context, e))?
                .into_value()
                .map_err(|e| SmokeError::remote(format!("{context}: {e}")))
        }

        /// Scroll the first match into view and return its box
        async fn scroll_into_view(&self, action: &str, locator: &Locator) -> SmokeResult<BoundingBox> {
            let script = format!(
                "(() => {{ const el = {}[0]; if (!el) return null; \
                 el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
                 const r = el.getBoundingClientRect(); \
                 return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()",
                locator.to_js()
            );
            let bbox: Option<BoundingBox> = self.eval(action, script).await?;
            bbox.filter(BoundingBox::has_area)
                .ok_or_else(|| SmokeError::ActionRejected {
                    action: action.to_string(),
                    selector: locator.to_string(),
                    reason: "element has no bounding box".to_string(),
                })
        }

        async fn mouse(&self, kind: DispatchMouseEventType, point: Point, pressed: bool) -> SmokeResult<()> {
            let mut builder = DispatchMouseEventParams::builder()
                .r#type(kind.clone())
                .x(point.x)
                .y(point.y);
            builder = match kind {
                DispatchMouseEventType::MousePressed | DispatchMouseEventType::MouseReleased => {
                    builder.button(MouseButton::Left).click_count(1)
                }
                _ if pressed => builder.button(MouseButton::Left).buttons(1),
                _ => builder,
            };
            let params = builder.build().map_err(SmokeError::fatal)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| classify("dispatch mouse event", e))?;
            Ok(())
        }

        async fn key(&self, kind: DispatchKeyEventType, def: &KeyDefinition) -> SmokeResult<()> {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(def.key.clone())
                .code(def.code.clone())
                .windows_virtual_key_code(def.key_code)
                .native_virtual_key_code(def.key_code);
            if kind == DispatchKeyEventType::KeyDown {
                if let Some(text) = &def.text {
                    builder = builder.text(text.clone());
                }
            }
            let params = builder.build().map_err(SmokeError::fatal)?;
            self.page
                .execute(params)
                .await
                .map_err(|e| classify("dispatch key event", e))?;
            Ok(())
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn navigate(&self, url: &str) -> SmokeResult<NavigationResponse> {
            self.page.goto(url).await.map_err(|e| {
                let err = classify(&format!("navigate to {url}"), e);
                if err.is_fatal() {
                    err
                } else {
                    SmokeError::fatal(err.to_string())
                }
            })?;
            let status: SmokeResult<Option<u16>> = self
                .eval(
                    "navigation status",
                    "(() => { const nav = performance.getEntriesByType('navigation')[0]; \
                     return nav && nav.responseStatus ? nav.responseStatus : null; })()"
                        .to_string(),
                )
                .await;
            let status = navigation_status(status);
            Ok(NavigationResponse {
                status,
                url: self.current_url().await?,
            })
        }

        async fn current_url(&self) -> SmokeResult<String> {
            Ok(self
                .page
                .url()
                .await
                .map_err(|e| classify("read url", e))?
                .unwrap_or_default())
        }

        async fn inspect(&self, locator: &Locator) -> SmokeResult<ElementSnapshot> {
            self.eval("inspect", inspect_script(&locator.to_js())).await
        }

        async fn attribute_values(&self, locator: &Locator, name: &str) -> SmokeResult<Vec<Option<String>>> {
            let script = format!(
                "{}.map(el => el.getAttribute({}))",
                locator.to_js(),
                js_str(name)
            );
            self.eval("read attributes", script).await
        }

        async fn click(&self, locator: &Locator) -> SmokeResult<()> {
            let point = self.scroll_into_view("click", locator).await?.center();
            self.mouse(DispatchMouseEventType::MouseMoved, point, false).await?;
            self.mouse(DispatchMouseEventType::MousePressed, point, true).await?;
            self.mouse(DispatchMouseEventType::MouseReleased, point, false).await
        }

        async fn fill(&self, locator: &Locator, text: &str) -> SmokeResult<()> {
            let script = format!(
                "(() => {{ const el = {}[0]; if (!el) return false; el.focus(); \
                 const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
                 const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
                 setter.call(el, {}); \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
                locator.to_js(),
                js_str(text)
            );
            let filled: bool = self.eval("fill", script).await?;
            if filled {
                Ok(())
            } else {
                Err(SmokeError::ActionRejected {
                    action: "fill".to_string(),
                    selector: locator.to_string(),
                    reason: "element detached before input".to_string(),
                })
            }
        }

        async fn press_key(&self, locator: Option<&Locator>, key_name: &str) -> SmokeResult<()> {
            let def = KeyDefinition::lookup(key_name).ok_or_else(|| SmokeError::ActionRejected {
                action: "press".to_string(),
                selector: locator.map(ToString::to_string).unwrap_or_default(),
                reason: format!("unknown key {key_name}"),
            })?;
            if let Some(locator) = locator {
                let script = format!(
                    "(() => {{ const el = {}[0]; if (!el) return false; el.focus(); return true; }})()",
                    locator.to_js()
                );
                let focused: bool = self.eval("focus", script).await?;
                if !focused {
                    return Err(SmokeError::ActionRejected {
                        action: "press".to_string(),
                        selector: locator.to_string(),
                        reason: "element detached before focus".to_string(),
                    });
                }
            }
            self.key(DispatchKeyEventType::KeyDown, &def).await?;
            self.key(DispatchKeyEventType::KeyUp, &def).await
        }

        async fn select_option(&self, locator: &Locator, choice: &OptionChoice) -> SmokeResult<()> {
            let finder = match choice {
                OptionChoice::Value(v) => format!("opts.findIndex(o => o.value === {})", js_str(v)),
                OptionChoice::Label(l) => {
                    format!("opts.findIndex(o => o.label.trim() === {})", js_str(l))
                }
                OptionChoice::Index(i) => format!("({i} < opts.length ? {i} : -1)"),
            };
            let script = format!(
                "(() => {{ const el = {}[0]; if (!el || !el.options) return 'not a select element'; \
                 const opts = Array.from(el.options); const idx = {finder}; \
                 if (idx < 0) return 'option not found'; el.selectedIndex = idx; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); return null; }})()",
                locator.to_js()
            );
            let problem: Option<String> = self.eval("select option", script).await?;
            match problem {
                None => Ok(()),
                Some(reason) => Err(SmokeError::ActionRejected {
                    action: "select".to_string(),
                    selector: locator.to_string(),
                    reason,
                }),
            }
        }

        async fn pointer(&self, event: PointerEvent) -> SmokeResult<()> {
            match event.kind {
                PointerKind::Move => {
                    let pressed = self.button_down.load(Ordering::SeqCst);
                    self.mouse(DispatchMouseEventType::MouseMoved, event.point, pressed).await
                }
                PointerKind::Down => {
                    self.mouse(DispatchMouseEventType::MousePressed, event.point, true).await?;
                    self.button_down.store(true, Ordering::SeqCst);
                    Ok(())
                }
                PointerKind::Up => {
                    self.button_down.store(false, Ordering::SeqCst);
                    self.mouse(DispatchMouseEventType::MouseReleased, event.point, false).await
                }
            }
        }

        async fn watch_exchanges(&self, matcher: ExchangeMatcher) -> SmokeResult<ExchangeWatch> {
            let (tx, watch) = ExchangeWatch::channel(matcher);
            self.watchers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(tx);
            Ok(watch)
        }

        async fn screenshot(&self) -> SmokeResult<Vec<u8>> {
            use base64::Engine;

            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = self
                .page
                .execute(params)
                .await
                .map_err(|e| classify("capture screenshot", e))?;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| SmokeError::remote(format!("decode screenshot: {e}")))
        }

        async fn close(&self) -> SmokeResult<()> {
            self.network.abort();
            self.watchers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            let closed = self.page.clone().close().await;
            let disposed = self
                .browser
                .lock()
                .await
                .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
                .await;
            closed.map_err(|e| classify("close page", e))?;
            disposed.map_err(|e| classify("dispose browser context", e))?;
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumFactory, ChromiumPage};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod launch_options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let options = LaunchOptions::default();
            assert!(options.headless);
            assert!(options.sandbox);
            assert!(options.chromium_path.is_none());
        }

        #[test]
        fn test_from_config() {
            let mut config = HarnessConfig::default().with_headless(false);
            config.chromium_path = Some("/usr/bin/chromium".into());
            let options = LaunchOptions::from_config(&config);
            assert!(!options.headless);
            assert_eq!(options.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }

        #[test]
        fn test_builders() {
            let options = LaunchOptions::default()
                .with_no_sandbox()
                .with_chromium_path("/opt/chrome")
                .with_arg("--disable-gpu");
            assert!(!options.sandbox);
            assert_eq!(options.args, ["--disable-gpu"]);
        }
    }

    mod key_tests {
        use super::*;

        #[test]
        fn test_enter_submits() {
            let def = KeyDefinition::lookup("Enter").unwrap();
            assert_eq!(def.key_code, 13);
            assert_eq!(def.text.as_deref(), Some("\r"));
        }

        #[test]
        fn test_single_characters() {
            let a = KeyDefinition::lookup("a").unwrap();
            assert_eq!(a.code, "KeyA");
            assert_eq!(a.key_code, 65);
            assert_eq!(KeyDefinition::lookup("7").unwrap().code, "Digit7");
        }

        #[test]
        fn test_unknown_key() {
            assert!(KeyDefinition::lookup("Hyper").is_none());
            assert!(KeyDefinition::lookup("").is_none());
        }
    }

    #[test]
    fn test_unreadable_navigation_status_is_unknown() {
        assert_eq!(navigation_status(Ok(Some(200))), Some(200));
        assert_eq!(navigation_status(Ok(None)), None);
        let err = crate::result::SmokeError::remote("Execution context was destroyed");
        assert_eq!(navigation_status(Err(err)), None);
    }

    #[test]
    fn test_inspect_script_embeds_locator() {
        let script = inspect_script("[document.body]");
        assert!(script.contains("const els = [document.body];"));
        assert!(script.contains("bounding_box"));
    }
}
