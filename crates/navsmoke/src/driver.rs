//! Remote page abstraction.
//!
//! The executor, dispatcher and conditions only ever talk to a page through
//! [`PageDriver`]. Environments are produced by an [`EnvironmentFactory`],
//! so the same scenarios run against Chromium (feature `browser`) or the
//! scripted [`crate::mock::MockFactory`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::EnvironmentConfig;
use crate::locator::{BoundingBox, Locator, Point};
use crate::network::{ExchangeMatcher, ExchangeWatch};
use crate::result::SmokeResult;

/// What the page reported after a navigation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationResponse {
    /// Main document status, when the driver saw the response
    pub status: Option<u16>,
    /// URL after redirects
    pub url: String,
}

/// Point-in-time state of the elements a locator resolves to.
///
/// `count` covers every match; the remaining fields describe the first one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Number of matched elements
    pub count: usize,
    /// First match is rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// First match is not disabled
    pub enabled: bool,
    /// First match accepts text input
    pub editable: bool,
    /// Text content of the first match
    pub text: Option<String>,
    /// Bounding box of the first match
    pub bounding_box: Option<BoundingBox>,
}

impl ElementSnapshot {
    /// Snapshot of a locator with no matches
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// One rendered, enabled element
    #[must_use]
    pub fn visible() -> Self {
        Self {
            count: 1,
            visible: true,
            enabled: true,
            editable: false,
            text: None,
            bounding_box: Some(BoundingBox::new(0.0, 0.0, 100.0, 40.0)),
        }
    }

    /// One attached element that is not rendered
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            count: 1,
            enabled: true,
            ..Self::default()
        }
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the match count
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the bounding box
    #[must_use]
    pub const fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark as accepting text input
    #[must_use]
    pub const fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Whether at least one element matched
    #[must_use]
    pub const fn attached(&self) -> bool {
        self.count > 0
    }

    /// Compact description used in observations
    #[must_use]
    pub fn describe(&self) -> String {
        if self.count == 0 {
            return "count=0".to_string();
        }
        let mut out = format!(
            "count={} visible={} enabled={}",
            self.count, self.visible, self.enabled
        );
        if let Some(text) = &self.text {
            let text = text.trim();
            let shown: String = text.chars().take(60).collect();
            if shown.len() < text.len() {
                out.push_str(&format!(" text={shown:?}..."));
            } else {
                out.push_str(&format!(" text={shown:?}"));
            }
        }
        out
    }
}

/// Which option of a `<select>` to pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionChoice {
    /// Option with this `value` attribute
    Value(String),
    /// Option with this visible label
    Label(String),
    /// Option at this index
    Index(usize),
}

impl fmt::Display for OptionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "value={v:?}"),
            Self::Label(l) => write!(f, "label={l:?}"),
            Self::Index(i) => write!(f, "index={i}"),
        }
    }
}

/// Low-level pointer event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    /// Pointer moved
    Move,
    /// Primary button pressed
    Down,
    /// Primary button released
    Up,
}

/// A pointer event at page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Event kind
    pub kind: PointerKind,
    /// Position
    pub point: Point,
}

impl PointerEvent {
    /// Pointer move
    #[must_use]
    pub const fn move_to(point: Point) -> Self {
        Self {
            kind: PointerKind::Move,
            point,
        }
    }

    /// Button press
    #[must_use]
    pub const fn down(point: Point) -> Self {
        Self {
            kind: PointerKind::Down,
            point,
        }
    }

    /// Button release
    #[must_use]
    pub const fn up(point: Point) -> Self {
        Self {
            kind: PointerKind::Up,
            point,
        }
    }
}

/// Driver for one isolated page
///
/// Errors follow the harness taxonomy: `Remote` for recoverable hiccups the
/// poller may retry, `ActionRejected` when the page refused an input, and
/// `FatalEnvironment` when the page or browser is gone.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load event
    async fn navigate(&self, url: &str) -> SmokeResult<NavigationResponse>;

    /// Current page URL (including fragment)
    async fn current_url(&self) -> SmokeResult<String>;

    /// Snapshot the elements a locator resolves to
    async fn inspect(&self, locator: &Locator) -> SmokeResult<ElementSnapshot>;

    /// Attribute value of every matched element
    async fn attribute_values(&self, locator: &Locator, name: &str)
        -> SmokeResult<Vec<Option<String>>>;

    /// Click the first matched element
    async fn click(&self, locator: &Locator) -> SmokeResult<()>;

    /// Replace the value of the first matched input
    async fn fill(&self, locator: &Locator, text: &str) -> SmokeResult<()>;

    /// Press a key, focused on the locator when given
    async fn press_key(&self, locator: Option<&Locator>, key: &str) -> SmokeResult<()>;

    /// Select an option of the first matched `<select>`
    async fn select_option(&self, locator: &Locator, choice: &OptionChoice) -> SmokeResult<()>;

    /// Inject a raw pointer event
    async fn pointer(&self, event: PointerEvent) -> SmokeResult<()>;

    /// Subscribe to completed network exchanges matching `matcher`
    async fn watch_exchanges(&self, matcher: ExchangeMatcher) -> SmokeResult<ExchangeWatch>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> SmokeResult<Vec<u8>>;

    /// Release the page and anything scoped to it
    async fn close(&self) -> SmokeResult<()>;
}

/// Produces fresh, isolated pages
#[async_trait]
pub trait EnvironmentFactory: Send + Sync {
    /// Create a page configured per `config`
    async fn create(&self, config: &EnvironmentConfig) -> SmokeResult<Box<dyn PageDriver>>;

    /// Release shared resources once the suite is done
    async fn shutdown(&self) -> SmokeResult<()> {
        Ok(())
    }
}
