//! Locators: scoped element selection compiled to DOM queries.
//!
//! A [`Locator`] is a chain of segments. Each segment runs its [`Selector`]
//! inside every element matched by the previous segment, then optionally
//! narrows the matches with a [`Pick`]. The textual form mirrors the one used
//! in scenario files:
//!
//! ```text
//! ul.menu_content_list.search-results >> li .name:has-text("Mrvica") >> nth=0
//! ul.navigation.left >> text=Create Place
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::{SmokeError, SmokeResult};

const SEGMENT_SEPARATOR: &str = " >> ";

/// JavaScript function collapsing runs of whitespace, as rendered text does
const NORMALIZED_TEXT: &str = "((s) => (s || '').replace(/\\s+/g, ' ').trim())";

/// A point in page coordinates (CSS pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Translate the point by an offset
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Bounding box of a rendered element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center of the box
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the box contains a point
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Whether the box has a non-zero area
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Selector type for one locator segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// Innermost elements whose text content contains the string
    Text(String),
    /// CSS selector filtered by text content
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS selector with a text filter
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// JavaScript expression mapping `root` to an array of matches
    fn to_js(&self) -> String {
        match self {
            Self::Css(css) => format!("Array.from(root.querySelectorAll({}))", js_str(css)),
            Self::Text(text) => {
                let t = js_str(&normalize_whitespace(text));
                format!(
                    "Array.from(root.querySelectorAll('*')).filter(e => {NORMALIZED_TEXT}(e.textContent).includes({t}) \
                     && !Array.from(e.children).some(c => {NORMALIZED_TEXT}(c.textContent).includes({t})))"
                )
            }
            Self::CssWithText { css, text } => format!(
                "Array.from(root.querySelectorAll({})).filter(e => {NORMALIZED_TEXT}(e.textContent).includes({}))",
                js_str(css),
                js_str(&normalize_whitespace(text))
            ),
        }
    }

    fn parse(raw: &str) -> SmokeResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SmokeError::config("empty selector segment"));
        }
        if let Some(text) = raw.strip_prefix("text=") {
            return Ok(Self::Text(unquote(text)));
        }
        if let Some(start) = raw.find(":has-text(") {
            let css = &raw[..start];
            let rest = &raw[start + ":has-text(".len()..];
            let inner = rest
                .strip_suffix(')')
                .ok_or_else(|| SmokeError::config(format!("unterminated :has-text in {raw}")))?;
            return Ok(Self::css_with_text(css.trim(), unquote(inner)));
        }
        Ok(Self::Css(raw.to_string()))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Text(text) if needs_quotes(text) => write!(f, "text={}", js_str(text)),
            Self::Text(text) => write!(f, "text={text}"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text({})", js_str(text)),
        }
    }
}

/// Narrowing applied to the matches of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pick {
    /// Keep every match
    #[default]
    All,
    /// Keep the match at this index
    Nth(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    selector: Selector,
    pick: Pick,
}

/// A scoped, chainable element locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    segments: Vec<Segment>,
}

impl Locator {
    /// Create a locator from a CSS selector
    #[must_use]
    pub fn new(css: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(css.into()))
    }

    /// Create a locator from any selector
    #[must_use]
    pub fn from_selector(selector: Selector) -> Self {
        Self {
            segments: vec![Segment {
                selector,
                pick: Pick::All,
            }],
        }
    }

    /// Parse the textual `a >> b >> nth=0` form
    pub fn parse(raw: &str) -> SmokeResult<Self> {
        let mut segments: Vec<Segment> = Vec::new();
        for part in split_segments(raw) {
            let part = part.trim();
            if let Some(index) = part.strip_prefix("nth=") {
                let index: usize = index
                    .parse()
                    .map_err(|_| SmokeError::config(format!("invalid nth index in {raw}")))?;
                let last = segments
                    .last_mut()
                    .ok_or_else(|| SmokeError::config(format!("nth= without a selector in {raw}")))?;
                last.pick = Pick::Nth(index);
                continue;
            }
            segments.push(Segment {
                selector: Selector::parse(part)?,
                pick: Pick::All,
            });
        }
        if segments.is_empty() {
            return Err(SmokeError::config("empty locator"));
        }
        Ok(Self { segments })
    }

    /// Search inside the current matches with another selector
    #[must_use]
    pub fn locate(mut self, selector: Selector) -> Self {
        self.segments.push(Segment {
            selector,
            pick: Pick::All,
        });
        self
    }

    /// Search inside the current matches with a CSS selector
    #[must_use]
    pub fn css(self, css: impl Into<String>) -> Self {
        self.locate(Selector::Css(css.into()))
    }

    /// Filter the last segment by text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        if let Some(last) = self.segments.last_mut() {
            let text = text.into();
            last.selector = match std::mem::replace(&mut last.selector, Selector::Text(String::new())) {
                Selector::Css(css) | Selector::CssWithText { css, .. } => {
                    Selector::CssWithText { css, text }
                }
                Selector::Text(_) => Selector::Text(text),
            };
        }
        self
    }

    /// Keep only the first match of the last segment
    #[must_use]
    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Keep only the n-th match of the last segment
    #[must_use]
    pub fn nth(mut self, index: usize) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.pick = Pick::Nth(index);
        }
        self
    }

    /// `inner` searched within the matches of `self`
    #[must_use]
    pub fn within(&self, inner: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(inner.segments.iter().cloned());
        Self { segments }
    }

    /// Number of segments in the chain
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// JavaScript expression evaluating to the array of matched elements
    #[must_use]
    pub fn to_js(&self) -> String {
        let mut js = String::from("(() => { let scope = [document];");
        for segment in &self.segments {
            js.push_str(&format!(
                " scope = Array.from(new Set(scope.flatMap(root => {})));",
                segment.selector.to_js()
            ));
            if let Pick::Nth(index) = segment.pick {
                js.push_str(&format!(" scope = scope.slice({index}, {});", index + 1));
            }
        }
        js.push_str(" return scope; })()");
        js
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(SEGMENT_SEPARATOR)?;
            }
            write!(f, "{}", segment.selector)?;
            if let Pick::Nth(index) = segment.pick {
                write!(f, "{SEGMENT_SEPARATOR}nth={index}")?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for Locator {
    type Error = SmokeError;

    fn try_from(value: String) -> SmokeResult<Self> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

/// Encode a string as a JavaScript string literal
pub(crate) fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Collapse whitespace runs to single spaces and trim the ends
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether text must be written as a quoted literal to parse back unchanged
fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.trim() != text
        || text.contains(">>")
        || text.chars().any(|c| c == '"' || c == '\'' || c.is_control())
}

/// Decode a `"..."` literal; bare text is returned trimmed
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        if let Ok(decoded) = serde_json::from_str::<String>(raw) {
            return decoded;
        }
        return raw[1..raw.len() - 1].to_string();
    }
    raw.to_string()
}

/// Split on the segment separator, ignoring separators inside quotes
fn split_segments(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = raw.char_indices();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if raw[i..].starts_with(SEGMENT_SEPARATOR) => {
                parts.push(&raw[start..i]);
                start = i + SEGMENT_SEPARATOR.len();
                // skip the rest of the separator
                for _ in 1..SEGMENT_SEPARATOR.len() {
                    chars.next();
                }
            }
            None => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}
