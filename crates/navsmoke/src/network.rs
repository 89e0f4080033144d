//! Network exchange matching.
//!
//! Steps can block until the page completes a request/response pair that
//! matches an [`ExchangeMatcher`]. Drivers push every completed exchange
//! into an [`ExchangeWatch`]; the watch discards non-matching ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::result::{SmokeError, SmokeResult};

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request, including CORS preflights
    Options,
    /// CONNECT request
    Connect,
    /// TRACE request
    Trace,
    /// A method outside this list; never matched by a named method
    Other,
    /// Any method. Only meaningful on the matcher side
    #[default]
    #[serde(rename = "*")]
    Any,
}

impl HttpMethod {
    /// Parse from a wire method name. Unknown names become [`HttpMethod::Other`]
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "CONNECT" => Self::Connect,
            "TRACE" => Self::Trace,
            "*" => Self::Any,
            _ => Self::Other,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Other => "OTHER",
            Self::Any => "*",
        }
    }

    /// Check if an observed method satisfies this one.
    ///
    /// `self` is the wanted method: only it may be the `Any` wildcard.
    /// An observed `Any` or `Other` never satisfies a named method.
    #[must_use]
    pub fn matches(&self, observed: &Self) -> bool {
        match self {
            Self::Any => true,
            Self::Other => false,
            wanted => wanted == observed,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Suffix match
    Suffix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Suffix(pattern) => url.ends_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Any => true,
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "url == {p:?}"),
            Self::Prefix(p) => write!(f, "url starts with {p:?}"),
            Self::Suffix(p) => write!(f, "url ends with {p:?}"),
            Self::Contains(p) => write!(f, "url contains {p:?}"),
            Self::Regex(p) => write!(f, "url =~ /{p}/"),
            Self::Any => f.write_str("any url"),
        }
    }
}

/// Expected class of an HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 200..=299
    #[default]
    Success,
    /// 300..=399
    Redirect,
    /// 400..=499
    ClientError,
    /// 500..=599
    ServerError,
    /// Exactly this code
    Exact(u16),
}

impl StatusClass {
    /// Whether the status belongs to the class
    #[must_use]
    pub const fn contains(&self, status: u16) -> bool {
        match self {
            Self::Success => status >= 200 && status < 300,
            Self::Redirect => status >= 300 && status < 400,
            Self::ClientError => status >= 400 && status < 500,
            Self::ServerError => status >= 500 && status < 600,
            Self::Exact(code) => status == *code,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("2xx"),
            Self::Redirect => f.write_str("3xx"),
            Self::ClientError => f.write_str("4xx"),
            Self::ServerError => f.write_str("5xx"),
            Self::Exact(code) => write!(f, "{code}"),
        }
    }
}

/// Predicate selecting which exchange a step waits for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeMatcher {
    /// URL pattern
    pub url: UrlPattern,
    /// Request method
    #[serde(default)]
    pub method: HttpMethod,
}

impl ExchangeMatcher {
    /// Match by URL substring and method
    #[must_use]
    pub fn new(url_contains: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: UrlPattern::Contains(url_contains.into()),
            method,
        }
    }

    /// Whether an exchange matches
    #[must_use]
    pub fn matches(&self, exchange: &NetworkExchange) -> bool {
        self.method.matches(&exchange.method) && self.url.matches(&exchange.url)
    }
}

impl fmt::Display for ExchangeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A completed request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkExchange {
    /// Request URL
    pub url: String,
    /// Request method
    pub method: HttpMethod,
    /// Response status code
    pub status: u16,
}

impl NetworkExchange {
    /// Create a new exchange record
    #[must_use]
    pub fn new(url: impl Into<String>, method: HttpMethod, status: u16) -> Self {
        Self {
            url: url.into(),
            method,
            status,
        }
    }

    /// Whether the response status is in the 2xx range
    #[must_use]
    pub const fn ok(&self) -> bool {
        StatusClass::Success.contains(self.status)
    }
}

impl fmt::Display for NetworkExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.url, self.status)
    }
}

/// Responses held back while their request is still unseen
const MAX_ORPHAN_RESPONSES: usize = 256;

/// Pairs request and response events by request id.
///
/// An exchange is only emitted once both halves are known, so it always
/// carries the method the page actually sent. A response that arrives
/// before its request is held until the request shows up.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct ExchangeCorrelator {
    methods: HashMap<String, HttpMethod>,
    orphans: HashMap<String, (String, u16)>,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl ExchangeCorrelator {
    /// Record a request; completes an exchange whose response came first
    pub(crate) fn request(&mut self, id: &str, method: &str) -> Option<NetworkExchange> {
        let method = HttpMethod::parse(method);
        match self.orphans.remove(id) {
            Some((url, status)) => Some(NetworkExchange::new(url, method, status)),
            None => {
                self.methods.insert(id.to_string(), method);
                None
            }
        }
    }

    /// Record a response; completes the exchange when its request is known
    pub(crate) fn response(&mut self, id: &str, url: &str, status: u16) -> Option<NetworkExchange> {
        if let Some(method) = self.methods.remove(id) {
            return Some(NetworkExchange::new(url, method, status));
        }
        tracing::trace!(request_id = id, "response before its request");
        if self.orphans.len() >= MAX_ORPHAN_RESPONSES {
            self.orphans.clear();
        }
        self.orphans.insert(id.to_string(), (url.to_string(), status));
        None
    }
}

/// Subscription to completed exchanges, created before the triggering action
#[derive(Debug)]
pub struct ExchangeWatch {
    matcher: ExchangeMatcher,
    rx: mpsc::UnboundedReceiver<NetworkExchange>,
    seen: usize,
}

impl ExchangeWatch {
    /// Create a watch and the sender a driver feeds it through
    #[must_use]
    pub fn channel(matcher: ExchangeMatcher) -> (mpsc::UnboundedSender<NetworkExchange>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { matcher, rx, seen: 0 })
    }

    /// The matcher this watch filters by
    #[must_use]
    pub const fn matcher(&self) -> &ExchangeMatcher {
        &self.matcher
    }

    /// Wait for the first matching exchange
    ///
    /// # Errors
    ///
    /// `TimeoutExceeded` when nothing matches in time, `FatalEnvironment`
    /// when the driver dropped the feed (page closed).
    pub async fn next_match(&mut self, timeout: Duration) -> SmokeResult<NetworkExchange> {
        let matcher = self.matcher.clone();
        let seen = &mut self.seen;
        let rx = &mut self.rx;
        let wait = async {
            while let Some(exchange) = rx.recv().await {
                *seen += 1;
                if matcher.matches(&exchange) {
                    return Some(exchange);
                }
                tracing::trace!(%exchange, "ignoring non-matching exchange");
            }
            None
        };
        let outcome = tokio::time::timeout(timeout, wait).await;
        match outcome {
            Ok(Some(exchange)) => Ok(exchange),
            Ok(None) => Err(SmokeError::fatal(format!(
                "network feed closed while waiting for {}",
                self.matcher
            ))),
            Err(_) => Err(SmokeError::TimeoutExceeded {
                waited_for: format!("exchange {}", self.matcher),
                ms: timeout.as_millis() as u64,
                last_observation: format!("{} non-matching exchange(s)", self.seen),
            }),
        }
    }
}
