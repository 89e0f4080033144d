//! Result reporting.
//!
//! The [`Reporter`] is purely additive: every scenario outcome is recorded,
//! nothing stops the run early. [`Reporter::summarize`] freezes the
//! collected outcomes into a [`Report`] that renders as a text summary, JSON
//! or JUnit XML for CI.

use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::executor::{Outcome, ScenarioReport};
use crate::result::SmokeResult;

/// Output format of a [`Report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// serde_json document
    Json,
    /// JUnit XML
    Junit,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "junit" | "xml" => Ok(Self::Junit),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

/// Collects scenario outcomes
#[derive(Debug)]
pub struct Reporter {
    suite_name: String,
    reports: Vec<ScenarioReport>,
    started: Option<Instant>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Create an empty reporter
    #[must_use]
    pub fn new() -> Self {
        Self {
            suite_name: "navsmoke".to_string(),
            reports: Vec::new(),
            started: None,
        }
    }

    /// Set suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Mark the start of the run; the summary then reports wall time
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Record a bare outcome for `scenario_id`
    pub fn record(&mut self, scenario_id: impl Into<String>, outcome: Outcome) {
        let id = scenario_id.into();
        self.record_report(ScenarioReport {
            title: id.clone(),
            id,
            outcome,
            steps_run: 0,
            steps_total: 0,
            duration_ms: 0,
            environment: None,
        });
    }

    /// Record a full scenario report
    pub fn record_report(&mut self, report: ScenarioReport) {
        self.reports.push(report);
    }

    /// Number of recorded scenarios
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Freeze the recorded outcomes into a report
    #[must_use]
    pub fn summarize(&self) -> Report {
        let count = |pred: fn(&Outcome) -> bool| self.reports.iter().filter(|r| pred(&r.outcome)).count();
        let duration = self.started.map_or_else(
            || self.reports.iter().map(ScenarioReport::duration).sum(),
            |started| started.elapsed(),
        );
        Report {
            suite: self.suite_name.clone(),
            total: self.reports.len(),
            passed: count(|o| matches!(o, Outcome::Passed)),
            failed: count(Outcome::is_failed),
            partial: count(|o| matches!(o, Outcome::Partial { .. })),
            duration_ms: duration.as_millis() as u64,
            scenarios: self.reports.clone(),
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Suite name
    pub suite: String,
    /// Scenarios recorded
    pub total: usize,
    /// Scenarios PASSED
    pub passed: usize,
    /// Scenarios FAILED
    pub failed: usize,
    /// Scenarios PARTIAL
    pub partial: usize,
    /// Run wall time in milliseconds
    pub duration_ms: u64,
    /// Per-scenario detail, in record order
    pub scenarios: Vec<ScenarioReport>,
}

impl Report {
    /// True when no scenario FAILED
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failed == 0
    }

    /// Run wall time
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Failed scenarios
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.scenarios.iter().filter(|s| s.outcome.is_failed())
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let rate = if self.total == 0 {
            100.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        };
        format!(
            "{}: {}/{} passed, {} partial, {} failed ({:.1}%) in {:.2}s",
            self.suite,
            self.passed,
            self.total,
            self.partial,
            self.failed,
            rate,
            self.duration().as_secs_f64()
        )
    }

    /// Render in `format`
    pub fn render(&self, format: ReportFormat) -> SmokeResult<String> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Junit => Ok(self.to_junit()),
        }
    }

    /// Render in `format` and write to `path`
    pub fn write_to(&self, path: &Path, format: ReportFormat) -> SmokeResult<()> {
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }

    /// Plain text: one line per scenario, failure detail indented below
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for scenario in &self.scenarios {
            let _ = writeln!(
                out,
                "{:<8} {} {} ({}ms)",
                scenario.outcome.state(),
                scenario.id,
                scenario.title,
                scenario.duration_ms
            );
            if let Some(failure) = scenario.outcome.failure() {
                let _ = writeln!(out, "    failed at {}: [{}] {}", failure.location(), failure.kind, failure.message);
                if let Some(observation) = &failure.observation {
                    let _ = writeln!(out, "    last observation: {observation}");
                }
            }
            for optional in scenario.outcome.optional_failures() {
                let _ = writeln!(
                    out,
                    "    optional {}: [{}] {}",
                    optional.location(),
                    optional.kind,
                    optional.message
                );
            }
        }
        out.push_str(&self.summary());
        out.push('\n');
        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> SmokeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JUnit XML; PARTIAL scenarios pass with their optional failures in
    /// `system-out`
    #[must_use]
    pub fn to_junit(&self) -> String {
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.suite),
            self.total,
            self.failed,
            self.duration().as_secs_f64()
        );

        for scenario in &self.scenarios {
            let _ = writeln!(
                xml,
                r#"  <testcase name="{}: {}" time="{:.3}">"#,
                escape_xml(&scenario.id),
                escape_xml(&scenario.title),
                scenario.duration().as_secs_f64()
            );
            if let Some(failure) = scenario.outcome.failure() {
                let mut body = format!("{}: {}", failure.location(), failure.message);
                if let Some(observation) = &failure.observation {
                    let _ = write!(body, "\nlast observation: {observation}");
                }
                let _ = writeln!(
                    xml,
                    r#"    <failure message="{}" type="{}">{}</failure>"#,
                    escape_xml(&failure.message),
                    escape_xml(&failure.kind),
                    escape_xml(&body)
                );
            }
            let optional = scenario.outcome.optional_failures();
            if !optional.is_empty() {
                let lines: Vec<String> = optional
                    .iter()
                    .map(|f| format!("optional {}: {}", f.location(), f.message))
                    .collect();
                let _ = writeln!(xml, "    <system-out>{}</system-out>", escape_xml(&lines.join("\n")));
            }
            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
