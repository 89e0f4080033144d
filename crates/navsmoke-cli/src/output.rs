//! Progress and status lines on stderr

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use navsmoke::{Outcome, Report, ScenarioReport};

/// Progress reporter for a suite run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Print a line per finished scenario
    pub verbose: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            verbose: false,
        }
    }

    /// Print every finished scenario, not only failures
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// A scenario finished
    pub fn scenario_done(&self, report: &ScenarioReport) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
            pb.set_message(report.id.clone());
        }
        let line = format!("{} {} ({}ms)", report.id, report.title, report.duration_ms);
        match &report.outcome {
            Outcome::Failed { failure, .. } => self.failure(&format!(
                "{line}: {} [{}] {}",
                failure.location(),
                failure.kind,
                failure.message
            )),
            Outcome::Partial { optional_failures } if self.verbose => self.warning(&format!(
                "{line}: {} optional check(s) failed",
                optional_failures.len()
            )),
            Outcome::Passed if self.verbose => self.success(&line),
            _ => {}
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn write_line(&self, line: &str) {
        match &self.progress_bar {
            Some(pb) => pb.suspend(|| {
                let _ = self.term.write_line(line);
            }),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, quiet or not
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print the run summary
    pub fn summary(&self, report: &Report) {
        if self.quiet && report.success() {
            return;
        }

        let line = summary_line(report, self.use_color);
        let _ = self.term.write_line(&line);
    }
}

/// `PASSED 12 scenarios in 31.20s (10 passed, 2 partial, 0 failed)`
#[must_use]
pub fn summary_line(report: &Report, use_color: bool) -> String {
    let status = if report.success() { "PASSED" } else { "FAILED" };
    let secs = report.duration().as_secs_f64();

    if !use_color {
        return format!(
            "{status} {} scenarios in {secs:.2}s ({} passed, {} partial, {} failed)",
            report.total, report.passed, report.partial, report.failed
        );
    }

    let passed_style = Style::new().green().bold();
    let failed_style = Style::new().red().bold();
    let partial_style = Style::new().yellow();
    let status = if report.success() {
        passed_style.apply_to(status)
    } else {
        failed_style.apply_to(status)
    };
    format!(
        "{status} {} scenarios in {secs:.2}s ({} passed, {} partial, {} failed)",
        report.total,
        passed_style.apply_to(report.passed),
        partial_style.apply_to(report.partial),
        if report.failed > 0 {
            failed_style.apply_to(report.failed).to_string()
        } else {
            report.failed.to_string()
        },
    )
}
