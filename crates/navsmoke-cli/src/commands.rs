//! CLI command definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use navsmoke::{ReportFormat, ENV_BASE_URL, ENV_CHROMIUM_PATH, ENV_CONFIG};

use crate::config::{ColorChoice, LogFormat};

/// navsmoke: browser smoke tests for single-page map applications
#[derive(Parser, Debug)]
#[command(name = "navsmoke")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures and the summary only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format on stderr
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios against a live site
    Run(RunArgs),

    /// List the scenarios that would run
    List(ListArgs),

    /// Show or check the effective configuration
    Config(ConfigArgs),
}

/// Where scenarios and settings come from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Harness configuration file (YAML)
    #[arg(short, long, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Scenario file (YAML) used instead of the built-in suite
    #[arg(short, long)]
    pub scenarios: Option<PathBuf>,

    /// Only scenarios whose id, title or tag matches
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Site under test
    #[arg(long, env = ENV_BASE_URL)]
    pub base_url: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario and configuration sources
    #[command(flatten)]
    pub source: SourceArgs,

    /// Report format
    #[arg(long, default_value = "text")]
    pub format: FormatArg,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Scenarios run at once (0 = number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Chromium executable
    #[arg(long, env = ENV_CHROMIUM_PATH)]
    pub chromium_path: Option<String>,

    /// Launch chromium without its sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Default step timeout in milliseconds
    #[arg(long)]
    pub step_timeout: Option<u64>,

    /// Skip screenshots of failing steps
    #[arg(long)]
    pub no_screenshots: bool,
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Scenario and configuration sources
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the full scenario definitions as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Scenario and configuration sources
    #[command(flatten)]
    pub source: SourceArgs,

    /// Validate and exit without printing
    #[arg(long)]
    pub check: bool,
}

/// Report format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document
    Json,
    /// JUnit XML
    Junit,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
            FormatArg::Junit => Self::Junit,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Detect terminal
    #[default]
    Auto,
    /// Always color
    Always,
    /// Never color
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
