//! navsmoke CLI library
//!
//! Argument parsing, configuration layering and progress output for the
//! `navsmoke` binary.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, FormatArg, ListArgs, LogFormatArg, RunArgs, SourceArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{summary_line, ProgressReporter};
pub use runner::{emit_report, harness_config, run_config, select_scenarios, SuiteRunner};
