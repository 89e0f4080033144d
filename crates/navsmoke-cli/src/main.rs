//! navsmoke: browser smoke tests from the command line
//!
//! ## Usage
//!
//! ```bash
//! navsmoke run                              # Built-in suite against navigator.ba
//! navsmoke run --filter map --format junit  # Map scenarios, JUnit on stdout
//! navsmoke run --scenarios smoke.yaml -o report.json --format json
//! navsmoke list                             # What would run
//! navsmoke config                           # Effective configuration
//! ```
//!
//! Exit status: 0 when no scenario FAILED, 1 when one did, 2 on errors.

use std::process::ExitCode;

use clap::Parser;
use navsmoke_cli::{
    emit_report, handlers, logging, Cli, CliConfig, CliResult, Commands, RunArgs, SuiteRunner, Verbosity,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);

    if let Err(e) = logging::init(&config) {
        eprintln!("Warning: {e}");
    }

    match run(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_format(cli.log_format.into());
    console::set_colors_enabled_stderr(config.use_color());
    config
}

/// Returns whether the command succeeded
async fn run(command: Commands, config: &CliConfig) -> CliResult<bool> {
    match command {
        Commands::Run(args) => run_suite(&args, config).await,
        Commands::List(args) => handlers::execute_list(&args).map(|()| true),
        Commands::Config(args) => handlers::execute_config(&args).map(|()| true),
    }
}

async fn run_suite(args: &RunArgs, config: &CliConfig) -> CliResult<bool> {
    let mut runner = SuiteRunner::new(config);
    let report = runner.run(args).await?;
    emit_report(&report, args.format.into(), args.output.as_deref())?;
    Ok(report.success())
}
