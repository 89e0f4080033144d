//! Config command handler

use navsmoke::HarnessConfig;

use crate::commands::ConfigArgs;
use crate::error::CliResult;
use crate::runner::{harness_config, select_scenarios};

/// Execute the config command
pub fn execute_config(args: &ConfigArgs) -> CliResult<()> {
    let config = harness_config(&args.source)?;
    let scenarios = select_scenarios(&args.source, &config)?;

    if args.check {
        println!(
            "configuration ok: {} scenario(s) against {}",
            scenarios.len(),
            config.base_url
        );
        return Ok(());
    }

    print!("{}", render_config(&config)?);
    Ok(())
}

/// Effective configuration as YAML
pub fn render_config(config: &HarnessConfig) -> CliResult<String> {
    Ok(config.to_yaml()?)
}
