//! List command handler

use std::fmt::Write as _;

use navsmoke::Scenario;

use crate::commands::ListArgs;
use crate::error::CliResult;
use crate::runner::{harness_config, select_scenarios};

/// Execute the list command
pub fn execute_list(args: &ListArgs) -> CliResult<()> {
    let config = harness_config(&args.source)?;
    let scenarios = select_scenarios(&args.source, &config)?;
    print!("{}", render_list(&scenarios, args.json)?);
    Ok(())
}

/// One line per scenario, or the full definitions as JSON
pub fn render_list(scenarios: &[Scenario], json: bool) -> CliResult<String> {
    if json {
        let mut out = serde_json::to_string_pretty(scenarios)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for scenario in scenarios {
        let _ = write!(
            out,
            "{:<6} {:<40} {:>2} steps",
            scenario.id,
            scenario.title,
            scenario.steps.len()
        );
        if !scenario.tags.is_empty() {
            let _ = write!(out, "  [{}]", scenario.tags.join(", "));
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{} scenario(s)", scenarios.len());
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use navsmoke::{catalog, HarnessConfig};

    #[test]
    fn test_text_lists_every_scenario() {
        let scenarios = catalog::all(&HarnessConfig::default());
        let text = render_list(&scenarios, false).unwrap();
        for id in catalog::SCENARIO_IDS {
            assert!(text.contains(id), "missing {id}");
        }
        assert!(text.ends_with("12 scenario(s)\n"));
    }

    #[test]
    fn test_tags_shown() {
        let text = render_list(&[catalog::map_display()], false).unwrap();
        assert!(text.contains("[map]"));
    }

    #[test]
    fn test_json_is_parseable() {
        let json = render_list(&[catalog::map_display()], true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["id"], "TC002");
    }
}
