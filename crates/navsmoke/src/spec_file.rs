//! YAML scenario files.
//!
//! A file is either a plain list of scenarios or a mapping with a shared
//! `environment` and a `scenarios` list:
//!
//! ```yaml
//! environment:
//!   locale: en-US
//! scenarios:
//!   - id: TC002
//!     title: Map display
//!     steps:
//!       - navigate: {}
//!       - await_condition:
//!           condition: { visible: ".leaflet-container" }
//! ```
//!
//! The shared environment sits underneath each scenario's own override.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::EnvironmentConfig;
use crate::result::{SmokeError, SmokeResult};
use crate::scenario::Scenario;

/// Contents of a scenario file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Environment shared by every scenario in the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentConfig>,
    /// The scenarios
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioFile {
    /// Parse YAML text
    pub fn parse(yaml: &str) -> SmokeResult<Self> {
        let value: serde_yaml_ng::Value = serde_yaml_ng::from_str(yaml)?;
        let file = match value {
            serde_yaml_ng::Value::Null => Self::default(),
            serde_yaml_ng::Value::Sequence(_) => Self {
                environment: None,
                scenarios: serde_yaml_ng::from_value(value)?,
            },
            serde_yaml_ng::Value::Mapping(_) => serde_yaml_ng::from_value(value)?,
            _ => {
                return Err(SmokeError::config(
                    "scenario file must be a list of scenarios or a mapping with `scenarios`",
                ))
            }
        };
        file.validate()?;
        Ok(file)
    }

    /// Read and parse a file
    pub fn load(path: impl AsRef<Path>) -> SmokeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|err| match err {
            SmokeError::Config { message } => SmokeError::config(format!("{}: {message}", path.display())),
            other => other,
        })
    }

    /// Check every scenario and reject duplicate ids
    pub fn validate(&self) -> SmokeResult<()> {
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.id.as_str()) {
                return Err(SmokeError::config(format!("duplicate scenario id {}", scenario.id)));
            }
            scenario
                .validate()
                .map_err(|err| SmokeError::config(format!("scenario {}: {err}", scenario.id)))?;
        }
        Ok(())
    }

    /// Scenarios with the shared environment folded into their overrides
    #[must_use]
    pub fn into_scenarios(self) -> Vec<Scenario> {
        let Some(shared) = self.environment else {
            return self.scenarios;
        };
        self.scenarios
            .into_iter()
            .map(|mut scenario| {
                scenario.environment = Some(match &scenario.environment {
                    Some(own) => shared.merge(own),
                    None => shared.clone(),
                });
                scenario
            })
            .collect()
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> SmokeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// Load the scenarios of a file, shared environment applied
pub fn load_scenarios(path: impl AsRef<Path>) -> SmokeResult<Vec<Scenario>> {
    Ok(ScenarioFile::load(path)?.into_scenarios())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scenario::StepKind;

    const LIST: &str = r#"
- id: TC002
  title: Map display
  tags: [map]
  steps:
    - navigate: {}
    - await_condition:
        condition: { visible: ".leaflet-container" }
- id: TC020
  title: Create place
  timeout_ms: 60000
  steps:
    - act_and_await_exchange:
        target: "button[type=submit]"
        action: click
        exchange: { url: { contains: /places/ }, method: POST }
        name: create
    - assert:
        condition: { exchange_status: { name: create, expect: success } }
"#;

    const MAPPING: &str = r#"
environment:
  locale: en-US
  permissions: [geolocation]
scenarios:
  - id: TC005
    title: Geolocation
    environment:
      geolocation: { latitude: 43.8563, longitude: 18.4131 }
    steps:
      - navigate: {}
  - id: TC001
    title: Home
    steps:
      - navigate: { url: "", expect_status: success }
"#;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_plain_list() {
            let file = ScenarioFile::parse(LIST).unwrap();
            assert!(file.environment.is_none());
            assert_eq!(file.scenarios.len(), 2);
            assert_eq!(file.scenarios[0].tags, ["map"]);
            assert!(matches!(
                file.scenarios[1].steps[0].kind,
                StepKind::ActAndAwaitExchange { .. }
            ));
        }

        #[test]
        fn test_mapping_with_shared_environment() {
            let scenarios = ScenarioFile::parse(MAPPING).unwrap().into_scenarios();
            let geo = scenarios[0].environment.as_ref().unwrap();
            assert_eq!(geo.locale.as_deref(), Some("en-US"));
            assert!(geo.geolocation.is_some());
            assert_eq!(geo.permissions, ["geolocation"]);
            let home = scenarios[1].environment.as_ref().unwrap();
            assert_eq!(home.locale.as_deref(), Some("en-US"));
        }

        #[test]
        fn test_empty_document() {
            assert!(ScenarioFile::parse("").unwrap().scenarios.is_empty());
        }

        #[test]
        fn test_scalar_rejected() {
            let err = ScenarioFile::parse("just text").unwrap_err();
            assert_eq!(err.kind(), "ConfigError");
        }

        #[test]
        fn test_duplicate_ids_rejected() {
            let yaml = r#"
- { id: TC001, title: a, steps: [ { navigate: {} } ] }
- { id: TC001, title: b, steps: [ { navigate: {} } ] }
"#;
            let err = ScenarioFile::parse(yaml).unwrap_err();
            assert!(err.to_string().contains("duplicate scenario id TC001"));
        }

        #[test]
        fn test_unknown_exchange_name_rejected() {
            let yaml = r#"
- id: TC020
  title: Create place
  steps:
    - assert:
        condition: { exchange_status: { name: create, expect: success } }
"#;
            assert!(ScenarioFile::parse(yaml).is_err());
        }

        #[test]
        fn test_unknown_top_level_key_rejected() {
            assert!(ScenarioFile::parse("scenario: []").is_err());
        }
    }

    mod file_tests {
        use super::*;

        #[test]
        fn test_load_from_disk() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("smoke.yaml");
            std::fs::write(&path, LIST).unwrap();
            let scenarios = load_scenarios(&path).unwrap();
            assert_eq!(scenarios[1].id, "TC020");
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = load_scenarios("/nonexistent/navsmoke.yaml").unwrap_err();
            assert_eq!(err.kind(), "IoError");
        }

        #[test]
        fn test_yaml_round_trip() {
            let file = ScenarioFile::parse(MAPPING).unwrap();
            let again = ScenarioFile::parse(&file.to_yaml().unwrap()).unwrap();
            assert_eq!(again, file);
        }
    }
}
