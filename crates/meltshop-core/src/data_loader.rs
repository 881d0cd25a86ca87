//! Plant configuration loading from JSON or TOML text.
//!
//! Feature-gated behind `data-loader`. Reading files is left to the caller;
//! these functions take the text, fill every missing field with the plant
//! defaults and validate the result.

use crate::config::{ConfigError, PlantConfig};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Parse a plant configuration from a JSON string without validating it.
pub fn parse_config_json(json: &str) -> Result<PlantConfig, DataLoadError> {
    Ok(serde_json::from_str(json)?)
}

/// Parse a plant configuration from a TOML string without validating it.
pub fn parse_config_toml(text: &str) -> Result<PlantConfig, DataLoadError> {
    Ok(toml::from_str(text)?)
}

/// Parse and validate a JSON configuration.
pub fn load_config_json(json: &str) -> Result<Arc<PlantConfig>, DataLoadError> {
    Ok(parse_config_json(json)?.validate()?)
}

/// Parse and validate a TOML configuration.
pub fn load_config_toml(text: &str) -> Result<Arc<PlantConfig>, DataLoadError> {
    Ok(parse_config_toml(text)?.validate()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::SteelGrade;
    use crate::unit::UnitType;

    #[test]
    fn load_empty_json_gives_defaults() {
        let cfg = load_config_json("{}").unwrap();
        assert_eq!(*cfg, PlantConfig::default());
    }

    #[test]
    fn load_partial_json() {
        let json = r#"{
            "seed": 7,
            "heat_interval": 45.0,
            "grade_routes": {
                "standard": ["EAF", "LMF", "Caster"],
                "high_clean": ["EAF", "LMF", "Degasser", "Caster"]
            }
        }"#;
        let cfg = load_config_json(json).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.heat_interval, 45.0);
        assert_eq!(cfg.grade_routes.len(), 2);
        assert_eq!(cfg.route_for(SteelGrade::HighClean)[2], UnitType::Degasser);
        assert_eq!(cfg.n_ladles, 12);
    }

    #[test]
    fn load_toml_with_analytics_table() {
        let text = r#"
            simulation_time = 720.0
            max_heats = 10

            [analytics]
            takt_time = 45.0
        "#;
        let cfg = load_config_toml(text).unwrap();
        assert_eq!(cfg.simulation_time, 720.0);
        assert_eq!(cfg.max_heats, 10);
        assert_eq!(cfg.analytics.takt_time, 45.0);
        assert_eq!(cfg.analytics.window, 20);
    }

    #[test]
    fn parse_keeps_invalid_values_until_validation() {
        let cfg = parse_config_json(r#"{"grade_routes": {}}"#).unwrap();
        assert!(cfg.grade_routes.is_empty());
        assert!(matches!(
            load_config_json(r#"{"grade_routes": {}}"#),
            Err(DataLoadError::Config(ConfigError::MissingGradeRoutes))
        ));
    }

    #[test]
    fn load_invalid_json_fails() {
        let result = load_config_json("not valid json {{{");
        assert!(matches!(result, Err(DataLoadError::JsonParse(_))));
    }

    #[test]
    fn load_invalid_toml_fails() {
        let result = load_config_toml("seed = = 3");
        assert!(matches!(result, Err(DataLoadError::TomlParse(_))));
    }

    #[test]
    fn unknown_unit_type_is_a_parse_error() {
        let json = r#"{"grade_routes": {"standard": ["BOF"]}}"#;
        assert!(matches!(load_config_json(json), Err(DataLoadError::JsonParse(_))));
    }
}
