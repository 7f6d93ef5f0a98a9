#![forbid(unsafe_code)]

use crate::value::display_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error as ThisError;

const DEFAULT_RULES_YAML: &str = include_str!("../rules/default_rules.yaml");

///
/// RulesConfig
///
/// Business rules that the legacy form hard-coded: placeholder texts, fields
/// that are always critical, conditional requirements, the selection-criteria
/// catalogue and every user-facing message.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    pub placeholders: Vec<String>,
    #[serde(default)]
    pub critical_fields: Vec<String>,
    #[serde(default)]
    pub critical_dropdowns: Vec<CriticalDropdown>,
    #[serde(default)]
    pub multi_entry: Vec<MultiEntryRule>,
    #[serde(default)]
    pub conditional: Vec<ConditionalRule>,
    pub framework_duration: FrameworkDurationRule,
    pub criteria: CriteriaConfig,
    pub messages: Messages,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalDropdown {
    pub key: String,
    pub label: String,
}

/// "Multiple entries" toggle that demands a minimum number of complete entries
/// under `entries.<i>.<field>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiEntryRule {
    pub toggle: String,
    #[serde(default = "default_toggle_value")]
    pub toggle_value: Value,
    pub entries: String,
    pub required_fields: Vec<String>,
    #[serde(default = "default_minimum_entries")]
    pub minimum: usize,
    pub message: String,
}

/// When `when` equals `equals`, every key in `require` must be filled in.
/// `equals` defaults to `true`, which matches any truthy toggle value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalRule {
    pub when: String,
    #[serde(default = "default_toggle_value")]
    pub equals: Value,
    pub require: Vec<String>,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameworkDurationRule {
    pub key: String,
    pub max_months: u32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriteriaConfig {
    pub section: String,
    pub price: String,
    pub override_key: String,
    pub cpv_codes_key: String,
    #[serde(default = "default_expected_total")]
    pub expected_total: f64,
    pub items: Vec<CriterionDef>,
    pub social: SocialCriteriaDef,
}

impl CriteriaConfig {
    /// `section.field` for a key relative to the criteria section.
    pub fn key(&self, field: &str) -> String {
        format!("{}.{field}", self.section)
    }

    pub fn item(&self, key: &str) -> Option<&CriterionDef> {
        self.items.iter().find(|item| item.key == key)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionDef {
    pub key: String,
    pub points: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Social criteria score as the sum of their sub-options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialCriteriaDef {
    pub key: String,
    pub label: String,
    pub sub_options: Vec<SocialSubOption>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialSubOption {
    pub option: String,
    pub points: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Messages {
    pub required_field: String,
    pub dropdown_unset: String,
    pub criteria_none_selected: String,
    pub points_missing: String,
    pub points_invalid: String,
    pub points_negative: String,
    pub points_zero: String,
    pub total_mismatch: String,
    pub social_no_sub_option: String,
    pub description_missing: String,
    pub cpv_social_required: String,
    pub cpv_price_only_forbidden: String,
    pub price_only: String,
    pub lot_prefix: String,
}

impl RulesConfig {
    /// Rules shipped with the crate (`rules/default_rules.yaml`).
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml_str(DEFAULT_RULES_YAML)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Yaml(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded rules config");
        Ok(config)
    }

    /// Unset dropdowns show a placeholder option instead of a value.
    pub fn is_placeholder(&self, value: &Value) -> bool {
        let text = display_text(value).to_lowercase();
        self.placeholders
            .iter()
            .any(|placeholder| placeholder.trim().to_lowercase() == text)
    }

    pub fn is_critical_field(&self, key: &str) -> bool {
        self.critical_fields.iter().any(|field| field == key)
    }

    pub fn is_critical_dropdown(&self, key: &str) -> bool {
        self.critical_dropdowns.iter().any(|dropdown| dropdown.key == key)
    }
}

/// Fills `{name}` placeholders in a message template.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

fn default_toggle_value() -> Value {
    Value::Bool(true)
}

fn default_minimum_entries() -> usize {
    2
}

fn default_expected_total() -> f64 {
    100.0
}

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
    #[error("rules config could not be read from {path}: {message}")]
    Read { path: String, message: String },

    #[error("rules config is not valid YAML: {0}")]
    Yaml(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_defaults_parse() {
        let config = RulesConfig::embedded().expect("embedded rules parse");
        assert_eq!(config.criteria.section, "selectionCriteria");
        assert_eq!(config.criteria.social.sub_options.len(), 5);
        assert_eq!(config.framework_duration.max_months, 48);
        assert!(config.multi_entry.iter().all(|rule| rule.minimum == 2));
        assert!(config.criteria.item("price").is_some());
    }

    #[test]
    fn placeholders_match_case_insensitively() {
        let config = RulesConfig::embedded().expect("embedded rules parse");
        assert!(config.is_placeholder(&json!("--Select--")));
        assert!(config.is_placeholder(&json!("-- izberite --")));
        assert!(!config.is_placeholder(&json!("storitve")));
    }

    #[test]
    fn render_fills_named_placeholders() {
        assert_eq!(
            render("{label}: {count}/{minimum}", &[("label", "A"), ("count", "1"), ("minimum", "2")]),
            "A: 1/2"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut raw = DEFAULT_RULES_YAML.to_string();
        raw.push_str("\nunexpected: true\n");
        assert!(matches!(
            RulesConfig::from_yaml_str(&raw).unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RulesConfig::load("/nonexistent/jn_rules.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
