#![forbid(unsafe_code)]

use crate::config::ConfigError;
use crate::value::display_text;
use serde::Deserialize;
use serde_json::Value;

/// Lookup of CPV-code driven criteria rules. The reference dataset lives
/// outside this crate; the engine only asks these two questions.
pub trait CpvLookup {
    fn requires_social_criteria(&self, code: &str) -> bool;
    fn forbids_price_only(&self, code: &str) -> bool;
}

/// No CPV code carries any rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCpvRules;

impl CpvLookup for NoCpvRules {
    fn requires_social_criteria(&self, _code: &str) -> bool {
        false
    }

    fn forbids_price_only(&self, _code: &str) -> bool {
        false
    }
}

///
/// StaticCpvRules
///
/// Table-backed lookup. A rule code covers every code in its CPV subtree: the
/// trailing zeros of the numeric part are dropped and the rest is a prefix.
///

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCpvRules {
    #[serde(default)]
    pub social_required: Vec<String>,
    #[serde(default)]
    pub price_only_forbidden: Vec<String>,
}

impl StaticCpvRules {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Yaml(err.to_string()))
    }
}

impl CpvLookup for StaticCpvRules {
    fn requires_social_criteria(&self, code: &str) -> bool {
        covered_by_any(&self.social_required, code)
    }

    fn forbids_price_only(&self, code: &str) -> bool {
        covered_by_any(&self.price_only_forbidden, code)
    }
}

fn covered_by_any(rules: &[String], code: &str) -> bool {
    let Some(code) = numeric_part(code) else {
        return false;
    };
    rules.iter().filter_map(|rule| numeric_part(rule)).any(|rule| {
        let stem = rule.trim_end_matches('0');
        !stem.is_empty() && code.starts_with(stem)
    })
}

/// `"45210000-2"` → `"45210000"`; anything without leading digits → `None`.
pub fn numeric_part(code: &str) -> Option<&str> {
    let code = code.trim();
    let end = code
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(code.len());
    if end == 0 { None } else { Some(&code[..end]) }
}

/// Reads CPV codes from a stored value: a list, or text separated by commas,
/// semicolons or newlines. Each entry keeps only its first token, so
/// `"45000000-7 Gradbena dela"` yields `"45000000-7"`.
pub fn parse_cpv_codes(value: &Value) -> Vec<String> {
    let pieces = match value {
        Value::Array(items) => items.iter().map(display_text).collect::<Vec<_>>(),
        other => display_text(other)
            .split([',', ';', '\n'])
            .map(str::to_string)
            .collect(),
    };
    pieces
        .iter()
        .filter_map(|piece| piece.split_whitespace().next())
        .filter(|token| numeric_part(token).is_some())
        .map(str::to_string)
        .collect()
}
