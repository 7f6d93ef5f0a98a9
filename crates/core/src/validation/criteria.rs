#![forbid(unsafe_code)]

use super::Run;
use crate::FlatStore;
use crate::config::{CriteriaConfig, RulesConfig, render};
use crate::cpv::{CpvLookup, parse_cpv_codes};
use crate::resolve::KeyResolver;
use crate::value::{format_number, is_blank, is_blank_opt, parse_number};
use serde_json::Value;

/// Points entered for one selected criterion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Points {
    Missing,
    Invalid,
    Value(f64),
}

impl Points {
    fn read(value: Option<&Value>) -> Self {
        match value {
            None => Self::Missing,
            Some(value) if is_blank(value) => Self::Missing,
            Some(value) => parse_number(value).map_or(Self::Invalid, Self::Value),
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(points) => Some(points),
            Self::Missing | Self::Invalid => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectedCriterion {
    pub key: String,
    pub label: String,
    pub points: Points,
}

/// Criteria switched on in the store, with their points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CriteriaSelection {
    pub selected: Vec<SelectedCriterion>,
    /// A social sub-option is ticked or carries non-zero points.
    pub social_sub_option_selected: bool,
}

impl CriteriaSelection {
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.iter().any(|criterion| criterion.key == key)
    }

    pub fn points(&self, key: &str) -> Option<f64> {
        self.selected
            .iter()
            .find(|criterion| criterion.key == key)
            .and_then(|criterion| criterion.points.value())
    }

    pub fn total(&self) -> f64 {
        self.selected
            .iter()
            .filter_map(|criterion| criterion.points.value())
            .sum()
    }

    /// `key` is selected and nothing else is.
    pub fn only(&self, key: &str) -> bool {
        self.selected.len() == 1 && self.selected[0].key == key
    }
}

pub fn extract_criteria(
    store: &FlatStore,
    resolver: &KeyResolver,
    config: &CriteriaConfig,
) -> CriteriaSelection {
    let mut selection = CriteriaSelection::default();

    for item in &config.items {
        if !resolver.flag(store, &config.key(&item.key)) {
            continue;
        }
        let points = Points::read(resolver.value(store, &config.key(&item.points)));
        selection.selected.push(SelectedCriterion {
            key: item.key.clone(),
            label: item.label.clone(),
            points,
        });
    }

    let social = &config.social;
    let mut social_points = Points::Missing;
    for sub in &social.sub_options {
        let points = Points::read(resolver.value(store, &config.key(&sub.points)));
        let ticked = resolver.flag(store, &config.key(&sub.option));
        if ticked || points.value().is_some_and(|points| points != 0.0) {
            selection.social_sub_option_selected = true;
        }
        social_points = match (social_points, points) {
            (Points::Invalid, _) | (_, Points::Invalid) => Points::Invalid,
            (Points::Missing, other) => other,
            (sum, Points::Missing) => sum,
            (Points::Value(sum), Points::Value(points)) => Points::Value(sum + points),
        };
    }
    if resolver.flag(store, &config.key(&social.key)) {
        selection.selected.push(SelectedCriterion {
            key: social.key.clone(),
            label: social.label.clone(),
            points: social_points,
        });
    }

    selection
}

pub(super) fn check(rules: &RulesConfig, cpv: &dyn CpvLookup, run: &mut Run<'_>) {
    let config = &rules.criteria;
    let messages = &rules.messages;
    let selection = extract_criteria(run.store, &run.resolver, config);

    if selection.selected.is_empty() {
        run.error(messages.criteria_none_selected.clone());
    }

    for criterion in &selection.selected {
        let label = [("label", criterion.label.as_str())];
        match criterion.points {
            Points::Missing => run.error(render(&messages.points_missing, &label)),
            Points::Invalid => run.error(render(&messages.points_invalid, &label)),
            Points::Value(points) if points < 0.0 => {
                run.error(render(&messages.points_negative, &label));
            }
            Points::Value(points) if points == 0.0 => {
                run.error(render(&messages.points_zero, &label));
            }
            Points::Value(_) => {}
        }
    }

    let total = selection.total();
    if !selection.selected.is_empty() && total != config.expected_total {
        let total = format_number(total);
        let expected = format_number(config.expected_total);
        run.warning(render(
            &messages.total_mismatch,
            &[("total", total.as_str()), ("expected", expected.as_str())],
        ));
    }

    if selection.is_selected(&config.social.key) && !selection.social_sub_option_selected {
        run.error(messages.social_no_sub_option.clone());
    }

    for item in &config.items {
        let Some(description) = &item.description else {
            continue;
        };
        if selection.is_selected(&item.key)
            && is_blank_opt(run.resolver.value(run.store, &config.key(description)))
        {
            run.error(render(
                &messages.description_missing,
                &[("label", item.label.as_str())],
            ));
        }
    }

    let codes = run
        .resolver
        .value(run.store, &config.cpv_codes_key)
        .map(parse_cpv_codes)
        .unwrap_or_default();
    let overridden = run.resolver.flag(run.store, &config.key(&config.override_key));

    let social_codes = codes
        .iter()
        .filter(|code| cpv.requires_social_criteria(code))
        .cloned()
        .collect::<Vec<_>>();
    if !overridden && !social_codes.is_empty() && !selection.is_selected(&config.social.key) {
        let joined = social_codes.join(", ");
        run.error(render(
            &messages.cpv_social_required,
            &[("codes", joined.as_str())],
        ));
    }

    let price_only = selection.only(&config.price);
    let price_codes = codes
        .iter()
        .filter(|code| cpv.forbids_price_only(code))
        .cloned()
        .collect::<Vec<_>>();
    let cpv_blocks_price_only = !overridden && price_only && !price_codes.is_empty();
    if cpv_blocks_price_only {
        let joined = price_codes.join(", ");
        run.error(render(
            &messages.cpv_price_only_forbidden,
            &[("codes", joined.as_str())],
        ));
    } else if price_only {
        run.warning(messages.price_only.clone());
    }
}
