#![forbid(unsafe_code)]

use super::Run;
use crate::config::{MultiEntryRule, RulesConfig, render};
use crate::value::{is_blank_opt, matches_literal};
use std::collections::BTreeSet;

pub(super) fn check(rules: &RulesConfig, run: &mut Run<'_>) {
    for rule in &rules.multi_entry {
        let toggle = run.resolver.value(run.store, &rule.toggle);
        if !matches_literal(toggle, &rule.toggle_value) {
            continue;
        }
        let count = complete_entries(run, rule);
        if count < rule.minimum {
            let count = count.to_string();
            let minimum = rule.minimum.to_string();
            run.error(render(
                &rule.message,
                &[("count", count.as_str()), ("minimum", minimum.as_str())],
            ));
        }
    }
}

/// Entries under `entries.<i>.` whose required fields are all filled in.
fn complete_entries(run: &Run<'_>, rule: &MultiEntryRule) -> usize {
    let mut indices = BTreeSet::new();
    for candidate in run.resolver.candidates(&rule.entries) {
        let prefix = format!("{candidate}.");
        for key in run.store.keys_with_prefix(&prefix) {
            let index = key[prefix.len()..]
                .split('.')
                .next()
                .and_then(|segment| segment.parse::<usize>().ok());
            if let Some(index) = index {
                indices.insert(index);
            }
        }
    }

    indices
        .into_iter()
        .filter(|index| {
            rule.required_fields.iter().all(|field| {
                let key = format!("{}.{index}.{field}", rule.entries);
                !is_blank_opt(run.resolver.value(run.store, &key))
            })
        })
        .count()
}
