#![forbid(unsafe_code)]

use super::Run;
use crate::config::{RulesConfig, render};
use crate::value::is_blank_opt;

/// Critical dropdowns in the current step must hold a real option. Keys the
/// required check already reported are not reported twice.
pub(super) fn check(rules: &RulesConfig, run: &mut Run<'_>) {
    for dropdown in &rules.critical_dropdowns {
        if !run.keys.contains(&dropdown.key) || run.reported.contains(&dropdown.key) {
            continue;
        }
        let value = run.resolver.value(run.store, &dropdown.key);
        if is_blank_opt(value) || value.is_some_and(|v| rules.is_placeholder(v)) {
            run.error(render(
                &rules.messages.dropdown_unset,
                &[("label", dropdown.label.as_str())],
            ));
            run.reported.insert(dropdown.key.clone());
        }
    }
}
