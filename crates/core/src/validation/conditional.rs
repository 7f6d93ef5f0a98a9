#![forbid(unsafe_code)]

use super::Run;
use crate::config::{RulesConfig, render};
use crate::value::{display_text, is_blank_opt, matches_literal};

pub(super) fn check(rules: &RulesConfig, run: &mut Run<'_>) {
    for rule in &rules.conditional {
        let toggle = run.resolver.value(run.store, &rule.when);
        if !matches_literal(toggle, &rule.equals) {
            continue;
        }
        let incomplete = rule
            .require
            .iter()
            .any(|key| is_blank_opt(run.resolver.value(run.store, key)));
        if incomplete {
            run.error(rule.message.clone());
        }
    }

    let limit = &rules.framework_duration;
    let Some(raw) = run.resolver.value(run.store, &limit.key) else {
        return;
    };
    // Durations we cannot read are left to the reviewer.
    let Some(months) = parse_duration_months(&display_text(raw)) else {
        return;
    };
    if months > limit.max_months {
        let max_months = limit.max_months.to_string();
        run.error(render(&limit.message, &[("max_months", max_months.as_str())]));
    }
}

/// Reads `"<n> <unit>"` where the unit is a Slovenian year or month word
/// (`leto`, `leti`, `leta`, `let`, `mesec`, `meseca`, `mesece`, `mesecev`, ...).
/// Returns the duration in months, or `None` when no such pair is present.
pub fn parse_duration_months(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    let mut tokens = lowered
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter(|token| !token.is_empty())
        .peekable();

    while let Some(token) = tokens.next() {
        let digits = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        if digits == 0 {
            continue;
        }
        let Ok(amount) = token[..digits].parse::<u32>() else {
            continue;
        };
        // Accept both "4 leta" and "4leta".
        let unit = if digits < token.len() {
            &token[digits..]
        } else {
            match tokens.peek() {
                Some(next) => *next,
                None => return None,
            }
        };
        if unit.starts_with("let") {
            return amount.checked_mul(12);
        }
        if unit.starts_with("mesec") {
            return Some(amount);
        }
    }
    None
}
