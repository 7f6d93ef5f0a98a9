#![forbid(unsafe_code)]

use super::Run;
use crate::config::{RulesConfig, render};
use crate::paths::join_key;
use crate::schema::{FieldSchema, RequiredIf, Schema};
use crate::value::{is_blank_opt, matches_literal};

pub(super) fn check(schema: &Schema, rules: &RulesConfig, run: &mut Run<'_>) {
    let keys = run.keys.clone();
    for key in keys {
        let field = schema.field(&key);
        if !is_required(schema, rules, run, &key, field) {
            continue;
        }

        let value = run.resolver.value(run.store, &key);
        let dropdown = field.is_some_and(FieldSchema::is_dropdown) || rules.is_critical_dropdown(&key);
        let missing = is_blank_opt(value) || (dropdown && value.is_some_and(|v| rules.is_placeholder(v)));
        if missing {
            let title = schema.title_for(&key);
            run.error(render(
                &rules.messages.required_field,
                &[("title", title.as_str())],
            ));
            run.reported.insert(key);
        }
    }
}

fn is_required(
    schema: &Schema,
    rules: &RulesConfig,
    run: &Run<'_>,
    key: &str,
    field: Option<&FieldSchema>,
) -> bool {
    if schema.is_top_level_required(key)
        || schema.parent_requires(key)
        || field.is_some_and(|field| field.required)
        || rules.is_critical_field(key)
    {
        return true;
    }
    field
        .and_then(|field| field.required_if.as_ref())
        .is_some_and(|condition| condition_holds(run, key, condition))
}

/// `required_if.field` is a full key when it contains a dot, otherwise a sibling.
fn condition_holds(run: &Run<'_>, key: &str, condition: &RequiredIf) -> bool {
    let other = if condition.field.contains('.') {
        condition.field.clone()
    } else {
        let parent = key.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("");
        join_key(parent, &condition.field)
    };
    matches_literal(run.resolver.value(run.store, &other), &condition.value)
}
