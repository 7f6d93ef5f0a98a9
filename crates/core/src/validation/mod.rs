#![forbid(unsafe_code)]

mod conditional;
mod criteria;
mod dropdowns;
mod multi_entry;
mod required;

pub use conditional::parse_duration_months;
pub use criteria::{CriteriaSelection, Points, SelectedCriterion, extract_criteria};

use crate::config::{RulesConfig, render};
use crate::cpv::CpvLookup;
use crate::lots::{LotGroup, LotMode, lot_indices};
use crate::paths::{KeyPath, PathError};
use crate::resolve::KeyResolver;
use crate::schema::Schema;
use crate::FlatStore;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

/// Step entries with this prefix carry the lot being validated, not a section.
pub const LOT_CONTEXT_PREFIX: &str = "lot_context_";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Navigation is blocked by errors only; warnings are shown alongside.
    pub fn blocks_navigation(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Per-call progress of [`ValidationEngine::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ExpandingKeys,
    CheckingRequired,
    CheckingDropdowns,
    CheckingMultiEntry,
    CheckingConditional,
    CheckingCriteriaRules,
    Done,
}

/// Accumulator shared by every stage of one validation call.
pub(crate) struct Run<'s> {
    pub(crate) store: &'s FlatStore,
    pub(crate) resolver: KeyResolver,
    pub(crate) keys: Vec<String>,
    pub(crate) stage: Stage,
    pub(crate) reported: BTreeSet<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl<'s> Run<'s> {
    fn new(store: &'s FlatStore, resolver: KeyResolver) -> Self {
        Self {
            store,
            resolver,
            keys: Vec::new(),
            stage: Stage::Idle,
            reported: BTreeSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::trace!(from = ?self.stage, to = ?stage, "validation stage");
        self.stage = stage;
    }

    pub(crate) fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub(crate) fn warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn finish(mut self) -> ValidationResult {
        self.enter(Stage::Done);
        ValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Outcome of validating a step for every lot of a multi-lot procurement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LotValidation {
    pub mode: LotMode,
    pub lots: Vec<(usize, ValidationResult)>,
    pub combined: ValidationResult,
}

///
/// ValidationEngine
///
/// Decides whether a step (a list of schema sections, optionally with a
/// `lot_context_<i>` marker) satisfies the structural and business rules.
///

pub struct ValidationEngine<'a> {
    schema: &'a Schema,
    rules: &'a RulesConfig,
    cpv: &'a dyn CpvLookup,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(schema: &'a Schema, rules: &'a RulesConfig, cpv: &'a dyn CpvLookup) -> Self {
        Self { schema, rules, cpv }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn rules(&self) -> &RulesConfig {
        self.rules
    }

    pub fn validate<S: AsRef<str>>(
        &self,
        store: &FlatStore,
        step_sections: &[S],
    ) -> Result<ValidationResult, ValidationError> {
        let steps: Vec<&str> = step_sections.iter().map(|step| step.as_ref()).collect();
        let lot = lot_context(&steps)?;
        for section in steps.iter().copied() {
            if !section.starts_with(LOT_CONTEXT_PREFIX) {
                KeyPath::parse(section)?;
            }
        }
        let resolver = match lot {
            Some(index) => KeyResolver::for_lot(index),
            None => KeyResolver::general(),
        };

        let mut run = Run::new(store, resolver);

        run.enter(Stage::ExpandingKeys);
        run.keys = self.expand_section_keys(&steps);

        run.enter(Stage::CheckingRequired);
        required::check(self.schema, self.rules, &mut run);

        run.enter(Stage::CheckingDropdowns);
        dropdowns::check(self.rules, &mut run);

        run.enter(Stage::CheckingMultiEntry);
        multi_entry::check(self.rules, &mut run);

        run.enter(Stage::CheckingConditional);
        conditional::check(self.rules, &mut run);

        let criteria_section = self.rules.criteria.section.as_str();
        if steps.iter().any(|section| *section == criteria_section) {
            run.enter(Stage::CheckingCriteriaRules);
            criteria::check(self.rules, self.cpv, &mut run);
        }

        let result = run.finish();
        tracing::debug!(
            sections = steps.len(),
            lot = ?lot,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated step"
        );
        Ok(result)
    }

    /// Runs only the selection-criteria rule group for `step_key`, with the
    /// general key conventions.
    pub fn validate_criteria(&self, store: &FlatStore, step_key: &str) -> ValidationResult {
        let mut run = Run::new(store, KeyResolver::general());
        if step_key == self.rules.criteria.section {
            run.enter(Stage::CheckingCriteriaRules);
            criteria::check(self.rules, self.cpv, &mut run);
        }
        run.finish()
    }

    /// Criteria selection as the criteria rules see it.
    pub fn extract_criteria(&self, store: &FlatStore, resolver: &KeyResolver) -> CriteriaSelection {
        extract_criteria(store, resolver, &self.rules.criteria)
    }

    /// Leaf field paths for each section of a step. Unknown names pass through,
    /// `lot_context_` markers are dropped, duplicates keep their first position.
    pub fn expand_section_keys<S: AsRef<str>>(&self, step_sections: &[S]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let steps: Vec<&str> = step_sections.iter().map(|step| step.as_ref()).collect();
        for section in steps {
            if section.starts_with(LOT_CONTEXT_PREFIX) {
                continue;
            }
            let keys = match self.schema.leaf_fields(section) {
                Some(leaves) if !leaves.is_empty() => {
                    leaves.into_iter().map(|leaf| leaf.path).collect()
                }
                _ => vec![section.to_string()],
            };
            for key in keys {
                if seen.insert(key.clone()) {
                    out.push(key);
                }
            }
        }
        out
    }

    /// Validates a step once per lot when the procurement has several lots, and
    /// once against the general keys otherwise. A `multiple` mode with no lot
    /// keys yet falls back to the general keys.
    pub fn validate_lots<S: AsRef<str>>(
        &self,
        store: &FlatStore,
        step_sections: &[S],
    ) -> Result<LotValidation, ValidationError> {
        let mode = LotMode::detect(store);
        let sections = step_sections
            .iter()
            .map(|section| section.as_ref().to_string())
            .filter(|section| !section.starts_with(LOT_CONTEXT_PREFIX))
            .collect::<Vec<_>>();

        let indices = lot_indices(store);
        if mode.validates_as_general() || indices.is_empty() {
            if !mode.validates_as_general() {
                tracing::debug!("multiple lot mode without lot keys, validating general keys");
            }
            let combined = self.validate(store, &sections)?;
            return Ok(LotValidation {
                mode,
                lots: Vec::new(),
                combined,
            });
        }

        let mut lots = Vec::new();
        let mut combined = ValidationResult::default();
        for index in indices {
            let mut step = sections.clone();
            step.push(format!("{LOT_CONTEXT_PREFIX}{index}"));
            let result = self.validate(store, &step)?;

            let label = LotGroup::new(store, index).label();
            let prefix = render(&self.rules.messages.lot_prefix, &[("label", label.as_str())]);
            combined
                .errors
                .extend(result.errors.iter().map(|message| format!("{prefix}{message}")));
            combined
                .warnings
                .extend(result.warnings.iter().map(|message| format!("{prefix}{message}")));
            lots.push((index, result));
        }
        combined.is_valid = combined.errors.is_empty();
        Ok(LotValidation {
            mode,
            lots,
            combined,
        })
    }
}

fn lot_context(steps: &[&str]) -> Result<Option<usize>, ValidationError> {
    let mut lot = None;
    for marker in steps.iter().copied() {
        let Some(raw) = marker.strip_prefix(LOT_CONTEXT_PREFIX) else {
            continue;
        };
        let index = raw
            .parse::<usize>()
            .map_err(|_| ValidationError::InvalidLotMarker {
                marker: marker.to_string(),
            })?;
        lot = Some(index);
    }
    Ok(lot)
}

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("lot marker `{marker}` does not end in a lot index")]
    InvalidLotMarker { marker: String },
}
