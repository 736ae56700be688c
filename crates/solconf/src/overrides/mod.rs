//! override records
//!
//! An override replaces the value of a declared member, addressed by its [VarPath] relative to the
//! root configuration. Overrides are specified as text (`"a.b[0] = c + 1; x = 2"`), as a mapping
//! from path to a pre-computed value, or as ready-made [Override] records.
//!
//! Text values are kept as expressions and evaluated when the targeted declaration executes, in
//! the scope of that declaration. Every override of a package must be used by the time the root
//! configuration is loaded.
pub mod engine;
pub mod overridable;
pub mod parser;

pub use engine::deduce_var_path;
pub use overridable::{Choices, Overridable, Required, Submodule};
pub use parser::parse_overrides;

use crate::error::{AddressingError, Result};
use crate::value::Value;
use crate::var_path::VarPath;
use indexmap::IndexMap;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// Replace the value of an existing member
    Existing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    /// Evaluated lazily where the target is declared
    Expr(hcl::Expression),
    Precomputed(Value),
}

#[derive(Debug, Clone)]
pub struct Override {
    /// the clause this override was parsed from
    pub source: Option<String>,
    pub target: VarPath,
    pub kind: OverrideKind,
    pub value: OverrideValue,
    /// text of the value, used by `id_str`
    pub value_source: String,
    used: Cell<usize>,
    as_id: Cell<bool>,
}

impl Override {
    pub fn new(
        source: Option<String>,
        target: VarPath,
        value: OverrideValue,
        value_source: String,
    ) -> Self {
        Self {
            source,
            target,
            kind: OverrideKind::Existing,
            value,
            value_source,
            used: Cell::new(0),
            as_id: Cell::new(true),
        }
    }

    pub fn precomputed(target: VarPath, value: Value) -> Self {
        let value_source = value.describe();
        Self::new(None, target, OverrideValue::Precomputed(value), value_source)
    }

    /// Number of declarations this override was applied to
    pub fn used(&self) -> usize {
        self.used.get()
    }

    pub(crate) fn mark_used(&self) {
        self.used.set(self.used.get() + 1)
    }

    /// Whether this override contributes to `id_str`
    pub fn as_id(&self) -> bool {
        self.as_id.get()
    }

    pub(crate) fn exclude_from_id(&self) {
        self.as_id.set(false)
    }

    /// The override as written, or `target = value` for pre-computed records
    pub fn source_text(&self) -> String {
        self.source
            .clone()
            .unwrap_or_else(|| format!("{} = {}", self.target, self.value_source))
    }
}

/// The accepted override specifications
#[derive(Debug, Clone)]
pub enum OverrideSpec {
    /// one or more `path = expression` clauses separated by `;` or newlines
    Text(String),
    /// paths mapped to pre-computed values
    Values(IndexMap<String, Value>),
    Record(Override),
}

impl From<&str> for OverrideSpec {
    fn from(value: &str) -> Self {
        OverrideSpec::Text(value.to_string())
    }
}

impl From<String> for OverrideSpec {
    fn from(value: String) -> Self {
        OverrideSpec::Text(value)
    }
}

impl From<IndexMap<String, Value>> for OverrideSpec {
    fn from(value: IndexMap<String, Value>) -> Self {
        OverrideSpec::Values(value)
    }
}

impl From<Override> for OverrideSpec {
    fn from(value: Override) -> Self {
        OverrideSpec::Record(value)
    }
}

/// Turn specifications into records, one specification may produce multiple records
pub fn cast_overrides(specs: impl IntoIterator<Item = OverrideSpec>) -> Result<Vec<Override>> {
    let mut out = vec![];
    for spec in specs {
        match spec {
            OverrideSpec::Text(text) => out.extend(parse_overrides(&text)?),
            OverrideSpec::Values(values) => {
                for (path, value) in values {
                    out.push(Override::precomputed(VarPath::parse(&path)?, value));
                }
            }
            OverrideSpec::Record(record) => out.push(record),
        }
    }
    Ok(out)
}

/// [cast_overrides] and reject duplicate targets
pub fn eval_overrides(specs: impl IntoIterator<Item = OverrideSpec>) -> Result<Vec<Override>> {
    let overrides = cast_overrides(specs)?;

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in &overrides {
        *counts.entry(record.target.as_str()).or_default() += 1;
    }
    let duplicates = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(target, _)| target)
        .collect::<Vec<_>>();

    if !duplicates.is_empty() {
        return Err(AddressingError::DuplicateTargets(duplicates).into());
    }

    Ok(overrides)
}

/// Update `base` with `new`, records of `new` replace `base` records with the same target
pub fn merge_overrides(
    base: impl IntoIterator<Item = OverrideSpec>,
    new: impl IntoIterator<Item = OverrideSpec>,
) -> Result<Vec<Override>> {
    let base = eval_overrides(base)?;
    let mut new = eval_overrides(new)?
        .into_iter()
        .map(|record| (record.target.clone(), record))
        .collect::<IndexMap<_, _>>();

    let mut out = base
        .into_iter()
        .map(|record| new.shift_remove(&record.target).unwrap_or(record))
        .collect::<Vec<_>>();
    out.extend(new.into_values());

    tracing::debug!(count = out.len(), "merged overrides");
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn targets(overrides: &[Override]) -> Vec<String> {
        overrides.iter().map(|o| o.target.as_str()).collect()
    }

    #[test]
    fn cast_mixed_specs() {
        let overrides = eval_overrides([
            OverrideSpec::from("a = 1; b.c = 2"),
            IndexMap::from([("d[0]".to_string(), Value::Integer(3))]).into(),
        ])
        .unwrap();

        assert_eq!(targets(&overrides), vec!["a", "b.c", "d[0]"]);
        assert_eq!(
            overrides[2].value,
            OverrideValue::Precomputed(Value::Integer(3))
        );
        assert_eq!(overrides[2].source_text(), "d[0] = 3");
        assert!(overrides.iter().all(|o| o.used() == 0 && o.as_id()));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = eval_overrides([OverrideSpec::from("a = 1\nb = 1\na = 2"), "b = 3".into()])
            .unwrap_err();
        let Error::Addressing(AddressingError::DuplicateTargets(duplicates)) = err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(duplicates, vec!["a", "b"]);
    }

    #[test]
    fn merge_replaces_by_target() {
        let merged = merge_overrides(
            [OverrideSpec::from("a = 1; b = 2")],
            [OverrideSpec::from("b = 3; c = 4")],
        )
        .unwrap();

        assert_eq!(targets(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged[1].source.as_deref(), Some("b = 3"));
    }
}
