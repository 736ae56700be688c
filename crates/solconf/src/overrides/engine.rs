//! override application
//!
//! Every module-scope or block-scope declaration passes its value through [apply_override]. The
//! declaration's absolute [VarPath] is deduced from the module's own path and the nesting of the
//! declaring block, then matched against the overrides of the module's package.
use crate::error::{Error, OverrideUsageError, Result};
use crate::eval::{Interpreter, Scope};
use crate::modifiers::NOID;
use crate::value::Value;
use crate::var_path::{Step, VarPath};
use std::rc::Rc;

use super::Override;

/// The absolute path of `target` declared in the block at `class_path` of a module
///
/// A module with a promoted member is addressed through that member: only declarations within it
/// have a path, and the promoted member's own name is skipped. `None` when the declaration can't
/// be addressed.
pub fn deduce_var_path(
    module_var_path: Option<&VarPath>,
    promoted: Option<&str>,
    class_path: &VarPath,
    target: &str,
) -> Option<VarPath> {
    let module_var_path = module_var_path?;

    match promoted {
        Some(promoted) => match class_path.first() {
            Some(Step::Attribute(first)) if first == promoted => {
                Some(module_var_path.join(&class_path.steps()[1..]).attr(target))
            }
            _ => None,
        },
        None => Some(module_var_path.join(class_path.steps()).attr(target)),
    }
}

/// Apply the matching override (if any) to a declared value and return the value to store
///
/// Overridable placeholders receive the override through [super::Overridable::set] and produce
/// the stored value with [super::Overridable::get], other values are replaced.
pub(crate) fn apply_override(
    interpreter: &Interpreter,
    scope: &Scope,
    target: &str,
    declared: Value,
) -> Result<Value> {
    let module = interpreter.module();
    let matched = match deduce_var_path(
        module.var_path(),
        module.promoted(),
        &scope.class_path(),
        target,
    ) {
        Some(var_path) => find_override(interpreter, &var_path)?,
        None => None,
    };

    let Some(record) = matched else {
        return match overridable_of(&declared) {
            Some(_) => declared_get(interpreter, scope, target, &declared),
            None => Ok(declared),
        };
    };

    tracing::debug!(path = %record.target, source = %record.source_text(), "applying override");
    record.mark_used();
    if scope
        .current_block(module)
        .annotation(target)
        .map_or(false, |modifiers| modifiers.flag(NOID))
    {
        record.exclude_from_id();
    }

    let wrap = |source: Error| Error::Override {
        target: record.target.as_str(),
        source_text: record.source_text(),
        source: Box::new(source),
    };

    let value = interpreter
        .eval_override(&record, scope, target)
        .map_err(wrap)?;

    match overridable_of(&declared) {
        Some(overridable) => {
            overridable.set(value).map_err(wrap)?;
            declared_get(interpreter, scope, target, &declared).map_err(wrap)
        }
        None => Ok(value),
    }
}

fn overridable_of(value: &Value) -> Option<&dyn super::Overridable> {
    match value {
        Value::Special(special) => special.as_overridable(),
        _ => None,
    }
}

fn declared_get(interpreter: &Interpreter, scope: &Scope, target: &str, declared: &Value) -> Result<Value> {
    match overridable_of(declared) {
        Some(overridable) => overridable.get(interpreter, scope, target),
        None => Ok(declared.clone()),
    }
}

fn find_override(interpreter: &Interpreter, var_path: &VarPath) -> Result<Option<Rc<Override>>> {
    let overrides = interpreter
        .loader()
        .package_overrides(interpreter.module().package())?;

    let mut matches = overrides.into_iter().filter(|record| &record.target == var_path);
    let first = matches.next();
    if matches.next().is_some() {
        return Err(OverrideUsageError::Ambiguous(var_path.as_str()).into());
    }
    Ok(first)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(text: &str) -> VarPath {
        VarPath::parse(text).unwrap()
    }

    #[test]
    fn plain_modules() {
        let root = VarPath::new();
        assert_eq!(
            deduce_var_path(Some(&root), None, &VarPath::new(), "a"),
            Some(path("a"))
        );
        assert_eq!(
            deduce_var_path(Some(&path("sub")), None, &path("A.B"), "c"),
            Some(path("sub.A.B.c"))
        );
        assert_eq!(deduce_var_path(None, None, &path("A"), "c"), None);
    }

    #[test]
    fn promoted_modules() {
        let module = path("model");
        assert_eq!(
            deduce_var_path(Some(&module), Some("Model"), &path("Model"), "size"),
            Some(path("model.size"))
        );
        assert_eq!(
            deduce_var_path(Some(&module), Some("Model"), &path("Model.Inner"), "size"),
            Some(path("model.Inner.size"))
        );
        assert_eq!(
            deduce_var_path(Some(&module), Some("Model"), &VarPath::new(), "helper"),
            None
        );
        assert_eq!(
            deduce_var_path(Some(&module), Some("Model"), &path("Other"), "x"),
            None
        );
    }
}
