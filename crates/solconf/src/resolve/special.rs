//! deferred values
//!
//! Values that can only be computed once the declarations they depend on are resolved. Each kind
//! is matched by its own resolver through [Value::special].
use super::class::callable;
use super::{Memo, Resolution, Resolver};
use crate::error::{EvalError, ResolutionError, Result};
use crate::functions::Kwargs;
use crate::module::{Block, Module};
use crate::overrides::{Override, Required};
use crate::util::as_valid_filename;
use crate::value::{Special, Value};
use crate::var_path::{get_step, Step};
use std::any::Any;
use std::rc::{Rc, Weak};

/// `call(f, args...)`, operators and native calls on unresolved operands
#[derive(Debug)]
pub struct DeferredCall {
    callee: Value,
    args: Vec<Value>,
    kwargs: Kwargs,
    memo: Memo,
}

impl DeferredCall {
    pub fn new(callee: Value, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            callee,
            args,
            kwargs,
            memo: Memo::default(),
        }
    }
}

impl Special for DeferredCall {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        let callee = match &self.callee {
            Value::Function(function) => function.name().to_string(),
            other => other.describe(),
        };
        format!("call({callee})")
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }
}

pub struct DeferredCallResolver;

impl Resolver for DeferredCallResolver {
    fn name(&self) -> &'static str {
        "deferred call"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<DeferredCall>().is_some()
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Some(call) = value.special::<DeferredCall>() else {
            unreachable!("checked by can_handle")
        };

        let callee = resolution.resolve(&call.callee)?;
        let function = callable(&callee, resolution.functions())?;
        let args = call
            .args
            .iter()
            .map(|arg| resolution.resolve(arg))
            .collect::<Result<Vec<_>>>()?;
        let kwargs = call
            .kwargs
            .iter()
            .map(|(key, value)| Ok((key.clone(), resolution.resolve(value)?)))
            .collect::<Result<Kwargs>>()?;

        function.call(&args, &kwargs).map_err(|message| {
            ResolutionError::CallFailed {
                function: function.name().to_string(),
                message,
            }
            .into()
        })
    }
}

/// A string template with unresolved interpolations
#[derive(Debug)]
pub struct DeferredString {
    parts: Vec<Value>,
    memo: Memo,
}

impl DeferredString {
    pub fn new(parts: Vec<Value>) -> Self {
        Self {
            parts,
            memo: Memo::default(),
        }
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// A new deferred string with `value` appended
    pub fn append(&self, separator: Option<&str>, value: Value) -> Value {
        let mut parts = self.parts.clone();
        parts.extend(separator.map(Value::from));
        parts.push(value);
        Value::Special(Rc::new(Self::new(parts)))
    }

    /// A new deferred string with `value` prepended
    pub fn prepend(&self, value: Value, separator: Option<&str>) -> Value {
        let mut parts = vec![value];
        parts.extend(separator.map(Value::from));
        parts.extend(self.parts.iter().cloned());
        Value::Special(Rc::new(Self::new(parts)))
    }
}

impl Special for DeferredString {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        let parts = self
            .parts
            .iter()
            .map(|part| match part {
                Value::String(text) => text.clone(),
                other => format!("${{{}}}", other.describe()),
            })
            .collect::<String>();
        format!("deferred string {parts:?}")
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }
}

pub struct DeferredStringResolver;

impl Resolver for DeferredStringResolver {
    fn name(&self) -> &'static str {
        "deferred string"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<DeferredString>().is_some()
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Some(string) = value.special::<DeferredString>() else {
            unreachable!("checked by can_handle")
        };

        let mut out = String::new();
        for part in &string.parts {
            out.push_str(&resolution.resolve(part)?.to_text());
        }
        Ok(Value::String(out))
    }
}

/// `ref("name")`: the value a member holds when it is resolved
#[derive(Debug)]
pub struct Reference {
    module: Weak<Module>,
    /// set when the member belongs to the innermost block instead of the module
    block: Option<Weak<Block>>,
    name: String,
    memo: Memo,
}

impl Reference {
    pub fn new(module: Weak<Module>, block: Option<Weak<Block>>, name: &str) -> Self {
        Self {
            module,
            block,
            name: name.to_string(),
            memo: Memo::default(),
        }
    }

    /// The current value of the referenced member
    pub fn target(&self) -> Result<Value> {
        let value = match &self.block {
            Some(block) => block.upgrade().and_then(|block| block.get(&self.name)),
            None => self
                .module
                .upgrade()
                .and_then(|module| module.block().get(&self.name)),
        };
        value.ok_or_else(|| EvalError::UndefinedName(self.name.clone()).into())
    }
}

impl Special for Reference {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("ref({})", self.name)
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }
}

pub struct ReferenceResolver;

impl Resolver for ReferenceResolver {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<Reference>().is_some()
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Some(reference) = value.special::<Reference>() else {
            unreachable!("checked by can_handle")
        };
        let target = reference.target()?;
        resolution.resolve(&target)
    }
}

pub struct RequiredResolver;

impl Resolver for RequiredResolver {
    fn name(&self) -> &'static str {
        "required"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<Required>().is_some()
    }

    fn compute_resolved(&self, value: &Value, _: &mut Resolution) -> Result<Value> {
        let Some(required) = value.special::<Required>() else {
            unreachable!("checked by can_handle")
        };
        Err(ResolutionError::MissingRequired {
            resolvable: "a required value".to_string(),
            names: vec![required.var_path().unwrap_or("<unnamed>").to_string()],
        }
        .into())
    }
}

/// Attribute and index access applied to the resolution of `target`
#[derive(Debug)]
pub struct ResolvedAccess {
    target: Value,
    steps: Vec<Step>,
    memo: Memo,
}

impl ResolvedAccess {
    pub fn new(target: Value, steps: Vec<Step>) -> Self {
        Self {
            target,
            steps,
            memo: Memo::default(),
        }
    }

    /// A new access with one more step
    pub fn then(&self, step: Step) -> Value {
        let mut steps = self.steps.clone();
        steps.push(step);
        Value::Special(Rc::new(Self::new(self.target.clone(), steps)))
    }
}

impl Special for ResolvedAccess {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        let steps = self
            .steps
            .iter()
            .map(|step| match step {
                Step::Attribute(name) => format!(".{name}"),
                subscript => subscript.to_string(),
            })
            .collect::<String>();
        format!("resolved({}){steps}", self.target.describe())
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }
}

pub struct ResolvedAccessResolver;

impl Resolver for ResolvedAccessResolver {
    fn name(&self) -> &'static str {
        "resolved access"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<ResolvedAccess>().is_some()
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Some(access) = value.special::<ResolvedAccess>() else {
            unreachable!("checked by can_handle")
        };

        let mut current = resolution.resolve(&access.target)?;
        for step in &access.steps {
            current = get_step(&current, step).ok_or_else(|| ResolutionError::InvalidAccess {
                step: step.to_string(),
                value: current.describe(),
            })?;
        }
        Ok(current)
    }
}

/// `id_str(glue, full)`: identifies a configuration by the overrides applied to it
#[derive(Debug)]
pub struct IdString {
    overrides: Vec<Rc<Override>>,
    glue: String,
    full: bool,
    memo: Memo,
}

impl IdString {
    pub fn new(overrides: Vec<Rc<Override>>, glue: &str, full: bool) -> Self {
        Self {
            overrides,
            glue: glue.to_string(),
            full,
            memo: Memo::default(),
        }
    }

    /// Sorted `member=value` pairs (or the full override sources) of all overrides that count
    /// towards the identifier
    pub fn compute(&self) -> String {
        let mut parts = self
            .overrides
            .iter()
            .filter(|record| record.as_id())
            .map(|record| match (self.full, record.target.last()) {
                (false, Some(last)) => format!("{last}={}", record.value_source),
                _ => record.source_text(),
            })
            .collect::<Vec<_>>();
        parts.sort();
        as_valid_filename(&parts.join(&self.glue))
    }
}

impl Special for IdString {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        "id_str()".to_string()
    }

    fn memo(&self) -> Option<&Memo> {
        Some(&self.memo)
    }
}

pub struct IdStringResolver;

impl Resolver for IdStringResolver {
    fn name(&self) -> &'static str {
        "id string"
    }

    fn can_handle(&self, value: &Value) -> bool {
        value.special::<IdString>().is_some()
    }

    fn compute_resolved(&self, value: &Value, _: &mut Resolution) -> Result<Value> {
        let Some(id) = value.special::<IdString>() else {
            unreachable!("checked by can_handle")
        };
        Ok(Value::String(id.compute()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::functions::Functions;
    use crate::overrides::eval_overrides;
    use crate::resolve::Registry;
    use crate::var_path::Key;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn special(value: impl Special + 'static) -> Value {
        Value::Special(Rc::new(value))
    }

    #[test]
    fn deferred_call_resolves_arguments() {
        let registry = Registry::default();
        let inner = special(DeferredString::new(vec![Value::from("ab")]));
        let call = special(DeferredCall::new(
            Value::from("len"),
            vec![inner],
            Kwargs::new(),
        ));
        assert_eq!(registry.resolve(&call).unwrap(), Value::Integer(2));
    }

    #[test]
    fn failing_calls_name_the_function() {
        let mut functions = Functions::empty();
        functions.register("fail", |_, _| Err("nope".to_string()));
        let registry = Registry::new(functions);

        let call = special(DeferredCall::new(Value::from("fail"), vec![], Kwargs::new()));
        let err = registry.resolve(&call).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            crate::error::Error::Resolution(ResolutionError::CallFailed { function, message })
                if function == "fail" && message == "nope"
        ));
    }

    #[test]
    fn resolved_access_walks_result() {
        let registry = Registry::default();
        let data: Value = IndexMap::from([("items", Value::from(vec![1_i64, 2, 3]))]).into();
        let target = special(DeferredCall::new(
            Value::from("dict"),
            vec![data],
            Kwargs::new(),
        ));

        let access = ResolvedAccess::new(target, vec![Step::Attribute("items".into())])
            .then(Step::Subscript(Key::Int(-1)));
        assert_eq!(registry.resolve(&access).unwrap(), Value::Integer(3));

        let bad = access
            .special::<ResolvedAccess>()
            .unwrap()
            .then(Step::Attribute("x".into()));
        assert!(registry.resolve(&bad).is_err());
    }

    #[test]
    fn memoized_once() {
        let calls = Rc::new(std::cell::Cell::new(0));
        let counter = calls.clone();
        let mut functions = Functions::empty();
        functions.register("count", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::Integer(counter.get()))
        });
        let registry = Registry::new(functions);

        let call = special(DeferredCall::new(Value::from("count"), vec![], Kwargs::new()));
        assert_eq!(registry.resolve(&call).unwrap(), Value::Integer(1));
        assert_eq!(registry.resolve(&call).unwrap(), Value::Integer(1));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn id_string() {
        let overrides = eval_overrides(["model.size = 3; lr = 0.1; run.tag = \"a/b\"".into()])
            .unwrap()
            .into_iter()
            .map(Rc::new)
            .collect::<Vec<_>>();
        overrides[2].exclude_from_id();

        let short = IdString::new(overrides.clone(), ",", false);
        assert_eq!(short.compute(), "lr=0.1,size=3");

        let full = IdString::new(overrides, "_", true);
        assert_eq!(full.compute(), "lr = 0.1_model.size = 3");
    }

    #[test]
    fn required_fails_with_path() {
        let registry = Registry::default();
        let err = registry.resolve(&special(Required::new())).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            crate::error::Error::Resolution(ResolutionError::MissingRequired { .. })
        ));
    }
}
