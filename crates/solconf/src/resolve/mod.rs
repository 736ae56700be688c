//! resolution
//!
//! Resolution turns a graph of declarations into plain data (or live objects built by native
//! constructors). A [Registry] holds an ordered list of [Resolver]s, the first one whose
//! [Resolver::can_handle] accepts a value computes its resolution. Values no resolver accepts are
//! already final and returned unchanged.
//!
//! Blocks, modules and deferred values carry a [Memo]: they are resolved at most once and every
//! later resolution returns the stored result. Re-entering the resolution of a value that is
//! still in progress is a dependency cycle.
//!
//! The first failure that is not itself a nested resolution failure gets wrapped in
//! [ResolutionError::Nested] with the chain of in-progress resolutions, outer levels pass it on.
pub mod class;
pub mod module;
pub mod special;

use crate::error::{Error, ResolutionError, Result};
use crate::functions::Functions;
use crate::value::Value;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Memo(RefCell<MemoState>);

#[derive(Debug, Default, Clone)]
enum MemoState {
    #[default]
    Unresolved,
    InProgress,
    Resolved(Value),
}

impl Memo {
    /// The stored resolution, if any
    pub fn get(&self) -> Option<Value> {
        match &*self.0.borrow() {
            MemoState::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.0.borrow(), MemoState::Resolved(_))
    }

    fn state(&self) -> MemoState {
        self.0.borrow().clone()
    }

    fn set(&self, state: MemoState) {
        *self.0.borrow_mut() = state;
    }
}

/// A resolution strategy
pub trait Resolver {
    /// Identifies the resolver in trace logs
    fn name(&self) -> &'static str;

    fn can_handle(&self, value: &Value) -> bool;

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value>;
}

/// Numbers, strings, booleans, null and modifiers resolve to themselves
pub struct ScalarResolver;

impl Resolver for ScalarResolver {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(
            value,
            Value::Null
                | Value::Boolean(_)
                | Value::Integer(_)
                | Value::Decimal(_)
                | Value::String(_)
                | Value::Modifiers(_)
        )
    }

    fn compute_resolved(&self, value: &Value, _: &mut Resolution) -> Result<Value> {
        Ok(value.clone())
    }
}

pub struct MappingResolver;

impl Resolver for MappingResolver {
    fn name(&self) -> &'static str {
        "mapping"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Object(_))
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Value::Object(object) = value else {
            unreachable!("checked by can_handle")
        };

        object
            .iter()
            .map(|(key, value)| Ok((key.clone(), resolution.resolve(value)?)))
            .collect::<Result<_>>()
            .map(Value::Object)
    }
}

pub struct SequenceResolver;

impl Resolver for SequenceResolver {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Array(_))
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Value::Array(items) = value else {
            unreachable!("checked by can_handle")
        };

        items
            .iter()
            .map(|item| resolution.resolve(item))
            .collect::<Result<_>>()
            .map(Value::Array)
    }
}

/// Ordered resolver table plus the native functions available to resolvers
pub struct Registry {
    resolvers: Vec<Rc<dyn Resolver>>,
    functions: Functions,
}

impl Registry {
    pub fn new(functions: Functions) -> Self {
        Self {
            resolvers: vec![
                Rc::new(ScalarResolver),
                Rc::new(MappingResolver),
                Rc::new(SequenceResolver),
                Rc::new(module::ModuleResolver),
                Rc::new(class::ClassResolver),
                Rc::new(special::DeferredCallResolver),
                Rc::new(special::DeferredStringResolver),
                Rc::new(special::ReferenceResolver),
                Rc::new(special::RequiredResolver),
                Rc::new(special::ResolvedAccessResolver),
                Rc::new(special::IdStringResolver),
            ],
            functions,
        }
    }

    /// Append a resolver, it is consulted after all built-in ones
    pub fn register(&mut self, resolver: impl Resolver + 'static) -> &mut Self {
        self.resolvers.push(Rc::new(resolver));
        self
    }

    pub fn functions(&self) -> &Functions {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut Functions {
        &mut self.functions
    }

    pub fn get_resolver(&self, value: &Value) -> Option<Rc<dyn Resolver>> {
        self.resolvers
            .iter()
            .find(|resolver| resolver.can_handle(value))
            .cloned()
    }

    /// Resolve a value with a fresh resolution chain
    pub fn resolve(&self, value: &Value) -> Result<Value> {
        Resolution::new(self).resolve(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Functions::default())
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("functions", &self.functions.names().collect::<Vec<_>>())
            .finish()
    }
}

/// One resolution call tree, tracks the chain of in-progress resolutions
pub struct Resolution<'r> {
    registry: &'r Registry,
    chain: Vec<String>,
}

impl<'r> Resolution<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            chain: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn functions(&self) -> &'r Functions {
        &self.registry.functions
    }

    /// Descriptions of the resolutions currently in progress, outermost first
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn resolve(&mut self, value: &Value) -> Result<Value> {
        let Some(resolver) = self.registry.get_resolver(value) else {
            return Ok(value.clone());
        };

        let memo = value.memo();
        if let Some(memo) = memo {
            match memo.state() {
                MemoState::Resolved(resolved) => return Ok(resolved),
                MemoState::InProgress => {
                    let mut chain = self.chain.clone();
                    chain.push(value.describe());
                    return Err(ResolutionError::Cycle(chain).into());
                }
                MemoState::Unresolved => memo.set(MemoState::InProgress),
            }
        }

        let description = value.describe();
        tracing::trace!(resolver = resolver.name(), value = %description, "resolving");

        self.chain.push(description);
        let result = resolver
            .compute_resolved(value, self)
            .map_err(|err| self.nest(err));
        self.chain.pop();

        if let Some(memo) = memo {
            memo.set(match &result {
                Ok(resolved) => MemoState::Resolved(resolved.clone()),
                Err(_) => MemoState::Unresolved,
            });
        }

        result
    }

    fn nest(&self, err: Error) -> Error {
        match err {
            err @ Error::Resolution(ResolutionError::Nested { .. }) => err,
            other => ResolutionError::Nested {
                chain: self.chain.clone(),
                source: Box::new(other),
            }
            .into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::value::Opaque;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_data_is_unchanged() {
        let registry = Registry::default();
        let value: Value = IndexMap::from([
            ("a", Value::from(vec![1_i64, 2])),
            ("b", Value::from("x")),
            ("c", Value::Null),
        ])
        .into();
        assert_eq!(registry.resolve(&value).unwrap(), value);
    }

    #[test]
    fn opaque_values_pass_through() {
        let registry = Registry::default();
        let opaque = Value::from(Opaque::new("handle", 7_u32));
        assert!(registry.get_resolver(&opaque).is_none());
        assert_eq!(registry.resolve(&opaque).unwrap(), opaque);
    }

    #[test]
    fn memo_states() {
        let memo = Memo::default();
        assert!(memo.get().is_none());
        memo.set(MemoState::Resolved(Value::Integer(1)));
        assert!(memo.is_resolved());
        assert_eq!(memo.get(), Some(Value::Integer(1)));
    }
}
