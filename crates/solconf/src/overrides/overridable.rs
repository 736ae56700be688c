//! overridable placeholders
//!
//! Some declarations don't hold their final value but a placeholder that receives the matching
//! override (if any) and then computes the value that is actually stored:
//!
//! - `req()`: a value that must be provided by an override or by the `reqs` of the `load` call
//! - `submodule([package,] name, {reqs})`: loads a module, the override replaces the module name
//! - `choices({..}, default)`: selects one of several values, the override selects the key
use super::{deduce_var_path, Override};
use crate::error::{EvalError, PromotionError, Result};
use crate::eval::{Interpreter, LoadRequest, Scope};
use crate::value::{Special, Value};
use crate::var_path::VarPath;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

pub trait Overridable {
    /// Receive the value of the matching override
    fn set(&self, value: Value) -> Result<()>;

    /// The value to store for the declaration `target` in `scope`
    fn get(&self, interpreter: &Interpreter, scope: &Scope, target: &str) -> Result<Value>;
}

/// A value that has to be provided
///
/// Stays in place when nothing provides it, resolving it fails naming the member.
#[derive(Debug, Default)]
pub struct Required {
    value: RefCell<Option<Value>>,
    var_path: Option<String>,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    /// The member this placeholder was declared as, once known
    pub fn var_path(&self) -> Option<&str> {
        self.var_path.as_deref()
    }
}

impl Special for Required {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        match &self.var_path {
            Some(var_path) => format!("req({var_path})"),
            None => "req()".to_string(),
        }
    }

    fn as_overridable(&self) -> Option<&dyn Overridable> {
        Some(self)
    }
}

impl Overridable for Required {
    fn set(&self, value: Value) -> Result<()> {
        *self.value.borrow_mut() = Some(value);
        Ok(())
    }

    fn get(&self, interpreter: &Interpreter, scope: &Scope, target: &str) -> Result<Value> {
        let module = interpreter.module();
        let class_path = scope.class_path();

        // an override replaces the required value but still consumes it
        let req = deduce_var_path(Some(&VarPath::new()), module.promoted(), &class_path, target)
            .and_then(|relative| module.reqs().iter().find(|record| record.target == relative));
        if let Some(record) = req {
            record.mark_used();
        }

        if let Some(value) = self.value.borrow().clone() {
            return Ok(value);
        }

        if let Some(record) = req {
            tracing::debug!(module = module.name(), path = %record.target, "required value from reqs");
            return interpreter.eval_override(record, scope, target);
        }

        let var_path = deduce_var_path(module.var_path(), module.promoted(), &class_path, target)
            .map(|var_path| var_path.as_str())
            .unwrap_or_else(|| {
                let mut qualified = scope.qualname();
                if !qualified.is_empty() {
                    qualified.push('.');
                }
                format!("{}:{qualified}{target}", module.name())
            });

        Ok(Value::Special(Rc::new(Required {
            value: RefCell::new(None),
            var_path: Some(var_path),
        })))
    }
}

/// A module loaded by name, overriding the member replaces the module name
#[derive(Debug)]
pub struct Submodule {
    package: Option<String>,
    name: RefCell<String>,
    reqs: Vec<Override>,
}

impl Submodule {
    /// `package` defaults to the sub-package named after the declared member
    pub fn new(package: Option<String>, name: String, reqs: Vec<Override>) -> Self {
        Self {
            package,
            name: RefCell::new(name),
            reqs,
        }
    }
}

impl Special for Submodule {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("submodule({})", self.name.borrow())
    }

    fn as_overridable(&self) -> Option<&dyn Overridable> {
        Some(self)
    }
}

impl Overridable for Submodule {
    fn set(&self, value: Value) -> Result<()> {
        let Value::String(name) = value else {
            return Err(EvalError::TypeMismatch {
                expected: "a module name",
                got: value.describe(),
            }
            .into());
        };
        *self.name.borrow_mut() = name;
        Ok(())
    }

    fn get(&self, interpreter: &Interpreter, scope: &Scope, target: &str) -> Result<Value> {
        let module = interpreter.module();
        if scope.is_module_scope() && module.promoted() == Some(target) {
            return Err(PromotionError::PromotedSubmodule(target.to_string()).into());
        }

        let package = self
            .package
            .clone()
            .unwrap_or_else(|| format!(".{target}"));
        let name = format!("{package}.{}", self.name.borrow());

        interpreter.load_module(
            &name,
            LoadRequest {
                promoted: true,
                resolve: false,
                reqs: self.reqs.clone(),
            },
            scope,
            Some(target),
        )
    }
}

/// One of several values, selected by key
#[derive(Debug)]
pub struct Choices {
    values: IndexMap<String, Value>,
    choice: RefCell<Value>,
}

impl Choices {
    pub fn new(values: IndexMap<String, Value>, default: Value) -> Self {
        Self {
            values,
            choice: RefCell::new(default),
        }
    }
}

impl Special for Choices {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn describe(&self) -> String {
        format!("choices({})", self.choice.borrow().describe())
    }

    fn as_overridable(&self) -> Option<&dyn Overridable> {
        Some(self)
    }
}

impl Overridable for Choices {
    fn set(&self, value: Value) -> Result<()> {
        *self.choice.borrow_mut() = value;
        Ok(())
    }

    fn get(&self, _: &Interpreter, _: &Scope, _: &str) -> Result<Value> {
        let key = self.choice.borrow().to_text();
        self.values.get(&key).cloned().ok_or_else(|| {
            EvalError::NoMember {
                value: format!(
                    "choices{{{}}}",
                    self.values.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
                member: key,
            }
            .into()
        })
    }
}
