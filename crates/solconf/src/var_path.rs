//! variable paths
//!
//! A [VarPath] addresses a value relative to the root configuration, e.g. `model.layers[0].size`.
//! Paths are parsed with the hcl expression parser and then restricted to variables, attribute
//! access and literal (integer or string) subscripts. Everything else is rejected.
use crate::error::{AddressingError, Result};
use crate::modifiers::Modifiers;
use crate::util::hcl_quote;
use crate::value::Value;
use hcl::{Expression, Operation, TraversalOperator, UnaryOperator};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Attribute(String),
    Subscript(Key),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VarPath(Vec<Step>);

impl VarPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self(steps.into_iter().collect())
    }

    /// Single attribute step
    pub fn attribute(name: impl Into<String>) -> Self {
        Self(vec![Step::Attribute(name.into())])
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&Step> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.0.last()
    }

    pub fn push(&mut self, step: Step) {
        self.0.push(step)
    }

    /// Builder style [Step::Attribute] push
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.0.push(Step::Attribute(name.into()));
        self
    }

    /// This path followed by all steps of `other`
    pub fn join(&self, other: &[Step]) -> Self {
        let mut steps = self.0.clone();
        steps.extend_from_slice(other);
        Self(steps)
    }

    /// Parse a reference string such as `a.b[0]["x"]`
    ///
    /// The empty string is the empty path (the root itself).
    pub fn parse(path: &str) -> Result<Self, AddressingError> {
        if path.trim().is_empty() {
            return Ok(Self::new());
        }

        let expression: hcl_edit::expr::Expression =
            path.parse().map_err(|err: hcl_edit::parser::Error| {
                AddressingError::InvalidPath {
                    path: path.to_string(),
                    reason: err.to_string(),
                }
            })?;

        Self::from_expression(&expression.into(), path)
    }

    /// Convert an already parsed expression, `source` is used in error messages
    pub fn from_expression(expression: &Expression, source: &str) -> Result<Self, AddressingError> {
        let unsupported = |component: String| AddressingError::UnsupportedComponent {
            path: source.to_string(),
            component,
        };

        match expression {
            Expression::Variable(variable) => Ok(Self::attribute(variable.as_str())),
            Expression::Traversal(traversal) => {
                let mut path = Self::from_expression(&traversal.expr, source)?;
                for operator in &traversal.operators {
                    let step = match operator {
                        TraversalOperator::GetAttr(ident) => Step::Attribute(ident.to_string()),
                        TraversalOperator::LegacyIndex(index) => Step::Subscript(Key::Int(
                            i64::try_from(*index).map_err(|_| unsupported(index.to_string()))?,
                        )),
                        TraversalOperator::Index(index) => Step::Subscript(
                            subscript_key(index).ok_or_else(|| unsupported(format!("{index:?}")))?,
                        ),
                        other => return Err(unsupported(format!("{other:?}"))),
                    };
                    path.push(step);
                }
                Ok(path)
            }
            Expression::Parenthesis(inner) => Self::from_expression(inner, source),
            other => Err(unsupported(format!("{other:?}"))),
        }
    }

    /// Render back to the dotted/bracketed form
    pub fn as_str(&self) -> String {
        let mut out = String::new();
        for step in &self.0 {
            match step {
                Step::Attribute(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Step::Subscript(Key::Int(index)) => out.push_str(&format!("[{index}]")),
                Step::Subscript(Key::Str(key)) => out.push_str(&format!("[{}]", hcl_quote(key))),
            }
        }
        out
    }

    /// Walk `root` along this path and return the addressed value plus its immediate container
    ///
    /// Modules with a promoted member are transparently replaced by that member, both before the
    /// first step and after every step, unless the path is empty (addressing `root` itself).
    pub fn get_with_container(&self, root: &Value) -> Result<(Value, Option<Value>)> {
        if self.is_empty() {
            return Ok((root.clone(), None));
        }

        let mut current = skip_promoted(root.clone(), self)?;
        let mut container = None;
        for step in &self.0 {
            let next = get_step(&current, step).ok_or_else(|| AddressingError::NoSuchMember {
                path: self.as_str(),
                step: step.to_string(),
            })?;
            container = Some(current);
            current = skip_promoted(next, self)?;
        }

        Ok((current, container))
    }

    pub fn get(&self, root: &Value) -> Result<Value> {
        Ok(self.get_with_container(root)?.0)
    }

    /// The modifiers annotating the addressed member, if any
    pub fn get_modifiers(&self, root: &Value) -> Result<Option<Modifiers>> {
        let (_, container) = self.get_with_container(root)?;
        let Some(Step::Attribute(name)) = self.last() else {
            return Ok(None);
        };

        Ok(match container {
            Some(Value::Block(block)) => block.annotation(name),
            Some(Value::Module(module)) => module.block().annotation(name),
            _ => None,
        })
    }
}

fn subscript_key(expression: &Expression) -> Option<Key> {
    match expression {
        Expression::Number(number) => number.as_i64().map(Key::Int),
        Expression::String(key) => Some(Key::Str(key.clone())),
        Expression::Parenthesis(inner) => subscript_key(inner),
        Expression::TemplateExpr(template_expr) => {
            let template = hcl::Template::from_expr(template_expr).ok()?;
            let mut literal = String::new();
            for element in template.elements() {
                let hcl::template::Element::Literal(text) = element else {
                    return None;
                };
                literal.push_str(text);
            }
            Some(Key::Str(literal))
        }
        Expression::Operation(operation) => match operation.as_ref() {
            Operation::Unary(unary) if unary.operator == UnaryOperator::Neg => {
                match subscript_key(&unary.expr)? {
                    Key::Int(index) => Some(Key::Int(-index)),
                    Key::Str(_) => None,
                }
            }
            _ => None,
        },
        _ => None,
    }
}

/// Replace a module by its promoted member
fn skip_promoted(value: Value, path: &VarPath) -> Result<Value> {
    let Value::Module(module) = &value else {
        return Ok(value);
    };
    let Some(promoted) = module.promoted() else {
        return Ok(value);
    };

    module
        .block()
        .get(promoted)
        .ok_or_else(|| {
            AddressingError::NoSuchMember {
                path: path.as_str(),
                step: promoted.to_string(),
            }
            .into()
        })
}

/// One step of a walk over blocks, modules and plain data
pub(crate) fn get_step(value: &Value, step: &Step) -> Option<Value> {
    match (value, step) {
        (Value::Block(block), Step::Attribute(name) | Step::Subscript(Key::Str(name))) => {
            block.get(name)
        }
        (Value::Module(module), Step::Attribute(name) | Step::Subscript(Key::Str(name))) => {
            module.block().get(name)
        }
        (Value::Object(object), Step::Attribute(name) | Step::Subscript(Key::Str(name))) => {
            object.get(name).cloned()
        }
        (Value::Array(items), Step::Subscript(Key::Int(index))) => {
            let index = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                *index as usize
            };
            items.get(index).cloned()
        }
        _ => None,
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Attribute(name) => f.write_str(name),
            Step::Subscript(Key::Int(index)) => write!(f, "[{index}]"),
            Step::Subscript(Key::Str(key)) => write!(f, "[{}]", hcl_quote(key)),
        }
    }
}

impl Display for VarPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for VarPath {
    type Err = AddressingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
