//! declaration evaluator
//!
//! The [Interpreter] executes the statements of one module. Every declaration passes its value
//! through the override engine before it is stored in the enclosing block, so overrides take
//! effect before later declarations read the value.
//!
//! Within one body, `modifiers` annotations are executed before all other statements.
//!
//! Names are looked up in the enclosing blocks (innermost first), then among the module members,
//! the built-in modifier constants and the registered native functions. Override values may also
//! refer to members of the root configuration module.
use crate::error::{Error, EvalError, Result};
use crate::functions::{Function, Kwargs};
use crate::loader::{LoadOptions, LoaderContext};
use crate::modifiers::{Modifiers, CAST, NAME};
use crate::module::{Block, Module};
use crate::overrides::engine::apply_override;
use crate::overrides::{deduce_var_path, Choices, Override, OverrideValue, Required, Submodule};
use crate::resolve::special::{DeferredCall, DeferredString, IdString, Reference, ResolvedAccess};
use crate::source::Statement;
use crate::util::abs_mod_name;
use crate::value::Value;
use crate::var_path::{get_step, Key, Step, VarPath};
use hcl::expr::{
    BinaryOperator, Conditional, Expression, FuncCall, ObjectKey, Operation, TemplateExpr,
    Traversal, TraversalOperator, UnaryOperator,
};
use hcl::template::{Element, Template};
use indexmap::IndexMap;
use std::rc::Rc;

/// The chain of blocks enclosing a statement, empty at module scope
#[derive(Debug, Clone, Default)]
pub struct Scope {
    blocks: Vec<Rc<Block>>,
}

impl Scope {
    pub fn module() -> Self {
        Self::default()
    }

    pub fn nested(&self, block: Rc<Block>) -> Self {
        let mut blocks = self.blocks.clone();
        blocks.push(block);
        Self { blocks }
    }

    pub fn is_module_scope(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn innermost(&self) -> Option<&Rc<Block>> {
        self.blocks.last()
    }

    /// Nesting of the innermost block within its module
    pub fn class_path(&self) -> VarPath {
        self.innermost()
            .map(|block| block.class_path())
            .unwrap_or_default()
    }

    pub fn qualname(&self) -> String {
        self.innermost()
            .map(|block| block.qualname().to_string())
            .unwrap_or_default()
    }

    /// The block statements in this scope declare into
    pub fn current_block<'a>(&'a self, module: &'a Module) -> &'a Block {
        match self.innermost() {
            Some(block) => block,
            None => module.block(),
        }
    }
}

/// What an expression is evaluated for
#[derive(Clone, Copy)]
struct Env<'s> {
    scope: &'s Scope,
    /// the member being declared
    target: Option<&'s str>,
    /// evaluating the value of an override
    overriding: bool,
}

/// A module load requested from configuration source
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub promoted: bool,
    pub resolve: bool,
    pub reqs: Vec<Override>,
}

pub struct Interpreter<'l> {
    loader: &'l LoaderContext,
    module: Rc<Module>,
}

impl<'l> Interpreter<'l> {
    pub fn new(loader: &'l LoaderContext, module: Rc<Module>) -> Self {
        Self { loader, module }
    }

    pub fn loader(&self) -> &'l LoaderContext {
        self.loader
    }

    pub fn module(&self) -> &Rc<Module> {
        &self.module
    }

    /// Execute all statements of the module
    #[tracing::instrument(skip_all, fields(module = self.module.name()))]
    pub fn execute(&self) -> Result<()> {
        tracing::debug!("executing module");
        self.exec_body(self.module.statements(), &Scope::module())
    }

    fn exec_body(&self, statements: &[Statement], scope: &Scope) -> Result<()> {
        let (annotations, declarations): (Vec<_>, Vec<_>) = statements
            .iter()
            .partition(|statement| matches!(statement, Statement::Annotate { .. }));

        for statement in annotations.into_iter().chain(declarations) {
            self.exec_statement(statement, scope)?;
        }
        Ok(())
    }

    fn exec_statement(&self, statement: &Statement, scope: &Scope) -> Result<()> {
        let block = scope.current_block(&self.module);

        let result = match statement {
            Statement::Block {
                name, bases, body, ..
            } => return self.exec_block(name, bases, body, scope),
            Statement::Annotate { name, expr, .. } => self
                .eval(expr, Env::plain(scope, None))
                .and_then(|annotation| {
                    let modifiers = Modifiers::from_annotation(&annotation)?;
                    block.annotate(name, modifiers)?;
                    Ok(())
                }),
            Statement::Import { name, expr, .. } => self
                .eval(expr, Env::plain(scope, Some(name.as_str())))
                .map(|value| {
                    block.set(name, value);
                    block.hide_by_default(name);
                }),
            Statement::Assign { name, expr, .. } => self
                .eval(expr, Env::plain(scope, Some(name.as_str())))
                .and_then(|declared| apply_override(self, scope, name, declared))
                .map(|value| block.set(name, value)),
        };

        result.map_err(|source| {
            let name = match statement {
                Statement::Annotate { name, .. }
                | Statement::Import { name, .. }
                | Statement::Assign { name, .. }
                | Statement::Block { name, .. } => name,
            };
            Error::Declaration {
                module: self.module.name().to_string(),
                name: name.clone(),
                location: statement.location().to_string(),
                source: Box::new(source),
            }
        })
    }

    fn exec_block(&self, name: &str, bases: &[String], body: &[Statement], scope: &Scope) -> Result<()> {
        let env = Env::plain(scope, None);
        let bases = bases
            .iter()
            .map(|label| {
                let path = VarPath::parse(label)?;
                match self.lookup_path(&path, env)? {
                    Value::Block(base) => Ok(base),
                    other => Err(EvalError::TypeMismatch {
                        expected: "a block as base",
                        got: other.describe(),
                    }
                    .into()),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let qualname = match scope.qualname() {
            outer if outer.is_empty() => name.to_string(),
            outer => format!("{outer}.{name}"),
        };
        let block = Rc::new(Block::new(name, &qualname, self.module.name(), bases));
        tracing::trace!(block = %qualname, "executing block");

        self.exec_body(body, &scope.nested(block.clone()))?;
        scope
            .current_block(&self.module)
            .set(name, Value::Block(block));
        Ok(())
    }

    /// Evaluate the value of an override applied to `target`
    pub(crate) fn eval_override(&self, record: &Override, scope: &Scope, target: &str) -> Result<Value> {
        match &record.value {
            OverrideValue::Precomputed(value) => Ok(value.clone()),
            OverrideValue::Expr(expr) => self.eval(
                expr,
                Env {
                    scope,
                    target: Some(target),
                    overriding: true,
                },
            ),
        }
    }

    /// Load a module on behalf of the declaration `target`
    ///
    /// The loaded module is addressed below the declaration, names with leading dots are relative
    /// to this module and other names are relative to the package.
    pub(crate) fn load_module(
        &self,
        name: &str,
        request: LoadRequest,
        scope: &Scope,
        target: Option<&str>,
    ) -> Result<Value> {
        let module = &self.module;
        let absolute = if name.starts_with('.') {
            abs_mod_name(module.name(), name)?
        } else {
            format!("{}.{name}", module.package())
        };

        let var_path = match target {
            Some(target) if scope.is_module_scope() && module.promoted() == Some(target) => {
                module.var_path().cloned()
            }
            Some(target) => deduce_var_path(
                module.var_path(),
                module.promoted(),
                &scope.class_path(),
                target,
            ),
            None => None,
        };

        let root = match module.root() {
            Some(root) => Rc::downgrade(&root),
            None => Rc::downgrade(module),
        };

        self.loader.load(
            &absolute,
            LoadOptions {
                resolve: request.resolve,
                promoted: request.promoted,
                reqs: request.reqs,
                var_path,
                root: Some(root),
            },
        )
    }

    fn lookup(&self, name: &str, env: Env) -> Result<Value> {
        if let Some(value) = env
            .scope
            .blocks
            .iter()
            .rev()
            .find_map(|block| block.own(name))
        {
            return Ok(value);
        }

        if let Some(value) = self.module.block().own(name) {
            return Ok(value);
        }

        if let Some(modifiers) = Modifiers::builtin(name) {
            return Ok(Value::Modifiers(modifiers));
        }

        if let Some(function) = self.loader.registry().functions().get(name) {
            return Ok(Value::Function(function.clone()));
        }

        if env.overriding {
            if let Some(value) = self.module.root().and_then(|root| root.block().own(name)) {
                return Ok(value);
            }
        }

        Err(EvalError::UndefinedName(name.to_string()).into())
    }

    fn lookup_path(&self, path: &VarPath, env: Env) -> Result<Value> {
        let Some((Step::Attribute(first), rest)) = path.steps().split_first() else {
            return Err(EvalError::UndefinedName(path.as_str()).into());
        };

        let mut value = self.lookup(first, env)?;
        for step in rest {
            value = access(value, step)?;
        }
        Ok(value)
    }

    fn eval(&self, expr: &Expression, env: Env) -> Result<Value> {
        Ok(match expr {
            Expression::Null => Value::Null,
            Expression::Bool(b) => Value::Boolean(*b),
            Expression::Number(number) => Value::from(number.clone()),
            Expression::String(s) => Value::String(s.clone()),
            Expression::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<Result<_>>()?,
            ),
            Expression::Object(object) => {
                let mut out = IndexMap::new();
                for (key, value) in object {
                    let key = match key {
                        ObjectKey::Identifier(ident) => ident.to_string(),
                        ObjectKey::Expression(expr) => match self.eval(expr, env)? {
                            Value::String(key) => key,
                            key @ (Value::Integer(_) | Value::Decimal(_) | Value::Boolean(_)) => {
                                key.to_text()
                            }
                            other => {
                                return Err(EvalError::TypeMismatch {
                                    expected: "a string object key",
                                    got: other.describe(),
                                }
                                .into())
                            }
                        },
                        #[allow(unreachable_patterns)]
                        other => return Err(EvalError::Unsupported(format!("{other:?}")).into()),
                    };
                    out.insert(key, self.eval(value, env)?);
                }
                Value::Object(out)
            }
            Expression::TemplateExpr(template_expr) => self.template(template_expr, env)?,
            Expression::Variable(variable) => self.lookup(variable.as_str(), env)?,
            Expression::Traversal(traversal) => self.traversal(traversal, env)?,
            Expression::FuncCall(func_call) => self.func_call(func_call, env)?,
            Expression::Parenthesis(inner) => self.eval(inner, env)?,
            Expression::Conditional(conditional) => self.conditional(conditional, env)?,
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Unary(unary) => {
                    let operand = self.eval(&unary.expr, env)?;
                    if let Value::Special(_) = operand {
                        deferred(unary_function(unary.operator), vec![operand])
                    } else {
                        unary_op(unary.operator, &operand)?
                    }
                }
                Operation::Binary(binary) => {
                    let lhs = self.eval(&binary.lhs_expr, env)?;
                    let rhs = self.eval(&binary.rhs_expr, env)?;
                    binary_value(binary.operator, lhs, rhs)?
                }
            },
            Expression::ForExpr(_) => {
                return Err(EvalError::Unsupported("for expression".to_string()).into())
            }
            other => return Err(EvalError::Unsupported(format!("{other:?}")).into()),
        })
    }

    fn template(&self, template_expr: &TemplateExpr, env: Env) -> Result<Value> {
        let template = Template::from_expr(template_expr).map_err(EvalError::from)?;

        let mut parts = vec![];
        let mut text = String::new();
        for element in template.elements() {
            match element {
                Element::Literal(literal) => text.push_str(literal),
                Element::Interpolation(interpolation) => {
                    let value = self.eval(&interpolation.expr, env)?;
                    if value.is_unresolved() {
                        parts.push(Value::String(std::mem::take(&mut text)));
                        parts.push(value);
                    } else {
                        text.push_str(&value.to_text());
                    }
                }
                Element::Directive(_) => {
                    return Err(EvalError::Unsupported("template directive".to_string()).into())
                }
            }
        }

        if parts.is_empty() {
            return Ok(Value::String(text));
        }
        parts.push(Value::String(text));
        Ok(Value::Special(Rc::new(DeferredString::new(parts))))
    }

    fn traversal(&self, traversal: &Traversal, env: Env) -> Result<Value> {
        let mut value = self.eval(&traversal.expr, env)?;
        for operator in &traversal.operators {
            let step = match operator {
                TraversalOperator::GetAttr(ident) => Step::Attribute(ident.to_string()),
                TraversalOperator::LegacyIndex(index) => {
                    Step::Subscript(Key::Int(i64::try_from(*index).map_err(|_| {
                        EvalError::IndexOutOfRange {
                            index: i64::MAX,
                            value: value.describe(),
                        }
                    })?))
                }
                TraversalOperator::Index(index) => match self.eval(index, env)? {
                    Value::Integer(index) => Step::Subscript(Key::Int(index)),
                    Value::String(key) => Step::Subscript(Key::Str(key)),
                    other => {
                        return Err(EvalError::TypeMismatch {
                            expected: "an integer or string index",
                            got: other.describe(),
                        }
                        .into())
                    }
                },
                other => return Err(EvalError::Unsupported(format!("{other:?}")).into()),
            };
            value = access(value, &step)?;
        }
        Ok(value)
    }

    fn conditional(&self, conditional: &Conditional, env: Env) -> Result<Value> {
        match self.eval(&conditional.cond_expr, env)? {
            Value::Boolean(true) => self.eval(&conditional.true_expr, env),
            Value::Boolean(false) => self.eval(&conditional.false_expr, env),
            condition @ Value::Special(_) => {
                let choose = Function::new("conditional", |args, _| match args {
                    [Value::Boolean(condition), when_true, when_false] => Ok(if *condition {
                        when_true.clone()
                    } else {
                        when_false.clone()
                    }),
                    [other, ..] => Err(format!("condition is {}, not a boolean", other.type_name())),
                    _ => Err("expected a condition and two values".to_string()),
                });
                let when_true = self.eval(&conditional.true_expr, env)?;
                let when_false = self.eval(&conditional.false_expr, env)?;
                Ok(deferred(choose, vec![condition, when_true, when_false]))
            }
            other => Err(EvalError::TypeMismatch {
                expected: "a boolean condition",
                got: other.describe(),
            }
            .into()),
        }
    }

    fn func_call(&self, func_call: &FuncCall, env: Env) -> Result<Value> {
        let name = func_call.name.to_string();
        let mut args = func_call
            .args
            .iter()
            .map(|arg| self.eval(arg, env))
            .collect::<Result<Vec<_>>>()?;

        let arity = |expected: &'static str| EvalError::Arity {
            function: name.clone(),
            expected,
        };

        let value = match name.as_str() {
            "load" => {
                let (module, options) = match args.as_slice() {
                    [Value::String(module)] => (module, None),
                    [Value::String(module), Value::Object(options)] => (module, Some(options)),
                    _ => return Err(arity("a module name and an optional options object").into()),
                };

                let mut request = LoadRequest {
                    promoted: true,
                    resolve: false,
                    reqs: vec![],
                };
                for (key, value) in options.into_iter().flatten() {
                    match (key.as_str(), value) {
                        ("promoted", Value::Boolean(promoted)) => request.promoted = *promoted,
                        ("resolve", Value::Boolean(resolve)) => request.resolve = *resolve,
                        ("reqs", Value::Object(reqs)) => request.reqs = reqs_from(reqs)?,
                        _ => {
                            return Err(EvalError::TypeMismatch {
                                expected: "load options `promoted` (bool), `resolve` (bool) or `reqs` (object)",
                                got: format!("`{key}` = {}", value.describe()),
                            }
                            .into())
                        }
                    }
                }

                self.load_module(module, request, env.scope, env.target)?
            }
            "submodule" => {
                let reqs = match args.last() {
                    Some(Value::Object(reqs)) => reqs_from(reqs)?,
                    _ => vec![],
                };
                if matches!(args.last(), Some(Value::Object(_))) {
                    args.pop();
                }

                let (package, module) = match args.as_slice() {
                    [Value::String(module)] => (None, module.clone()),
                    [Value::String(package), Value::String(module)] => {
                        (Some(package.clone()), module.clone())
                    }
                    _ => {
                        return Err(arity(
                            "an optional package, a module name and optional reqs",
                        )
                        .into())
                    }
                };
                Value::Special(Rc::new(Submodule::new(package, module, reqs)))
            }
            "choices" => match args.as_slice() {
                [Value::Object(values), default] => {
                    Value::Special(Rc::new(Choices::new(values.clone(), default.clone())))
                }
                _ => return Err(arity("an object of choices and the default key").into()),
            },
            "req" => match args.as_slice() {
                [] => Value::Special(Rc::new(Required::new())),
                _ => return Err(arity("no arguments").into()),
            },
            "ref" => match args.as_slice() {
                [Value::String(member)] => self.reference(member, env.scope)?,
                _ => return Err(arity("a member name").into()),
            },
            "call" => match args.split_first() {
                Some((callee, rest)) => {
                    Value::Special(Rc::new(DeferredCall::new(callee.clone(), rest.to_vec(), Kwargs::new())))
                }
                None => return Err(arity("a callable and its arguments").into()),
            },
            "resolved" => match args.pop() {
                Some(target) if args.is_empty() => {
                    Value::Special(Rc::new(ResolvedAccess::new(target, vec![])))
                }
                _ => return Err(arity("a single value").into()),
            },
            "resolve" => match args.as_slice() {
                [value] => self.loader.registry().resolve(value)?,
                _ => return Err(arity("a single value").into()),
            },
            "id_str" => {
                let (glue, full) = match args.as_slice() {
                    [] => (",", false),
                    [Value::String(glue)] => (glue.as_str(), false),
                    [Value::String(glue), Value::Boolean(full)] => (glue.as_str(), *full),
                    _ => return Err(arity("an optional glue string and an optional `full` flag").into()),
                };
                let overrides = self.loader.package_overrides(self.module.package())?;
                Value::Special(Rc::new(IdString::new(overrides, glue, full)))
            }
            NAME => match args.as_slice() {
                [Value::String(rename)] => Modifiers::new().with(NAME, rename.as_str()).into(),
                _ => return Err(arity("the output name").into()),
            },
            CAST => match args.as_slice() {
                [Value::Function(function)] => Modifiers::new().with(CAST, function.clone()).into(),
                [Value::String(function)] => match self.loader.registry().functions().get(function) {
                    Some(function) => Modifiers::new().with(CAST, function.clone()).into(),
                    None => return Err(EvalError::UnknownFunction(function.clone()).into()),
                },
                _ => return Err(arity("a function").into()),
            },
            "modifier" => match args.as_slice() {
                [Value::String(key), value] => Modifiers::new().with(key, value.clone()).into(),
                _ => return Err(arity("a key and a value").into()),
            },
            _ => {
                let function = match self.loader.registry().functions().get(&name) {
                    Some(function) => function.clone(),
                    None => match self.lookup(&name, env) {
                        Ok(Value::Function(function)) => function,
                        _ => return Err(EvalError::UnknownFunction(name).into()),
                    },
                };

                if args.iter().any(Value::is_unresolved) {
                    deferred(function, args)
                } else {
                    function
                        .call(&args, &Kwargs::new())
                        .map_err(|message| EvalError::CallFailed {
                            function: name.clone(),
                            message,
                        })?
                }
            }
        };

        Ok(value)
    }

    /// A late-bound reference to a member of the innermost block or the module
    fn reference(&self, member: &str, scope: &Scope) -> Result<Value> {
        let block = scope
            .innermost()
            .filter(|block| block.contains_own(member));

        if block.is_none() && !self.module.block().contains_own(member) {
            return Err(EvalError::UndefinedName(member.to_string()).into());
        }

        Ok(Value::Special(Rc::new(Reference::new(
            Rc::downgrade(&self.module),
            block.map(Rc::downgrade),
            member,
        ))))
    }
}

impl<'s> Env<'s> {
    fn plain(scope: &'s Scope, target: Option<&'s str>) -> Self {
        Self {
            scope,
            target,
            overriding: false,
        }
    }
}

fn reqs_from(reqs: &IndexMap<String, Value>) -> Result<Vec<Override>> {
    reqs.iter()
        .map(|(path, value)| Ok(Override::precomputed(VarPath::parse(path)?, value.clone())))
        .collect()
}

fn deferred(function: Function, args: Vec<Value>) -> Value {
    Value::Special(Rc::new(DeferredCall::new(
        Value::Function(function),
        args,
        Kwargs::new(),
    )))
}

/// Attribute or index access, deferred on values that are not resolved yet
fn access(value: Value, step: &Step) -> Result<Value> {
    if let Some(access) = value.special::<ResolvedAccess>() {
        return Ok(access.then(step.clone()));
    }
    if let Value::Special(_) = value {
        return Ok(Value::Special(Rc::new(ResolvedAccess::new(
            value,
            vec![step.clone()],
        ))));
    }

    get_step(&value, step).ok_or_else(|| {
        EvalError::NoMember {
            value: value.describe(),
            member: step.to_string(),
        }
        .into()
    })
}

fn binary_value(operator: BinaryOperator, lhs: Value, rhs: Value) -> Result<Value> {
    let separator = match operator {
        BinaryOperator::Plus => Some(None),
        BinaryOperator::Div => Some(Some("/")),
        _ => None,
    };
    if let Some(separator) = separator {
        if let Some(string) = lhs.special::<DeferredString>() {
            return Ok(string.append(separator, rhs));
        }
        if let Some(string) = rhs.special::<DeferredString>() {
            return Ok(string.prepend(lhs, separator));
        }
    }

    if matches!(lhs, Value::Special(_)) || matches!(rhs, Value::Special(_)) {
        return Ok(deferred(binary_function(operator), vec![lhs, rhs]));
    }

    Ok(binary_op(operator, &lhs, &rhs)?)
}

fn binary_function(operator: BinaryOperator) -> Function {
    Function::new(symbol(operator), move |args, _| match args {
        [lhs, rhs] => binary_op(operator, lhs, rhs).map_err(|err| err.to_string()),
        _ => Err("expected two operands".to_string()),
    })
}

fn unary_function(operator: UnaryOperator) -> Function {
    let name = match operator {
        UnaryOperator::Neg => "-",
        UnaryOperator::Not => "!",
    };
    Function::new(name, move |args, _| match args {
        [operand] => unary_op(operator, operand).map_err(|err| err.to_string()),
        _ => Err("expected one operand".to_string()),
    })
}

fn symbol(operator: BinaryOperator) -> &'static str {
    match operator {
        BinaryOperator::Eq => "==",
        BinaryOperator::NotEq => "!=",
        BinaryOperator::LessEq => "<=",
        BinaryOperator::GreaterEq => ">=",
        BinaryOperator::Less => "<",
        BinaryOperator::Greater => ">",
        BinaryOperator::Plus => "+",
        BinaryOperator::Minus => "-",
        BinaryOperator::Mul => "*",
        BinaryOperator::Div => "/",
        BinaryOperator::Mod => "%",
        BinaryOperator::And => "&&",
        BinaryOperator::Or => "||",
    }
}

/// Binary operators on resolved values
///
/// `/` always produces a decimal, integer arithmetic falls back to decimals on overflow.
pub(crate) fn binary_op(operator: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    use BinaryOperator::*;

    let operands = || EvalError::BinaryOperands {
        op: symbol(operator),
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    };

    match operator {
        Eq => return Ok(Value::Boolean(lhs == rhs)),
        NotEq => return Ok(Value::Boolean(lhs != rhs)),
        And | Or => {
            let (Value::Boolean(a), Value::Boolean(b)) = (lhs, rhs) else {
                return Err(operands());
            };
            return Ok(Value::Boolean(if operator == And { *a && *b } else { *a || *b }));
        }
        Less | LessEq | Greater | GreaterEq => {
            let ordering = match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(operands()),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Boolean(false));
            };
            return Ok(Value::Boolean(match operator {
                Less => ordering.is_lt(),
                LessEq => ordering.is_le(),
                Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }));
        }
        _ => {}
    }

    match (operator, lhs, rhs) {
        (Plus, Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
        (Plus, Value::Array(a), Value::Array(b)) => {
            return Ok(Value::Array(a.iter().chain(b).cloned().collect()))
        }
        (Div | Mod, _, Value::Integer(0)) => return Err(EvalError::DivisionByZero),
        (Div | Mod, _, Value::Decimal(d)) if *d == 0.0 => return Err(EvalError::DivisionByZero),
        (_, Value::Integer(a), Value::Integer(b)) if operator != Div => {
            let (a, b) = (*a, *b);
            let exact = match operator {
                Plus => a.checked_add(b),
                Minus => a.checked_sub(b),
                Mul => a.checked_mul(b),
                _ => a.checked_rem_euclid(b),
            };
            if let Some(exact) = exact {
                return Ok(Value::Integer(exact));
            }
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(operands());
    };
    Ok(Value::Decimal(match operator {
        Plus => a + b,
        Minus => a - b,
        Mul => a * b,
        Div => a / b,
        _ => a.rem_euclid(b),
    }))
}

pub(crate) fn unary_op(operator: UnaryOperator, operand: &Value) -> Result<Value, EvalError> {
    match (operator, operand) {
        (UnaryOperator::Neg, Value::Integer(i)) => Ok(i
            .checked_neg()
            .map(Value::Integer)
            .unwrap_or(Value::Decimal(-(*i as f64)))),
        (UnaryOperator::Neg, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (UnaryOperator::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOperator::Neg, other) => Err(EvalError::UnaryOperand {
            op: "-",
            operand: other.type_name().to_string(),
        }),
        (UnaryOperator::Not, other) => Err(EvalError::UnaryOperand {
            op: "!",
            operand: other.type_name().to_string(),
        }),
    }
}
