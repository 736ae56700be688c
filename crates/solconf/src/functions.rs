//! native callables
//!
//! Configuration source can call functions registered in [Functions] by name, refer to them as
//! values (e.g. `cast(int)`), and use them as the `as_type` member of a declaration block. The
//! registry is owned by the loader so embedders can add constructors for their own types.
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub type Kwargs = IndexMap<String, Value>;
pub type NativeFn = dyn Fn(&[Value], &Kwargs) -> Result<Value, String>;

#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    func: Rc<NativeFn>,
}

impl Function {
    pub fn new(
        name: &str,
        func: impl Fn(&[Value], &Kwargs) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value], kwargs: &Kwargs) -> Result<Value, String> {
        tracing::trace!(function = %self.name, args = args.len(), kwargs = kwargs.len(), "native call");
        (self.func)(args, kwargs)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && std::ptr::addr_eq(Rc::as_ptr(&self.func), Rc::as_ptr(&other.func))
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Registry of native functions, keyed by name
#[derive(Clone, Debug)]
pub struct Functions {
    table: IndexMap<String, Function>,
}

impl Functions {
    /// A registry without any functions
    pub fn empty() -> Self {
        Self {
            table: IndexMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        func: impl Fn(&[Value], &Kwargs) -> Result<Value, String> + 'static,
    ) -> &mut Self {
        self.table.insert(name.to_string(), Function::new(name, func));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.table.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

impl Default for Functions {
    fn default() -> Self {
        let mut functions = Self::empty();
        functions
            .register("int", |args, _| match single(args, "int")? {
                Value::Integer(i) => Ok(Value::Integer(*i)),
                Value::Decimal(d) => Ok(Value::Integer(d.trunc() as i64)),
                Value::Boolean(b) => Ok(Value::Integer(*b as i64)),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|e| format!("invalid integer {s:?}: {e}")),
                other => Err(format!("cannot convert {} to int", other.type_name())),
            })
            .register("float", |args, _| match single(args, "float")? {
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Decimal)
                    .map_err(|e| format!("invalid float {s:?}: {e}")),
                other => Ok(Value::Decimal(numeric(other)?)),
            })
            .register("str", |args, _| Ok(Value::String(single(args, "str")?.to_text())))
            .register("bool", |args, _| {
                Ok(Value::Boolean(match single(args, "bool")? {
                    Value::Null => false,
                    Value::Boolean(b) => *b,
                    Value::Integer(i) => *i != 0,
                    Value::Decimal(d) => *d != 0.0,
                    Value::String(s) => !s.is_empty(),
                    Value::Array(items) => !items.is_empty(),
                    Value::Object(object) => !object.is_empty(),
                    _ => true,
                }))
            })
            .register("len", |args, _| match single(args, "len")? {
                Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
                Value::Array(items) => Ok(Value::Integer(items.len() as i64)),
                Value::Object(object) => Ok(Value::Integer(object.len() as i64)),
                other => Err(format!("{} has no length", other.type_name())),
            })
            .register("list", |args, _| match args {
                [Value::Array(items)] => Ok(Value::Array(items.clone())),
                _ => Ok(Value::Array(args.to_vec())),
            })
            .register("dict", |args, kwargs| {
                let mut out = IndexMap::new();
                for arg in args {
                    let Value::Object(object) = arg else {
                        return Err(format!("dict expects objects, got {}", arg.type_name()));
                    };
                    out.extend(object.clone());
                }
                out.extend(kwargs.clone());
                Ok(Value::Object(out))
            })
            .register("min", |args, _| extremum(args, "min", |a, b| a < b))
            .register("max", |args, _| extremum(args, "max", |a, b| a > b))
            .register("abs", |args, _| match single(args, "abs")? {
                Value::Integer(i) => Ok(i
                    .checked_abs()
                    .map(Value::Integer)
                    .unwrap_or(Value::Decimal((*i as f64).abs()))),
                other => Ok(Value::Decimal(numeric(other)?.abs())),
            })
            .register("upper", |args, _| {
                Ok(Value::String(text(single(args, "upper")?)?.to_uppercase()))
            })
            .register("lower", |args, _| {
                Ok(Value::String(text(single(args, "lower")?)?.to_lowercase()))
            })
            .register("join", |args, _| {
                let [separator, Value::Array(items)] = args else {
                    return Err("join expects a separator and an array".to_string());
                };
                let separator = text(separator)?;
                Ok(Value::String(
                    items
                        .iter()
                        .map(Value::to_text)
                        .collect::<Vec<_>>()
                        .join(separator),
                ))
            })
            .register("range", |args, _| {
                let (start, end) = match args {
                    [Value::Integer(end)] => (0, *end),
                    [Value::Integer(start), Value::Integer(end)] => (*start, *end),
                    _ => return Err("range expects one or two integers".to_string()),
                };
                Ok(Value::Array((start..end).map(Value::Integer).collect()))
            });
        functions
    }
}

fn single<'a>(args: &'a [Value], function: &str) -> Result<&'a Value, String> {
    match args {
        [value] => Ok(value),
        _ => Err(format!(
            "{function} expects exactly one argument, got {}",
            args.len()
        )),
    }
}

fn numeric(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, got {}", value.type_name()))
}

fn text(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {}", value.type_name()))
}

fn extremum(args: &[Value], function: &str, better: fn(f64, f64) -> bool) -> Result<Value, String> {
    let candidates = match args {
        [Value::Array(items)] => items.as_slice(),
        _ => args,
    };

    let mut best: Option<&Value> = None;
    for candidate in candidates {
        let value = numeric(candidate)?;
        if best.map_or(true, |current| better(value, numeric(current).unwrap_or(value))) {
            best = Some(candidate);
        }
    }

    best.cloned()
        .ok_or_else(|| format!("{function} expects at least one number"))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Result<Value, String> {
        Functions::default()
            .get(name)
            .expect("builtin exists")
            .call(args, &Kwargs::new())
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", &["42".into()]), Ok(Value::Integer(42)));
        assert_eq!(call("int", &[Value::Decimal(3.9)]), Ok(Value::Integer(3)));
        assert_eq!(call("str", &[Value::Integer(7)]), Ok(Value::from("7")));
        assert!(call("int", &["x".into()]).is_err());
    }

    #[test]
    fn absolute_values() {
        assert_eq!(call("abs", &[Value::Integer(-3)]), Ok(Value::Integer(3)));
        assert_eq!(call("abs", &[Value::Decimal(-1.5)]), Ok(Value::Decimal(1.5)));
        assert_eq!(
            call("abs", &[Value::Integer(i64::MIN)]),
            Ok(Value::Decimal(9223372036854775808.0))
        );
    }

    #[test]
    fn extremum_over_array() {
        let items = Value::from(vec![3_i64, 9, 1]);
        assert_eq!(call("max", &[items.clone()]), Ok(Value::Integer(9)));
        assert_eq!(call("min", &[items]), Ok(Value::Integer(1)));
    }

    #[test]
    fn dict_from_kwargs() {
        let kwargs = Kwargs::from([("a".to_string(), Value::Integer(1))]);
        let out = Functions::default()
            .get("dict")
            .unwrap()
            .call(&[], &kwargs)
            .unwrap();
        assert_eq!(out, IndexMap::from([("a", 1_i64)]).into());
    }
}
