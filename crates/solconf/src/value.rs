//! value representation
//!
//! A single [Value] type is used on both sides of resolution.
//!
//! Plain data:
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Values that only exist before resolution:
//! - [Value::Block] and [Value::Module]: declaration blocks (see [crate::module])
//! - [Value::Special]: deferred values and overridable placeholders (see [Special])
//!
//! Values that are passed through resolution unchanged:
//! - [Value::Function]: native callables
//! - [Value::Modifiers]: modifier annotations
//! - [Value::Opaque]: live objects produced by native constructors
//!
//! The only valid **implicit** conversion: every `integer` is also a `decimal`, so `1 == 1.0`.
use crate::functions::Function;
use crate::modifiers::Modifiers;
use crate::module::{Block, Module};
use crate::overrides::Overridable;
use crate::resolve::Memo;
use indexmap::IndexMap;
use serde::{
    ser::{Error as _, SerializeMap, SerializeSeq},
    Serializer,
};
use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// All possible value types
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Block(Rc<Block>),
    Module(Rc<Module>),
    Function(Function),
    Modifiers(Modifiers),
    Special(Rc<dyn Special>),
    Opaque(Opaque),
}

/// Values with custom resolution behaviour
///
/// Each implementor is matched by its own resolver (see [crate::resolve::Resolver]) through a
/// downcast of [Special::as_any], so custom kinds never collide with the built-in variants.
pub trait Special: Debug {
    fn as_any(&self) -> &dyn Any;

    /// Short human readable description used in diagnostics
    fn describe(&self) -> String;

    /// Storage for the memoized resolution, `None` for values that are recomputed on every use
    fn memo(&self) -> Option<&Memo> {
        None
    }

    /// Placeholders that take part in override application return themselves here
    fn as_overridable(&self) -> Option<&dyn Overridable> {
        None
    }
}

/// A live object produced by a native constructor
///
/// Compared by identity.
#[derive(Clone)]
pub struct Opaque {
    type_name: String,
    inner: Rc<dyn Any>,
}

impl Opaque {
    pub fn new<T: Any>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Rc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Opaque {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Block(_) => "block",
            Value::Module(_) => "module",
            Value::Function(_) => "function",
            Value::Modifiers(_) => "modifiers",
            Value::Special(_) => "deferred value",
            Value::Opaque(_) => "opaque object",
        }
    }

    /// Description used in diagnostics and resolution chains
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => format!("{s:?}"),
            Value::Array(items) => format!("array[{}]", items.len()),
            Value::Object(object) => format!(
                "object{{{}}}",
                object.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            ),
            Value::Block(block) => block.describe(),
            Value::Module(module) => module.describe(),
            Value::Function(function) => format!("<function {}>", function.name()),
            Value::Modifiers(modifiers) => modifiers.to_string(),
            Value::Special(special) => special.describe(),
            Value::Opaque(opaque) => format!("<{}>", opaque.type_name()),
        }
    }

    /// The memoization slot of resolvables that are resolved at most once
    pub fn memo(&self) -> Option<&Memo> {
        match self {
            Value::Block(block) => Some(block.memo()),
            Value::Module(module) => Some(module.block().memo()),
            Value::Special(special) => special.memo(),
            _ => None,
        }
    }

    /// Whether this value (or anything nested in it) still needs resolution to become plain data
    pub fn is_unresolved(&self) -> bool {
        match self {
            Value::Block(_) | Value::Module(_) | Value::Special(_) => true,
            Value::Array(items) => items.iter().any(Value::is_unresolved),
            Value::Object(object) => object.values().any(Value::is_unresolved),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast a [Value::Special] to its concrete type
    pub fn special<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Special(special) => special.as_any().downcast_ref(),
            _ => None,
        }
    }

    /// Text used when the value is interpolated into a string
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(self).unwrap_or_else(|_| self.describe())
            }
            other => other.describe(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Decimal(_), Value::Integer(_) | Value::Decimal(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            (Value::Block(a), Value::Block(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Modifiers(a), Value::Modifiers(b)) => a == b,
            (Value::Special(a), Value::Special(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl From<hcl::Number> for Value {
    fn from(value: hcl::Number) -> Self {
        if let Some(int) = value.as_i64() {
            return Value::Integer(int);
        }

        // every hcl number is representable as a float
        Value::Decimal(value.as_f64().unwrap_or(f64::NAN))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<K: ToString, V: Into<Value>> From<IndexMap<K, V>> for Value {
    fn from(value: IndexMap<K, V>) -> Self {
        Value::Object(
            value
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<Modifiers> for Value {
    fn from(value: Modifiers) -> Self {
        Value::Modifiers(value)
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Value::Opaque(value)
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
            Value::Modifiers(modifiers) => {
                let mut ser = serializer.serialize_map(Some(modifiers.len()))?;
                for (key, value) in modifiers.iter() {
                    ser.serialize_entry(key, value)?;
                }
                ser.end()
            }
            Value::Function(_) | Value::Opaque(_) => serializer.serialize_str(&self.describe()),
            Value::Block(_) | Value::Module(_) | Value::Special(_) => Err(S::Error::custom(
                format!("cannot serialize unresolved value {}", self.describe()),
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integers_are_decimals() {
        assert_eq!(Value::Integer(12), Value::Decimal(12.0));
        assert_ne!(Value::Integer(12), Value::String("12".into()));
    }

    #[test]
    fn objects_compare_unordered() {
        let a: Value = IndexMap::from([("a", 1_i64), ("b", 2)]).into();
        let b: Value = IndexMap::from([("b", 2_i64), ("a", 1)]).into();
        assert_eq!(a, b);
    }

    #[test]
    fn serializes_plain_data() {
        let value: Value = IndexMap::from([
            ("name", Value::from("x")),
            ("sizes", Value::from(vec![1_i64, 2])),
            ("none", Value::Null),
        ])
        .into();

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            serde_json::json!({"name": "x", "sizes": [1, 2], "none": null})
        );
    }

    #[test]
    fn opaque_identity() {
        let a = Opaque::new("thing", 1_u8);
        let b = a.clone();
        assert_eq!(Value::from(a.clone()), Value::from(b));
        assert_ne!(Value::from(a), Value::from(Opaque::new("thing", 1_u8)));
    }
}
