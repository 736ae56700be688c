//! modifier annotations
//!
//! Members are annotated inside a `modifiers` block of the body that declares them:
//!
//! ```hcl
//! Model {
//!   kind = "linear"
//!   size = 3
//!   modifiers {
//!     kind = [as_type, cast(str)]
//!     size = name("width")
//!   }
//! }
//! ```
//!
//! Arrays of modifiers are merged, specifying the same key twice with different values is an
//! error.
use crate::error::ModifierError;
use crate::functions::Function;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

pub const NAME: &str = "name";
pub const HIDDEN: &str = "hidden";
pub const CAST: &str = "cast";
pub const AS_TYPE: &str = "as_type";
pub const AS_ARGS: &str = "as_args";
pub const NOID: &str = "noid";
pub const PROMOTED: &str = "promoted";
pub const RESOLVES: &str = "resolves";

/// Keys accepted on members of class-like blocks
pub const CLASS_KEYS: &[&str] = &[NAME, HIDDEN, CAST, AS_TYPE, AS_ARGS, NOID];
/// Keys accepted on module members
pub const MODULE_KEYS: &[&str] = &[NAME, HIDDEN, CAST, AS_TYPE, AS_ARGS, NOID, PROMOTED, RESOLVES];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers(IndexMap<String, Value>);

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The named built-in modifier constants available in configuration source
    pub fn builtin(name: &str) -> Option<Self> {
        let modifiers = match name {
            "hidden" => Self::new().with(HIDDEN, true),
            "visible" => Self::new().with(HIDDEN, false),
            "promoted" => Self::new().with(PROMOTED, true),
            "resolves" => Self::new().with(RESOLVES, true),
            "as_type" => Self::new().with(AS_TYPE, true).with(HIDDEN, false),
            "as_args" => Self::new().with(AS_ARGS, true).with(HIDDEN, false),
            "noid" => Self::new().with(NOID, true),
            _ => return None,
        };
        Some(modifiers)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge two modifiers, failing on keys specified with different values
    pub fn merge(&self, other: &Modifiers) -> Result<Self, ModifierError> {
        let mut out = self.clone();
        for (key, value) in other.iter() {
            match out.0.get(key) {
                Some(existing) if existing != value => {
                    return Err(ModifierError::Conflict(key.clone()))
                }
                _ => {
                    out.0.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Fill in keys missing from `self`
    pub fn with_defaults(mut self, defaults: &Modifiers) -> Self {
        for (key, value) in defaults.iter() {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }

    /// Interpret an evaluated annotation
    ///
    /// A modifier is returned as is, an array must consist of modifiers only and is merged.
    pub fn from_annotation(annotation: &Value) -> Result<Self, ModifierError> {
        match annotation {
            Value::Modifiers(modifiers) => Ok(modifiers.clone()),
            Value::Array(items) => {
                let modifiers = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Modifiers(modifiers) => Some(modifiers),
                        _ => None,
                    })
                    .collect::<Vec<_>>();

                if modifiers.len() != items.len() {
                    return Err(if modifiers.is_empty() {
                        ModifierError::NotAModifier(annotation.describe())
                    } else {
                        ModifierError::Mixed
                    });
                }

                modifiers
                    .into_iter()
                    .try_fold(Modifiers::new(), |out, next| out.merge(next))
            }
            other => Err(ModifierError::NotAModifier(other.describe())),
        }
    }

    /// Keys that are not part of `valid`
    pub fn invalid_keys(&self, valid: &[&str]) -> Vec<String> {
        self.keys()
            .filter(|key| !valid.contains(key))
            .map(str::to_string)
            .collect()
    }

    /// Whether a boolean modifier is set to `true`
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Boolean(true)))
    }

    pub fn is_hidden(&self) -> bool {
        self.flag(HIDDEN)
    }

    /// The output key of the annotated member
    pub fn rename(&self) -> Option<&str> {
        self.0.get(NAME).and_then(Value::as_str)
    }

    pub fn cast(&self) -> Option<&Function> {
        match self.0.get(CAST) {
            Some(Value::Function(function)) => Some(function),
            _ => None,
        }
    }
}

impl Display for Modifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("modifiers(")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={}", value.describe())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_conflicts() {
        let hidden = Modifiers::builtin("hidden").unwrap();
        let visible = Modifiers::builtin("visible").unwrap();
        let renamed = Modifiers::new().with(NAME, "x");

        let merged = hidden.merge(&renamed).unwrap();
        assert!(merged.is_hidden());
        assert_eq!(merged.rename(), Some("x"));

        assert!(matches!(
            hidden.merge(&visible),
            Err(ModifierError::Conflict(key)) if key == HIDDEN
        ));
        assert_eq!(hidden.merge(&hidden).unwrap(), hidden);
    }

    #[test]
    fn defaults_do_not_replace() {
        let explicit = Modifiers::builtin("as_type").unwrap();
        let extended = explicit.with_defaults(&Modifiers::new().with(HIDDEN, true));
        assert!(!extended.is_hidden());
        assert!(extended.flag(AS_TYPE));
    }

    #[test]
    fn annotations() {
        let array = Value::Array(vec![
            Modifiers::builtin("hidden").unwrap().into(),
            Modifiers::new().with(NAME, "y").into(),
        ]);
        let modifiers = Modifiers::from_annotation(&array).unwrap();
        assert_eq!(modifiers.keys().collect::<Vec<_>>(), vec![HIDDEN, NAME]);

        let mixed = Value::Array(vec![Modifiers::new().into(), Value::Integer(1)]);
        assert!(matches!(
            Modifiers::from_annotation(&mixed),
            Err(ModifierError::Mixed)
        ));
        assert!(matches!(
            Modifiers::from_annotation(&Value::Integer(1)),
            Err(ModifierError::NotAModifier(_))
        ));
    }

    #[test]
    fn invalid_keys() {
        let modifiers = Modifiers::builtin("promoted").unwrap().with(NAME, "x");
        assert_eq!(modifiers.invalid_keys(CLASS_KEYS), vec![PROMOTED.to_string()]);
        assert!(modifiers.invalid_keys(MODULE_KEYS).is_empty());
    }
}
