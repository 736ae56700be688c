//! declaration block resolution
//!
//! A block resolves to the mapping of its visible members, or to the result of calling its
//! `as_type` member with the `as_args` member as positional arguments and the visible members as
//! keyword arguments.
//!
//! Members are gathered from the block and its bases (most-base first) and annotated with their
//! explicit modifiers. Members without an explicit `hidden` modifier are hidden when their name is
//! dunder-style (`__name__`) or they were declared in an `import` block.
use super::{Resolution, Resolver};
use crate::error::{ModifierError, ResolutionError, Result};
use crate::functions::{Function, Functions, Kwargs};
use crate::modifiers::{Modifiers, AS_ARGS, AS_TYPE, CLASS_KEYS, HIDDEN};
use crate::module::Block;
use crate::overrides::Required;
use crate::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;

/// Members with these flags take part in instantiation but are not keyword arguments
pub const CLASS_SPECIALS: &[&str] = &[AS_TYPE, AS_ARGS];

#[derive(Debug)]
pub struct Member {
    pub name: String,
    pub value: Value,
    pub modifiers: Modifiers,
}

impl Member {
    /// Output key, honoring the `name` modifier
    pub fn output_name(&self) -> &str {
        self.modifiers.rename().unwrap_or(&self.name)
    }
}

/// The members and annotations of a block, ready for instantiation
#[derive(Debug)]
pub struct Gathered {
    pub resolvable: String,
    pub members: IndexMap<String, Member>,
    pub annotations: IndexMap<String, Modifiers>,
}

impl Gathered {
    pub fn gather(block: &Block, valid_keys: &[&str]) -> Result<Self> {
        let resolvable = block.describe();
        let annotations = block.all_annotations();

        let invalid = annotations
            .values()
            .flat_map(|modifiers| modifiers.invalid_keys(valid_keys))
            .collect::<Vec<_>>();
        if !invalid.is_empty() {
            return Err(ModifierError::InvalidKeys {
                resolvable,
                keys: invalid,
            }
            .into());
        }

        let mut members = IndexMap::new();
        for (name, value) in block.all_members() {
            let defaults = Modifiers::new().with(
                HIDDEN,
                is_dunder(&name) || block.is_default_hidden(&name),
            );
            let modifiers = annotations
                .get(&name)
                .cloned()
                .unwrap_or_default()
                .with_defaults(&defaults);

            let value = match modifiers.cast() {
                Some(cast) => apply_cast(cast, value)?,
                None => value,
            };

            members.insert(
                name.clone(),
                Member {
                    name,
                    value,
                    modifiers,
                },
            );
        }

        Ok(Self {
            resolvable,
            members,
            annotations,
        })
    }

    /// The single member annotated with the flag `flag`, if any
    pub fn special(&self, flag: &str) -> Result<Option<&Member>> {
        let names = self
            .annotations
            .iter()
            .filter(|(_, modifiers)| modifiers.flag(flag))
            .map(|(name, _)| name)
            .collect::<Vec<_>>();

        match names.as_slice() {
            [] => Ok(None),
            [name] => match self.members.get(*name) {
                Some(member) => Ok(Some(member)),
                None => Err(ResolutionError::SpecialWithoutValue {
                    resolvable: self.resolvable.clone(),
                    flag: flag.to_string(),
                    name: name.to_string(),
                }
                .into()),
            },
            _ => Err(ResolutionError::AmbiguousSpecial {
                resolvable: self.resolvable.clone(),
                flag: flag.to_string(),
                names: names.into_iter().cloned().collect(),
            }
            .into()),
        }
    }

    /// Members that become keyword arguments or mapping entries
    pub fn visible<'a>(&'a self, specials: &'a [&'a str]) -> impl Iterator<Item = &'a Member> + 'a {
        self.members.values().filter(move |member| {
            !member.modifiers.is_hidden()
                && !specials.iter().any(|flag| member.modifiers.flag(flag))
        })
    }

    /// Fail listing all visible members that still hold a required placeholder
    pub fn check_required(&self, specials: &[&str]) -> Result<()> {
        let missing = self
            .visible(specials)
            .filter_map(|member| {
                member
                    .value
                    .special::<Required>()
                    .map(|required| required.var_path().unwrap_or(&member.name).to_string())
            })
            .collect::<Vec<_>>();

        if missing.is_empty() {
            return Ok(());
        }
        Err(ResolutionError::MissingRequired {
            resolvable: self.resolvable.clone(),
            names: missing,
        }
        .into())
    }

    /// Build the mapping of visible members or call the `as_type` member
    pub fn instantiate(&self, resolution: &mut Resolution, specials: &[&str]) -> Result<Value> {
        self.check_required(specials)?;
        let as_type = self.special(AS_TYPE)?;
        let as_args = self.special(AS_ARGS)?;

        let mut kwargs = Kwargs::new();
        for member in self.visible(specials) {
            kwargs.insert(
                member.output_name().to_string(),
                resolution.resolve(&member.value)?,
            );
        }

        let Some(as_type) = as_type else {
            return Ok(Value::Object(kwargs));
        };

        let function = callable(&resolution.resolve(&as_type.value)?, resolution.functions())?;
        let args = match as_args {
            Some(member) => match resolution.resolve(&member.value)? {
                Value::Array(args) => args,
                other => {
                    return Err(ResolutionError::CallFailed {
                        function: function.name().to_string(),
                        message: format!(
                            "positional arguments `{}` must be an array, got {}",
                            member.name,
                            other.type_name()
                        ),
                    }
                    .into())
                }
            },
            None => vec![],
        };

        tracing::trace!(function = function.name(), resolvable = %self.resolvable, "instantiating");
        function.call(&args, &kwargs).map_err(|message| {
            ResolutionError::CallFailed {
                function: function.name().to_string(),
                message,
            }
            .into()
        })
    }
}

/// A native function value or the name of a registered one
pub(crate) fn callable(value: &Value, functions: &Functions) -> Result<Function> {
    match value {
        Value::Function(function) => Ok(function.clone()),
        Value::String(name) => functions
            .get(name)
            .cloned()
            .ok_or_else(|| ResolutionError::NotCallable(name.clone()).into()),
        other => Err(ResolutionError::NotCallable(other.describe()).into()),
    }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Cast plain values right away, defer the cast of unresolved ones
fn apply_cast(cast: &Function, value: Value) -> Result<Value> {
    if value.special::<Required>().is_some() {
        return Ok(value);
    }

    if value.is_unresolved() {
        return Ok(Value::Special(Rc::new(super::special::DeferredCall::new(
            Value::Function(cast.clone()),
            vec![value],
            Kwargs::new(),
        ))));
    }

    cast.call(&[value], &Kwargs::new()).map_err(|message| {
        ResolutionError::CallFailed {
            function: cast.name().to_string(),
            message,
        }
        .into()
    })
}

pub struct ClassResolver;

impl Resolver for ClassResolver {
    fn name(&self) -> &'static str {
        "block"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Block(_))
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Value::Block(block) = value else {
            unreachable!("checked by can_handle")
        };

        Gathered::gather(block, CLASS_KEYS)?.instantiate(resolution, CLASS_SPECIALS)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use crate::modifiers::NAME;
    use crate::resolve::Registry;
    use crate::value::Opaque;
    use pretty_assertions::assert_eq;

    fn block(members: &[(&str, Value)]) -> Rc<Block> {
        let block = Rc::new(Block::new("B", "B", "pkg.main", vec![]));
        for (name, value) in members {
            block.set(name, value.clone());
        }
        block
    }

    #[test]
    fn visible_members_with_renames() {
        let block = block(&[
            ("a", Value::Integer(1)),
            ("b", Value::Integer(2)),
            ("__meta__", Value::Integer(3)),
            ("helper", Value::Integer(4)),
        ]);
        block
            .annotate("b", Modifiers::new().with(NAME, "renamed"))
            .unwrap();
        block.hide_by_default("helper");

        let resolved = Registry::default().resolve(&Value::Block(block)).unwrap();
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            serde_json::json!({"a": 1, "renamed": 2})
        );
    }

    #[test]
    fn explicit_modifiers_win_over_defaults() {
        let block = block(&[("helper", Value::Integer(4))]);
        block.hide_by_default("helper");
        block
            .annotate("helper", Modifiers::builtin("visible").unwrap())
            .unwrap();

        let resolved = Registry::default().resolve(&Value::Block(block)).unwrap();
        assert_eq!(resolved, IndexMap::from([("helper", 4_i64)]).into());
    }

    #[test]
    fn instantiates_as_type() {
        let mut functions = Functions::default();
        functions.register("point", |args, kwargs| {
            Ok(Opaque::new("point", (args.len(), kwargs.keys().cloned().collect::<Vec<_>>())).into())
        });
        let registry = Registry::new(functions);

        let block = block(&[
            ("kind", Value::from("point")),
            ("args", Value::from(vec![1_i64, 2])),
            ("x", Value::Integer(3)),
        ]);
        block
            .annotate("kind", Modifiers::builtin("as_type").unwrap())
            .unwrap();
        block
            .annotate("args", Modifiers::builtin("as_args").unwrap())
            .unwrap();

        let value = Value::Block(block);
        let resolved = registry.resolve(&value).unwrap();
        let Value::Opaque(point) = &resolved else {
            panic!("expected an opaque value, got {resolved:?}");
        };
        assert_eq!(
            point.downcast_ref::<(usize, Vec<String>)>(),
            Some(&(2, vec!["x".to_string()]))
        );

        // memoized, the same instance is returned
        assert_eq!(registry.resolve(&value).unwrap(), resolved);
    }

    #[test]
    fn casts_members() {
        let block = block(&[("n", Value::from("12"))]);
        block
            .annotate(
                "n",
                Modifiers::new().with(crate::modifiers::CAST, Functions::default().get("int").unwrap().clone()),
            )
            .unwrap();

        let resolved = Registry::default().resolve(&Value::Block(block)).unwrap();
        assert_eq!(resolved, IndexMap::from([("n", 12_i64)]).into());
    }

    #[test]
    fn special_member_errors() {
        let block = block(&[("a", Value::from("int")), ("b", Value::from("str"))]);
        block
            .annotate("a", Modifiers::builtin("as_type").unwrap())
            .unwrap();
        block
            .annotate("b", Modifiers::builtin("as_type").unwrap())
            .unwrap();
        block
            .annotate("c", Modifiers::builtin("as_args").unwrap())
            .unwrap();

        let gathered = Gathered::gather(&block, CLASS_KEYS).unwrap();
        assert!(matches!(
            gathered.special(AS_TYPE),
            Err(Error::Resolution(ResolutionError::AmbiguousSpecial { names, .. })) if names == vec!["a", "b"]
        ));
        assert!(matches!(
            gathered.special(AS_ARGS),
            Err(Error::Resolution(ResolutionError::SpecialWithoutValue { name, .. })) if name == "c"
        ));
    }

    #[test]
    fn invalid_keys() {
        let block = block(&[("a", Value::Integer(1))]);
        block
            .annotate("a", Modifiers::builtin("promoted").unwrap())
            .unwrap();

        assert!(matches!(
            Gathered::gather(&block, CLASS_KEYS),
            Err(Error::Modifier(ModifierError::InvalidKeys { keys, .. })) if keys == vec!["promoted"]
        ));
    }

    #[test]
    fn missing_required_collects_all() {
        let block = block(&[
            ("a", Value::Special(Rc::new(Required::new()))),
            ("b", Value::Integer(1)),
            ("c", Value::Special(Rc::new(Required::new()))),
        ]);

        let err = Registry::default()
            .resolve(&Value::Block(block))
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Error::Resolution(ResolutionError::MissingRequired { names, .. }) if names == &vec!["a", "c"]
        ));
    }
}
