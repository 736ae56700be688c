//! module resolution
//!
//! A module resolves like a declaration block, except that a member annotated `promoted` or
//! `resolves` stands for the whole module. A module cannot have both.
//!
//! A module that is still executing has no final member table yet, resolving it is an error.
use super::class::Gathered;
use super::{Resolution, Resolver};
use crate::error::{PromotionError, ResolutionError, Result};
use crate::modifiers::{AS_ARGS, AS_TYPE, MODULE_KEYS, PROMOTED, RESOLVES};
use crate::module::{ExecState, Module};
use crate::value::Value;

pub const MODULE_SPECIALS: &[&str] = &[AS_TYPE, AS_ARGS, PROMOTED, RESOLVES];

pub struct ModuleResolver;

impl ModuleResolver {
    fn resolve_module(module: &Module, resolution: &mut Resolution) -> Result<Value> {
        if module.state() == ExecState::Executing {
            return Err(ResolutionError::StillExecuting(module.name().to_string()).into());
        }

        let gathered = Gathered::gather(module.block(), MODULE_KEYS)?;

        let target = match (gathered.special(PROMOTED)?, gathered.special(RESOLVES)?) {
            (Some(promoted), Some(resolves)) => {
                return Err(PromotionError::PromotedAndResolves {
                    module: module.name().to_string(),
                    promoted: promoted.name.clone(),
                    resolves: resolves.name.clone(),
                }
                .into())
            }
            (Some(member), None) | (None, Some(member)) => member,
            (None, None) => return gathered.instantiate(resolution, MODULE_SPECIALS),
        };

        tracing::trace!(module = module.name(), member = %target.name, "resolving module through member");
        resolution.resolve(&target.value)
    }
}

impl Resolver for ModuleResolver {
    fn name(&self) -> &'static str {
        "module"
    }

    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Module(_))
    }

    fn compute_resolved(&self, value: &Value, resolution: &mut Resolution) -> Result<Value> {
        let Value::Module(module) = value else {
            unreachable!("checked by can_handle")
        };

        Self::resolve_module(module, resolution)
    }
}
