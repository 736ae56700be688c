//! # solconf - overridable configuration modules
//!
//! ## Introduction for developers
//!
//! Read this to understand how `solconf` works internally.
//!
//! ### Configuration files
//!
//! A configuration is a tree of modules. Each module is one `.solconf` file, an HCL body:
//!
//! ```hcl
//! # attributes declare members
//! lr = 0.1
//! model = load(".model", { reqs = { size = 3 } })
//!
//! # blocks declare class-like members, labels name base blocks
//! Optimizer {
//!   kind = "sgd"
//!   rate = lr * 2
//! }
//!
//! Tuned Optimizer {
//!   rate = 0.5
//! }
//!
//! modifiers {
//!   Tuned = promoted
//! }
//! ```
//!
//! The pre-processor ([source::ModuleSource]) turns a body into a list of [source::Statement]s
//! and extracts what has to be known before the module executes, most importantly the member
//! annotated `promoted`.
//!
//! ### Loading
//!
//! [loader::LoaderContext] maps absolute module names to files below a package root, caches loaded
//! modules and executes each one once. Executing a module ([eval::Interpreter]) evaluates every
//! declaration and passes the result through the override engine before storing it in the
//! enclosing [module::Block].
//!
//! ### Addressing and overrides
//!
//! Overrides are written as `path = expression` ([overrides::parse_overrides]). A path
//! ([var_path::VarPath]) is relative to the root configuration, so every module knows where it
//! sits: the loader passes each submodule the path of the declaration that loaded it.
//!
//! | **declaration**                        | **path**         |
//! |----------------------------------------|------------------|
//! | `lr` in the root module                | `lr`             |
//! | `rate` in block `Optimizer`            | `Optimizer.rate` |
//! | `size` in the module loaded as `model` | `model.size`     |
//!
//! A promoted member stands for its module, its name is skipped: with `Tuned` promoted, `rate`
//! in `Tuned` is addressed as `rate` (or `model.rate` when the module is loaded as `model`).
//!
//! Every override must be applied while loading, unused overrides fail the load.
//!
//! ### Resolution
//!
//! Loading produces a graph of blocks, modules and deferred values. [resolve::Registry] turns it
//! into plain [value::Value]s (or whatever native constructors return). Results of blocks and
//! modules are memoized, so a block referenced twice resolves to the same value.
//!
//! ### Output
//!
//! Resolved values serialize via [serde].
//!
pub mod error;
pub mod eval;
pub mod functions;
pub mod loader;
pub mod modifiers;
pub mod module;
pub mod overrides;
pub mod resolve;
pub mod source;
pub mod util;
pub mod value;
pub mod var_path;
mod visit;

pub use error::{Error, Result};
pub use loader::{load_config, ConfigOptions, LoaderContext};
pub use overrides::OverrideSpec;
pub use value::Value;
