//! error kinds
//!
//! Every failure is fatal to the current load/resolve call. The kinds below carry enough context
//! (target path, module name, resolvable description) to be rendered on their own, wrapping
//! variants keep the underlying cause available through [std::error::Error::source].
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Addressing(#[from] AddressingError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Promotion(#[from] PromotionError),
    #[error(transparent)]
    OverrideUsage(#[from] OverrideUsageError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Modifier(#[from] ModifierError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("failed to apply override `{source_text}` to `{target}`")]
    Override {
        target: String,
        source_text: String,
        #[source]
        source: Box<Error>,
    },
    #[error("failed to declare `{name}` in module `{module}` ({location})")]
    Declaration {
        module: String,
        name: String,
        location: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error of a wrapping chain
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Override { source, .. } | Error::Declaration { source, .. } => {
                source.root_cause()
            }
            Error::Resolution(ResolutionError::Nested { source, .. }) => source.root_cause(),
            other => other,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AddressingError {
    #[error("unable to parse variable path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("unsupported expression component in `{path}`: {component}")]
    UnsupportedComponent { path: String, component: String },
    #[error("invalid override `{source_text}`: {reason}")]
    InvalidOverride { source_text: String, reason: String },
    #[error("module reference `{0}` refers beyond the root package")]
    BeyondRoot(String),
    #[error("multiple overrides provided for target(s) `{}`", .0.join("`, `"))]
    DuplicateTargets(Vec<String>),
    #[error("no member `{step}` while walking `{path}`")]
    NoSuchMember { path: String, step: String },
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("expected a `*.solconf` file but received `{}`", .0.display())]
    InvalidSuffix(PathBuf),
    #[error("no such configuration file `{}`", .0.display())]
    NotFound(PathBuf),
    #[error("no package directory at `{}`", .0.display())]
    NotADirectory(PathBuf),
    #[error("package `{0}` is already initialized")]
    PackageExists(String),
    #[error("package `{0}` is not initialized")]
    UnknownPackage(String),
    #[error("no module `{name}` (expected at `{}`)", .path.display())]
    ModuleNotFound { name: String, path: PathBuf },
    #[error("module `{0}` was already loaded and cannot be reloaded with required values")]
    ReloadWithReqs(String),
    #[error("cannot assign reserved name `{name}` ({location})")]
    ReservedName { name: String, location: String },
    #[error("invalid declaration: {reason} ({location})")]
    InvalidDeclaration { reason: String, location: String },
    #[error("IO error reading `{}`", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse hcl file `{}`", .path.display())]
    HclParseFailed {
        path: PathBuf,
        #[source]
        source: hcl_edit::parser::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum PromotionError {
    #[error("module `{module}` promotes multiple members (`{}`)", .members.join("`, `"))]
    Multiple { module: String, members: Vec<String> },
    #[error("only module-scope members can be promoted but `{path}` in module `{module}` is nested")]
    NotRoot { module: String, path: String },
    #[error("module `{module}` cannot have both a promoted member (`{promoted}`) and a resolution target (`{resolves}`)")]
    PromotedAndResolves {
        module: String,
        promoted: String,
        resolves: String,
    },
    #[error("cannot promote the `submodule` overridable `{0}`, use `resolves` instead of `promoted` or `load` instead of `submodule`")]
    PromotedSubmodule(String),
}

#[derive(thiserror::Error, Debug)]
pub enum OverrideUsageError {
    #[error("could not apply the following overrides: {}", .0.join(", "))]
    Unused(Vec<String>),
    #[error("multiple overrides match target `{0}`")]
    Ambiguous(String),
    #[error("required values passed to module `{module}` match no `req()` member: {}", .reqs.join(", "))]
    UnusedReqs { module: String, reqs: Vec<String> },
}

#[derive(thiserror::Error, Debug)]
pub enum ResolutionError {
    #[error("missing values for required members `{}` of {resolvable}", .names.join("`, `"))]
    MissingRequired {
        resolvable: String,
        names: Vec<String>,
    },
    #[error("expected a single `{flag}` member but got multiple (`{}`) for {resolvable}", .names.join("`, `"))]
    AmbiguousSpecial {
        resolvable: String,
        flag: String,
        names: Vec<String>,
    },
    #[error("annotation with no value provided for `{flag}` member `{name}` of {resolvable}")]
    SpecialWithoutValue {
        resolvable: String,
        flag: String,
        name: String,
    },
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("module `{0}` cannot be resolved while it is still executing")]
    StillExecuting(String),
    #[error("`{0}` is not callable")]
    NotCallable(String),
    #[error("call to `{function}` failed: {message}")]
    CallFailed { function: String, message: String },
    #[error("cannot access `{step}` on resolved value {value}")]
    InvalidAccess { step: String, value: String },
    #[error("the error below occurred during the nested resolution `{}`", .chain.join("`, `"))]
    Nested {
        chain: Vec<String>,
        #[source]
        source: Box<Error>,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ModifierError {
    #[error("multiply-specified modifier `{0}`")]
    Conflict(String),
    #[error("invalid modifier key(s) `{}` for {resolvable}", .keys.join("`, `"))]
    InvalidKeys {
        resolvable: String,
        keys: Vec<String>,
    },
    #[error("expected all annotation components to be modifiers but only some are")]
    Mixed,
    #[error("annotation of `{0}` is not a modifier")]
    NotAModifier(String),
    #[error("modifier `{key}` expects {expected}")]
    InvalidValue { key: String, expected: &'static str },
}

#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("name `{0}` is not defined")]
    UndefinedName(String),
    #[error("unsupported expression component: {0}")]
    Unsupported(String),
    #[error("unsupported operand types for `{op}`: {lhs} and {rhs}")]
    BinaryOperands {
        op: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("bad operand type for `{op}`: {operand}")]
    UnaryOperand { op: &'static str, operand: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("expected {expected} but got {got}")]
    TypeMismatch { expected: &'static str, got: String },
    #[error("{value} has no member `{member}`")]
    NoMember { value: String, member: String },
    #[error("index {index} out of range for {value}")]
    IndexOutOfRange { index: i64, value: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{function}` expects {expected}")]
    Arity {
        function: String,
        expected: &'static str,
    },
    #[error("call to `{function}` failed: {message}")]
    CallFailed { function: String, message: String },
    #[error("invalid template")]
    Template(#[from] hcl::Error),
}
