//! Error types.
//!
//! Errors are split by the phase that produces them:
//!
//! - **Definition time** (`ConstraintParseError`, `ActionParseError`,
//!   `RuleDefinitionError`, `RegistryError`, `LoadError`): raised while a rule
//!   store is being populated. The bulk loader skips rules that fail with
//!   `LoadError::RuleDefinition` and aborts on anything else.
//! - **Evaluation time** (`QueryError`): a malformed structural query is a rule
//!   authoring defect and is always propagated to the caller.
//! - **Surface** (`ConfigError`, `XmlError`, `SpeechError`): configuration and
//!   markup input handled by `config`, `dom` and `api`.

use thiserror::Error;

use crate::dynamic_cstr::Axis;
use crate::store::FunctionKind;

/// Failure to parse a dynamic constraint spec such as `"en.mathspeak.brief"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintParseError {
    #[error("constraint `{spec}` has {found} values but only {max} axes exist")]
    TooManyValues { spec: String, found: usize, max: usize },

    #[error("constraint `{spec}` has an empty value for axis `{axis}`")]
    EmptyValue { spec: String, axis: Axis },
}

/// Failure to parse the action program of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("empty action")]
    Empty,

    #[error("component `{0}` has no `[x]` directive tag")]
    MissingTag(String),

    #[error("unknown directive tag `[{0}]`")]
    UnknownTag(String),

    #[error("component `{0}` has no content")]
    MissingContent(String),

    #[error("unterminated string literal in `{0}`")]
    UnterminatedString(String),

    #[error("unbalanced parentheses in `{0}`")]
    UnbalancedParens(String),

    #[error("malformed attribute `{0}`")]
    MalformedAttribute(String),

    #[error("attribute `{key}` is not allowed on `[{tag}]`")]
    UnsupportedAttribute { tag: char, key: String },

    #[error("attribute `{key}` has invalid value `{value}`")]
    InvalidValue { key: String, value: String },
}

/// Reason a rule definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleErrorKind {
    #[error("rule name is empty")]
    EmptyName,

    #[error("query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Constraint(#[from] ConstraintParseError),

    #[error(transparent)]
    Action(#[from] ActionParseError),

    #[error("{kind} `{name}` is not registered")]
    UnknownFunction { kind: FunctionKind, name: String },
}

/// A malformed rule definition.
///
/// Carries the precondition query and the raw spec that failed so the loader
/// can log something a rule author can find.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule error {query} ({spec}): {kind}")]
pub struct RuleDefinitionError {
    pub query: String,
    pub spec: String,
    pub kind: RuleErrorKind,
}

/// Malformed structural query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("syntax error in `{expr}` at offset {offset}: {message}")]
    Syntax { expr: String, offset: usize, message: String },

    #[error("unknown function `{name}` in `{expr}`")]
    UnknownFunction { expr: String, name: String },

    #[error("function `{name}` in `{expr}` takes {expected} arguments, got {found}")]
    Arity { expr: String, name: String, expected: String, found: usize },

    #[error("unknown axis `{axis}` in `{expr}`")]
    UnknownAxis { expr: String, axis: String },
}

/// Registration of a named custom function was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} `{name}` is already registered")]
    Duplicate { kind: FunctionKind, name: String },

    #[error("{kind} `{name}` must start with `{prefix}`")]
    BadPrefix { kind: FunctionKind, name: String, prefix: &'static str },
}

/// Failure while populating a rule store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// A single malformed rule; the bulk loader logs it and continues.
    #[error(transparent)]
    RuleDefinition(#[from] RuleDefinitionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("no rule named `{name}` to alias")]
    UnknownRule { name: String },

    #[error("unknown rule set `{name}` for locale `{locale}`")]
    UnknownRuleSet { name: String, locale: String },
}

/// Failure to read or validate an `EngineConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Constraint(#[from] ConstraintParseError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Malformed markup handed to `Document::parse`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("XML error at offset {offset}: {message}")]
pub struct XmlError {
    pub offset: usize,
    pub message: String,
}

/// Anything that can go wrong between markup in and speech out.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
