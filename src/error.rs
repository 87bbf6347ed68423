//! Footprint errors.
//!
//! Only structural problems surface as errors: malformed definitions,
//! unreachable placeholders, runaway substitution and strict resolutions that
//! leave a mandatory attribute undefined. Ordinary mismatches found while
//! probing candidates are [`Diagnostic`]s attached to a failed outcome.

use crate::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FootprintError>;

#[derive(Debug, Error)]
pub enum FootprintError {
    #[error("could not replace `[{reference}]` in attribute `{attribute}`")]
    UnreachableAttr { attribute: String, reference: String },

    #[error("too many footprint replacements for `{attribute}` after {passes} passes")]
    TooManyPasses { attribute: String, passes: usize },

    #[error("bad format `%{spec}` for attribute `{attribute}`: {reason}")]
    BadFormat { attribute: String, spec: String, reason: String },

    #[error("no valid attribute `{attribute}` is fatal")]
    Fatal { attribute: String, diagnostics: Vec<Diagnostic> },

    #[error("invalid footprint definition for `{owner}`: {reason}")]
    InvalidDefinition { owner: String, reason: String },

    #[error("no such priority level `{0}`")]
    UnknownPriority(String),

    #[error("no frozen priority set tagged `{0}`")]
    UnknownFreeze(String),

    #[error("could not freeze a new default priority set")]
    FrozenDefault,

    #[error("no ambient defaults scope tagged `{0}`")]
    UnknownScope(String),

    #[error("attribute `{attribute}` of `{owner}` is not {mode}")]
    AccessDenied { owner: String, attribute: String, mode: &'static str },

    #[error("invalid range definition `{0}`")]
    InvalidRange(String),

    #[error("description expansion exceeds {limit} items")]
    ExpansionOverflow { limit: usize },
}
