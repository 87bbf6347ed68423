extern crate self as footprints;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[macro_use]
mod macros;
mod api;
pub mod catalog;
mod engine;
mod error;
pub mod util;

pub use api::{Context, Options, mandatory, resolve};
pub use engine::{
    Access, AmbientDefaults, AttrEntry, AttrSpec, AttrType, Candidate, CandidateDecl, CandidateReport, Coerce,
    Collector, Couldbe, DEFAULT_COLLECTOR, DEFAULT_LEVEL, Diagnostic, Failure, Footprint, IDENTITY_KEY, Identity,
    Instance, OnlyValue, Outcome, Position, PrioritySet, Registry, Report, Resolution, STANDARD, Scope, Selection,
    Verdict, Why,
};
pub use error::{FootprintError, Result};

/// Flat name → value mapping used for descriptions, resolved attributes and extras.
pub type Attributes = IndexMap<String, Value>;

// --- Values -----------------------------------------------------------------

/// A dynamically typed attribute value.
///
/// Descriptions are untyped: a caller may hand over raw strings (possibly with
/// `[name]` placeholders) that resolution later coerces to the declared
/// [`AttrType`]. `Object` carries anything implementing [`Lookup`], most
/// notably already resolved [`Instance`]s and the ambient [`Identity`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDateTime),
    List(Vec<Value>),
    Object(Arc<dyn Lookup>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Lookup>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Short name of the runtime shape, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Ordering used by `after_` / `before_` applicability rules.
    ///
    /// Only values of comparable shapes are ordered; ints and floats compare
    /// numerically with each other.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float()?.partial_cmp(&other.as_float()?)
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => self.as_float() == other.as_float(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
            Value::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Object(obj) => f.write_str(obj.name()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Lookup + 'static> From<Arc<T>> for Value {
    fn from(obj: Arc<T>) -> Self {
        Value::Object(obj)
    }
}

// --- Object lookups -----------------------------------------------------------

/// Result of a `[name:member]` lookup on an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// The member exists and produced a value.
    Value(Value),
    /// No such member; the substituted attribute becomes null.
    Absent,
    /// The member exists but computing it failed.
    Failed(String),
}

/// An object usable as a description value or as an extra.
///
/// `member` is the hook behind `[name:member]` placeholders: besides plain
/// attribute access it may compute a value from the current resolution
/// [`Scope`] (the guess under construction and the extras).
pub trait Lookup: fmt::Debug + Send + Sync {
    /// Name used when the object is rendered into a string.
    fn name(&self) -> &str;

    /// Flat attribute view merged into the extras when this object appears as
    /// a description value. Plain objects return `None`.
    fn attributes(&self) -> Option<Attributes> {
        None
    }

    fn member(&self, member: &str, scope: &Scope<'_>) -> Member;
}

/// Build a description from `key => value` pairs.
///
/// ```
/// use footprints::{desc, Value};
///
/// let d = desc! { "kind" => "a", "size" => 3 };
/// assert_eq!(d["size"], Value::Int(3));
/// ```
#[macro_export]
macro_rules! desc {
    () => { $crate::Attributes::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::Attributes::new();
        $(d.insert(($key).to_string(), $crate::Value::from($value));)+
        d
    }};
}
