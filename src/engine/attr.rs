//! Attribute contracts.
//!
//! An [`AttrSpec`] describes one footprint attribute: whether it is optional,
//! its default, the alternate names it may be supplied under, a remap table,
//! allowed (`values`) and forbidden (`outcast`) values, and the type the raw
//! value is coerced to.
//!
//! Every field is kept as *declared* (`Option`) rather than as its effective
//! value. This is what makes footprint inheritance work: when two levels
//! declare the same attribute, only the fields the more derived level actually
//! mentions override the base (see `footprint.rs`).
//!
//! ## Coercion
//!
//! ```text
//! raw value ──▶ accepts(type)? ──yes──▶ keep
//!                   │
//!                   no ──▶ coerce(raw, args) ──ok──▶ typed value
//!                                  └──err──▶ CoercionFailure diagnostic
//! ```
//!
//! Coercion is lenient towards strings since descriptions frequently come from
//! command lines or configuration files.

use crate::{Attributes, Value};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::sync::Arc;

bitflags::bitflags! {
    /// Access mode of an attribute on resolved instances.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXECUTE = 1 << 2;
        const DELETE  = 1 << 3;

        /// Read only (the default).
        const RXX = Self::READ.bits();
        /// Read-write-executable.
        const RWX = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
        /// Read-write, may be deleted.
        const RWD = Self::READ.bits() | Self::WRITE.bits() | Self::DELETE.bits();
    }
}

impl Access {
    /// Parse a three letter access mode (`rxx`, `rwx`, `rwd`, ...).
    pub fn parse(mode: &str) -> Option<Self> {
        let bytes = mode.as_bytes();
        if bytes.len() != 3 || bytes[0] != b'r' {
            return None;
        }
        let mut access = Access::READ;
        match bytes[1] {
            b'w' => access |= Access::WRITE,
            b'x' => {}
            _ => return None,
        }
        match bytes[2] {
            b'x' if access.contains(Access::WRITE) => access |= Access::EXECUTE,
            b'x' => {}
            b'd' => access |= Access::DELETE,
            _ => return None,
        }
        Some(access)
    }
}

impl Default for Access {
    fn default() -> Self {
        Access::RXX
    }
}

/// User supplied coercion target.
///
/// `args` are the constructor arguments declared on the attribute.
pub trait Coerce: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Whether `value` already has the expected shape.
    fn accepts(&self, value: &Value) -> bool;

    fn coerce(&self, value: &Value, args: &Attributes) -> Result<Value, String>;
}

/// Target type of an attribute.
#[derive(Debug, Clone)]
pub enum AttrType {
    Any,
    Str,
    Int,
    Float,
    Bool,
    Date,
    List(Box<AttrType>),
    Custom(Arc<dyn Coerce>),
}

/// Formats tried, in order, when a string is coerced to a date.
const DATE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

impl AttrType {
    pub fn name(&self) -> String {
        match self {
            AttrType::Any => "any".to_string(),
            AttrType::Str => "str".to_string(),
            AttrType::Int => "int".to_string(),
            AttrType::Float => "float".to_string(),
            AttrType::Bool => "bool".to_string(),
            AttrType::Date => "date".to_string(),
            AttrType::List(inner) => format!("list<{}>", inner.name()),
            AttrType::Custom(c) => c.name().to_string(),
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (AttrType::Any, _) => true,
            (AttrType::Str, Value::Str(_)) => true,
            (AttrType::Int, Value::Int(_)) => true,
            (AttrType::Float, Value::Float(_)) => true,
            (AttrType::Bool, Value::Bool(_)) => true,
            (AttrType::Date, Value::Date(_)) => true,
            (AttrType::List(inner), Value::List(items)) => items.iter().all(|item| inner.accepts(item)),
            (AttrType::Custom(c), v) => c.accepts(v),
            _ => false,
        }
    }

    /// Whether every value accepted by `previous` is also accepted by `self`.
    ///
    /// Used to flag inconsistent redeclarations along an inheritance chain.
    pub(crate) fn refines(&self, previous: &AttrType) -> bool {
        match (self, previous) {
            (_, AttrType::Any) | (AttrType::Any, _) => true,
            (AttrType::List(a), AttrType::List(b)) => a.refines(b),
            (AttrType::Custom(a), AttrType::Custom(b)) => a.name() == b.name(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }

    pub fn coerce(&self, value: &Value, args: &Attributes) -> Result<Value, String> {
        if self.accepts(value) {
            return Ok(value.clone());
        }
        match self {
            AttrType::Any => Ok(value.clone()),
            AttrType::Str => match value {
                Value::Null | Value::Object(_) => Err(format!("cannot make a str out of {}", value.type_name())),
                other => Ok(Value::Str(other.to_string())),
            },
            AttrType::Int => coerce_int(value, args),
            AttrType::Float => match value {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
                other => Err(format!("cannot make a float out of {}", other.type_name())),
            },
            AttrType::Bool => match value {
                Value::Int(0) => Ok(Value::Bool(false)),
                Value::Int(1) => Ok(Value::Bool(true)),
                Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                    "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                    _ => Err(format!("`{s}` is not a boolean")),
                },
                other => Err(format!("cannot make a bool out of {}", other.type_name())),
            },
            AttrType::Date => coerce_date(value, args),
            AttrType::List(inner) => {
                let items: Vec<Value> = match value {
                    Value::Str(s) => s.split(',').map(|item| Value::Str(item.trim().to_string())).collect(),
                    Value::List(items) => items.clone(),
                    Value::Null => return Err("cannot make a list out of null".to_string()),
                    scalar => vec![scalar.clone()],
                };
                items.iter().map(|item| inner.coerce(item, args)).collect::<Result<Vec<_>, _>>().map(Value::List)
            }
            AttrType::Custom(c) => c.coerce(value, args),
        }
    }
}

fn coerce_int(value: &Value, args: &Attributes) -> Result<Value, String> {
    let base = match args.get("base") {
        Some(Value::Int(b)) if (2..=36).contains(b) => *b as u32,
        Some(other) => return Err(format!("invalid int base `{other}`")),
        None => 10,
    };
    match value {
        Value::Str(s) => i64::from_str_radix(s.trim(), base).map(Value::Int).map_err(|e| e.to_string()),
        Value::Float(x) if x.fract() == 0.0 => Ok(Value::Int(*x as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        other => Err(format!("cannot make an int out of {} `{other}`", other.type_name())),
    }
}

fn coerce_date(value: &Value, args: &Attributes) -> Result<Value, String> {
    let raw = match value {
        Value::Str(s) => s.trim().to_string(),
        Value::Int(i) => i.to_string(),
        other => return Err(format!("cannot make a date out of {}", other.type_name())),
    };
    if let Some(Value::Str(fmt)) = args.get("format") {
        return parse_date_with(&raw, fmt).ok_or_else(|| format!("`{raw}` does not match `{fmt}`"));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .or_else(|| compact_date(&raw))
        .map(Value::Date)
        .ok_or_else(|| format!("`{raw}` is not a date"))
}

fn parse_date_with(raw: &str, fmt: &str) -> Option<Value> {
    NaiveDateTime::parse_from_str(raw, fmt)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, fmt).ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
        .map(Value::Date)
}

/// `YYYY-MM-DD` and the all-digits `YYYYMMDD[HH[MM]]` forms. chrono reads `%Y`
/// greedily, so digit runs are split by hand.
fn compact_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| raw.get(range)?.parse::<u32>().ok();
    let day = NaiveDate::from_ymd_opt(raw.get(..4)?.parse().ok()?, field(4..6)?, field(6..8)?)?;
    match raw.len() {
        8 => day.and_hms_opt(0, 0, 0),
        10 => day.and_hms_opt(field(8..10)?, 0, 0),
        12 => day.and_hms_opt(field(8..10)?, field(10..12)?, 0),
        _ => None,
    }
}

/// One attribute of a footprint, as declared.
///
/// Built with chained setters, usually through the [`attr!`](crate::attr)
/// macro:
///
/// ```
/// use footprints::{attr, AttrType};
///
/// let size = attr!(size, ty: AttrType::Int, optional: true, default: 10);
/// assert!(size.is_optional());
/// ```
#[derive(Debug, Clone)]
pub struct AttrSpec {
    name: String,
    info: Option<String>,
    optional: Option<bool>,
    default: Option<Value>,
    alias: Vec<String>,
    remap: Vec<(Value, Value)>,
    remap_first: bool,
    values: Option<Vec<Value>>,
    outcast: Option<Vec<Value>>,
    ty: Option<AttrType>,
    args: Attributes,
    access: Option<Access>,
}

impl AttrSpec {
    pub fn new(name: impl Into<String>) -> Self {
        AttrSpec {
            name: name.into(),
            info: None,
            optional: None,
            default: None,
            alias: Vec::new(),
            remap: Vec::new(),
            remap_first: false,
            values: None,
            outcast: None,
            ty: None,
            args: Attributes::new(),
            access: None,
        }
    }

    // --- Declaration -----------------------------------------------------------

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn alias<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.alias.contains(&name) {
                self.alias.push(name);
            }
        }
        self
    }

    pub fn remap<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        for (from, to) in entries {
            self.set_remap(from.into(), to.into());
        }
        self
    }

    /// Remap every declared value after the first one onto the first.
    pub fn remap_first(mut self, enabled: bool) -> Self {
        self.remap_first = enabled;
        self
    }

    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn outcast<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.outcast = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn ty(mut self, ty: AttrType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn args<I, K, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (k, v) in args {
            self.args.insert(k.into(), v.into());
        }
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    fn set_remap(&mut self, from: Value, to: Value) {
        match self.remap.iter_mut().find(|(k, _)| *k == from) {
            Some(entry) => entry.1 = to,
            None => self.remap.push((from, to)),
        }
    }

    // --- Effective view --------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.alias
    }

    pub fn allowed(&self) -> Option<&[Value]> {
        self.values.as_deref()
    }

    pub fn excluded(&self) -> Option<&[Value]> {
        self.outcast.as_deref()
    }

    pub fn attr_type(&self) -> Option<&AttrType> {
        self.ty.as_ref()
    }

    pub fn constructor_args(&self) -> &Attributes {
        &self.args
    }

    pub fn access_mode(&self) -> Access {
        self.access.unwrap_or_default()
    }

    /// Whether `key` names this attribute, canonically or through an alias.
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.alias.iter().any(|a| a == key)
    }

    /// Next value in the remap chain, if `value` is a remap key.
    pub(crate) fn remapped(&self, value: &Value) -> Option<&Value> {
        if let Some((_, to)) = self.remap.iter().find(|(from, _)| from == value) {
            return Some(to);
        }
        if self.remap_first {
            let values = self.values.as_deref()?;
            let (first, rest) = values.split_first()?;
            if rest.contains(value) && first != value {
                return Some(first);
            }
        }
        None
    }

    pub(crate) fn remap_len(&self) -> usize {
        self.remap.len() + if self.remap_first { self.values.as_ref().map_or(0, Vec::len) } else { 0 }
    }

    // --- Inheritance -----------------------------------------------------------

    /// Overlay the fields `later` declares on top of `self`.
    ///
    /// Scalars (`optional`, `default`, `values`, `outcast`, `type`, `access`)
    /// are replaced; `alias`, `remap` and `args` are merged entry by entry.
    pub(crate) fn absorb(&mut self, later: &AttrSpec) {
        if later.info.is_some() {
            self.info.clone_from(&later.info);
        }
        if later.optional.is_some() {
            self.optional = later.optional;
        }
        if later.default.is_some() {
            self.default.clone_from(&later.default);
        }
        if later.values.is_some() {
            self.values.clone_from(&later.values);
        }
        if later.outcast.is_some() {
            self.outcast.clone_from(&later.outcast);
        }
        if later.ty.is_some() {
            self.ty.clone_from(&later.ty);
        }
        if later.access.is_some() {
            self.access = later.access;
        }
        self.remap_first |= later.remap_first;
        for a in &later.alias {
            if !self.alias.contains(a) {
                self.alias.push(a.clone());
            }
        }
        for (from, to) in &later.remap {
            self.set_remap(from.clone(), to.clone());
        }
        for (k, v) in &later.args {
            self.args.insert(k.clone(), v.clone());
        }
    }

    /// Validate the effective declaration and coerce `values` / `outcast` to
    /// the declared type.
    pub(crate) fn check(&mut self) -> Result<(), String> {
        if !self.is_optional() && self.default.as_ref().is_some_and(|d| !d.is_null()) {
            return Err(format!("mandatory attribute `{}` carries a default", self.name));
        }
        let Some(ty) = self.ty.clone() else {
            return Ok(());
        };
        for (label, set) in [("values", &mut self.values), ("outcast", &mut self.outcast)] {
            if let Some(items) = set.as_mut() {
                for item in items.iter_mut() {
                    if !ty.accepts(item) {
                        *item = ty
                            .coerce(item, &self.args)
                            .map_err(|e| format!("bad {label} item `{item}` for `{}`: {e}", self.name))?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_modes_parse() {
        assert_eq!(Access::parse("rxx"), Some(Access::RXX));
        assert_eq!(Access::parse("rwx"), Some(Access::RWX));
        assert_eq!(Access::parse("rwd"), Some(Access::RWD));
        assert_eq!(Access::parse("wxx"), None);
        assert!(Access::default().contains(Access::READ));
        assert!(!Access::default().contains(Access::WRITE));
    }

    #[test]
    fn coercions_from_strings() {
        let args = Attributes::new();
        assert_eq!(AttrType::Int.coerce(&"798".into(), &args), Ok(Value::Int(798)));
        assert!(AttrType::Int.coerce(&"abc".into(), &args).is_err());
        assert_eq!(AttrType::Float.coerce(&"1.5".into(), &args), Ok(Value::Float(1.5)));
        assert_eq!(AttrType::Bool.coerce(&"Yes".into(), &args), Ok(Value::Bool(true)));
        assert_eq!(AttrType::Str.coerce(&Value::Int(2), &args), Ok(Value::Str("2".into())));

        let list = AttrType::List(Box::new(AttrType::Int)).coerce(&"1, 2,3".into(), &args);
        assert_eq!(list, Ok(Value::from(vec![1, 2, 3])));
    }

    #[test]
    fn int_base_argument() {
        let args: Attributes = [("base".to_string(), Value::Int(16))].into_iter().collect();
        assert_eq!(AttrType::Int.coerce(&"ff".into(), &args), Ok(Value::Int(255)));
    }

    #[test]
    fn dates_from_compact_forms() {
        let args = Attributes::new();
        let expected = NaiveDate::from_ymd_opt(2013, 2, 12).unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(AttrType::Date.coerce(&"2013021206".into(), &args), Ok(Value::Date(expected)));
        assert_eq!(AttrType::Date.coerce(&Value::Int(2013021206), &args), Ok(Value::Date(expected)));
        assert_eq!(AttrType::Date.coerce(&"2013-02-12T06:00:00".into(), &args), Ok(Value::Date(expected)));
        assert!(AttrType::Date.coerce(&"20131345".into(), &args).is_err());
    }

    #[test]
    fn absorb_overrides_scalars_and_merges_tables() {
        let mut base = AttrSpec::new("kind").values(["a", "b"]).alias(["k"]).remap([("x", "a")]);
        let derived = AttrSpec::new("kind").values(["c"]).alias(["sort"]).remap([("y", "c")]);
        base.absorb(&derived);

        assert_eq!(base.allowed(), Some(&[Value::from("c")][..]));
        assert_eq!(base.aliases(), &["k".to_string(), "sort".to_string()]);
        assert_eq!(base.remapped(&"x".into()), Some(&Value::from("a")));
        assert_eq!(base.remapped(&"y".into()), Some(&Value::from("c")));
    }

    #[test]
    fn check_rejects_mandatory_default() {
        let mut spec = AttrSpec::new("kind").default("a");
        assert!(spec.check().is_err());

        let mut spec = AttrSpec::new("kind").optional(true).default("a");
        assert!(spec.check().is_ok());
    }

    #[test]
    fn check_reclasses_values() {
        let mut spec = AttrSpec::new("term").ty(AttrType::Int).values(["0", "6", "12"]);
        spec.check().unwrap();
        assert_eq!(spec.allowed(), Some(&[Value::Int(0), Value::Int(6), Value::Int(12)][..]));

        let mut spec = AttrSpec::new("term").ty(AttrType::Int).values(["zero"]);
        assert!(spec.check().is_err());
    }

    #[test]
    fn remap_first_points_to_first_value() {
        let spec = AttrSpec::new("model").values(["arpege", "arp", "france"]).remap_first(true);
        assert_eq!(spec.remapped(&"arp".into()), Some(&Value::from("arpege")));
        assert_eq!(spec.remapped(&"arpege".into()), None);
    }
}
