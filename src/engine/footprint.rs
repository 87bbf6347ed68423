//! Footprints: declarative attribute schemas.
//!
//! A [`Footprint`] is an ordered set of [`AttrSpec`]s plus some metadata:
//!
//! - `info`: documentation string.
//! - `priority`: a level tag ranked by a [`PrioritySet`](super::PrioritySet).
//! - `bind`: groups of attributes meant to be resolved together (advisory).
//! - `only`: applicability rules checked against the resolved attributes (or
//!   the ambient defaults) once resolution succeeds.
//!
//! ## Inheritance
//!
//! Footprints compose by explicit merging, computed once when a candidate is
//! declared:
//!
//! ```text
//! base ──┐
//! mixin ─┼─ Footprint::merge ──▶ merged (immutable)
//! own ───┘   later layers override same-named fields
//! ```
//!
//! Attributes only present in an ancestor always survive the merge. The merge
//! keeps the *declared* shape of every field, so merging already merged
//! footprints gives the same result as merging all their layers at once.

use super::attr::AttrSpec;
use super::context::AmbientDefaults;
use super::report::{Diagnostic, Why};
use crate::{Attributes, FootprintError, Result, Value};
use indexmap::IndexMap;
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Level used when a footprint does not declare any priority.
pub const DEFAULT_LEVEL: &str = "DEFAULT";

/// One accepted value of an `only` rule.
#[derive(Debug, Clone)]
pub enum OnlyValue {
    Value(Value),
    Pattern(Regex),
}

impl OnlyValue {
    fn describe(&self) -> String {
        match self {
            OnlyValue::Value(v) => v.to_string(),
            OnlyValue::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Footprint {
    info: Option<String>,
    attrs: IndexMap<String, AttrSpec>,
    bind: Vec<Vec<String>>,
    only: IndexMap<String, Vec<OnlyValue>>,
    priority: Option<String>,
    /// Set once every attribute passed [`AttrSpec::check`].
    checked: bool,
}

impl Footprint {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Declaration -----------------------------------------------------------

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Add an attribute; declaring the same name twice overlays the second
    /// declaration on the first.
    pub fn attr(mut self, spec: AttrSpec) -> Self {
        self.checked = false;
        match self.attrs.get_mut(spec.name()) {
            Some(existing) => existing.absorb(&spec),
            None => {
                self.attrs.insert(spec.name().to_string(), spec);
            }
        }
        self
    }

    pub fn priority(mut self, level: impl Into<String>) -> Self {
        self.priority = Some(level.into().to_uppercase());
        self
    }

    pub fn bind<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind.push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict applicability: `key` names an attribute, optionally prefixed
    /// with `after_` (value `>=` one of `accepted`) or `before_` (value `<`).
    pub fn only<I, V>(mut self, key: impl Into<String>, accepted: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let entry = self.only.entry(key.into()).or_default();
        entry.extend(accepted.into_iter().map(|v| OnlyValue::Value(v.into())));
        self
    }

    /// Restrict applicability to values matching `pattern` from their first
    /// character.
    pub fn only_matching(mut self, key: impl Into<String>, pattern: Regex) -> Self {
        self.only.entry(key.into()).or_default().push(OnlyValue::Pattern(pattern));
        self
    }

    /// Merge `layers` (most generic first) into one checked footprint.
    ///
    /// `owner` only labels definition errors.
    pub fn merge<'a, I>(owner: &str, layers: I) -> Result<Footprint>
    where
        I: IntoIterator<Item = &'a Footprint>,
    {
        let mut merged = Footprint::new();
        for layer in layers {
            merged.absorb(owner, layer);
        }
        merged.check(owner)?;
        Ok(merged)
    }

    fn absorb(&mut self, owner: &str, later: &Footprint) {
        if later.info.is_some() {
            self.info.clone_from(&later.info);
        }
        if later.priority.is_some() {
            self.priority.clone_from(&later.priority);
        }
        for group in &later.bind {
            if !self.bind.contains(group) {
                self.bind.push(group.clone());
            }
        }
        for (key, accepted) in &later.only {
            self.only.insert(key.clone(), accepted.clone());
        }
        for (name, spec) in &later.attrs {
            match self.attrs.get_mut(name) {
                Some(existing) => {
                    if let (Some(before), Some(after)) = (existing.attr_type(), spec.attr_type()) {
                        if !after.refines(before) {
                            tracing::warn!(
                                "{owner}: type inconsistency among footprints for attribute {name}: {} then {}",
                                before.name(),
                                after.name()
                            );
                        }
                    }
                    existing.absorb(spec);
                }
                None => {
                    self.attrs.insert(name.clone(), spec.clone());
                }
            }
        }
    }

    fn check(&mut self, owner: &str) -> Result<()> {
        for spec in self.attrs.values_mut() {
            spec.check().map_err(|reason| FootprintError::InvalidDefinition { owner: owner.to_string(), reason })?;
        }
        self.checked = true;
        Ok(())
    }

    /// This footprint with typed `values`/`outcast`, checking a copy when it
    /// was built by hand rather than merged.
    pub(crate) fn checked(&self) -> Result<Cow<'_, Footprint>> {
        if self.checked {
            return Ok(Cow::Borrowed(self));
        }
        let mut fp = self.clone();
        fp.check(self.info.as_deref().unwrap_or("footprint"))?;
        Ok(Cow::Owned(fp))
    }

    // --- Introspection ---------------------------------------------------------

    pub fn doc(&self) -> &str {
        self.info.as_deref().unwrap_or("Not documented")
    }

    pub fn level(&self) -> &str {
        self.priority.as_deref().unwrap_or(DEFAULT_LEVEL)
    }

    pub fn attrs(&self) -> impl Iterator<Item = &AttrSpec> {
        self.attrs.values()
    }

    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&AttrSpec> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn bindings(&self) -> &[Vec<String>] {
        &self.bind
    }

    pub fn only_rules(&self) -> impl Iterator<Item = (&str, &[OnlyValue])> {
        self.only.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Every key this footprint recognises: attribute names and aliases.
    pub fn allkeys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        for spec in self.attrs.values() {
            keys.push(spec.name());
            keys.extend(spec.aliases().iter().map(String::as_str));
        }
        keys
    }

    /// Names of the mandatory attributes, in declaration order.
    pub fn mandatory(&self) -> Vec<&str> {
        self.attrs.values().filter(|s| !s.is_optional()).map(AttrSpec::name).collect()
    }

    /// `None` when `name` is not an attribute of this footprint.
    pub fn optional(&self, name: &str) -> Option<bool> {
        self.attrs.get(name).map(AttrSpec::is_optional)
    }

    pub fn values(&self, name: &str) -> Vec<Value> {
        self.attrs.get(name).and_then(AttrSpec::allowed).map(<[Value]>::to_vec).unwrap_or_default()
    }

    pub fn outcast(&self, name: &str) -> Vec<Value> {
        self.attrs.get(name).and_then(AttrSpec::excluded).map(<[Value]>::to_vec).unwrap_or_default()
    }

    /// Keys of `desc` this footprint would consume (names or aliases).
    pub fn track(&self, desc: &Attributes) -> Vec<String> {
        desc.keys().filter(|k| self.attrs.values().any(|s| s.answers_to(k))).cloned().collect()
    }

    /// Canonical attribute name for a description key.
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.attrs.values().find(|s| s.answers_to(key)).map(AttrSpec::name)
    }

    // --- Applicability -----------------------------------------------------------

    /// Check the `only` rules against resolved attributes.
    ///
    /// Returns the first failing rule as a diagnostic.
    pub(crate) fn check_only(&self, resolved: &Attributes, defaults: &AmbientDefaults) -> Option<Diagnostic> {
        for (key, accepted) in &self.only {
            let (attribute, test) = match key.split_once('_') {
                Some(("after", rest)) => (rest, Ordering::Greater),
                Some(("before", rest)) => (rest, Ordering::Less),
                _ => (key.as_str(), Ordering::Equal),
            };

            let actual = resolved.get(attribute).filter(|v| !v.is_null()).cloned().or_else(|| defaults.get(attribute));
            let Some(actual) = actual else {
                return Some(Diagnostic::new(attribute, Why::OnlyNotFound).detail(key.clone()));
            };

            let matched = accepted.iter().any(|candidate| match (candidate, test) {
                (OnlyValue::Value(v), Ordering::Greater) => {
                    matches!(actual.compare(v), Some(Ordering::Greater | Ordering::Equal))
                }
                (OnlyValue::Value(v), Ordering::Less) => matches!(actual.compare(v), Some(Ordering::Less)),
                (OnlyValue::Value(v), Ordering::Equal) => actual == *v,
                (OnlyValue::Pattern(re), _) => re.find(&actual.to_string()).is_some_and(|m| m.start() == 0),
            });

            if !matched {
                let expected: Vec<String> = accepted.iter().map(OnlyValue::describe).collect();
                let detail = format!("{key} in [{}]", expected.join(", "));
                return Some(Diagnostic::new(attribute, Why::OnlyMismatch).detail(detail));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttrType, desc};

    fn base() -> Footprint {
        footprint! {
            info: "Test class",
            attr: {
                kind { values: ["hip", "hop"] },
                somestr { values: ["this", "or", "that"], optional: true, default: "this" },
                someint { values: 0..10, ty: AttrType::Int },
            },
        }
    }

    #[test]
    fn merge_keeps_ancestor_attributes() {
        let derived = footprint! { attr: { somefoo { optional: true } } };
        let merged = Footprint::merge("two", [&base(), &derived]).unwrap();

        assert_eq!(merged.attr_names().collect::<Vec<_>>(), vec!["kind", "somestr", "someint", "somefoo"]);
        assert_eq!(merged.doc(), "Test class");
        assert_eq!(merged.mandatory(), vec!["kind", "someint"]);
        assert_eq!(merged.optional("somefoo"), Some(true));
        assert_eq!(merged.optional("nope"), None);
    }

    #[test]
    fn merge_most_derived_wins() {
        let derived = footprint! {
            info: "Other stuff",
            priority: "debug",
            attr: { kind { values: ["hop", "bop"], alias: ["sort"] } },
        };
        let merged = Footprint::merge("two", [&base(), &derived]).unwrap();

        assert_eq!(merged.doc(), "Other stuff");
        assert_eq!(merged.level(), "DEBUG");
        assert_eq!(merged.values("kind"), vec![Value::from("hop"), Value::from("bop")]);
        assert_eq!(merged.allkeys(), vec!["kind", "sort", "somestr", "someint"]);
    }

    #[test]
    fn merge_is_associative() {
        let mid = footprint! { attr: { kind { alias: ["k"] }, extra { optional: true, default: "x" } } };
        let leaf = footprint! { attr: { kind { values: ["leaf"] } } };

        let all_at_once = Footprint::merge("leaf", [&base(), &mid, &leaf]).unwrap();
        let staged = Footprint::merge("mid", [&base(), &mid]).unwrap();
        let staged = Footprint::merge("leaf", [&staged, &leaf]).unwrap();

        assert_eq!(all_at_once.allkeys(), staged.allkeys());
        assert_eq!(all_at_once.values("kind"), staged.values("kind"));
        assert_eq!(all_at_once.mandatory(), staged.mandatory());
    }

    #[test]
    fn merge_rejects_mandatory_with_default() {
        let broken = footprint! { attr: { somestr { optional: false } } };
        let err = Footprint::merge("broken", [&base(), &broken]).unwrap_err();
        assert!(matches!(err, FootprintError::InvalidDefinition { .. }));
    }

    #[test]
    fn track_reports_names_and_aliases() {
        let fp = footprint! {
            attr: {
                stuff1 { alias: ["arg1"] },
                stuff2 { optional: true, default: "foo" },
            },
        };
        let d = desc! { "arg1" => 1, "stuff2" => "hello", "stuff3" => 3 };
        assert_eq!(fp.track(&d), vec!["arg1", "stuff2"]);
        assert_eq!(fp.canonical("arg1"), Some("stuff1"));
    }

    #[test]
    fn only_rules() {
        let fp = Footprint::new()
            .only("site", ["paris", "toulouse"])
            .only("after_term", [6])
            .only_matching("host", Regex::new("^node\\d+$").unwrap());
        let defaults = AmbientDefaults::new();

        let ok = desc! { "site" => "paris", "term" => 12, "host" => "node12" };
        assert!(fp.check_only(&ok, &defaults).is_none());

        let early = desc! { "site" => "paris", "term" => 3, "host" => "node12" };
        assert_eq!(fp.check_only(&early, &defaults).map(|d| d.why), Some(Why::OnlyMismatch));

        let nowhere = desc! { "term" => 12, "host" => "node12" };
        assert_eq!(fp.check_only(&nowhere, &defaults).map(|d| d.why), Some(Why::OnlyNotFound));

        let mut defaults = AmbientDefaults::new();
        defaults.push("test", desc! { "site" => "toulouse" });
        assert!(fp.check_only(&nowhere, &defaults).is_none());
    }

    #[test]
    fn only_patterns_match_from_the_start() {
        let fp = Footprint::new().only_matching("host", Regex::new("node\\d+").unwrap());
        let defaults = AmbientDefaults::new();
        assert!(fp.check_only(&desc! { "host" => "node1" }, &defaults).is_none());
        assert!(fp.check_only(&desc! { "host" => "node1.infra" }, &defaults).is_none());
        let why = fp.check_only(&desc! { "host" => "xnode1" }, &defaults).map(|d| d.why);
        assert_eq!(why, Some(Why::OnlyMismatch));
    }
}
