//! Resolution state: the guess, the extras and the ambient defaults.
//!
//! ```text
//! description ─┐
//! defaults ────┼─ first_guess ──▶ guess + input_attrs
//! footprint ───┘
//!
//! identity ────┐
//! ground ──────┼─ gather_extras ──▶ extras (substitution only)
//! description ─┘   (+ ambient defaults when extended)
//! ```

use super::footprint::Footprint;
use crate::{Attributes, FootprintError, Lookup, Member, Result, Value};
use indexmap::IndexMap;
use std::sync::Arc;

/// Extras key of the ambient [`Identity`].
pub const IDENTITY_KEY: &str = "identity";

/// One entry of the guess under construction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Mandatory and unset, or invalidated by a check.
    Missing,
    /// Optional without default: left undetermined.
    Unknown,
    Set(Value),
}

impl Slot {
    pub fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Set(v) => Some(v),
            _ => None,
        }
    }
}

pub(crate) type Guess = IndexMap<String, Slot>;

/// Read-only view handed to [`Lookup::member`].
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    guess: &'a Guess,
    extras: &'a Attributes,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(guess: &'a Guess, extras: &'a Attributes) -> Self {
        Scope { guess, extras }
    }

    /// Current value of a footprint attribute, if already determined.
    pub fn guess(&self, name: &str) -> Option<&'a Value> {
        self.guess.get(name).and_then(Slot::value)
    }

    pub fn extra(&self, name: &str) -> Option<&'a Value> {
        self.extras.get(name)
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.guess(name).or_else(|| self.extra(name))
    }
}

// --- Ambient defaults ------------------------------------------------------------

/// Tag-scoped defaults consulted when a description omits an attribute.
///
/// Layers stack: the topmost layer defining a name wins. Names are stored
/// lower-case.
#[derive(Debug, Clone, Default)]
pub struct AmbientDefaults {
    layers: Vec<(String, Attributes)>,
}

impl AmbientDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: impl Into<String>, values: Attributes) {
        let values = values.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        self.layers.push((tag.into(), values));
    }

    /// Remove the topmost layer tagged `tag`.
    pub fn pop(&mut self, tag: &str) -> Result<Attributes> {
        let idx = self
            .layers
            .iter()
            .rposition(|(t, _)| t == tag)
            .ok_or_else(|| FootprintError::UnknownScope(tag.to_string()))?;
        Ok(self.layers.remove(idx).1)
    }

    /// Run `f` with `values` pushed under `tag`.
    pub fn scoped<R>(&mut self, tag: &str, values: Attributes, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.layers.len();
        self.push(tag, values);
        let out = f(self);
        self.layers.truncate(depth);
        out
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let name = name.to_lowercase();
        self.layers.iter().rev().find_map(|(_, layer)| layer.get(&name)).cloned()
    }

    /// Merged view, upper layers overriding lower ones.
    pub fn flatten(&self) -> Attributes {
        let mut flat = Attributes::new();
        for (_, layer) in &self.layers {
            for (k, v) in layer {
                flat.insert(k.clone(), v.clone());
            }
        }
        flat
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(t, _)| t.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(|(_, layer)| layer.is_empty())
    }
}

// --- Identity --------------------------------------------------------------------

/// Who and where: the ambient object always present in the extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub host: String,
}

impl Identity {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Identity { user: user.into(), host: host.into() }
    }

    pub fn from_env() -> Self {
        Identity {
            user: env_or(&["USER", "LOGNAME", "USERNAME"], "nobody"),
            host: env_or(&["HOSTNAME", "COMPUTERNAME"], "localhost"),
        }
    }
}

fn env_or(keys: &[&str], fallback: &str) -> String {
    keys.iter().find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty())).unwrap_or_else(|| fallback.to_string())
}

impl Default for Identity {
    fn default() -> Self {
        if cfg!(test) { Identity::new("tester", "testhost") } else { Identity::from_env() }
    }
}

impl Lookup for Identity {
    fn name(&self) -> &str {
        &self.user
    }

    fn member(&self, member: &str, _scope: &Scope<'_>) -> Member {
        match member {
            "user" | "login" => Member::Value(Value::Str(self.user.clone())),
            "host" | "hostname" => Member::Value(Value::Str(self.host.clone())),
            "short" => Member::Value(Value::Str(self.host.split('.').next().unwrap_or_default().to_string())),
            _ => Member::Absent,
        }
    }
}

// --- First guess and extras -------------------------------------------------------

/// Seed one slot per footprint attribute.
///
/// Precedence, highest first: canonical name in `desc`, first alias found in
/// `desc`, ambient default, declared default. Only the first two count as
/// input attributes. A null supplied for an optional attribute is ignored.
pub(crate) fn first_guess(fp: &Footprint, desc: &Attributes, defaults: &AmbientDefaults) -> (Guess, Vec<String>) {
    let mut guess = Guess::new();
    let mut input_attrs = Vec::new();

    for spec in fp.attrs() {
        let name = spec.name();
        let optional = spec.is_optional();
        let usable = |v: &&Value| !(optional && v.is_null());

        let supplied = std::iter::once(name)
            .chain(spec.aliases().iter().map(String::as_str))
            .find_map(|key| desc.get(key).filter(usable));

        let slot = match supplied {
            Some(v) => {
                input_attrs.push(name.to_string());
                if v.is_null() { Slot::Missing } else { Slot::Set(v.clone()) }
            }
            None => match defaults.get(name) {
                Some(v) if !v.is_null() => Slot::Set(v),
                _ if !optional => Slot::Missing,
                _ => match spec.default_value() {
                    Some(d) if !d.is_null() => Slot::Set(d.clone()),
                    _ => Slot::Unknown,
                },
            },
        };
        guess.insert(name.to_string(), slot);
    }

    (guess, input_attrs)
}

/// Values available to placeholders without being validated.
///
/// Always holds the identity under [`IDENTITY_KEY`] plus the `ground` values.
/// Objects found in `desc` contribute their attribute view; other description
/// keys that are not attributes of `fp` are copied as is. With `extended`, the
/// ambient defaults are copied the same way.
pub(crate) fn gather_extras(
    fp: &Footprint,
    desc: &Attributes,
    identity: &Arc<Identity>,
    ground: &Attributes,
    defaults: Option<&AmbientDefaults>,
) -> Attributes {
    let mut extras = Attributes::new();
    extras.insert(IDENTITY_KEY.to_string(), Value::Object(identity.clone()));
    for (k, v) in ground {
        extras.insert(k.clone(), v.clone());
    }

    for value in desc.values() {
        if let Some(view) = value.as_object().and_then(|obj| obj.attributes()) {
            extras.extend(view);
        }
    }

    let mut add_missing = |more: Attributes| {
        for (k, v) in more {
            if !extras.contains_key(&k) && !fp.contains(&k) {
                extras.insert(k, v);
            }
        }
    };
    add_missing(desc.clone());
    if let Some(defaults) = defaults {
        add_missing(defaults.flatten());
    }

    tracing::debug!(keys = ?extras.keys().collect::<Vec<_>>(), "extras");
    extras
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttrSpec, desc};

    fn fp() -> Footprint {
        Footprint::new()
            .attr(AttrSpec::new("kind"))
            .attr(AttrSpec::new("foo").alias(["fuzzy", "fizzy"]).optional(true).default(1))
            .attr(AttrSpec::new("bar").optional(true))
    }

    #[test]
    fn first_guess_seeds_sentinels() {
        let (guess, input) = first_guess(&fp(), &desc! {}, &AmbientDefaults::new());
        assert_eq!(guess["kind"], Slot::Missing);
        assert_eq!(guess["foo"], Slot::Set(Value::Int(1)));
        assert_eq!(guess["bar"], Slot::Unknown);
        assert!(input.is_empty());
    }

    #[test]
    fn first_guess_precedence() {
        let mut defaults = AmbientDefaults::new();
        defaults.push("test", desc! { "Foo" => 5, "kind" => "ambient" });

        let (guess, input) = first_guess(&fp(), &desc! { "fizzy" => 3, "fuzzy" => 2 }, &defaults);
        assert_eq!(guess["foo"], Slot::Set(Value::Int(2)));
        assert_eq!(guess["kind"], Slot::Set(Value::from("ambient")));
        assert_eq!(input, vec!["foo"]);

        let (guess, _) = first_guess(&fp(), &desc! { "foo" => 7, "fuzzy" => 2 }, &defaults);
        assert_eq!(guess["foo"], Slot::Set(Value::Int(7)));

        let (guess, input) = first_guess(&fp(), &desc! { "foo" => Value::Null }, &AmbientDefaults::new());
        assert_eq!(guess["foo"], Slot::Set(Value::Int(1)));
        assert!(input.is_empty());
    }

    #[test]
    fn ambient_layers_stack() {
        let mut defaults = AmbientDefaults::new();
        defaults.push("base", desc! { "geometry" => "global", "cutoff" => "p" });
        defaults.push("run", desc! { "cutoff" => "a" });
        assert_eq!(defaults.get("CUTOFF"), Some(Value::from("a")));

        let inner = defaults.scoped("tmp", desc! { "cutoff" => "x" }, |d| d.get("cutoff"));
        assert_eq!(inner, Some(Value::from("x")));
        assert_eq!(defaults.tags().collect::<Vec<_>>(), vec!["base", "run"]);

        assert_eq!(defaults.pop("run").unwrap()["cutoff"], Value::from("a"));
        assert_eq!(defaults.flatten()["cutoff"], Value::from("p"));
        assert!(matches!(defaults.pop("run"), Err(FootprintError::UnknownScope(_))));
    }

    #[test]
    fn extras_hold_identity_and_unused_keys() {
        let identity = Arc::new(Identity::default());
        let mut defaults = AmbientDefaults::new();
        defaults.push("test", desc! { "cluster" => "belenos" });

        let d = desc! { "kind" => "a", "experiment" => "ABCD" };
        let extras = gather_extras(&fp(), &d, &identity, &Attributes::new(), Some(&defaults));
        assert!(extras[IDENTITY_KEY].as_object().is_some());
        assert_eq!(extras["experiment"], Value::from("ABCD"));
        assert_eq!(extras["cluster"], Value::from("belenos"));
        assert!(!extras.contains_key("kind"));

        let plain = gather_extras(&fp(), &d, &identity, &Attributes::new(), None);
        assert!(!plain.contains_key("cluster"));
    }

    #[test]
    fn identity_members() {
        let id = Identity::new("mxpt001", "belenos.meteo.fr");
        let (guess, extras) = (Guess::new(), Attributes::new());
        let scope = Scope::new(&guess, &extras);
        assert_eq!(id.member("user", &scope), Member::Value(Value::from("mxpt001")));
        assert_eq!(id.member("short", &scope), Member::Value(Value::from("belenos")));
        assert_eq!(id.member("shell", &scope), Member::Absent);
    }
}
