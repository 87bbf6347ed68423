use crate::engine;
use crate::{AmbientDefaults, Attributes, Footprint, Identity, Outcome, PrioritySet, Result};
use std::sync::Arc;

/// Ambient state shared by resolutions.
///
/// Descriptions rarely carry everything: the ambient defaults fill the gaps,
/// the priority set ranks competing candidates and the identity (plus any
/// `ground` values) is always available to placeholders.
#[derive(Debug, Clone)]
pub struct Context {
    pub defaults: AmbientDefaults,
    pub priorities: PrioritySet,
    pub identity: Arc<Identity>,
    /// Extras present in every resolution.
    pub ground: Attributes,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            defaults: AmbientDefaults::new(),
            priorities: PrioritySet::default(),
            identity: Arc::new(Identity::default()),
            ground: Attributes::new(),
        }
    }
}

/// Options that affect resolution behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Stop at the first attribute failing its checks.
    pub fast: bool,
    /// Attributes resolved first; failing one of them stops the resolution.
    pub fast_keys: Vec<String>,
    /// Copy the ambient defaults into the extras.
    pub extended: bool,
    /// Requeues allowed on top of one pass per attribute.
    pub max_passes: usize,
    /// Placeholder expansions allowed per attribute.
    pub max_substitutions: usize,
    /// Keep the report of the last probe on collectors.
    pub report: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fast: false,
            fast_keys: vec!["kind".to_string()],
            extended: false,
            max_passes: 50,
            max_substitutions: 25,
            report: true,
        }
    }
}

impl Options {
    /// Defaults overridden by `FOOTPRINTS_FAST`, `FOOTPRINTS_EXTENDED`,
    /// `FOOTPRINTS_MAX_PASSES` and `FOOTPRINTS_REPORT`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str, fallback: bool| match var(key).as_deref().map(str::trim) {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                tracing::warn!(variable = key, value = other, "ignoring non boolean setting");
                fallback
            }
            None => fallback,
        };
        let base = Self::default();
        let max_passes = match var("FOOTPRINTS_MAX_PASSES").map(|v| v.trim().parse::<usize>()) {
            Some(Ok(n)) => n,
            Some(Err(err)) => {
                tracing::warn!(variable = "FOOTPRINTS_MAX_PASSES", %err, "ignoring invalid setting");
                base.max_passes
            }
            None => base.max_passes,
        };
        Self {
            fast: flag("FOOTPRINTS_FAST", base.fast),
            extended: flag("FOOTPRINTS_EXTENDED", base.extended),
            report: flag("FOOTPRINTS_REPORT", base.report),
            max_passes,
            ..base
        }
    }
}

/// Resolve `desc` against `fp`.
///
/// With `strict`, a mandatory attribute left undefined is a
/// [`FootprintError::Fatal`](crate::FootprintError::Fatal) error; otherwise it
/// is reported through a failed [`Outcome`].
///
/// # Example
/// ```
/// use footprints::{attr, desc, resolve, AttrType, Context, Footprint, Options, Value};
///
/// let fp = Footprint::new()
///     .attr(attr!(kind, values: ["a", "b"]))
///     .attr(attr!(size, ty: AttrType::Int, optional: true, default: 10));
/// let outcome = resolve(&fp, &desc! { "kind" => "a" }, &Context::default(), &Options::default(), true).unwrap();
/// assert_eq!(outcome.resolution().unwrap().get("size"), Some(&Value::Int(10)));
/// ```
pub fn resolve(fp: &Footprint, desc: &Attributes, ctx: &Context, opts: &Options, strict: bool) -> Result<Outcome> {
    engine::resolve(fp, desc, ctx, opts, strict)
}

/// Attributes a description must provide to match `fp`.
pub fn mandatory(fp: &Footprint) -> Vec<&str> {
    fp.mandatory()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn options_from_vars() {
        let vars: HashMap<&str, &str> =
            [("FOOTPRINTS_FAST", "yes"), ("FOOTPRINTS_MAX_PASSES", "7"), ("FOOTPRINTS_REPORT", "maybe")].into();
        let opts = Options::from_vars(|k| vars.get(k).map(|v| v.to_string()));
        assert!(opts.fast);
        assert!(!opts.extended);
        assert!(opts.report);
        assert_eq!(opts.max_passes, 7);
        assert_eq!(opts.fast_keys, vec!["kind"]);
    }

    #[test]
    fn context_default_is_deterministic_under_test() {
        let ctx = Context::default();
        assert_eq!(ctx.identity.user, "tester");
        assert_eq!(ctx.priorities.rank("default").unwrap(), 1);
    }
}
