//! Candidates and their resolved instances.
//!
//! A [`Candidate`] is declared once, through a [`CandidateDecl`]: its footprint
//! layers (and those of the candidate it extends) are merged and checked at
//! that point. It is then resolved many times, each call with its own
//! description; the merged footprint is never mutated afterwards.
//!
//! An [`Instance`] is what a successful resolution builds: the candidate plus
//! its typed attributes. Instances can be fed back into descriptions, where
//! their attributes become extras for `[name:member]` lookups.

use super::attr::Access;
use super::footprint::Footprint;
use super::priorities::PrioritySet;
use super::report::Diagnostic;
use super::resolver::{self, Outcome, Resolution};
use crate::{Attributes, Context, FootprintError, Lookup, Member, Options, Result, Scope, Value};
use std::sync::{Arc, RwLock};

/// Collector tag used when a declaration names none.
pub const DEFAULT_COLLECTOR: &str = "garbage";

// --- Declaration -------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CandidateDecl {
    name: String,
    parent: Option<Arc<Candidate>>,
    layers: Vec<Footprint>,
    collectors: Option<Vec<String>>,
    is_abstract: bool,
    explicit: Option<bool>,
    reusable: Option<bool>,
    realkind: Option<String>,
}

impl CandidateDecl {
    pub fn new(name: impl Into<String>) -> Self {
        CandidateDecl {
            name: name.into(),
            parent: None,
            layers: Vec::new(),
            collectors: None,
            is_abstract: false,
            explicit: None,
            reusable: None,
            realkind: None,
        }
    }

    /// Inherit the merged footprint and the flags of `parent`.
    pub fn extends(mut self, parent: &Arc<Candidate>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Add a footprint layer; later layers override earlier ones.
    pub fn footprint(mut self, fp: Footprint) -> Self {
        self.layers.push(fp);
        self
    }

    pub fn collector(mut self, tag: impl Into<String>) -> Self {
        self.collectors.get_or_insert_with(Vec::new).push(tag.into());
        self
    }

    /// Abstract candidates carry footprints for others to extend but never match.
    pub fn abstract_candidate(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// Explicit candidates must declare at least one mandatory attribute.
    pub fn explicit(mut self, explicit: bool) -> Self {
        self.explicit = Some(explicit);
        self
    }

    /// Whether live instances may be handed out again by `Collector::default`.
    pub fn reusable(mut self, reusable: bool) -> Self {
        self.reusable = Some(reusable);
        self
    }

    pub fn realkind(mut self, kind: impl Into<String>) -> Self {
        self.realkind = Some(kind.into());
        self
    }

    /// Merge and check the footprint.
    pub fn build(self) -> Result<Arc<Candidate>> {
        let parent = self.parent.as_deref();
        let layers = parent.map(|p| &p.footprint).into_iter().chain(self.layers.iter());
        let footprint = Footprint::merge(&self.name, layers)?;

        let inherit = |own: Option<bool>, get: fn(&Candidate) -> bool, fallback: bool| {
            own.or_else(|| parent.map(get)).unwrap_or(fallback)
        };
        let explicit = inherit(self.explicit, |c| c.explicit, true);
        let reusable = inherit(self.reusable, |c| c.reusable, true);
        let collectors = self
            .collectors
            .or_else(|| parent.map(|p| p.collectors.clone()))
            .unwrap_or_else(|| vec![DEFAULT_COLLECTOR.to_string()]);

        let invalid = |reason: String| FootprintError::InvalidDefinition { owner: self.name.clone(), reason };
        if !self.is_abstract && explicit && footprint.mandatory().is_empty() {
            return Err(invalid("explicit candidate without any mandatory footprint attribute".to_string()));
        }
        let keys = footprint.allkeys();
        if let Some(tag) = collectors.iter().find(|tag| keys.contains(&tag.as_str())) {
            return Err(invalid(format!("an attribute or alias name is equal to collector tag `{tag}`")));
        }

        tracing::debug!(candidate = %self.name, attrs = footprint.len(), "candidate declared");
        let realkind =
            self.realkind.or_else(|| parent.map(|p| p.realkind.clone())).unwrap_or_else(|| self.name.to_lowercase());
        Ok(Arc::new(Candidate {
            name: self.name,
            footprint,
            collectors,
            is_abstract: self.is_abstract,
            explicit,
            reusable,
            realkind,
        }))
    }
}

// --- Candidate -----------------------------------------------------------------

/// Result of [`Candidate::couldbe`]: the resolution on success, and always the
/// input attributes so collectors can compare specificity.
#[derive(Debug, Clone)]
pub struct Couldbe {
    pub resolution: Option<Resolution>,
    pub input_attrs: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Couldbe {
    pub fn is_match(&self) -> bool {
        self.resolution.is_some()
    }
}

#[derive(Debug)]
pub struct Candidate {
    name: String,
    footprint: Footprint,
    collectors: Vec<String>,
    is_abstract: bool,
    explicit: bool,
    reusable: bool,
    realkind: String,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn collectors(&self) -> &[String] {
        &self.collectors
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    pub fn realkind(&self) -> &str {
        &self.realkind
    }

    pub fn info(&self) -> &str {
        self.footprint.doc()
    }

    pub fn level(&self) -> &str {
        self.footprint.level()
    }

    pub fn mandatory(&self) -> Vec<&str> {
        self.footprint.mandatory()
    }

    pub fn optional(&self, name: &str) -> Option<bool> {
        self.footprint.optional(name)
    }

    pub fn values(&self, name: &str) -> Vec<Value> {
        self.footprint.values(name)
    }

    pub fn access(&self, name: &str) -> Option<Access> {
        self.footprint.get(name).map(|a| a.access_mode())
    }

    pub fn resolve(&self, desc: &Attributes, ctx: &Context, opts: &Options, strict: bool) -> Result<Outcome> {
        resolver::resolve(&self.footprint, desc, ctx, opts, strict)
    }

    /// Non-strict resolution followed by the `only` rules.
    pub fn couldbe(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Couldbe> {
        tracing::debug!(candidate = %self.name, "couldbe");
        match self.resolve(desc, ctx, opts, false)? {
            Outcome::Resolved(resolution) => {
                let input_attrs = resolution.input_attrs.clone();
                match self.footprint.check_only(&resolution.attrs, &ctx.defaults) {
                    None => Ok(Couldbe { resolution: Some(resolution), input_attrs, diagnostics: Vec::new() }),
                    Some(diag) => Ok(Couldbe { resolution: None, input_attrs, diagnostics: vec![diag] }),
                }
            }
            Outcome::Failed(failure) => {
                Ok(Couldbe { resolution: None, input_attrs: failure.input_attrs, diagnostics: failure.diagnostics })
            }
        }
    }

    /// Ranking key: priority rank, then number of input attributes.
    pub fn weightsort(&self, input_attrs: &[String], priorities: &PrioritySet) -> Result<(usize, usize)> {
        Ok((priorities.rank(self.level())?, input_attrs.len()))
    }

    /// Description keys this candidate's footprint consumes.
    pub fn track(&self, desc: &Attributes) -> Vec<String> {
        self.footprint.track(desc)
    }

    /// Remove the tracked keys from `desc`.
    pub fn cleanup(&self, desc: &mut Attributes) {
        for key in self.track(desc) {
            tracing::debug!(candidate = %self.name, attribute = %key, "removing tracked attribute");
            desc.shift_remove(&key);
        }
    }

    /// Strictly resolve `desc` and build an instance.
    pub fn instantiate(self: &Arc<Self>, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Arc<Instance>> {
        match self.resolve(desc, ctx, opts, true)? {
            Outcome::Resolved(resolution) => self.build(resolution),
            Outcome::Failed(failure) => Err(FootprintError::Fatal {
                attribute: failure.missing.first().cloned().unwrap_or_default(),
                diagnostics: failure.diagnostics,
            }),
        }
    }

    /// Build an instance from an already checked resolution.
    pub fn build(self: &Arc<Self>, resolution: Resolution) -> Result<Arc<Instance>> {
        if self.is_abstract {
            return Err(FootprintError::InvalidDefinition {
                owner: self.name.clone(),
                reason: "could not instantiate abstract candidate".to_string(),
            });
        }
        Ok(Arc::new(Instance { candidate: self.clone(), attrs: RwLock::new(resolution.attrs), unknown: resolution.unknown }))
    }
}

// --- Instances -----------------------------------------------------------------

#[derive(Debug)]
pub struct Instance {
    candidate: Arc<Candidate>,
    attrs: RwLock<Attributes>,
    unknown: Vec<String>,
}

impl Instance {
    pub fn candidate(&self) -> &Arc<Candidate> {
        &self.candidate
    }

    /// Determined value of `name`; `None` for undetermined optionals.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    pub fn is_unknown(&self, name: &str) -> bool {
        self.unknown.iter().any(|n| n == name)
    }

    /// Snapshot of the determined attributes.
    pub fn attributes(&self) -> Attributes {
        self.read().clone()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.authorize(name, Access::WRITE, "writable")?;
        self.write().insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<Option<Value>> {
        self.authorize(name, Access::DELETE, "deletable")?;
        Ok(self.write().shift_remove(name))
    }

    /// Whether `desc` resolves, for this footprint, to the values this
    /// instance already holds.
    pub fn compatible(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<bool> {
        let Outcome::Resolved(resolution) = self.candidate.resolve(desc, ctx, opts, false)? else {
            return Ok(false);
        };
        let current = self.read();
        let fp = self.candidate.footprint();
        Ok(desc.keys().filter_map(|k| fp.canonical(k)).all(|name| current.get(name) == resolution.get(name)))
    }

    /// A fresh instance holding the same attributes.
    pub fn duplicate(&self) -> Arc<Instance> {
        Arc::new(Instance {
            candidate: self.candidate.clone(),
            attrs: RwLock::new(self.attributes()),
            unknown: self.unknown.clone(),
        })
    }

    fn authorize(&self, name: &str, needed: Access, mode: &'static str) -> Result<()> {
        match self.candidate.access(name) {
            Some(access) if access.contains(needed) => Ok(()),
            _ => Err(FootprintError::AccessDenied { owner: self.candidate.name.clone(), attribute: name.to_string(), mode }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Attributes> {
        self.attrs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Attributes> {
        self.attrs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Lookup for Instance {
    fn name(&self) -> &str {
        &self.candidate.name
    }

    fn attributes(&self) -> Option<Attributes> {
        Some(Instance::attributes(self))
    }

    fn member(&self, member: &str, _scope: &Scope<'_>) -> Member {
        match member {
            "realkind" => Member::Value(Value::Str(self.candidate.realkind.clone())),
            "name" => Member::Value(Value::Str(self.candidate.name.clone())),
            _ => self.get(member).map_or(Member::Absent, Member::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttrType, desc};

    fn base() -> Arc<Candidate> {
        CandidateDecl::new("Store")
            .abstract_candidate(true)
            .collector("store")
            .footprint(footprint! {
                info: "Abstract store",
                attr: {
                    scheme { },
                    netloc { optional: true, default: "localhost" },
                },
            })
            .build()
            .unwrap()
    }

    fn file_store() -> Arc<Candidate> {
        CandidateDecl::new("FileStore")
            .extends(&base())
            .footprint(footprint! {
                attr: {
                    scheme { values: ["file"] },
                    retries { ty: AttrType::Int, optional: true, default: 3, access: Access::RWD },
                },
            })
            .build()
            .unwrap()
    }

    #[test]
    fn extends_merges_parent_footprint() {
        let store = file_store();
        assert!(!store.is_abstract());
        assert_eq!(store.collectors(), &["store".to_string()]);
        assert_eq!(store.info(), "Abstract store");
        assert_eq!(store.mandatory(), vec!["scheme"]);
        assert_eq!(store.optional("netloc"), Some(true));
        assert_eq!(store.values("scheme"), vec![Value::from("file")]);
        assert_eq!(store.realkind(), "store");
    }

    #[test]
    fn declaration_checks() {
        let err = CandidateDecl::new("Loose").footprint(footprint! { attr: { x { optional: true } } }).build().unwrap_err();
        assert!(matches!(err, FootprintError::InvalidDefinition { .. }));

        let ok = CandidateDecl::new("Loose").explicit(false).footprint(footprint! { attr: { x { optional: true } } }).build();
        assert!(ok.is_ok());

        let err = CandidateDecl::new("Clash")
            .collector("store")
            .footprint(footprint! { attr: { kind { alias: ["store"] } } })
            .build()
            .unwrap_err();
        assert!(matches!(err, FootprintError::InvalidDefinition { ref reason, .. } if reason.contains("store")));
    }

    #[test]
    fn couldbe_reports_input_attrs_on_failure() {
        let store = file_store();
        let ctx = Context::default();
        let opts = Options::default();

        let yes = store.couldbe(&desc! { "scheme" => "file", "netloc" => "here" }, &ctx, &opts).unwrap();
        assert!(yes.is_match());
        assert_eq!(yes.input_attrs, vec!["scheme", "netloc"]);

        let no = store.couldbe(&desc! { "scheme" => "ftp", "netloc" => "here" }, &ctx, &opts).unwrap();
        assert!(!no.is_match());
        assert_eq!(no.input_attrs, vec!["netloc"]);
        assert_eq!(store.weightsort(&no.input_attrs, &ctx.priorities).unwrap(), (1, 1));
    }

    #[test]
    fn couldbe_checks_only_rules() {
        let local = CandidateDecl::new("LocalStore")
            .extends(&file_store())
            .footprint(Footprint::new().only("cluster", ["belenos"]))
            .build()
            .unwrap();
        let mut ctx = Context::default();
        let opts = Options::default();
        let d = desc! { "scheme" => "file" };

        assert!(!local.couldbe(&d, &ctx, &opts).unwrap().is_match());
        ctx.defaults.push("site", desc! { "cluster" => "belenos" });
        assert!(local.couldbe(&d, &ctx, &opts).unwrap().is_match());
    }

    #[test]
    fn instances_honour_access_modes() {
        let store = file_store();
        let inst = store.instantiate(&desc! { "scheme" => "file" }, &Context::default(), &Options::default()).unwrap();

        assert_eq!(inst.get("retries"), Some(Value::Int(3)));
        assert!(matches!(inst.set("scheme", "ftp"), Err(FootprintError::AccessDenied { .. })));
        inst.set("retries", 5).unwrap();
        assert_eq!(inst.remove("retries").unwrap(), Some(Value::Int(5)));
        assert!(inst.get("retries").is_none());

        let scope_guess = Default::default();
        let scope_extras = Attributes::new();
        let scope = Scope::new(&scope_guess, &scope_extras);
        assert_eq!(inst.member("scheme", &scope), Member::Value(Value::from("file")));
        assert_eq!(inst.member("realkind", &scope), Member::Value(Value::from("store")));
    }

    #[test]
    fn instantiate_is_strict() {
        let err = file_store().instantiate(&desc! { "scheme" => "ftp" }, &Context::default(), &Options::default());
        assert!(matches!(err, Err(FootprintError::Fatal { .. })));
        assert!(base().build(Resolution::default()).is_err());
    }

    #[test]
    fn compatible_and_cleanup() {
        let store = file_store();
        let (ctx, opts) = (Context::default(), Options::default());
        let inst = store.instantiate(&desc! { "scheme" => "file", "netloc" => "here" }, &ctx, &opts).unwrap();

        assert!(inst.compatible(&desc! { "scheme" => "file", "netloc" => "here" }, &ctx, &opts).unwrap());
        assert!(!inst.compatible(&desc! { "scheme" => "file", "netloc" => "there" }, &ctx, &opts).unwrap());

        let mut d = desc! { "scheme" => "file", "netloc" => "here", "path" => "/tmp" };
        store.cleanup(&mut d);
        assert_eq!(d, desc! { "path" => "/tmp" });
    }

    #[test]
    fn instances_feed_extras() {
        let store = file_store();
        let (ctx, opts) = (Context::default(), Options::default());
        let inst = store.instantiate(&desc! { "scheme" => "file", "netloc" => "here" }, &ctx, &opts).unwrap();

        let fp = footprint! { attr: { store { }, url { optional: true, default: "[scheme]://[netloc]/[store:realkind]" } } };
        let outcome = crate::resolve(&fp, &desc! { "store" => inst.clone() }, &ctx, &opts, false).unwrap();
        let r = outcome.into_resolution().unwrap();
        assert_eq!(r.get("url"), Some(&Value::from("file://here/store")));
        assert_eq!(r.get("store"), Some(&Value::Object(inst)));
    }
}
