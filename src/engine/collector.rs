//! Collectors: candidates gathered under one tag and matched against
//! descriptions.
//!
//! ```text
//! desc ──▶ couldbe(c1) ─┐
//!          couldbe(c2) ─┼─▶ successes ──▶ sort by weightsort (stable) ──▶ best
//!          couldbe(cN) ─┘        │
//!                                └─▶ Report (one entry per candidate)
//! ```
//!
//! Ranking keys are `(priority rank, |input_attrs|)`, higher first. Equal keys
//! keep registration order. Structural errors in any candidate abort the probe.
//!
//! Collectors also track the instances they built (weakly) so that
//! [`Collector::default`] can hand out a compatible live instance instead of
//! building a new one.

use super::candidate::{Candidate, Instance};
use super::priorities::PrioritySet;
use super::report::{CandidateReport, Report, Verdict};
use super::resolver::Resolution;
use crate::{Attributes, Context, Options, Result, Value};
use indexmap::IndexMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

/// A candidate that matched, with its resolution.
#[derive(Debug, Clone)]
pub struct Selection {
    pub candidate: Arc<Candidate>,
    pub resolution: Resolution,
}

impl Selection {
    pub fn weight(&self, priorities: &PrioritySet) -> Result<(usize, usize)> {
        self.candidate.weightsort(&self.resolution.input_attrs, priorities)
    }

    pub fn instantiate(&self) -> Result<Arc<Instance>> {
        self.candidate.build(self.resolution.clone())
    }
}

/// One line of [`Collector::attribute_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttrEntry {
    pub candidate: String,
    pub optional: bool,
    pub values: Vec<Value>,
    pub outcast: Vec<Value>,
}

#[derive(Debug)]
pub struct Collector {
    tag: String,
    candidates: Vec<Arc<Candidate>>,
    instances: Vec<Weak<Instance>>,
    last_report: Option<Report>,
}

impl Collector {
    pub fn new(tag: impl Into<String>) -> Self {
        Collector { tag: tag.into(), candidates: Vec::new(), instances: Vec::new(), last_report: None }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    // --- Candidates ----------------------------------------------------------

    /// Add `candidate`; abstract candidates and duplicated names are skipped.
    pub fn register(&mut self, candidate: Arc<Candidate>) -> bool {
        if candidate.is_abstract() {
            tracing::debug!(collector = %self.tag, candidate = candidate.name(), "abstract candidate not collected");
            return false;
        }
        if self.get(candidate.name()).is_some() {
            tracing::debug!(collector = %self.tag, candidate = candidate.name(), "candidate already collected");
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn discard(&mut self, name: &str) -> bool {
        let before = self.candidates.len();
        self.candidates.retain(|c| c.name() != name);
        before != self.candidates.len()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Candidate>> {
        self.candidates.iter().find(|c| c.name() == name)
    }

    pub fn candidates(&self) -> &[Arc<Candidate>] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    // --- Probes --------------------------------------------------------------

    /// First candidate, in registration order, that could be `desc`.
    pub fn find_any(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Option<Selection>> {
        let mut report = Report::new(&self.tag, desc);
        Ok(self.evaluate(desc, ctx, opts, true, &mut report)?.into_iter().next())
    }

    /// Every candidate that could be `desc`, in registration order.
    pub fn find_all(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Vec<Selection>> {
        let mut report = Report::new(&self.tag, desc);
        self.evaluate(desc, ctx, opts, false, &mut report)
    }

    /// Best ranked candidate that could be `desc`.
    pub fn pick_best(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Option<Selection>> {
        self.pick_best_with_report(desc, ctx, opts).0
    }

    /// Like [`pick_best`](Self::pick_best), also returning the probe report,
    /// which is filled even when the probe fails.
    pub fn pick_best_with_report(
        &self,
        desc: &Attributes,
        ctx: &Context,
        opts: &Options,
    ) -> (Result<Option<Selection>>, Report) {
        let started = Instant::now();
        let mut report = Report::new(&self.tag, desc);
        let result =
            self.evaluate(desc, ctx, opts, false, &mut report).and_then(|found| self.best(found, desc, &ctx.priorities));
        if let Ok(Some(selection)) = &result {
            report.mark_selected(selection.candidate.name());
        }
        report.total = started.elapsed();
        (result, report)
    }

    /// Probe report for `desc`, whatever the outcome.
    pub fn explain(&self, desc: &Attributes, ctx: &Context, opts: &Options) -> Report {
        self.pick_best_with_report(desc, ctx, opts).1
    }

    fn evaluate(
        &self,
        desc: &Attributes,
        ctx: &Context,
        opts: &Options,
        first_only: bool,
        report: &mut Report,
    ) -> Result<Vec<Selection>> {
        let mut found = Vec::new();
        for candidate in &self.candidates {
            let started = Instant::now();
            let entry = |verdict, input_attrs, diagnostics| CandidateReport {
                candidate: candidate.name().to_string(),
                level: candidate.level().to_string(),
                input_attrs,
                verdict,
                diagnostics,
                duration: started.elapsed(),
            };
            if let Err(err) = ctx.priorities.rank(candidate.level()) {
                tracing::warn!(candidate = %candidate.name(), level = %candidate.level(), "unknown priority level");
                report.candidates.push(entry(Verdict::Error(err.to_string()), Vec::new(), Vec::new()));
                continue;
            }
            match candidate.couldbe(desc, ctx, opts) {
                Ok(couldbe) => match couldbe.resolution {
                    Some(resolution) => {
                        report.candidates.push(entry(Verdict::Eligible, couldbe.input_attrs, Vec::new()));
                        found.push(Selection { candidate: candidate.clone(), resolution });
                        if first_only {
                            break;
                        }
                    }
                    None => report.candidates.push(entry(Verdict::Rejected, couldbe.input_attrs, couldbe.diagnostics)),
                },
                Err(err) => {
                    report.candidates.push(entry(Verdict::Error(err.to_string()), Vec::new(), Vec::new()));
                    return Err(err);
                }
            }
        }
        Ok(found)
    }

    fn best(&self, found: Vec<Selection>, desc: &Attributes, priorities: &PrioritySet) -> Result<Option<Selection>> {
        if found.len() <= 1 {
            return Ok(found.into_iter().next());
        }
        let mut ranked = found
            .into_iter()
            .map(|s| Ok((s.weight(priorities)?, s)))
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        tracing::warn!(collector = %self.tag, keys = ?desc.keys().collect::<Vec<_>>(), "multiple candidates");
        for (idx, (weight, s)) in ranked.iter().enumerate() {
            tracing::warn!("  no.{} in.{} level.{} is {}", idx + 1, weight.1, s.candidate.level(), s.candidate.name());
        }
        Ok(ranked.into_iter().next().map(|(_, s)| s))
    }

    // --- Instances -----------------------------------------------------------

    /// Pick an instance for this collector's tag into `desc`.
    ///
    /// Keys starting with `_` are dropped. When the tag is not set yet, the
    /// best candidate is instantiated and stored under it. Either way, the keys
    /// consumed by the instance's footprint are removed. Returns the instance
    /// now stored under the tag, if this collector knows it.
    pub fn pickup(&mut self, desc: &mut Attributes, ctx: &Context, opts: &Options) -> Result<Option<Arc<Instance>>> {
        let hidden: Vec<String> = desc.keys().filter(|k| k.starts_with('_')).cloned().collect();
        for key in hidden {
            tracing::warn!(attribute = %key, "hidden argument ignored in pickup attributes");
            desc.shift_remove(&key);
        }

        let instance = match desc.get(&self.tag).filter(|v| !v.is_null()) {
            Some(existing) => {
                tracing::debug!(collector = %self.tag, value = %existing, "already defined");
                let existing = existing.as_object().cloned();
                existing.and_then(|obj| self.live().into_iter().find(|i| std::ptr::addr_eq(Arc::as_ptr(i), Arc::as_ptr(&obj))))
            }
            None => {
                let (result, report) = self.pick_best_with_report(desc, ctx, opts);
                if opts.report {
                    self.last_report = Some(report);
                }
                match result? {
                    Some(selection) => {
                        let instance = selection.instantiate()?;
                        self.adopt(&instance);
                        desc.insert(self.tag.clone(), Value::Object(instance.clone()));
                        Some(instance)
                    }
                    None => {
                        tracing::warn!(collector = %self.tag, keys = ?desc.keys().collect::<Vec<_>>(), "no match found");
                        None
                    }
                }
            }
        };

        if let Some(instance) = &instance {
            let tag = self.tag.clone();
            let tracked: Vec<String> = instance.candidate().track(desc).into_iter().filter(|k| *k != tag).collect();
            for key in tracked {
                desc.shift_remove(&key);
            }
        }
        Ok(instance)
    }

    /// Pick up on a copy of `desc` and return the instance.
    pub fn load(&mut self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Option<Arc<Instance>>> {
        let mut desc = desc.clone();
        self.pickup(&mut desc, ctx, opts)
    }

    /// A live reusable instance compatible with `desc`, or a freshly loaded one.
    pub fn default(&mut self, desc: &Attributes, ctx: &Context, opts: &Options) -> Result<Option<Arc<Instance>>> {
        for instance in self.live() {
            if instance.candidate().is_reusable() && instance.compatible(desc, ctx, opts)? {
                tracing::debug!(collector = %self.tag, candidate = instance.candidate().name(), "reusing instance");
                return Ok(Some(instance));
            }
        }
        self.load(desc, ctx, opts)
    }

    /// Track `instance` as built by this collector.
    pub fn adopt(&mut self, instance: &Arc<Instance>) {
        self.instances.retain(|w| w.strong_count() > 0);
        self.instances.push(Arc::downgrade(instance));
    }

    /// Instances built by this collector that are still alive.
    pub fn live(&self) -> Vec<Arc<Instance>> {
        self.instances.iter().filter_map(Weak::upgrade).collect()
    }

    /// Live instances whose attributes equal every entry of `attrs`.
    pub fn grep(&self, attrs: &Attributes) -> Vec<Arc<Instance>> {
        self.live().into_iter().filter(|i| attrs.iter().all(|(k, v)| i.get(k).as_ref() == Some(v))).collect()
    }

    pub fn last_report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    // --- Introspection -------------------------------------------------------

    /// Union of the values declared for `attr` by every candidate.
    pub fn values(&self, attr: &str) -> Vec<Value> {
        let mut all: Vec<Value> = Vec::new();
        for value in self.candidates.iter().flat_map(|c| c.values(attr)) {
            if !all.contains(&value) {
                all.push(value);
            }
        }
        all
    }

    /// Attribute name → how each candidate declares it, sorted by name.
    pub fn attribute_map(&self) -> IndexMap<String, Vec<AttrEntry>> {
        let mut map: IndexMap<String, Vec<AttrEntry>> = IndexMap::new();
        for candidate in &self.candidates {
            let fp = candidate.footprint();
            for spec in fp.attrs() {
                map.entry(spec.name().to_string()).or_default().push(AttrEntry {
                    candidate: candidate.name().to_string(),
                    optional: spec.is_optional(),
                    values: fp.values(spec.name()),
                    outcast: fp.outcast(spec.name()),
                });
            }
        }
        map.sort_keys();
        for entries in map.values_mut() {
            entries.sort_by(|a, b| a.candidate.cmp(&b.candidate));
        }
        map
    }
}

// --- Registry --------------------------------------------------------------------

/// Collectors by tag.
#[derive(Debug, Default)]
pub struct Registry {
    collectors: IndexMap<String, Collector>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `candidate` with each of its collector tags.
    pub fn register(&mut self, candidate: &Arc<Candidate>) {
        for tag in candidate.collectors() {
            self.collector_or_new(tag).register(candidate.clone());
        }
    }

    pub fn collector(&self, tag: &str) -> Option<&Collector> {
        self.collectors.get(tag)
    }

    pub fn collector_mut(&mut self, tag: &str) -> Option<&mut Collector> {
        self.collectors.get_mut(tag)
    }

    pub fn collector_or_new(&mut self, tag: &str) -> &mut Collector {
        self.collectors.entry(tag.to_string()).or_insert_with(|| Collector::new(tag))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.collectors.keys().map(String::as_str)
    }
}
