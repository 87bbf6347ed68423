//! Footprint resolution.
//!
//! [`resolve`] turns a partial, untyped description into either a fully typed
//! attribute mapping or a diagnosed failure:
//!
//! ```text
//! first_guess ──▶ gather_extras ──▶ queue (fast keys first)
//!                                      │
//!                   ┌──────────────────┘
//!                   v
//!             substitute(attr) ── pending reference ──▶ requeue
//!                   │
//!                   v
//!             finalize(attr): remap ─▶ coerce ─▶ values ─▶ outcast
//!                   │
//!                   v
//!             "None" literals, missing attributes ──▶ Outcome
//! ```
//!
//! Work is bounded in three ways, each failing with `TooManyPasses`:
//!
//! - per attribute, a placeholder may be re-expanded at most
//!   `Options::max_substitutions` times (self references);
//! - the queue may be popped at most `n(n+1)/2 + Options::max_passes` times
//!   for `n` attributes, and a full round of requeues without progress is a
//!   cycle;
//! - remap chains may not revisit a value.
//!
//! Placeholders naming neither an attribute nor an extra fail with
//! `UnreachableAttr`. Both errors abort the call even when merely probing.

use super::attr::AttrType;
use super::context::{Guess, Scope, Slot, first_guess, gather_extras};
use super::footprint::Footprint;
use super::report::{Diagnostic, Why};
use super::template::{FormatSpec, Reference, Template};
use crate::{Attributes, Context, FootprintError, Member, Options, Result, Value};
use std::collections::VecDeque;

// --- Outcomes ------------------------------------------------------------------

/// A successful resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Every determined attribute, typed.
    pub attrs: Attributes,
    /// Optional attributes left undetermined.
    pub unknown: Vec<String>,
    /// Attributes whose value came from the description (canonical names).
    pub input_attrs: Vec<String>,
    /// Attributes that went through validation.
    pub seen: Vec<String>,
}

impl Resolution {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub input_attrs: Vec<String>,
    pub missing: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved(Resolution),
    Failed(Failure),
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved(_))
    }

    /// Input attributes, available on failure too for specificity checks.
    pub fn input_attrs(&self) -> &[String] {
        match self {
            Outcome::Resolved(r) => &r.input_attrs,
            Outcome::Failed(f) => &f.input_attrs,
        }
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            Outcome::Resolved(r) => Some(r),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_resolution(self) -> Option<Resolution> {
        match self {
            Outcome::Resolved(r) => Some(r),
            Outcome::Failed(_) => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Outcome::Resolved(_) => &[],
            Outcome::Failed(f) => &f.diagnostics,
        }
    }
}

// --- Resolution ----------------------------------------------------------------

enum Step {
    Done,
    Requeue,
    /// The value vanished (missing reference or member).
    Dropped,
}

enum Stop {
    Pending(String),
    Null(String),
    Fatal(FootprintError),
}

struct Run<'a> {
    fp: &'a Footprint,
    opts: &'a Options,
    guess: Guess,
    extras: Attributes,
    diags: Vec<Diagnostic>,
}

/// Resolve `desc` against `fp`.
///
/// With `strict`, a mandatory attribute left missing is a `Fatal` error rather
/// than a failed outcome.
pub(crate) fn resolve(fp: &Footprint, desc: &Attributes, ctx: &Context, opts: &Options, strict: bool) -> Result<Outcome> {
    let fp = fp.checked()?;
    let fp: &Footprint = &fp;
    let (guess, mut input_attrs) = first_guess(fp, desc, &ctx.defaults);
    tracing::debug!(?input_attrs, "first guess");
    let extras = gather_extras(fp, desc, &ctx.identity, &ctx.ground, opts.extended.then_some(&ctx.defaults));
    let mut run = Run { fp, opts, guess, extras, diags: Vec::new() };
    let mut seen = Vec::new();

    let mut queue: VecDeque<String> = if run.guess.values().any(Slot::is_missing) {
        tracing::debug!("mandatory attribute missing from the first guess");
        VecDeque::new()
    } else {
        let mut names: VecDeque<String> = fp.attr_names().map(str::to_string).collect();
        for key in opts.fast_keys.iter().rev() {
            if let Some(name) = names.iter().position(|n| n == key).and_then(|pos| names.remove(pos)) {
                names.push_front(name);
            }
        }
        names
    };

    // Each round without a stall completes one attribute.
    let budget = fp.len().saturating_mul(fp.len() + 1) / 2 + opts.max_passes;
    let (mut pops, mut stalled) = (0usize, 0usize);
    while let Some(name) = queue.pop_front() {
        pops += 1;
        if pops > budget {
            tracing::error!(attribute = %name, pops, "resolve probably cycling too much");
            return Err(FootprintError::TooManyPasses { attribute: name, passes: pops });
        }

        match run.substitute(&name, &queue)? {
            Step::Requeue => {
                queue.push_back(name.clone());
                stalled += 1;
                if stalled > queue.len() {
                    tracing::error!(attribute = %name, "circular placeholder references");
                    return Err(FootprintError::TooManyPasses { attribute: name, passes: pops });
                }
                continue;
            }
            Step::Dropped => {
                stalled = 0;
                continue;
            }
            Step::Done => stalled = 0,
        }

        run.finalize(&name)?;
        let missing = run.guess.get(&name).is_some_and(Slot::is_missing);
        seen.push(name);
        if missing && (opts.fast || seen.last().is_some_and(|n| opts.fast_keys.contains(n))) {
            tracing::debug!(attribute = ?seen.last(), "fast exit from resolve");
            break;
        }
    }

    let Run { guess, mut diags, .. } = run;
    let diagnosed = |diags: &[Diagnostic], name: &str| diags.iter().any(|d| d.attribute == name);
    let mut attrs = Attributes::new();
    let mut unknown = Vec::new();
    let mut missing = Vec::new();

    for (name, slot) in guess {
        let slot = match slot {
            Slot::Set(Value::Str(s)) if s == "None" => {
                tracing::warn!(attribute = %name, "attribute is a null string");
                if !diagnosed(&diags, &name) {
                    diags.push(Diagnostic::new(&name, Why::NoneLiteral));
                }
                Slot::Missing
            }
            other => other,
        };
        match slot {
            Slot::Set(v) => {
                attrs.insert(name, v);
            }
            Slot::Unknown => unknown.push(name),
            Slot::Missing => {
                input_attrs.retain(|n| *n != name);
                if !diagnosed(&diags, &name) {
                    diags.push(Diagnostic::new(&name, Why::Missing));
                }
                tracing::debug!(attribute = %name, "no valid attribute");
                missing.push(name);
            }
        }
    }

    if strict {
        if let Some(name) = missing.iter().find(|n| fp.optional(n) == Some(false)) {
            tracing::info!(attribute = %name, "no valid attribute is fatal");
            return Err(FootprintError::Fatal { attribute: name.clone(), diagnostics: diags });
        }
    }

    if missing.is_empty() {
        Ok(Outcome::Resolved(Resolution { attrs, unknown, input_attrs, seen }))
    } else {
        Ok(Outcome::Failed(Failure { input_attrs, missing, diagnostics: diags }))
    }
}

impl Run<'_> {
    /// Expand the placeholders of `name` until none is left.
    fn substitute(&mut self, name: &str, pending: &VecDeque<String>) -> Result<Step> {
        let Some(Slot::Set(Value::Str(text))) = self.guess.get(name) else {
            return Ok(Step::Done);
        };
        let mut current = Value::Str(text.clone());
        let mut passes = 0;

        loop {
            let Value::Str(text) = &current else { break };
            let template = Template::parse(text);
            if !template.has_refs() {
                break;
            }
            if passes >= self.opts.max_substitutions {
                tracing::error!(attribute = name, passes, "too many substitutions");
                return Err(FootprintError::TooManyPasses { attribute: name.to_string(), passes });
            }
            passes += 1;

            match self.expand(name, &template, pending) {
                Ok(next) => current = next,
                Err(Stop::Pending(on)) => {
                    tracing::debug!(attribute = name, waiting = %on, "requeue resolve");
                    return Ok(Step::Requeue);
                }
                Err(Stop::Null(raw)) => {
                    tracing::debug!(attribute = name, reference = %raw, "null substitution");
                    self.diags.push(Diagnostic::new(name, Why::Missing).detail(format!("{raw} has no value")));
                    self.guess.insert(name.to_string(), Slot::Missing);
                    return Ok(Step::Dropped);
                }
                Err(Stop::Fatal(err)) => return Err(err),
            }
        }

        tracing::debug!(attribute = name, passes, value = %current, "no more substitution");
        self.guess.insert(name.to_string(), Slot::Set(current));
        Ok(Step::Done)
    }

    /// One substitution pass, replacing the first placeholder only. A bare
    /// reference keeps the referenced value's type.
    fn expand(&self, name: &str, template: &Template, pending: &VecDeque<String>) -> std::result::Result<Value, Stop> {
        if let Some(r) = template.single().filter(|r| r.format.is_none()) {
            return self.lookup(name, r, pending);
        }
        template
            .render_first(|r| {
                let value = self.lookup(name, r, pending)?;
                self.render(name, r, &value)
            })
            .map(Value::Str)
    }

    fn lookup(&self, name: &str, r: &Reference, pending: &VecDeque<String>) -> std::result::Result<Value, Stop> {
        let base = if let Some(slot) = self.guess.get(&r.name) {
            if pending.contains(&r.name) {
                return Err(Stop::Pending(r.name.clone()));
            }
            match slot {
                Slot::Set(v) => v.clone(),
                Slot::Unknown => Value::Str(String::new()),
                Slot::Missing => return Err(Stop::Null(r.raw.clone())),
            }
        } else if let Some(v) = self.extras.get(&r.name) {
            v.clone()
        } else if let Some(fallback) = &r.fallback {
            return Ok(Value::Str(fallback.clone()));
        } else {
            tracing::error!(attribute = name, reference = %r.name, "no such key in guess nor in extras");
            return Err(Stop::Fatal(FootprintError::UnreachableAttr {
                attribute: name.to_string(),
                reference: r.name.clone(),
            }));
        };

        let Some(member) = &r.member else { return Ok(base) };
        let found = match &base {
            Value::Object(obj) => obj.member(member, &Scope::new(&self.guess, &self.extras)),
            other => builtin_member(other, member),
        };
        match found {
            Member::Value(Value::Null) | Member::Absent => Err(Stop::Null(r.raw.clone())),
            Member::Value(v) => Ok(v),
            Member::Failed(reason) => {
                tracing::warn!(attribute = name, reference = %r.raw, %reason, "member lookup failed");
                Err(Stop::Null(r.raw.clone()))
            }
        }
    }

    fn render(&self, name: &str, r: &Reference, value: &Value) -> std::result::Result<String, Stop> {
        let Some(spec) = &r.format else { return Ok(value.to_string()) };
        FormatSpec::parse(spec).and_then(|fs| fs.apply(value)).map_err(|reason| {
            tracing::error!(attribute = name, reference = %r.raw, %reason, "formatting failed");
            Stop::Fatal(FootprintError::BadFormat { attribute: name.to_string(), spec: spec.clone(), reason })
        })
    }

    /// Remap, reclass and range-check the substituted value of `name`.
    fn finalize(&mut self, name: &str) -> Result<()> {
        let Some(spec) = self.fp.get(name) else { return Ok(()) };
        let mut value = match self.guess.get(name) {
            Some(Slot::Set(v)) => v.clone(),
            Some(Slot::Unknown) => {
                tracing::debug!(attribute = name, "optional attribute still unknown");
                return Ok(());
            }
            _ => return Ok(()),
        };

        let mut visited = Vec::new();
        while let Some(next) = spec.remapped(&value) {
            if visited.contains(&value) || visited.len() > spec.remap_len() {
                tracing::error!(attribute = name, value = %value, "remap cycle");
                return Err(FootprintError::TooManyPasses { attribute: name.to_string(), passes: visited.len() });
            }
            tracing::debug!(attribute = name, from = %value, to = %next, "remap");
            visited.push(value);
            value = next.clone();
        }

        if let Some(ty) = spec.attr_type().filter(|ty| !ty.accepts(&value)) {
            match ty.coerce(&value, spec.constructor_args()) {
                Ok(typed) => {
                    tracing::debug!(attribute = name, ty = %ty.name(), value = %typed, "reclassed");
                    value = typed;
                }
                Err(reason) => {
                    tracing::debug!(attribute = name, ty = %ty.name(), value = %value, "badly reclassed");
                    self.reject(Diagnostic::new(name, Why::CoercionFailure).detail(coercion_detail(ty, &value, &reason)));
                    return Ok(());
                }
            }
        }

        if let Some(values) = spec.allowed().filter(|v| !v.is_empty()) {
            if !values.contains(&value) {
                tracing::debug!(attribute = name, value = %value, "value not in range");
                self.reject(Diagnostic::new(name, Why::NotInValues).detail(value.to_string()));
                return Ok(());
            }
        }
        if let Some(outcast) = spec.excluded() {
            if outcast.contains(&value) {
                tracing::debug!(attribute = name, value = %value, "value excluded from range");
                self.reject(Diagnostic::new(name, Why::IsOutcast).detail(value.to_string()));
                return Ok(());
            }
        }

        self.guess.insert(name.to_string(), Slot::Set(value));
        Ok(())
    }

    fn reject(&mut self, diag: Diagnostic) {
        self.guess.insert(diag.attribute.clone(), Slot::Missing);
        self.diags.push(diag);
    }
}

fn coercion_detail(ty: &AttrType, value: &Value, reason: &str) -> String {
    format!("{} from `{value}`: {reason}", ty.name())
}

/// Members available on plain values through `[name:member]`.
fn builtin_member(value: &Value, member: &str) -> Member {
    let v = match (value, member) {
        (Value::Str(s), "upper") => Value::Str(s.to_uppercase()),
        (Value::Str(s), "lower") => Value::Str(s.to_lowercase()),
        (Value::Str(s), "capitalize") => {
            let mut chars = s.chars();
            let head: String = chars.next().map(|c| c.to_uppercase().collect()).unwrap_or_default();
            Value::Str(head + &chars.as_str().to_lowercase())
        }
        (Value::Str(s), "len") => Value::Int(s.chars().count() as i64),
        (Value::Int(i), "abs") => Value::Int(i.abs()),
        (Value::Float(x), "int") => Value::Int(x.trunc() as i64),
        (Value::Date(d), "ymd") => Value::Str(d.format("%Y%m%d").to_string()),
        (Value::Date(d), "ymdh") => Value::Str(d.format("%Y%m%d%H").to_string()),
        (Value::Date(d), "ymdhm") => Value::Str(d.format("%Y%m%d%H%M").to_string()),
        (Value::Date(d), "hh") => Value::Str(d.format("%H").to_string()),
        (Value::Date(d), "year") => Value::Int(d.format("%Y").to_string().parse().unwrap_or_default()),
        (Value::Date(d), "month") => Value::Int(d.format("%m").to_string().parse().unwrap_or_default()),
        (Value::Date(d), "day") => Value::Int(d.format("%d").to_string().parse().unwrap_or_default()),
        (Value::Date(d), "hour") => Value::Int(d.format("%H").to_string().parse().unwrap_or_default()),
        (Value::Date(d), "minute") => Value::Int(d.format("%M").to_string().parse().unwrap_or_default()),
        (Value::List(items), "len") => Value::Int(items.len() as i64),
        (Value::List(items), "first") => return items.first().cloned().map_or(Member::Absent, Member::Value),
        (Value::List(items), "last") => return items.last().cloned().map_or(Member::Absent, Member::Value),
        _ => return Member::Absent,
    };
    Member::Value(v)
}
