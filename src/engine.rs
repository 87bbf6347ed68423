//! Footprint resolution engine.
//!
//! This module is the entry point for everything below the public API: it
//! declares the submodules under `src/engine/` and re-exports their public
//! types so that paths stay flat (`crate::Footprint`, `crate::Collector`, ...).
//!
//! ## How the parts work together
//!
//! ```text
//! AttrSpec ──┐
//!            │  Footprint::merge                  (footprint.rs)
//! layers ────┴──────────────┬─────────────────
//!                           │
//!                 CandidateDecl::build            (candidate.rs)
//!                   - explicit / collector checks
//!                           │
//!                           v
//!          Collector::register / Registry         (collector.rs)
//!                           │
//! desc ─────────────────────┼─ Collector::pick_best
//!                           v
//!                 Candidate::couldbe
//!                   resolver::resolve             (resolver.rs)
//!                     - first_guess, extras       (context.rs)
//!                     - placeholders              (template.rs)
//!                     - remap, coerce, values     (attr.rs)
//!                   Footprint::check_only
//!                           │
//!                           v
//!          weightsort (PrioritySet)               (priorities.rs)
//!                           │
//!                           v
//!                 Selection + Report              (report.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `attr.rs`: one attribute contract, types and coercion, access modes.
//! - `footprint.rs`: ordered attribute sets, inheritance merge, `only` rules.
//! - `priorities.rs`: re-rankable priority levels.
//! - `template.rs`: placeholder parsing and format specs.
//! - `context.rs`: ambient defaults, identity, first guess and extras.
//! - `resolver.rs`: the resolution algorithm and its outcomes.
//! - `candidate.rs`: candidate declaration and resolved instances.
//! - `collector.rs`: ranking candidates of one tag, instance tracking.
//! - `report.rs`: per-candidate diagnostics of a probe.
//!
//! ## Debugging
//!
//! Every step logs through `tracing` at debug level. The binary reads its
//! filter from `FOOTPRINTS_LOG`, e.g. `FOOTPRINTS_LOG=footprints=debug`.

#[path = "engine/attr.rs"]
mod attr;
#[path = "engine/candidate.rs"]
mod candidate;
#[path = "engine/collector.rs"]
mod collector;
#[path = "engine/context.rs"]
mod context;
#[path = "engine/footprint.rs"]
mod footprint;
#[path = "engine/priorities.rs"]
mod priorities;
#[path = "engine/report.rs"]
mod report;
#[path = "engine/resolver.rs"]
mod resolver;
#[path = "engine/template.rs"]
mod template;

pub use attr::{Access, AttrSpec, AttrType, Coerce};
pub use candidate::{Candidate, CandidateDecl, Couldbe, DEFAULT_COLLECTOR, Instance};
pub use collector::{AttrEntry, Collector, Registry, Selection};
pub use context::{AmbientDefaults, IDENTITY_KEY, Identity, Scope};
pub use footprint::{DEFAULT_LEVEL, Footprint, OnlyValue};
pub use priorities::{Position, PrioritySet, STANDARD};
pub use report::{CandidateReport, Diagnostic, Report, Verdict, Why};
pub use resolver::{Failure, Outcome, Resolution};

pub(crate) use resolver::resolve;
