//! Probe reports.
//!
//! Every time a collector evaluates its candidates against a description it
//! can record what happened to each of them:
//!
//! - `Report` for the probe as a whole (tag, description keys, timings).
//! - `CandidateReport` per evaluated candidate, with its [`Verdict`].
//! - `Diagnostic` per attribute that disqualified a candidate.
//!
//! Reports are plain data. Printing lives in the binary (`debug_report.rs`).

use crate::Attributes;
use std::fmt;
use std::time::Duration;

// --- Diagnostics ---------------------------------------------------------------

/// Reason an attribute was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Why {
    Missing,
    CoercionFailure,
    NotInValues,
    IsOutcast,
    NoneLiteral,
    OnlyNotFound,
    OnlyMismatch,
}

impl Why {
    pub fn describe(self) -> &'static str {
        match self {
            Why::Missing => "missing value",
            Why::CoercionFailure => "could not reclass",
            Why::NotInValues => "not in values",
            Why::IsOutcast => "outcast value",
            Why::NoneLiteral => "null string",
            Why::OnlyNotFound => "only rule without value",
            Why::OnlyMismatch => "only rule mismatch",
        }
    }
}

impl fmt::Display for Why {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub attribute: String,
    pub why: Why,
    /// Offending value, expected type, failed rule...
    pub detail: Option<String>,
}

impl Diagnostic {
    pub fn new(attribute: impl Into<String>, why: Why) -> Self {
        Diagnostic { attribute: attribute.into(), why, detail: None }
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {} ({detail})", self.attribute, self.why),
            None => write!(f, "{}: {}", self.attribute, self.why),
        }
    }
}

// --- Reports -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Picked by the collector.
    Selected,
    /// Resolved, but outranked.
    Eligible,
    Rejected,
    /// Structural error; the probe was aborted.
    Error(String),
}

#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub candidate: String,
    pub level: String,
    pub input_attrs: Vec<String>,
    pub verdict: Verdict,
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Collector tag.
    pub tag: String,
    /// Keys of the probed description.
    pub keys: Vec<String>,
    pub candidates: Vec<CandidateReport>,
    /// Elapsed time for the whole probe.
    pub total: Duration,
}

impl Report {
    pub(crate) fn new(tag: &str, desc: &Attributes) -> Self {
        Report { tag: tag.to_string(), keys: desc.keys().cloned().collect(), ..Report::default() }
    }

    pub fn selected(&self) -> Option<&CandidateReport> {
        self.candidates.iter().find(|c| c.verdict == Verdict::Selected)
    }

    pub fn eligible(&self) -> impl Iterator<Item = &CandidateReport> {
        self.candidates.iter().filter(|c| matches!(c.verdict, Verdict::Selected | Verdict::Eligible))
    }

    pub fn rejected(&self) -> impl Iterator<Item = &CandidateReport> {
        self.candidates.iter().filter(|c| c.verdict == Verdict::Rejected)
    }

    /// Diagnostics of rejected candidates whose name contains `name`.
    pub fn whynot(&self, name: &str) -> Vec<(&str, &[Diagnostic])> {
        self.rejected()
            .filter(|c| c.candidate.contains(name))
            .map(|c| (c.candidate.as_str(), c.diagnostics.as_slice()))
            .collect()
    }

    pub(crate) fn mark_selected(&mut self, candidate: &str) {
        for entry in &mut self.candidates {
            if entry.verdict == Verdict::Eligible && entry.candidate == candidate {
                entry.verdict = Verdict::Selected;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, verdict: Verdict, diagnostics: Vec<Diagnostic>) -> CandidateReport {
        CandidateReport {
            candidate: name.to_string(),
            level: "DEFAULT".to_string(),
            input_attrs: Vec::new(),
            verdict,
            diagnostics,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn whynot_filters_rejected_candidates() {
        let mut report = Report::default();
        report.candidates.push(entry("FileStore", Verdict::Eligible, Vec::new()));
        report.candidates.push(entry("FtpStore", Verdict::Rejected, vec![Diagnostic::new("scheme", Why::NotInValues)]));
        report.candidates.push(entry("CacheStore", Verdict::Rejected, vec![Diagnostic::new("netloc", Why::Missing)]));
        report.mark_selected("FileStore");

        assert_eq!(report.selected().map(|c| c.candidate.as_str()), Some("FileStore"));
        let why = report.whynot("Ftp");
        assert_eq!(why.len(), 1);
        assert_eq!(why[0].1[0].why, Why::NotInValues);
        assert!(report.whynot("File").is_empty());
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::new("size", Why::CoercionFailure).detail("int: invalid digit");
        assert_eq!(d.to_string(), "size: could not reclass (int: invalid digit)");
    }
}
