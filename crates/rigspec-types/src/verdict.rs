//! [`Verdict`]s and the aggregate [`ValidationReport`].
//!
//! A verdict is the outcome of one check: identifier, pass/fail, the
//! measured value, the threshold it was compared against, and a free-form
//! diagnostic.  Specialised failures carry a typed [`FailureDetail`].
//!
//! Reports are sorted by [`CheckId`] so that two runs over the same inputs
//! serialize identically regardless of evaluation order.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Axis;

// ────────────────────────────────────────────────────────────────────────────
// CheckId
// ────────────────────────────────────────────────────────────────────────────

/// Slash-separated check identifier, e.g. `part/coxa_fl/bbox`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CheckId(String);

impl CheckId {
    /// Join `segments` with `/`.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First segment of the id (`part`, `collision`, `cable`, …).
    pub fn family(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl std::fmt::Display for CheckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Verdict
// ────────────────────────────────────────────────────────────────────────────

/// Failure category of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// Generic threshold check (bounding box, volume, collision, mass, …).
    Invariant,
    /// The kernel could not provide the geometry the check needs.
    Geometry,
    /// Structural interface incompatibility or misalignment.
    Interface,
    Stability,
    Thermal,
    CableFit,
}

/// Measured hole-to-hole distance for one matched pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HolePair {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
}

/// One offending location of a cable check (waypoint, segment or grommet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CableOffender {
    pub location: String,
    pub value: f64,
}

/// Typed diagnostic payload attached to specialised failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureDetail {
    OutOfRange {
        axis: Option<Axis>,
        delta: f64,
    },
    Misalignment {
        pairs: Vec<HolePair>,
    },
    Unmatched {
        /// Unmatched hole indices on the left-hand side.
        left: Vec<usize>,
        /// Unmatched hole indices on the right-hand side.
        right: Vec<usize>,
    },
    StabilityFailure {
        stance: String,
        /// Distance from the projected centre of mass to the nearest hull
        /// edge; positive inside, negative outside.
        signed_margin: f64,
        nearest_edge: Option<usize>,
    },
    ThermalOverrun {
        actuator: String,
        required_torque_nm: f64,
        winding_temperature_c: f64,
        limit_c: f64,
    },
    CableFitFailure {
        offenders: Vec<CableOffender>,
    },
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    pub check: CheckId,
    pub passed: bool,
    pub kind: VerdictKind,
    pub measured: Option<f64>,
    pub threshold: Option<f64>,
    pub diagnostic: String,
    pub detail: Option<FailureDetail>,
}

impl Verdict {
    /// A passing verdict with an empty diagnostic.
    pub fn pass(check: CheckId, kind: VerdictKind) -> Self {
        Self::new(check, true, kind)
    }

    /// A failing verdict with an empty diagnostic.
    pub fn fail(check: CheckId, kind: VerdictKind) -> Self {
        Self::new(check, false, kind)
    }

    /// A verdict whose pass/fail is decided by `passed`.
    pub fn new(check: CheckId, passed: bool, kind: VerdictKind) -> Self {
        Self {
            check,
            passed,
            kind,
            measured: None,
            threshold: None,
            diagnostic: String::new(),
            detail: None,
        }
    }

    /// Failing verdict for a check that cannot be evaluated because a
    /// prerequisite (usually a part's geometry) is missing.
    pub fn undefined(check: CheckId, reason: impl Into<String>) -> Self {
        Self::fail(check, VerdictKind::Geometry).with_diagnostic(reason)
    }

    pub fn with_measured(mut self, value: f64) -> Self {
        self.measured = Some(value);
        self
    }

    pub fn with_threshold(mut self, value: f64) -> Self {
        self.threshold = Some(value);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = diagnostic.into();
        self
    }

    pub fn with_detail(mut self, detail: FailureDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ValidationReport
// ────────────────────────────────────────────────────────────────────────────

/// Ordered sequence of verdicts plus the overall outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationReport {
    pub passed: bool,
    pub verdicts: Vec<Verdict>,
    /// Logged waivers (e.g. a mass-band override) applied during the run.
    pub overrides: Vec<String>,
    /// Fingerprint of the parameter snapshot the run was evaluated against.
    pub parameter_fingerprint: String,
}

impl ValidationReport {
    /// Build a report, sorting verdicts by check id.  The overall verdict is
    /// the logical AND of every individual verdict.
    pub fn new(
        mut verdicts: Vec<Verdict>,
        overrides: Vec<String>,
        parameter_fingerprint: impl Into<String>,
    ) -> Self {
        verdicts.sort_by(|a, b| a.check.cmp(&b.check));
        let passed = verdicts.iter().all(|v| v.passed);
        Self {
            passed,
            verdicts,
            overrides,
            parameter_fingerprint: parameter_fingerprint.into(),
        }
    }

    /// Iterate over failing verdicts in report order.
    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }

    /// Look up a verdict by its check id.
    pub fn get(&self, check: &str) -> Option<&Verdict> {
        self.verdicts
            .binary_search_by(|v| v.check.as_str().cmp(check))
            .ok()
            .map(|i| &self.verdicts[i])
    }

    /// All verdicts whose id starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Verdict> + 'a {
        self.verdicts
            .iter()
            .filter(move |v| v.check.as_str().starts_with(prefix))
    }

    /// One-line summary suitable as the first line of CLI output.
    pub fn summary_line(&self) -> String {
        if self.passed {
            return format!("PASS ({} checks)", self.verdicts.len());
        }
        let failing: Vec<&str> = self.failures().map(|v| v.check.as_str()).collect();
        format!(
            "FAIL ({}/{} checks): {}",
            failing.len(),
            self.verdicts.len(),
            failing.join(", ")
        )
    }

    /// Process exit code for a driving CLI: 0 on pass, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.passed { 0 } else { 1 }
    }

    /// Pretty-printed JSON form of the report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(id: &str, passed: bool) -> Verdict {
        Verdict::new(CheckId::from(id), passed, VerdictKind::Invariant)
    }

    #[test]
    fn check_id_joins_segments() {
        let id = CheckId::new(["part", "plate", "bbox"]);
        assert_eq!(id.as_str(), "part/plate/bbox");
        assert_eq!(id.family(), "part");
    }

    #[test]
    fn report_sorts_by_check_id() {
        let report = ValidationReport::new(
            vec![
                verdict("part/b/volume", true),
                verdict("collision/a~b", true),
                verdict("part/a/bbox", true),
            ],
            vec![],
            "abc",
        );
        let ids: Vec<&str> = report.verdicts.iter().map(|v| v.check.as_str()).collect();
        assert_eq!(ids, ["collision/a~b", "part/a/bbox", "part/b/volume"]);
    }

    #[test]
    fn overall_is_logical_and() {
        let ok = ValidationReport::new(vec![verdict("a", true), verdict("b", true)], vec![], "");
        assert!(ok.passed);
        assert_eq!(ok.exit_code(), 0);

        let bad = ValidationReport::new(vec![verdict("a", true), verdict("b", false)], vec![], "");
        assert!(!bad.passed);
        assert_eq!(bad.exit_code(), 1);
    }

    #[test]
    fn empty_report_passes() {
        let report = ValidationReport::new(vec![], vec![], "");
        assert!(report.passed);
    }

    #[test]
    fn summary_line_lists_failing_ids() {
        let report = ValidationReport::new(
            vec![
                verdict("part/a/volume", false),
                verdict("part/a/bbox", true),
                verdict("mass/total", false),
            ],
            vec![],
            "",
        );
        assert_eq!(
            report.summary_line(),
            "FAIL (2/3 checks): mass/total, part/a/volume"
        );
    }

    #[test]
    fn get_finds_verdict_by_id() {
        let report = ValidationReport::new(
            vec![verdict("part/a/volume", false), verdict("part/a/bbox", true)],
            vec![],
            "",
        );
        assert!(report.get("part/a/bbox").is_some_and(|v| v.passed));
        assert!(report.get("part/zzz").is_none());
    }

    #[test]
    fn report_json_roundtrip() {
        let report = ValidationReport::new(
            vec![
                verdict("stability/stand", false).with_detail(FailureDetail::StabilityFailure {
                    stance: "stand".into(),
                    signed_margin: -3.5,
                    nearest_edge: Some(2),
                }),
            ],
            vec!["mass band waived: prototype".into()],
            "deadbeef",
        );
        let json = report.to_json().unwrap();
        let back: ValidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
