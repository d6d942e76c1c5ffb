//! Local/remote consistency checks.
//!
//! Both copies of the snapshot are judged on their own against the baseline;
//! the verdict says which copy diverged. A copy that could not be read at all
//! counts as diverged.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use crate::baseline::Baseline;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    /// Local copy matches, the published one doesn't
    RemoteBad,
    LocalBad,
    BothBad,
}

impl Verdict {
    pub fn from_checks(local_ok: bool, remote_ok: bool) -> Self {
        match (local_ok, remote_ok) {
            (true, true) => Verdict::Healthy,
            (true, false) => Verdict::RemoteBad,
            (false, true) => Verdict::LocalBad,
            (false, false) => Verdict::BothBad,
        }
    }

    /// Process exit code for an unrepaired verdict.
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Healthy => 0,
            Verdict::RemoteBad => 1,
            Verdict::LocalBad | Verdict::BothBad => 2,
        }
    }

    /// Only a remote-only divergence may be repaired from local state.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Verdict::RemoteBad)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Healthy => write!(f, "healthy"),
            Verdict::RemoteBad => write!(f, "remote copy diverged"),
            Verdict::LocalBad => write!(f, "local copy diverged"),
            Verdict::BothBad => write!(f, "both copies diverged"),
        }
    }
}

/// How one copy compares with the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyCheck {
    pub label: String,
    /// `None` when the copy could not be read
    pub total: Option<usize>,
    pub per_month: BTreeMap<u32, usize>,
    pub problems: Vec<String>,
}

impl CopyCheck {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Compare one copy with the baseline. Per-month counts are only checked for
/// months the baseline lists.
pub fn check_copy(
    label: &str,
    snapshot: Result<&Snapshot, &SchoolCalError>,
    baseline: &Baseline,
) -> CopyCheck {
    let snapshot = match snapshot {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return CopyCheck {
                label: label.to_string(),
                total: None,
                per_month: BTreeMap::new(),
                problems: vec![format!("could not read {label} copy: {e}")],
            };
        }
    };

    let total = snapshot.event_count();
    let per_month = snapshot.by_month();
    let mut problems = Vec::new();

    if total != baseline.total {
        problems.push(format!(
            "expected {} events, found {total}",
            baseline.total
        ));
    }
    for (month, expected) in &baseline.per_month {
        let found = per_month.get(month).copied().unwrap_or(0);
        if found != *expected {
            problems.push(format!("month {month}: expected {expected}, found {found}"));
        }
    }

    CopyCheck {
        label: label.to_string(),
        total: Some(total),
        per_month,
        problems,
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub verdict: Verdict,
    pub local: CopyCheck,
    pub remote: CopyCheck,
}

/// Classify the two copies against `baseline`.
pub fn verify(
    local: &SchoolCalResult<Snapshot>,
    remote: &SchoolCalResult<Snapshot>,
    baseline: &Baseline,
) -> Report {
    let local = check_copy("local", local.as_ref(), baseline);
    let remote = check_copy("remote", remote.as_ref(), baseline);
    let verdict = Verdict::from_checks(local.is_ok(), remote.is_ok());

    match verdict {
        Verdict::Healthy => info!(total = baseline.total, "Both copies match the baseline"),
        _ => {
            for problem in local.problems.iter().chain(&remote.problems) {
                warn!(%verdict, problem = %problem, "Consistency problem");
            }
        }
    }

    Report {
        verdict,
        local,
        remote,
    }
}

impl Report {
    /// The divergence as an error, or `Ok` when healthy.
    pub fn into_result(self) -> SchoolCalResult<Report> {
        if self.verdict == Verdict::Healthy {
            return Ok(self);
        }
        let problems: Vec<String> = self
            .local
            .problems
            .iter()
            .chain(&self.remote.problems)
            .cloned()
            .collect();
        Err(SchoolCalError::Consistency(format!(
            "{}: {}",
            self.verdict,
            problems.join("; ")
        )))
    }
}
