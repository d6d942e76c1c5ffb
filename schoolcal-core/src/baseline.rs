//! Pinned expected event counts.
//!
//! The verifier judges both copies of the snapshot against a baseline. The
//! baseline is pinned from a snapshot the operator trusts and kept in
//! `baseline.json` so it can be reviewed and versioned with the data.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::BASELINE_FORMAT_VERSION;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::snapshot::Snapshot;
use crate::store::write_json_atomic;

/// Expected total and per-month counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Baseline {
    pub total: usize,
    /// Months not listed here are not checked
    pub per_month: BTreeMap<u32, usize>,
}

impl Baseline {
    pub fn new(total: usize, per_month: impl IntoIterator<Item = (u32, usize)>) -> Self {
        Baseline {
            total,
            per_month: per_month.into_iter().collect(),
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Baseline {
            total: snapshot.event_count(),
            per_month: snapshot.by_month(),
        }
    }

    /// Apply operator overrides from the command line.
    pub fn with_overrides(mut self, total: Option<usize>, months: &[(u32, usize)]) -> Self {
        if let Some(total) = total {
            self.total = total;
        }
        for &(month, count) in months {
            self.per_month.insert(month, count);
        }
        self
    }
}

/// The on-disk form of a pinned baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineFile {
    pub version: u32,
    pub pinned_at: DateTime<Utc>,
    /// Where the counts were taken from, e.g. the snapshot path
    pub source: String,
    pub total: usize,
    pub per_month: BTreeMap<u32, usize>,
}

impl BaselineFile {
    pub fn pin(snapshot: &Snapshot, source: impl Into<String>, pinned_at: DateTime<Utc>) -> Self {
        let baseline = Baseline::from_snapshot(snapshot);
        BaselineFile {
            version: BASELINE_FORMAT_VERSION,
            pinned_at,
            source: source.into(),
            total: baseline.total,
            per_month: baseline.per_month,
        }
    }

    /// Load a pinned baseline. `None` when nothing has been pinned yet.
    pub fn load(path: &Path) -> SchoolCalResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let file: BaselineFile = serde_json::from_str(&content)?;
        if file.version != BASELINE_FORMAT_VERSION {
            return Err(SchoolCalError::Config(format!(
                "{} has baseline format version {}, expected {}",
                path.display(),
                file.version,
                BASELINE_FORMAT_VERSION
            )));
        }
        Ok(Some(file))
    }

    pub fn save(&self, path: &Path) -> SchoolCalResult<()> {
        write_json_atomic(path, self)
    }

    pub fn baseline(&self) -> Baseline {
        Baseline {
            total: self.total,
            per_month: self.per_month.clone(),
        }
    }
}

/// Parse a `M=N` month override, e.g. `10=9`.
pub fn parse_month_override(s: &str) -> Result<(u32, usize), String> {
    let (month, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MONTH=COUNT, got '{s}'"))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| format!("invalid month '{month}'"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month {month} is out of range 1-12"));
    }
    let count: usize = count
        .trim()
        .parse()
        .map_err(|_| format!("invalid count '{count}'"))?;
    Ok((month, count))
}
