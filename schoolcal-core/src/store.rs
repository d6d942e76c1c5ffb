//! Canonical event collection.
//!
//! The store is a JSON array on disk (`events.json`). All mutation goes
//! through [`merge`], [`EventStore::retract`] and [`EventStore::prune_before`];
//! persistence is the caller's job so that nothing is written before a
//! snapshot built from the new state has passed validation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::SchoolCalResult;
use crate::event::{Event, EventKey};

/// Result of merging incoming events into an existing collection.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub events: Vec<Event>,
    pub added: usize,
    pub duplicates: usize,
}

/// Merge `incoming` into `existing`, skipping events whose identity tuple is
/// already present, then stable-sort by (year, month, day).
///
/// On an identity hit the existing event wins; no field of it is overwritten.
pub fn merge(existing: Vec<Event>, incoming: Vec<Event>) -> MergeOutcome {
    let mut seen: HashSet<EventKey> = existing.iter().map(Event::key).collect();
    let mut events = existing;
    let mut added = 0;
    let mut duplicates = 0;

    for event in incoming {
        if seen.insert(event.key()) {
            debug!(event = %event.key(), "Added new event");
            events.push(event);
            added += 1;
        } else {
            duplicates += 1;
        }
    }

    // sort_by_key is stable: same-date events keep insertion order
    events.sort_by_key(Event::date_key);

    MergeOutcome {
        events,
        added,
        duplicates,
    }
}

/// The canonical, ordered, duplicate-free event collection.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    /// Build a store from an arbitrary list, dropping duplicate identities.
    pub fn from_events(events: Vec<Event>) -> Self {
        EventStore {
            events: merge(Vec::new(), events).events,
        }
    }

    /// Load `events.json`. A missing file is an empty store.
    pub fn load(path: &Path) -> SchoolCalResult<Self> {
        if !path.exists() {
            return Ok(EventStore::default());
        }
        let content = std::fs::read_to_string(path)?;
        let events: Vec<Event> = serde_json::from_str(&content)?;
        Ok(EventStore::from_events(events))
    }

    /// Write the store atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> SchoolCalResult<()> {
        write_json_atomic(path, &self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Merge incoming events in place. Returns (added, duplicates).
    pub fn merge(&mut self, incoming: Vec<Event>) -> (usize, usize) {
        let outcome = merge(std::mem::take(&mut self.events), incoming);
        self.events = outcome.events;
        info!(
            added = outcome.added,
            duplicates = outcome.duplicates,
            total = self.events.len(),
            "Merged events"
        );
        (outcome.added, outcome.duplicates)
    }

    /// Remove the event with this identity tuple.
    pub fn retract(&mut self, key: &EventKey) -> Option<Event> {
        let index = self.events.iter().position(|e| &e.key() == key)?;
        let removed = self.events.remove(index);
        info!(event = %key, "Retracted event");
        Some(removed)
    }

    /// Drop events dated strictly before `cutoff`. Returns what was removed.
    pub fn prune_before(&mut self, cutoff: NaiveDate) -> Vec<Event> {
        use chrono::Datelike;
        let cutoff_key = (cutoff.year(), cutoff.month(), cutoff.day());

        let (removed, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| e.date_key() < cutoff_key);
        self.events = kept;

        if !removed.is_empty() {
            info!(removed = removed.len(), %cutoff, "Pruned past events");
        }
        removed
    }

    /// Event counts per month number.
    pub fn by_month(&self) -> BTreeMap<u32, usize> {
        count_by_month(&self.events)
    }
}

pub fn count_by_month(events: &[Event]) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.month).or_insert(0) += 1;
    }
    counts
}

/// Serialize `value` as pretty JSON and move it into place.
pub(crate) fn write_json_atomic<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> SchoolCalResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");

    std::fs::write(&temp, content)?;
    std::fs::rename(&temp, path)?;
    Ok(())
}
