//! Runs: ingest, merge, rebuild, publish, verify.
//!
//! Every run follows the same order: change the event set in memory, build
//! and validate the snapshot, and only then write `events.json`, the snapshot
//! and the ledger. A run that fails before validation leaves the files on disk
//! untouched. Callers hold the [`RunLock`](crate::lock::RunLock) for runs
//! that write.

use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::{info, warn};

use crate::baseline::Baseline;
use crate::config::Settings;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::event::{Event, EventKey};
use crate::extract::EventExtractor;
use crate::ledger::Ledger;
use crate::notice::NoticeStore;
use crate::publish::{Publisher, publish_validated, republish_validated};
use crate::retry::with_retry;
use crate::roster::Roster;
use crate::snapshot::{Snapshot, build_snapshot};
use crate::source::{DocumentSource, TextExtractor};
use crate::store::EventStore;
use crate::verify::{Report, Verdict, verify};

/// The current time in the school's zone, or `date` at the current time of
/// day when a run is pinned to a date.
pub fn run_time(
    settings: &Settings,
    date: Option<NaiveDate>,
) -> SchoolCalResult<DateTime<FixedOffset>> {
    let tz = settings.timezone()?;
    let now = Utc::now().with_timezone(&tz);
    let Some(date) = date else {
        return Ok(now.fixed_offset());
    };

    tz.from_local_datetime(&date.and_time(now.time()))
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| SchoolCalError::InvalidInput(format!("{date} has no valid local time")))
}

/// The collaborators a scan needs.
pub struct Collaborators<'a> {
    pub source: &'a dyn DocumentSource,
    pub text: &'a dyn TextExtractor,
    pub extractor: &'a dyn EventExtractor,
}

#[derive(Debug, Clone)]
pub struct UpdateSummary {
    pub snapshot: Snapshot,
    pub pruned: Vec<Event>,
    pub published: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Documents turned into events and recorded in the ledger
    pub processed: Vec<String>,
    /// Documents left for a later run, with the reason
    pub skipped: Vec<(String, String)>,
    pub added: usize,
    pub duplicates: usize,
}

#[derive(Debug)]
pub struct VerifyOutcome {
    pub report: Report,
    /// Report after a repair attempt, when one was made
    pub repaired: Option<Report>,
    pub repair_error: Option<SchoolCalError>,
}

impl VerifyOutcome {
    pub fn final_verdict(&self) -> Verdict {
        match &self.repaired {
            Some(report) => report.verdict,
            None => self.report.verdict,
        }
    }

    /// 0 when healthy (or repaired), 1 when the remote copy is still bad,
    /// 2 when the local copy is bad. A repair is judged by its own report.
    pub fn exit_code(&self) -> i32 {
        match (&self.repaired, self.report.verdict) {
            (Some(report), _) => report.verdict.exit_code(),
            (None, verdict) if self.repair_error.is_some() && verdict.is_repairable() => 1,
            (None, verdict) => verdict.exit_code(),
        }
    }
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    roster: &'a Roster,
    publisher: Option<&'a dyn Publisher>,
}

impl<'a> Pipeline<'a> {
    /// `publisher` is `None` for local-only runs.
    pub fn new(
        settings: &'a Settings,
        roster: &'a Roster,
        publisher: Option<&'a dyn Publisher>,
    ) -> Self {
        Pipeline {
            settings,
            roster,
            publisher,
        }
    }

    pub fn load_store(&self) -> SchoolCalResult<EventStore> {
        EventStore::load(&self.settings.events_path())
    }

    /// Rebuild, validate, persist and publish the snapshot from `store`.
    pub async fn update(
        &self,
        store: EventStore,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<UpdateSummary> {
        let mut summary = self.write_local(store, now, true)?;
        if let Some(publisher) = self.publisher {
            publish_validated(publisher, &summary.snapshot, self.roster).await?;
            summary.published = true;
        }
        Ok(summary)
    }

    /// Build and validate the snapshot, then write the store and snapshot.
    /// `prune` applies the configured retention cutoff first.
    fn write_local(
        &self,
        mut store: EventStore,
        now: DateTime<FixedOffset>,
        prune: bool,
    ) -> SchoolCalResult<UpdateSummary> {
        let pruned = match self.settings.retention.keep_from {
            Some(cutoff) if prune => store.prune_before(cutoff),
            _ => Vec::new(),
        };

        let notices = NoticeStore::load(&self.settings.notices_path())?;
        let snapshot = build_snapshot(
            self.roster,
            store.events().to_vec(),
            notices.notices().to_vec(),
            now,
            self.settings.ui.clone(),
        );

        if let Err(e) = snapshot.validate(self.roster) {
            warn!(error = %e, "Snapshot failed validation; nothing written");
            return Err(e);
        }

        store.save(&self.settings.events_path())?;
        snapshot.save(&self.settings.snapshot_path())?;
        info!(
            events = snapshot.event_count(),
            notices = snapshot.notices.len(),
            path = %self.settings.snapshot_path().display(),
            "Wrote snapshot"
        );

        Ok(UpdateSummary {
            snapshot,
            pruned,
            published: false,
        })
    }

    /// Pull new documents through text and event extraction into `store`.
    ///
    /// A document whose extraction output can't be parsed, or whose text
    /// can't be read, is skipped and stays out of the ledger so a later run
    /// tries it again. Transport failures that outlast the retries abort.
    pub async fn ingest(
        &self,
        collaborators: &Collaborators<'_>,
        store: &mut EventStore,
        ledger: &mut Ledger,
    ) -> SchoolCalResult<ScanSummary> {
        let mut summary = ScanSummary::default();

        for document in collaborators.source.documents().await? {
            if ledger.contains(&document.id) {
                continue;
            }
            info!(document = %document.id, "Processing document");

            let text = match collaborators.text.extract_text(&document).await {
                Ok(text) => text,
                Err(e @ SchoolCalError::ToolNotInstalled(_)) => return Err(e),
                Err(e) => {
                    warn!(document = %document.id, stage = "text", error = %e, "Skipping document");
                    summary.skipped.push((document.id.clone(), e.to_string()));
                    continue;
                }
            };

            if text.trim().is_empty() {
                warn!(document = %document.id, "No text in document");
                ledger.mark(document.id.clone());
                summary.processed.push(document.id);
                continue;
            }

            let extracted = with_retry(&self.settings.retry, "extract", || {
                collaborators.extractor.extract(&text, &document.context)
            })
            .await;

            let events = match extracted {
                Ok(events) => events,
                Err(e @ SchoolCalError::Parse { .. }) => {
                    warn!(document = %document.id, stage = "extract", error = %e, "Skipping document");
                    summary.skipped.push((document.id.clone(), e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (added, duplicates) = store.merge(events);
            summary.added += added;
            summary.duplicates += duplicates;
            ledger.mark(document.id.clone());
            summary.processed.push(document.id);
        }

        Ok(summary)
    }

    /// Ingest new documents, then rebuild. The ledger is saved only once the
    /// rebuilt snapshot has been validated and written.
    pub async fn scan(
        &self,
        collaborators: &Collaborators<'_>,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<(ScanSummary, UpdateSummary)> {
        let mut store = self.load_store()?;
        let mut ledger = Ledger::load(&self.settings.ledger_path())?;

        let scan = self.ingest(collaborators, &mut store, &mut ledger).await?;
        let update = self
            .update_then(store, now, || ledger.save(&self.settings.ledger_path()))
            .await?;
        Ok((scan, update))
    }

    /// Merge an events file (a JSON array of events), then rebuild.
    pub async fn merge_file(
        &self,
        path: &Path,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<(usize, usize, UpdateSummary)> {
        let incoming = read_events_file(path)?;
        let mut store = self.load_store()?;
        let (added, duplicates) = store.merge(incoming);
        let update = self.update(store, now).await?;
        Ok((added, duplicates, update))
    }

    /// Remove one event by identity, then rebuild.
    pub async fn retract(
        &self,
        key: &EventKey,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<(Event, UpdateSummary)> {
        let mut store = self.load_store()?;
        let removed = store
            .retract(key)
            .ok_or_else(|| SchoolCalError::InvalidInput(format!("no event {key}")))?;
        let update = self.update(store, now).await?;
        Ok((removed, update))
    }

    /// Drop events dated before `cutoff`, then rebuild.
    pub async fn prune(
        &self,
        cutoff: NaiveDate,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<(Vec<Event>, UpdateSummary)> {
        let mut store = self.load_store()?;
        let removed = store.prune_before(cutoff);
        let update = self.update(store, now).await?;
        Ok((removed, update))
    }

    /// Compare the local snapshot file and the published copy with
    /// `baseline`. With `fix`, a remote-only divergence is repaired by
    /// rebuilding from the local store, republishing over the remote copy
    /// and checking again. The repair leaves the store's event set as it is;
    /// retention pruning only runs on updates.
    pub async fn verify(
        &self,
        baseline: &Baseline,
        fix: bool,
        now: DateTime<FixedOffset>,
    ) -> SchoolCalResult<VerifyOutcome> {
        let publisher = self
            .publisher
            .ok_or_else(|| SchoolCalError::Config("verification needs publishing enabled".into()))?;

        let local = Snapshot::load(&self.settings.snapshot_path());
        let remote = self.fetch_remote(publisher).await;
        let report = verify(&local, &remote, baseline);

        if !(fix && report.verdict.is_repairable()) {
            return Ok(VerifyOutcome {
                report,
                repaired: None,
                repair_error: None,
            });
        }

        info!("Remote copy diverged; regenerating and republishing");
        let repaired = async {
            let rebuilt = self.write_local(self.load_store()?, now, false)?;
            republish_validated(publisher, &rebuilt.snapshot, self.roster).await?;
            let local = Snapshot::load(&self.settings.snapshot_path());
            let remote = self.fetch_remote(publisher).await;
            Ok::<_, SchoolCalError>(verify(&local, &remote, baseline))
        }
        .await;

        Ok(match repaired {
            Ok(after) => VerifyOutcome {
                report,
                repaired: Some(after),
                repair_error: None,
            },
            Err(e) => {
                warn!(error = %e, "Repair failed");
                VerifyOutcome {
                    report,
                    repaired: None,
                    repair_error: Some(e),
                }
            }
        })
    }

    async fn fetch_remote(&self, publisher: &dyn Publisher) -> SchoolCalResult<Snapshot> {
        with_retry(&self.settings.retry, "fetch", || publisher.fetch_current()).await
    }

    async fn update_then<F>(
        &self,
        store: EventStore,
        now: DateTime<FixedOffset>,
        after_write: F,
    ) -> SchoolCalResult<UpdateSummary>
    where
        F: FnOnce() -> SchoolCalResult<()>,
    {
        // Ledger is written with the store, before publishing
        let mut summary = self.write_local(store, now, true)?;
        after_write()?;

        if let Some(publisher) = self.publisher {
            publish_validated(publisher, &summary.snapshot, self.roster).await?;
            summary.published = true;
        }
        Ok(summary)
    }
}

/// Read a JSON array of events, rejecting any that aren't well-formed.
pub fn read_events_file(path: &Path) -> SchoolCalResult<Vec<Event>> {
    let content = std::fs::read_to_string(path)?;
    let mut events: Vec<Event> = serde_json::from_str(&content)?;
    for event in &mut events {
        event.normalize_audience();
        event
            .check()
            .map_err(|reason| SchoolCalError::InvalidInput(format!("{}: {reason}", event.key())))?;
    }
    Ok(events)
}
