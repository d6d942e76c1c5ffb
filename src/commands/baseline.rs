use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use owo_colors::OwoColorize;
use schoolcal_core::baseline::BaselineFile;
use schoolcal_core::snapshot::Snapshot;

use crate::render::render_by_month;

pub fn pin(config: Option<&Path>) -> Result<()> {
    let (settings, roster) = super::load(config)?;
    let _lock = super::lock(&settings)?;

    let snapshot_path = settings.snapshot_path();
    let snapshot = Snapshot::load(&snapshot_path)
        .with_context(|| format!("Could not read {}", snapshot_path.display()))?;
    snapshot
        .validate(roster)
        .context("Refusing to pin a baseline from an invalid snapshot")?;

    let file = BaselineFile::pin(&snapshot, snapshot_path.display().to_string(), Utc::now());
    file.save(&settings.baseline_path())?;

    println!(
        "Pinned baseline of {} events to {}",
        file.total.green(),
        settings.baseline_path().display()
    );
    for line in render_by_month(&file.per_month) {
        println!("  {line}");
    }
    Ok(())
}

pub fn show(config: Option<&Path>) -> Result<()> {
    let (settings, _) = super::load(config)?;

    let Some(file) = BaselineFile::load(&settings.baseline_path())? else {
        println!("{}", "No baseline pinned".dimmed());
        return Ok(());
    };

    println!("{} events", file.total.bold());
    for line in render_by_month(&file.per_month) {
        println!("  {line}");
    }
    println!(
        "{}",
        format!("pinned {} from {}", file.pinned_at.format("%Y-%m-%d %H:%M UTC"), file.source)
            .dimmed()
    );
    Ok(())
}
