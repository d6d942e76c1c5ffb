use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use schoolcal_core::pipeline::{Pipeline, read_events_file, run_time};
use schoolcal_core::publish::Publisher;
use schoolcal_core::store::count_by_month;

use crate::render::{Render, render_by_month};

pub async fn run(config: Option<&Path>, file: &Path, no_publish: bool) -> Result<()> {
    let (settings, roster) = super::load(config)?;

    let incoming = read_events_file(file)
        .with_context(|| format!("Could not read events from {}", file.display()))?;
    println!("Found {} events in {}:", incoming.len(), file.display());
    for line in render_by_month(&count_by_month(&incoming)) {
        println!("  {line}");
    }
    println!();

    let _lock = super::lock(&settings)?;
    let publisher = super::publisher(&settings, no_publish)?;
    let pipeline = Pipeline::new(
        &settings,
        roster,
        publisher.as_ref().map(|p| p as &dyn Publisher),
    );

    let (added, duplicates, update) = pipeline.merge_file(file, run_time(&settings, None)?).await?;
    println!(
        "Merged {} new, skipped {} already known",
        added.green(),
        duplicates
    );
    println!("{}", update.render());
    Ok(())
}
