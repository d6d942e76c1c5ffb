use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use schoolcal_core::pipeline::{Pipeline, run_time};
use schoolcal_core::publish::Publisher;

use crate::render::Render;

pub async fn run(config: Option<&Path>, before: NaiveDate, no_publish: bool) -> Result<()> {
    let (settings, roster) = super::load(config)?;
    let _lock = super::lock(&settings)?;
    let publisher = super::publisher(&settings, no_publish)?;
    let pipeline = Pipeline::new(
        &settings,
        roster,
        publisher.as_ref().map(|p| p as &dyn Publisher),
    );

    let (removed, update) = pipeline.prune(before, run_time(&settings, None)?).await?;

    if removed.is_empty() {
        println!("{}", format!("No events before {before}").dimmed());
    }
    for event in &removed {
        println!("{} {}", "-".red(), event.render());
    }
    println!("{}", update.render());
    Ok(())
}
