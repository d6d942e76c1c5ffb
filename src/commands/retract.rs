use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use schoolcal_core::event::EventKey;
use schoolcal_core::pipeline::{Pipeline, run_time};
use schoolcal_core::publish::Publisher;

use crate::render::Render;

pub async fn run(config: Option<&Path>, date: NaiveDate, title: &str, no_publish: bool) -> Result<()> {
    let (settings, roster) = super::load(config)?;
    let _lock = super::lock(&settings)?;
    let publisher = super::publisher(&settings, no_publish)?;
    let pipeline = Pipeline::new(
        &settings,
        roster,
        publisher.as_ref().map(|p| p as &dyn Publisher),
    );

    let key = EventKey::new(date, title);
    let (removed, update) = pipeline.retract(&key, run_time(&settings, None)?).await?;

    println!("{} {}", "-".red(), removed.render());
    println!("{}", update.render());
    Ok(())
}
