use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use schoolcal_core::pipeline::{Pipeline, run_time};
use schoolcal_core::publish::Publisher;

use super::create_spinner;
use crate::render::Render;

pub async fn run(config: Option<&Path>, date: Option<NaiveDate>, no_publish: bool) -> Result<()> {
    let (settings, roster) = super::load(config)?;
    let _lock = super::lock(&settings)?;
    let publisher = super::publisher(&settings, no_publish)?;
    let pipeline = Pipeline::new(
        &settings,
        roster,
        publisher.as_ref().map(|p| p as &dyn Publisher),
    );

    let now = run_time(&settings, date)?;
    let store = pipeline.load_store()?;

    let spinner = create_spinner("Updating snapshot".to_string());
    let result = pipeline.update(store, now).await;
    spinner.finish_and_clear();

    let summary = result?;
    println!("{}", summary.render());
    Ok(())
}
