use std::path::Path;

use anyhow::Result;
use chrono::Datelike;
use schoolcal_core::extract::{ChatExtractor, ExtractionContext};
use schoolcal_core::pipeline::{Collaborators, Pipeline, run_time};
use schoolcal_core::publish::Publisher;
use schoolcal_core::source::{InboxDir, PdfToText};

use super::create_spinner;
use crate::render::Render;

pub async fn run(config: Option<&Path>, no_publish: bool) -> Result<()> {
    let (settings, roster) = super::load(config)?;
    let _lock = super::lock(&settings)?;
    let publisher = super::publisher(&settings, no_publish)?;
    let now = run_time(&settings, None)?;

    let source = InboxDir::new(settings.inbox_dir());
    let text = PdfToText::new(settings.tool_timeout()?);
    let extractor = ChatExtractor::from_settings(
        &settings,
        ExtractionContext {
            roster: roster.names().into_iter().map(String::from).collect(),
            default_year: settings.school.default_year.unwrap_or(now.year()),
            max_input_chars: settings.extraction.max_input_chars,
        },
    )?;
    let collaborators = Collaborators {
        source: &source,
        text: &text,
        extractor: &extractor,
    };

    let pipeline = Pipeline::new(
        &settings,
        roster,
        publisher.as_ref().map(|p| p as &dyn Publisher),
    );

    let spinner = create_spinner(format!("Scanning {}", source.path().display()));
    let result = pipeline.scan(&collaborators, now).await;
    spinner.finish_and_clear();

    let (scan, update) = result?;
    println!("{}", scan.render());
    println!("{}", update.render());
    Ok(())
}
