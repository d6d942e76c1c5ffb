use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use owo_colors::OwoColorize;
use schoolcal_core::extract::{ChatExtractor, EventExtractor, ExtractionContext};
use schoolcal_core::pipeline::run_time;
use schoolcal_core::retry::with_retry;
use schoolcal_core::source::{Document, PdfToText, TextExtractor};
use schoolcal_core::store::merge;

use super::create_spinner;
use crate::render::render_events_by_month;

pub async fn run(config: Option<&Path>, file: &Path, output: Option<&Path>) -> Result<()> {
    if !file.exists() {
        bail!("{} does not exist", file.display());
    }
    let (settings, roster) = super::load(config)?;
    let now = run_time(&settings, None)?;

    let document = Document::from_path(file);
    let text = PdfToText::new(settings.tool_timeout()?)
        .extract_text(&document)
        .await?;
    println!(
        "Extracted {} characters from {}",
        text.chars().count(),
        document.id
    );
    if text.trim().is_empty() {
        println!("{}", "No text found in document".yellow());
        return Ok(());
    }

    let extractor = ChatExtractor::from_settings(
        &settings,
        ExtractionContext {
            roster: roster.names().into_iter().map(String::from).collect(),
            default_year: settings.school.default_year.unwrap_or(now.year()),
            max_input_chars: settings.extraction.max_input_chars,
        },
    )?;

    let spinner = create_spinner(format!("Extracting events from {}", document.id));
    let result = with_retry(&settings.retry, "extract", || {
        extractor.extract(&text, &document.context)
    })
    .await;
    spinner.finish_and_clear();

    // Sorted and deduplicated the same way the store would hold them
    let events = merge(Vec::new(), result?).events;
    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    println!("Found {} events:\n", events.len());
    for line in render_events_by_month(&events) {
        println!("{line}");
    }

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&events)?;
        std::fs::write(output, json)
            .with_context(|| format!("Could not write {}", output.display()))?;
        println!("\nSaved events to {}", output.display());
    }

    Ok(())
}
