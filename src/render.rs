//! Colored terminal rendering for schoolcal-core types.

use std::collections::BTreeMap;

use owo_colors::OwoColorize;
use schoolcal_core::event::Event;
use schoolcal_core::pipeline::{ScanSummary, UpdateSummary};
use schoolcal_core::verify::{CopyCheck, Report, Verdict};

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Event {
    fn render(&self) -> String {
        let date = match self.date() {
            Some(date) => date.format("%a %b %-d").to_string(),
            None => format!("{}/{}", self.day, self.month),
        };
        let children = format!("[{}]", self.audience.join(", "));
        let time = if self.is_all_day() {
            String::new()
        } else {
            format!(" {}", self.time)
        };
        format!(
            "{:<10} {}{} {}",
            date,
            self.title,
            time.dimmed(),
            children.dimmed()
        )
    }
}

impl Render for Verdict {
    fn render(&self) -> String {
        match self {
            Verdict::Healthy => format!("{} {}", "✓".green(), self.green()),
            Verdict::RemoteBad => format!("{} {}", "!".yellow(), self.yellow()),
            Verdict::LocalBad | Verdict::BothBad => format!("{} {}", "✗".red(), self.red()),
        }
    }
}

impl Render for CopyCheck {
    fn render(&self) -> String {
        let total = match self.total {
            Some(total) => format!("{total} events"),
            None => "unreadable".to_string(),
        };
        let mut lines = vec![format!("{:<7} {}", self.label.bold(), total)];
        if self.total.is_some() {
            lines.extend(render_by_month(&self.per_month).into_iter().map(|l| format!("   {l}")));
        }
        for problem in &self.problems {
            lines.push(format!("   {}", problem.red()));
        }
        lines.join("\n")
    }
}

impl Render for Report {
    fn render(&self) -> String {
        [self.local.render(), self.remote.render(), self.verdict.render()].join("\n")
    }
}

impl Render for UpdateSummary {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.pruned.is_empty() {
            lines.push(format!(
                "Dropped {} past {}",
                self.pruned.len(),
                pluralize("event", self.pruned.len())
            ));
        }
        let destination = if self.published {
            "written and published".green().to_string()
        } else {
            "written".to_string()
        };
        lines.push(format!(
            "Snapshot {} ({} {}, {} {})",
            destination,
            self.snapshot.event_count(),
            pluralize("event", self.snapshot.event_count()),
            self.snapshot.notices.len(),
            pluralize("notice", self.snapshot.notices.len()),
        ));
        lines.join("\n")
    }
}

impl Render for ScanSummary {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        for id in &self.processed {
            lines.push(format!("{} {}", "+".green(), id));
        }
        for (id, reason) in &self.skipped {
            lines.push(format!("{} {} {}", "-".yellow(), id, reason.dimmed()));
        }
        if self.processed.is_empty() && self.skipped.is_empty() {
            lines.push("No new documents".dimmed().to_string());
        }
        lines.push(format!(
            "Added {} new {} ({} already known)",
            self.added,
            pluralize("event", self.added),
            self.duplicates
        ));
        lines.join("\n")
    }
}

/// "October: 9 events" lines in month order.
pub fn render_by_month(counts: &BTreeMap<u32, usize>) -> Vec<String> {
    counts
        .iter()
        .map(|(month, count)| format!("{}: {} {}", month_name(*month), count, pluralize("event", *count)))
        .collect()
}

/// Events grouped under month headings.
pub fn render_events_by_month(events: &[Event]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<(i32, u32)> = None;
    for event in events {
        if current != Some((event.year, event.month)) {
            if current.is_some() {
                lines.push(String::new());
            }
            lines.push(format!("{} {}", month_name(event.month), event.year).bold().to_string());
            current = Some((event.year, event.month));
        }
        lines.push(format!("  {}", event.render()));
    }
    lines
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| format!("Month {month}"))
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}
