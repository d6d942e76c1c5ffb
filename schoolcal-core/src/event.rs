//! School calendar event types.
//!
//! Events arrive from the extraction endpoint or from seed data and are
//! stored, published and verified as the same JSON shape the front-end reads.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{ALL_DAY, DEFAULT_LOCATION};

/// A dated school calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Day of month (1-31)
    #[serde(rename = "date")]
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub title: String,
    /// Free text such as "9:00-9:30am", or "All Day"
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(rename = "type")]
    pub category: Category,
    /// Children the event applies to
    #[serde(rename = "children")]
    pub audience: Vec<String>,
}

fn default_time() -> String {
    ALL_DAY.to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

/// Identity tuple used for deduplication: (day, month, year, title).
///
/// Titles compare exactly; "Odd Socks Day" and "odd socks day" are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub title: String,
}

impl EventKey {
    pub fn new(date: NaiveDate, title: &str) -> Self {
        use chrono::Datelike;
        EventKey {
            day: date.day(),
            month: date.month(),
            year: date.year(),
            title: title.to_string(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {}",
            self.year, self.month, self.day, self.title
        )
    }
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey {
            day: self.day,
            month: self.month,
            year: self.year,
            title: self.title.clone(),
        }
    }

    /// Sort key for the store: (year, month, day).
    pub fn date_key(&self) -> (i32, u32, u32) {
        (self.year, self.month, self.day)
    }

    /// The calendar date, or None when day/month/year don't form a real date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn is_all_day(&self) -> bool {
        self.time == ALL_DAY
    }

    /// Check the structural invariants an extracted event must satisfy
    /// before it may enter the store.
    pub fn check(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is empty".into());
        }
        if !(1..=12).contains(&self.month) {
            return Err(format!("month {} out of range", self.month));
        }
        if self.date().is_none() {
            return Err(format!(
                "{}-{}-{} is not a calendar date",
                self.year, self.month, self.day
            ));
        }
        if self.audience.is_empty() {
            return Err("audience is empty".into());
        }
        Ok(())
    }

    /// Collapse repeated audience names while keeping first-seen order.
    pub fn normalize_audience(&mut self) {
        let mut seen = Vec::with_capacity(self.audience.len());
        for child in self.audience.drain(..) {
            if !seen.contains(&child) {
                seen.push(child);
            }
        }
        self.audience = seen;
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Event category. Serialized with the spelling the front-end expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Assembly,
    Celebration,
    Activity,
    #[serde(rename = "Special Day", alias = "SpecialDay")]
    SpecialDay,
    Academic,
    #[serde(rename = "School Trip", alias = "SchoolTrip")]
    SchoolTrip,
    Closure,
    Holiday,
    #[serde(rename = "Special Week", alias = "SpecialWeek")]
    SpecialWeek,
    #[serde(rename = "Term End", alias = "TermEnd")]
    TermEnd,
    Exhibition,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Assembly,
        Category::Celebration,
        Category::Activity,
        Category::SpecialDay,
        Category::Academic,
        Category::SchoolTrip,
        Category::Closure,
        Category::Holiday,
        Category::SpecialWeek,
        Category::TermEnd,
        Category::Exhibition,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Assembly => "Assembly",
            Category::Celebration => "Celebration",
            Category::Activity => "Activity",
            Category::SpecialDay => "Special Day",
            Category::Academic => "Academic",
            Category::SchoolTrip => "School Trip",
            Category::Closure => "Closure",
            Category::Holiday => "Holiday",
            Category::SpecialWeek => "Special Week",
            Category::TermEnd => "Term End",
            Category::Exhibition => "Exhibition",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
pub(crate) fn make_event(day: u32, month: u32, year: i32, title: &str) -> Event {
    Event {
        day,
        month,
        year,
        title: title.to_string(),
        time: ALL_DAY.to_string(),
        description: String::new(),
        location: DEFAULT_LOCATION.to_string(),
        category: Category::SpecialDay,
        audience: vec!["Leo".to_string(), "Novah".to_string()],
    }
}
