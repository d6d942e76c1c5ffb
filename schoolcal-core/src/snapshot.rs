//! The published calendar document.
//!
//! A snapshot is rebuilt in full on every run and never patched. It must pass
//! [`validate_document`] before anything writes or publishes it.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calendar_view::{CalendarMonth, month_view};
use crate::constants::SNAPSHOT_SCHEMA_VERSION;
use crate::error::{SchoolCalError, SchoolCalResult};
use crate::event::Event;
use crate::notice::Notice;
use crate::roster::Roster;
use crate::schedule::{ActivityDay, DayReport, activity_tables, day_report};
use crate::store::{count_by_month, write_json_atomic};

pub const REQUIRED_KEYS: [&str; 9] = [
    "meta",
    "schoolInfo",
    "today",
    "tomorrow",
    "events",
    "activities",
    "notices",
    "calendar",
    "settings",
];
const REQUIRED_EVENT_KEYS: [&str; 5] = ["date", "month", "year", "title", "children"];
const REQUIRED_NOTICE_KEYS: [&str; 5] = ["id", "title", "priority", "description", "children"];
const REQUIRED_CALENDAR_KEYS: [&str; 3] = ["month", "year", "days"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub meta: Meta,
    pub school_info: SchoolInfo,
    pub today: DayReport,
    pub tomorrow: DayReport,
    pub events: Vec<Event>,
    pub activities: BTreeMap<String, Vec<ActivityDay>>,
    pub notices: Vec<Notice>,
    pub calendar: CalendarMonth,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// RFC 3339 generation time in the school's time zone
    pub generated: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolInfo {
    pub name: String,
    pub children: Vec<ChildInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub name: String,
    pub year: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub notification_count: usize,
    pub current_tab: String,
    pub filter_setting: String,
}

/// Front-end defaults written into `settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiDefaults {
    #[serde(default = "default_tab")]
    pub current_tab: String,
    #[serde(default = "default_filter")]
    pub filter_setting: String,
}

impl Default for UiDefaults {
    fn default() -> Self {
        UiDefaults {
            current_tab: default_tab(),
            filter_setting: default_filter(),
        }
    }
}

fn default_tab() -> String {
    "Today".to_string()
}

fn default_filter() -> String {
    "All".to_string()
}

/// Derived schedule facts for the two published days.
#[derive(Debug, Clone)]
pub struct ScheduleFacts {
    pub today: DayReport,
    pub tomorrow: DayReport,
}

/// Everything in a snapshot that isn't events, notices or schedule facts.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub generated: DateTime<FixedOffset>,
    pub school_name: String,
    pub roster: Vec<ChildInfo>,
    /// Month shown in the calendar block
    pub calendar_month: u32,
    pub calendar_year: i32,
    pub ui: UiDefaults,
}

/// Compose a snapshot from already-derived parts.
pub fn assemble(
    events: Vec<Event>,
    notices: Vec<Notice>,
    facts: ScheduleFacts,
    activities: BTreeMap<String, Vec<ActivityDay>>,
    metadata: SnapshotMetadata,
) -> Snapshot {
    let calendar = month_view(&events, metadata.calendar_month, metadata.calendar_year);
    let settings = Settings {
        notification_count: notices.len(),
        current_tab: metadata.ui.current_tab,
        filter_setting: metadata.ui.filter_setting,
    };

    Snapshot {
        meta: Meta {
            generated: metadata.generated.to_rfc3339(),
            version: SNAPSHOT_SCHEMA_VERSION.to_string(),
        },
        school_info: SchoolInfo {
            name: metadata.school_name,
            children: metadata.roster,
        },
        today: facts.today,
        tomorrow: facts.tomorrow,
        events,
        activities,
        notices,
        calendar,
        settings,
    }
}

/// Derive all parts from the roster for the run time `now` and assemble.
/// "Today" is `now`'s calendar date; the calendar block shows its month.
pub fn build_snapshot(
    roster: &Roster,
    events: Vec<Event>,
    notices: Vec<Notice>,
    now: DateTime<FixedOffset>,
    ui: UiDefaults,
) -> Snapshot {
    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);

    let facts = ScheduleFacts {
        today: day_report(roster, today),
        tomorrow: day_report(roster, tomorrow),
    };
    let metadata = SnapshotMetadata {
        generated: now,
        school_name: roster.school_name.clone(),
        roster: roster
            .children
            .iter()
            .map(|c| ChildInfo {
                name: c.name.clone(),
                year: c.year.clone(),
                class: c.class.clone(),
            })
            .collect(),
        calendar_month: today.month(),
        calendar_year: today.year(),
        ui,
    };

    assemble(events, notices, facts, activity_tables(roster), metadata)
}

impl Snapshot {
    pub fn from_json(content: &str) -> SchoolCalResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> SchoolCalResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write pretty JSON atomically.
    pub fn save(&self, path: &Path) -> SchoolCalResult<()> {
        write_json_atomic(path, self)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn by_month(&self) -> BTreeMap<u32, usize> {
        count_by_month(&self.events)
    }

    /// Validate against the roster; collects every violation.
    pub fn validate(&self, roster: &Roster) -> SchoolCalResult<()> {
        let value = serde_json::to_value(self)?;
        validate_document(&value, &roster.names()).map_err(SchoolCalError::Validation)
    }
}

/// Check the structure of a snapshot document. `roster` is the fixed list of
/// child names every referenced name must come from.
pub fn validate_document(doc: &Value, roster: &[&str]) -> Result<(), Vec<String>> {
    let mut violations = Vec::new();

    let Some(root) = doc.as_object() else {
        return Err(vec!["snapshot is not a JSON object".to_string()]);
    };

    for key in REQUIRED_KEYS {
        if !root.contains_key(key) {
            violations.push(format!("missing required key: {key}"));
        }
    }

    let check_name = |violations: &mut Vec<String>, name: &Value, place: &str| match name
        .as_str()
    {
        Some(n) if roster.contains(&n) => {}
        Some(n) => violations.push(format!("unknown child '{n}' in {place}")),
        None => violations.push(format!("non-string child name in {place}")),
    };

    if let Some(children) = root
        .get("schoolInfo")
        .and_then(|s| s.get("children"))
        .and_then(Value::as_array)
    {
        for child in children {
            check_name(&mut violations, child.get("name").unwrap_or(&Value::Null), "schoolInfo");
        }
    }

    for section in ["today", "tomorrow"] {
        let Some(block) = root.get(section) else {
            continue;
        };
        match block.get("children").and_then(Value::as_object) {
            Some(children) => {
                for name in roster {
                    if !children.contains_key(*name) {
                        violations.push(format!("missing child {name} in {section} section"));
                    }
                }
                for name in children.keys() {
                    if !roster.contains(&name.as_str()) {
                        violations.push(format!("unknown child '{name}' in {section} section"));
                    }
                }
            }
            None => violations.push(format!("missing children in {section} section")),
        }
    }

    if let Some(events) = root.get("events") {
        match events.as_array() {
            Some(events) => {
                for (i, event) in events.iter().enumerate() {
                    let label = item_label(event, i);
                    for key in REQUIRED_EVENT_KEYS {
                        if event.get(key).is_none() {
                            violations.push(format!("missing required key {key} in event: {label}"));
                        }
                    }
                    for name in event.get("children").and_then(Value::as_array).into_iter().flatten() {
                        check_name(&mut violations, name, &format!("event {label}"));
                    }
                }
            }
            None => violations.push("events is not a list".to_string()),
        }
    }

    if let Some(notices) = root.get("notices") {
        match notices.as_array() {
            Some(notices) => {
                let mut ids = HashSet::new();
                for (i, notice) in notices.iter().enumerate() {
                    let label = item_label(notice, i);
                    for key in REQUIRED_NOTICE_KEYS {
                        if notice.get(key).is_none() {
                            violations.push(format!("missing required key {key} in notice: {label}"));
                        }
                    }
                    if let Some(id) = notice.get("id").and_then(Value::as_str) {
                        if !ids.insert(id) {
                            violations.push(format!("duplicate notice id '{id}'"));
                        }
                    }
                    for name in notice.get("children").and_then(Value::as_array).into_iter().flatten() {
                        check_name(&mut violations, name, &format!("notice {label}"));
                    }
                }
            }
            None => violations.push("notices is not a list".to_string()),
        }
    }

    if let Some(activities) = root.get("activities").and_then(Value::as_object) {
        for name in activities.keys() {
            if !roster.contains(&name.as_str()) {
                violations.push(format!("unknown child '{name}' in activities"));
            }
        }
    }

    if let Some(calendar) = root.get("calendar") {
        if REQUIRED_CALENDAR_KEYS.iter().any(|k| calendar.get(k).is_none()) {
            violations.push("missing required keys in calendar section".to_string());
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn item_label(item: &Value, index: usize) -> String {
    item.get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index} (untitled)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::make_event;
    use crate::notice::{NoticeStore, Priority};
    use crate::roster::TEST_ROSTER;
    use chrono::TimeZone;

    fn roster() -> Roster {
        Roster::from_toml(TEST_ROSTER).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 9, 7, 30, 0)
            .unwrap()
    }

    fn notices() -> Vec<Notice> {
        vec![Notice {
            id: "half-term-reminder".into(),
            title: "Half Term Holiday".into(),
            priority: Priority::Medium,
            deadline: "October 20th".into(),
            description: "School closed from October 20th.".into(),
            audience: vec!["Leo".into(), "Novah".into()],
            action_button: None,
        }]
    }

    fn snapshot() -> Snapshot {
        let events = vec![
            make_event(10, 10, 2025, "Red, White and Blue Day"),
            make_event(10, 11, 2025, "Odd Socks Day"),
        ];
        build_snapshot(&roster(), events, notices(), now(), UiDefaults::default())
    }

    #[test]
    fn test_build_snapshot() {
        let snapshot = snapshot();
        assert_eq!(snapshot.meta.version, "1.0");
        assert_eq!(snapshot.meta.generated, "2025-10-09T07:30:00+01:00");
        assert_eq!(snapshot.today.date, "Thursday, October 9");
        assert_eq!(snapshot.tomorrow.date, "Friday, October 10");
        assert_eq!(snapshot.calendar.month, 10);
        assert_eq!(snapshot.calendar.days.len(), 31);
        assert_eq!(snapshot.calendar.days[9].events.len(), 1);
        assert_eq!(snapshot.settings.notification_count, 1);
        assert_eq!(snapshot.school_info.children[1].class, "Butterflies");

        // Thursday: Leo has a club, so Novah's pickup follows it
        assert_eq!(snapshot.today.children["Novah"].facts.pickup_time, "5:30 PM");
        assert_eq!(snapshot.tomorrow.children["Novah"].facts.pickup_time, "3:40 PM");

        snapshot.validate(&roster()).unwrap();
    }

    #[test]
    fn test_top_level_keys() {
        let value = serde_json::to_value(snapshot()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in REQUIRED_KEYS {
            assert!(keys.contains(&key), "{key}");
        }
        assert_eq!(value["settings"]["currentTab"], "Today");
        assert_eq!(value["settings"]["notificationCount"], 1);
    }

    #[test]
    fn test_missing_top_level_key_fails() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value.as_object_mut().unwrap().remove("notices");

        let violations = validate_document(&value, &["Leo", "Novah"]).unwrap_err();
        assert_eq!(violations, vec!["missing required key: notices"]);
    }

    #[test]
    fn test_event_missing_title_fails() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value["events"][0].as_object_mut().unwrap().remove("title");

        let violations = validate_document(&value, &["Leo", "Novah"]).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("missing required key title in event"));
    }

    #[test]
    fn test_collects_all_violations() {
        let mut value = serde_json::to_value(snapshot()).unwrap();
        value.as_object_mut().unwrap().remove("settings");
        value["tomorrow"]["children"].as_object_mut().unwrap().remove("Leo");
        value["notices"][0].as_object_mut().unwrap().remove("priority");
        value["events"][1]["children"] = serde_json::json!(["Leo", "Mia"]);
        value["calendar"].as_object_mut().unwrap().remove("days");

        let violations = validate_document(&value, &["Leo", "Novah"]).unwrap_err();
        assert_eq!(violations.len(), 5, "{violations:#?}");
        assert!(violations.iter().any(|v| v == "missing child Leo in tomorrow section"));
        assert!(violations.iter().any(|v| v.contains("unknown child 'Mia'")));
    }

    #[test]
    fn test_unknown_roster_child_fails() {
        let value = serde_json::to_value(snapshot()).unwrap();
        let violations = validate_document(&value, &["Leo"]).unwrap_err();
        assert!(violations.iter().any(|v| v == "unknown child 'Novah' in schoolInfo"));
    }

    #[test]
    fn test_non_object_document() {
        assert!(validate_document(&serde_json::json!([1, 2]), &["Leo"]).is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("school_calendar_data.json");
        let snapshot = snapshot();
        snapshot.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
        assert_eq!(snapshot.by_month().get(&11), Some(&1));
    }

    #[test]
    fn test_notice_store_feeds_settings() {
        let store = NoticeStore::new(notices()).unwrap();
        let snapshot = build_snapshot(
            &roster(),
            vec![],
            store.notices().to_vec(),
            now(),
            UiDefaults::default(),
        );
        assert_eq!(snapshot.settings.notification_count, store.len());
    }
}
