//! Daily per-child facts derived from the weekly rules.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::roster::{ChildRules, Roster, SCHOOL_DAYS, weekday_name};

/// What a child needs on a given weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFacts {
    pub uniform: String,
    #[serde(rename = "uniformType")]
    pub uniform_kind: String,
    #[serde(rename = "pickup")]
    pub pickup_time: String,
    pub gate: String,
}

/// Facts for one child as published under `today`/`tomorrow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDay {
    pub year: String,
    #[serde(flatten)]
    pub facts: DailyFacts,
}

/// One published day section (`today` or `tomorrow`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    /// Display date, e.g. "Monday, October 6"
    pub date: String,
    pub year: i32,
    pub children: BTreeMap<String, ChildDay>,
}

/// Derive a child's facts for `weekday`.
///
/// `club_override` replaces the club flag that selects the pickup time. For a
/// child that follows another child's club schedule, that flag is the anchor's.
/// Children missing from the roster get the roster defaults.
pub fn derive(
    roster: &Roster,
    child: &str,
    weekday: Weekday,
    club_override: Option<bool>,
) -> DailyFacts {
    let defaults = &roster.defaults;
    let Some(rules) = roster.child(child) else {
        return DailyFacts {
            uniform: defaults.uniform.clone(),
            uniform_kind: defaults.uniform_kind.clone(),
            pickup_time: defaults.pickup.clone(),
            gate: defaults.gate.clone(),
        };
    };

    let (uniform, uniform_kind) = uniform_for(roster, rules, weekday);
    let club = club_override.unwrap_or_else(|| club_flag(roster, rules, weekday));

    let standard = rules.pickup.as_ref().unwrap_or(&defaults.pickup);
    let pickup_time = if club {
        rules.club_pickup.as_ref().unwrap_or(standard)
    } else {
        standard
    };

    DailyFacts {
        uniform,
        uniform_kind,
        pickup_time: pickup_time.clone(),
        gate: rules.gate.clone().unwrap_or_else(|| defaults.gate.clone()),
    }
}

/// The club flag that drives `rules`' pickup time on `weekday`: the anchor's
/// when the child follows another child's club schedule, its own otherwise.
pub fn club_flag(roster: &Roster, rules: &ChildRules, weekday: Weekday) -> bool {
    match &rules.follows_club_schedule_of {
        Some(anchor) => roster
            .child(anchor)
            .map(|a| a.has_club(weekday))
            .unwrap_or(false),
        None => rules.has_club(weekday),
    }
}

fn uniform_for(roster: &Roster, rules: &ChildRules, weekday: Weekday) -> (String, String) {
    if let Some(day) = rules.uniform_days.iter().find(|u| u.day == weekday) {
        return (day.uniform.clone(), day.kind.clone());
    }
    match &rules.uniform {
        Some(u) => (u.uniform.clone(), u.kind.clone()),
        None => (
            roster.defaults.uniform.clone(),
            roster.defaults.uniform_kind.clone(),
        ),
    }
}

/// Facts for every roster child on `date`.
pub fn day_report(roster: &Roster, date: NaiveDate) -> DayReport {
    let weekday = date.weekday();
    let children = roster
        .children
        .iter()
        .map(|child| {
            let day = ChildDay {
                year: child.year.clone(),
                facts: derive(roster, &child.name, weekday, None),
            };
            (child.name.clone(), day)
        })
        .collect();

    DayReport {
        date: display_date(date),
        year: date.year(),
        children,
    }
}

/// "Monday, October 6"
pub fn display_date(date: NaiveDate) -> String {
    format!("{}, {} {}", weekday_name(date.weekday()), date.format("%B"), date.day())
}

/// A timed activity as published under `activities`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub title: String,
    pub time: String,
    pub teacher: String,
}

/// One weekday row of a child's activity table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub day: String,
    pub activities: Vec<Activity>,
}

/// Monday-to-Friday activity table for each roster child.
pub fn activity_tables(roster: &Roster) -> BTreeMap<String, Vec<ActivityDay>> {
    roster
        .children
        .iter()
        .map(|child| {
            let week = SCHOOL_DAYS
                .iter()
                .map(|&weekday| ActivityDay {
                    day: weekday_name(weekday).to_string(),
                    activities: child
                        .activities_on(weekday)
                        .map(|a| Activity {
                            title: a.title.clone(),
                            time: a.time.clone(),
                            teacher: a.teacher.clone(),
                        })
                        .collect(),
                })
                .collect();
            (child.name.clone(), week)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::TEST_ROSTER;

    fn roster() -> Roster {
        Roster::from_toml(TEST_ROSTER).unwrap()
    }

    #[test]
    fn test_club_day_pickup() {
        let roster = roster();
        assert_eq!(derive(&roster, "Leo", Weekday::Mon, None).pickup_time, "5:30 PM");
        assert_eq!(derive(&roster, "Leo", Weekday::Fri, None).pickup_time, "3:40 PM");
    }

    #[test]
    fn test_follower_tracks_anchor_club_days() {
        let roster = roster();
        // Novah has no club days; pickup follows Leo's
        for weekday in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu] {
            assert_eq!(
                derive(&roster, "Novah", weekday, None).pickup_time,
                "5:30 PM",
                "{weekday:?}"
            );
        }
        assert_eq!(derive(&roster, "Novah", Weekday::Fri, None).pickup_time, "3:40 PM");
    }

    #[test]
    fn test_follower_ignores_own_club_days() {
        let mut roster = roster();
        let novah = roster.children.iter_mut().find(|c| c.name == "Novah").unwrap();
        novah.club_days = vec![Weekday::Fri];

        assert_eq!(derive(&roster, "Novah", Weekday::Fri, None).pickup_time, "3:40 PM");
        assert_eq!(derive(&roster, "Novah", Weekday::Mon, None).pickup_time, "5:30 PM");
    }

    #[test]
    fn test_club_override() {
        let roster = roster();
        assert_eq!(
            derive(&roster, "Leo", Weekday::Mon, Some(false)).pickup_time,
            "3:40 PM"
        );
        assert_eq!(
            derive(&roster, "Novah", Weekday::Fri, Some(true)).pickup_time,
            "5:30 PM"
        );
    }

    #[test]
    fn test_uniform_rules() {
        let roster = roster();
        let tuesday = derive(&roster, "Leo", Weekday::Tue, None);
        assert_eq!(tuesday.uniform, "Sports Wear");
        assert_eq!(tuesday.uniform_kind, "Sports");

        let monday = derive(&roster, "Leo", Weekday::Mon, None);
        assert_eq!(monday.uniform, "School Uniform");
        assert_eq!(monday.uniform_kind, "Uniform");

        let thursday = derive(&roster, "Novah", Weekday::Thu, None);
        assert_eq!(thursday.uniform_kind, "Forest");
        assert_eq!(thursday.gate, "Meadow Gate");
    }

    #[test]
    fn test_unknown_child_gets_defaults() {
        let facts = derive(&roster(), "Mia", Weekday::Mon, None);
        assert_eq!(
            facts,
            DailyFacts {
                uniform: "School Uniform".into(),
                uniform_kind: "Uniform".into(),
                pickup_time: "3:30 PM".into(),
                gate: "Main Gate".into(),
            }
        );
    }

    #[test]
    fn test_day_report() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 6).unwrap();
        let report = day_report(&roster(), date);
        assert_eq!(report.date, "Monday, October 6");
        assert_eq!(report.year, 2025);
        assert_eq!(report.children["Leo"].year, "Year 2");
        assert_eq!(report.children["Novah"].facts.pickup_time, "5:30 PM");

        let value = serde_json::to_value(&report.children["Leo"]).unwrap();
        assert_eq!(value["uniformType"], "Uniform");
        assert_eq!(value["pickup"], "5:30 PM");
        assert_eq!(value["gate"], "West Gate");
    }

    #[test]
    fn test_activity_tables_cover_school_week() {
        let tables = activity_tables(&roster());
        let leo = &tables["Leo"];
        assert_eq!(leo.len(), 5);
        assert_eq!(leo[0].day, "Monday");
        assert_eq!(leo[0].activities.len(), 2);
        assert!(leo[4].activities.is_empty());
        assert_eq!(tables["Novah"][3].activities[0].title, "Forest School");
    }
}
