//! Child roster and weekly schedule rules.
//!
//! Rules live in `roster.toml`, one `[[children]]` table per child. Adding a
//! child is a data change; nothing in the deriver branches on names.
//!
//! ```toml
//! school_name = "Hampstead Hill School"
//!
//! [[children]]
//! name = "Leo"
//! year = "Year 2"
//! class = "Poplar"
//! gate = "West Gate"
//! pickup = "3:40 PM"
//! club_pickup = "5:30 PM"
//! club_days = ["Monday", "Tuesday", "Wednesday", "Thursday"]
//! uniform_days = [{ day = "Wednesday", uniform = "Sports Wear", kind = "Sports" }]
//!
//! [[children]]
//! name = "Novah"
//! follows_club_schedule_of = "Leo"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{SchoolCalError, SchoolCalResult};

static ROSTER: OnceLock<Roster> = OnceLock::new();

pub const DEFAULT_UNIFORM: &str = "School Uniform";
pub const DEFAULT_UNIFORM_KIND: &str = "Uniform";
pub const DEFAULT_PICKUP: &str = "3:30 PM";
pub const DEFAULT_GATE: &str = "Main Gate";

/// Weekdays that get a row in the published activity table
pub const SCHOOL_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub school_name: String,
    #[serde(default)]
    pub defaults: RuleDefaults,
    #[serde(default)]
    pub children: Vec<ChildRules>,
}

/// Fallbacks for children missing from the roster and for unset fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefaults {
    #[serde(default = "default_uniform")]
    pub uniform: String,
    #[serde(default = "default_uniform_kind")]
    pub uniform_kind: String,
    #[serde(default = "default_pickup")]
    pub pickup: String,
    #[serde(default = "default_gate")]
    pub gate: String,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        RuleDefaults {
            uniform: default_uniform(),
            uniform_kind: default_uniform_kind(),
            pickup: default_pickup(),
            gate: default_gate(),
        }
    }
}

fn default_uniform() -> String {
    DEFAULT_UNIFORM.to_string()
}
fn default_uniform_kind() -> String {
    DEFAULT_UNIFORM_KIND.to_string()
}
fn default_pickup() -> String {
    DEFAULT_PICKUP.to_string()
}
fn default_gate() -> String {
    DEFAULT_GATE.to_string()
}

/// Rule-set record for one child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRules {
    pub name: String,
    /// School year label, e.g. "Year 2"
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub class: String,
    pub gate: Option<String>,
    /// Standard pickup time
    pub pickup: Option<String>,
    /// Pickup time on after-school-club days
    pub club_pickup: Option<String>,
    #[serde(default)]
    pub club_days: Vec<Weekday>,
    /// This child's pickup time tracks the named child's club days, not its own.
    pub follows_club_schedule_of: Option<String>,
    /// Uniform when no `uniform_days` entry matches
    pub uniform: Option<UniformRule>,
    #[serde(default)]
    pub uniform_days: Vec<DayUniform>,
    #[serde(default)]
    pub activities: Vec<ActivityRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformRule {
    pub uniform: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayUniform {
    pub day: Weekday,
    pub uniform: String,
    pub kind: String,
}

/// A recurring timed activity in a child's week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRule {
    pub day: Weekday,
    pub title: String,
    pub time: String,
    /// Supervising teacher or staff group
    pub teacher: String,
}

impl ChildRules {
    pub fn has_club(&self, weekday: Weekday) -> bool {
        self.club_days.contains(&weekday)
    }

    pub fn activities_on(&self, weekday: Weekday) -> impl Iterator<Item = &ActivityRule> {
        self.activities.iter().filter(move |a| a.day == weekday)
    }
}

impl Roster {
    /// Parse and check a roster from TOML text.
    pub fn from_toml(content: &str) -> SchoolCalResult<Self> {
        let roster: Roster =
            toml::from_str(content).map_err(|e| SchoolCalError::Config(e.to_string()))?;
        roster.check()?;
        Ok(roster)
    }

    pub fn load(path: &Path) -> SchoolCalResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchoolCalError::Config(format!("Could not read roster {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Install the roster as process-wide read-only state.
    /// The first call wins; later calls return the installed roster.
    pub fn install(self) -> &'static Roster {
        ROSTER.get_or_init(|| self)
    }

    pub fn child(&self, name: &str) -> Option<&ChildRules> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }

    fn check(&self) -> SchoolCalResult<()> {
        if self.children.is_empty() {
            return Err(SchoolCalError::Config("roster has no children".into()));
        }

        let mut names = HashSet::new();
        for child in &self.children {
            if child.name.trim().is_empty() {
                return Err(SchoolCalError::Config("roster child with empty name".into()));
            }
            if !names.insert(child.name.as_str()) {
                return Err(SchoolCalError::Config(format!(
                    "child '{}' listed twice in roster",
                    child.name
                )));
            }
        }

        for child in &self.children {
            if let Some(anchor) = &child.follows_club_schedule_of {
                if anchor == &child.name {
                    return Err(SchoolCalError::Config(format!(
                        "child '{}' cannot follow its own club schedule",
                        child.name
                    )));
                }
                if !names.contains(anchor.as_str()) {
                    return Err(SchoolCalError::Config(format!(
                        "child '{}' follows unknown child '{}'",
                        child.name, anchor
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Full English weekday name ("Monday").
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
pub(crate) const TEST_ROSTER: &str = r#"
school_name = "Hampstead Hill School"

[[children]]
name = "Leo"
year = "Year 2"
class = "Poplar"
gate = "West Gate"
pickup = "3:40 PM"
club_pickup = "5:30 PM"
club_days = ["Monday", "Tuesday", "Wednesday", "Thursday"]
uniform_days = [
    { day = "Tuesday", uniform = "Sports Wear", kind = "Sports" },
    { day = "Wednesday", uniform = "Sports Wear", kind = "Sports" },
]
activities = [
    { day = "Monday", title = "Swimming", time = "10:30-11:30", teacher = "Mr. Roberts" },
    { day = "Monday", title = "Chess Club", time = "15:45-16:45", teacher = "Mr. Johnson" },
    { day = "Thursday", title = "Drama Club", time = "15:45-16:45", teacher = "Ms. Williams" },
]

[[children]]
name = "Novah"
year = "Early Years"
class = "Butterflies"
gate = "Meadow Gate"
pickup = "3:40 PM"
club_pickup = "5:30 PM"
follows_club_schedule_of = "Leo"
uniform_days = [{ day = "Thursday", uniform = "Forest School Kit", kind = "Forest" }]
activities = [
    { day = "Thursday", title = "Forest School", time = "9:00-11:00", teacher = "Miss Emma" },
]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster() {
        let roster = Roster::from_toml(TEST_ROSTER).unwrap();
        assert_eq!(roster.names(), vec!["Leo", "Novah"]);

        let leo = roster.child("Leo").unwrap();
        assert!(leo.has_club(Weekday::Thu));
        assert!(!leo.has_club(Weekday::Fri));
        assert_eq!(leo.activities_on(Weekday::Mon).count(), 2);

        let novah = roster.child("Novah").unwrap();
        assert_eq!(novah.follows_club_schedule_of.as_deref(), Some("Leo"));
        assert!(novah.club_days.is_empty());
        assert_eq!(roster.defaults.gate, "Main Gate");
    }

    #[test]
    fn test_unknown_anchor_rejected() {
        let toml = r#"
school_name = "S"
[[children]]
name = "Novah"
follows_club_schedule_of = "Leo"
"#;
        assert!(Roster::from_toml(toml).is_err());
    }

    #[test]
    fn test_self_anchor_and_duplicates_rejected() {
        let self_anchor = r#"
school_name = "S"
[[children]]
name = "Leo"
follows_club_schedule_of = "Leo"
"#;
        assert!(Roster::from_toml(self_anchor).is_err());

        let duplicate = r#"
school_name = "S"
[[children]]
name = "Leo"
[[children]]
name = "Leo"
"#;
        assert!(Roster::from_toml(duplicate).is_err());
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(weekday_name(Weekday::Thu), "Thursday");
        assert_eq!(weekday_name(Weekday::Sun), "Sunday");
    }
}
