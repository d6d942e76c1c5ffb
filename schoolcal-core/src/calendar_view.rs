//! Month view: one bucket per day holding that day's events.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// The slice of an event shown in a calendar cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub title: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: u32,
    pub events: Vec<CalendarEntry>,
}

/// The published `calendar` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub month: u32,
    pub year: i32,
    pub days: Vec<CalendarDay>,
}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Days in `month` of `year`; 0 for a month outside 1..=12.
pub fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        _ => 0,
    }
}

/// Build the day buckets for `month`/`year`. Events keep their input order
/// within a day.
pub fn build(events: &[Event], month: u32, year: i32) -> Vec<CalendarDay> {
    (1..=days_in_month(month, year))
        .map(|day| CalendarDay {
            date: day,
            events: events
                .iter()
                .filter(|e| e.day == day && e.month == month && e.year == year)
                .map(|e| CalendarEntry {
                    title: e.title.clone(),
                    children: e.audience.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn month_view(events: &[Event], month: u32, year: i32) -> CalendarMonth {
    CalendarMonth {
        month,
        year,
        days: build(events, month, year),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::make_event;

    #[test]
    fn test_leap_years() {
        assert_eq!(build(&[], 2, 2024).len(), 29);
        assert_eq!(build(&[], 2, 2023).len(), 28);
        assert_eq!(build(&[], 2, 1900).len(), 28);
        assert_eq!(build(&[], 2, 2000).len(), 29);
    }

    #[test]
    fn test_month_lengths() {
        assert_eq!(days_in_month(1, 2025), 31);
        assert_eq!(days_in_month(9, 2025), 30);
        assert_eq!(days_in_month(11, 2025), 30);
        assert_eq!(days_in_month(12, 2025), 31);
        assert_eq!(days_in_month(13, 2025), 0);
        assert!(build(&[], 0, 2025).is_empty());
    }

    #[test]
    fn test_buckets_hold_exactly_the_month_events() {
        let events = vec![
            make_event(10, 10, 2025, "Red, White and Blue Day"),
            make_event(10, 10, 2025, "Parent Consultations Day 1"),
            make_event(31, 10, 2025, "Exhibition"),
            make_event(10, 11, 2025, "Odd Socks Day"),
            make_event(10, 10, 2024, "Last Year"),
        ];

        let days = build(&events, 10, 2025);
        assert_eq!(days.len(), 31);
        assert_eq!(days[0].date, 1);
        assert_eq!(days[30].date, 31);

        let titles: Vec<&str> = days
            .iter()
            .flat_map(|d| d.events.iter().map(|e| e.title.as_str()))
            .collect();
        assert_eq!(
            titles,
            vec!["Red, White and Blue Day", "Parent Consultations Day 1", "Exhibition"]
        );

        assert_eq!(days[9].events.len(), 2);
        assert_eq!(days[9].events[0].children, vec!["Leo", "Novah"]);
        assert!(days[10].events.is_empty());
    }

    #[test]
    fn test_entry_projection_shape() {
        let view = month_view(&[make_event(3, 10, 2025, "Assembly")], 10, 2025);
        let value = serde_json::to_value(&view).unwrap();
        let entry = &value["days"][2]["events"][0];
        assert_eq!(entry["title"], "Assembly");
        assert!(entry.get("description").is_none());
        assert_eq!(value["month"], 10);
    }
}
