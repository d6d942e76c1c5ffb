//! Action-required notices.
//!
//! Notices are read fresh from `notices.json` on every run and published
//! as-is; unlike events they are never merged with history.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SchoolCalError, SchoolCalResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    #[serde(default)]
    pub deadline: String,
    pub description: String,
    #[serde(rename = "children")]
    pub audience: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_button: Option<ActionButton>,
}

/// Link rendered as a button next to the notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// The notices for one run.
#[derive(Debug, Clone, Default)]
pub struct NoticeStore {
    notices: Vec<Notice>,
}

impl NoticeStore {
    /// Build a store, rejecting duplicate ids.
    pub fn new(notices: Vec<Notice>) -> SchoolCalResult<Self> {
        let mut ids = HashSet::new();
        for notice in &notices {
            if !ids.insert(notice.id.as_str()) {
                return Err(SchoolCalError::InvalidInput(format!(
                    "duplicate notice id '{}'",
                    notice.id
                )));
            }
        }
        Ok(NoticeStore { notices })
    }

    /// Load `notices.json`. A missing file means no notices this run.
    pub fn load(path: &Path) -> SchoolCalResult<Self> {
        if !path.exists() {
            return Ok(NoticeStore::default());
        }
        let content = std::fs::read_to_string(path)?;
        let notices: Vec<Notice> = serde_json::from_str(&content)?;
        Self::new(notices)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(id: &str) -> Notice {
        Notice {
            id: id.to_string(),
            title: "Half Term Holiday".to_string(),
            priority: Priority::Medium,
            deadline: "October 20th".to_string(),
            description: "School closed.".to_string(),
            audience: vec!["Leo".to_string()],
            action_button: None,
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(NoticeStore::new(vec![notice("a"), notice("b")]).is_ok());
        assert!(NoticeStore::new(vec![notice("a"), notice("a")]).is_err());
    }

    #[test]
    fn test_wire_shape() {
        let json = r#"{
            "id": "science-museum-trip",
            "title": "Science Museum Trip Permission",
            "priority": "high",
            "deadline": "October 10th",
            "description": "Permission slip needed.",
            "children": ["Leo"],
            "actionButton": {"text": "Complete Form", "url": "https://example.org/form"}
        }"#;
        let parsed: Notice = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.action_button.as_ref().unwrap().text, "Complete Form");

        let value = serde_json::to_value(notice("x")).unwrap();
        assert!(value.get("actionButton").is_none());
        assert_eq!(value["children"][0], "Leo");
        assert_eq!(value["priority"], "medium");
    }
}
