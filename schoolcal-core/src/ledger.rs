//! Record of source documents already turned into events.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::SchoolCalResult;
use crate::store::write_json_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    processed: BTreeSet<String>,
}

impl Ledger {
    /// Load the ledger; a missing file means nothing has been processed.
    pub fn load(path: &Path) -> SchoolCalResult<Self> {
        if !path.exists() {
            return Ok(Ledger::default());
        }
        let content = std::fs::read_to_string(path)?;
        let ids: Vec<String> = serde_json::from_str(&content)?;
        Ok(Ledger {
            processed: ids.into_iter().collect(),
        })
    }

    pub fn save(&self, path: &Path) -> SchoolCalResult<()> {
        let ids: Vec<&String> = self.processed.iter().collect();
        write_json_atomic(path, &ids)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Returns false if `id` was already recorded.
    pub fn mark(&mut self, id: impl Into<String>) -> bool {
        self.processed.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_idempotent() {
        let mut ledger = Ledger::default();
        assert!(ledger.mark("newsletter.pdf"));
        assert!(!ledger.mark("newsletter.pdf"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("newsletter.pdf"));
        assert!(!ledger.contains("term-dates.pdf"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_sources.json");
        assert!(Ledger::load(&path).unwrap().is_empty());

        let mut ledger = Ledger::default();
        ledger.mark("b.pdf");
        ledger.mark("a.pdf");
        ledger.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(ids, vec!["a.pdf", "b.pdf"]);
        assert_eq!(Ledger::load(&path).unwrap(), ledger);
    }
}
