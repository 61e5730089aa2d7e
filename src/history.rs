//! In-memory record of successful enhancements for the current session.

use crate::model::{EnhancedArtifact, EnhancementSettings, HistoryEntry};
use std::time::{SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Most-recent-first list of finished jobs. Cleared on restart.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    last_id: u64,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful job at the front and return its id.
    pub fn push(
        &mut self,
        original_name: &str,
        settings: &EnhancementSettings,
        artifact: &EnhancedArtifact,
    ) -> u64 {
        let id = now_millis().max(self.last_id + 1);
        self.last_id = id;
        let entry = HistoryEntry {
            id,
            original_name: original_name.to_string(),
            enhanced_path: artifact.path.clone(),
            timestamp: local_timestamp(),
            settings: settings.clone(),
            elapsed: artifact.elapsed,
        };
        tracing::debug!(id, original_name, "recorded history entry");
        self.entries.insert(0, entry);
        id
    }

    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Remove exactly the entry with `id`, keeping the order of the rest.
    pub fn remove(&mut self, id: u64) -> Option<HistoryEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// RFC 3339 wall-clock time, in the local offset when it can be determined.
fn local_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn artifact(name: &str) -> EnhancedArtifact {
        EnhancedArtifact {
            path: PathBuf::from(format!("/out/enhanced_{name}")),
            output: String::new(),
            exit_code: Some(0),
            elapsed: Duration::from_secs(12),
        }
    }

    fn ledger_with(names: &[&str]) -> (HistoryLedger, Vec<u64>) {
        let mut ledger = HistoryLedger::new();
        let settings = EnhancementSettings::default();
        let ids = names
            .iter()
            .map(|n| ledger.push(n, &settings, &artifact(n)))
            .collect();
        (ledger, ids)
    }

    #[test]
    fn entries_are_most_recent_first_with_unique_ids() {
        let (ledger, ids) = ledger_with(&["a.mp4", "b.mp4", "c.mp4"]);
        let names: Vec<_> = ledger
            .entries()
            .iter()
            .map(|e| e.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["c.mp4", "b.mp4", "a.mp4"]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn remove_deletes_exactly_one_and_keeps_order() {
        let (mut ledger, ids) = ledger_with(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
        let removed = ledger.remove(ids[1]).unwrap();
        assert_eq!(removed.original_name, "b.mp4");
        let names: Vec<_> = ledger
            .entries()
            .iter()
            .map(|e| e.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["d.mp4", "c.mp4", "a.mp4"]);
        assert!(ledger.remove(ids[1]).is_none());
        assert!(ledger.get(ids[1]).is_none());
    }

    #[test]
    fn entry_snapshots_artifact_and_settings() {
        let mut ledger = HistoryLedger::new();
        let settings = EnhancementSettings {
            sharpening: 70,
            ..Default::default()
        };
        let id = ledger.push("clip.mp4", &settings, &artifact("clip.mp4"));
        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.enhanced_path, PathBuf::from("/out/enhanced_clip.mp4"));
        assert_eq!(entry.settings.sharpening, 70);
        assert_eq!(entry.elapsed, Duration::from_secs(12));
        assert!(OffsetDateTime::parse(&entry.timestamp, &Rfc3339).is_ok());
    }
}
