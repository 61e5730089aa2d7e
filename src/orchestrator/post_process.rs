//! Post-job processing utilities.
//!
//! Records the history entry and runs the optional export after a job completes.

use crate::model::{EnhancedArtifact, HistoryEntry, JobRequest};
use crate::session::Session;
use anyhow::{Context, Result};
use std::path::Path;

/// Result of post-job processing, ready for presentation layers.
pub(crate) struct ProcessedJob {
    pub entry: HistoryEntry,
    pub export_messages: Vec<String>,
}

/// Write one history entry as pretty JSON.
pub(crate) fn export_entry_json(path: &Path, entry: &HistoryEntry) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(entry)?;
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Record a completed job in the session history and export it if requested.
pub(crate) fn process_job_completion(
    session: &mut Session,
    request: &JobRequest,
    artifact: &EnhancedArtifact,
    export_path: Option<&Path>,
) -> ProcessedJob {
    let id = session.record_success(request, artifact);
    let entry = session
        .history
        .get(id)
        .cloned()
        .unwrap_or_else(|| HistoryEntry {
            id,
            original_name: request.input.name.clone(),
            enhanced_path: artifact.path.clone(),
            timestamp: String::new(),
            settings: request.settings.clone(),
            elapsed: artifact.elapsed,
        });

    let mut export_messages = Vec::new();
    if let Some(export_path) = export_path {
        match export_entry_json(export_path, &entry) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedJob {
        entry,
        export_messages,
    }
}
