//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for text mode.

use crate::engine::command::model_for;
use crate::model::{EnhancedArtifact, HistoryEntry};
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a recorded entry and the artifact it came from.
pub(crate) fn build_text_summary(entry: &HistoryEntry, artifact: &EnhancedArtifact) -> TextSummary {
    let mut lines = Vec::new();
    let model = model_for(&entry.settings.upscaling);

    lines.push(format!("Input:    {}", entry.original_name));
    lines.push(format!("Output:   {}", entry.enhanced_path.display()));
    lines.push(format!("Model:    {} (x{})", model.name, model.scale));
    lines.push(format!("Settings: {}", entry.settings.describe()));
    lines.push(format!(
        "Elapsed:  {}",
        humantime::format_duration(Duration::from_secs(entry.elapsed.as_secs()))
    ));
    match artifact.exit_code {
        Some(0) => {}
        Some(code) => lines.push(format!("Exit code: {code} (artifact present, treated as success)")),
        None => lines.push("Exit code: terminated by signal (artifact present)".to_string()),
    }
    if !entry.timestamp.is_empty() {
        lines.push(format!("Finished: {}", entry.timestamp));
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnhancementSettings, Upscaling};
    use std::path::PathBuf;

    fn fixture(exit_code: Option<i32>) -> (HistoryEntry, EnhancedArtifact) {
        let artifact = EnhancedArtifact {
            path: PathBuf::from("/out/enhanced_clip.mp4"),
            output: String::new(),
            exit_code,
            elapsed: Duration::from_millis(61_400),
        };
        let entry = HistoryEntry {
            id: 1,
            original_name: "clip.mp4".into(),
            enhanced_path: artifact.path.clone(),
            timestamp: "2024-05-01T10:00:00+02:00".into(),
            settings: EnhancementSettings {
                upscaling: Upscaling::X4,
                ..Default::default()
            },
            elapsed: artifact.elapsed,
        };
        (entry, artifact)
    }

    #[test]
    fn summary_lists_model_and_elapsed() {
        let (entry, artifact) = fixture(Some(0));
        let summary = build_text_summary(&entry, &artifact);
        assert!(summary.lines.contains(&"Model:    RealESRGAN_x4plus (x4)".to_string()));
        assert!(summary.lines.contains(&"Elapsed:  1m 1s".to_string()));
        assert!(!summary.lines.iter().any(|l| l.starts_with("Exit code")));
    }

    #[test]
    fn nonzero_exit_is_mentioned() {
        let (entry, artifact) = fixture(Some(1));
        let summary = build_text_summary(&entry, &artifact);
        assert!(summary.lines.iter().any(|l| l.starts_with("Exit code: 1")));
    }
}
