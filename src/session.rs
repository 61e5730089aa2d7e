//! Per-session state: the current file, chosen output, settings and history.

use crate::history::HistoryLedger;
use crate::model::{EnhancedArtifact, EnhancementSettings, FileRef, JobRequest};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Session {
    pub current_file: Option<FileRef>,
    pub output_path: Option<PathBuf>,
    pub settings: EnhancementSettings,
    pub history: HistoryLedger,
    default_dir: PathBuf,
}

impl Session {
    pub fn new(settings: EnhancementSettings, default_dir: PathBuf) -> Self {
        Self {
            current_file: None,
            output_path: None,
            settings,
            history: HistoryLedger::new(),
            default_dir,
        }
    }

    /// Validate and select an input video.
    pub fn select_file(&mut self, path: &Path) -> Result<&FileRef> {
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("Input file not found: {}", path.display()))?;
        if !path.is_file() {
            bail!("Not a file: {}", path.display());
        }
        let Some(file) = FileRef::from_path(&path) else {
            bail!("Please upload a video file");
        };
        tracing::info!(name = %file.name, mime = %file.mime_type, "selected input");
        Ok(self.current_file.insert(file))
    }

    /// Suggested save-dialog file name for the current file and format.
    pub fn default_output_name(&self) -> String {
        let ext = self.settings.output_format.extension();
        match &self.current_file {
            Some(file) => {
                let stem = Path::new(&file.name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.name.clone());
                format!("{stem}_enhanced.{ext}")
            }
            None => format!("enhanced_video.{ext}"),
        }
    }

    pub fn set_output_path(&mut self, path: PathBuf) {
        self.output_path = Some(path);
    }

    /// Directory the tool writes into.
    pub fn output_dir(&self) -> PathBuf {
        self.output_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_dir.clone())
    }

    /// Snapshot everything a job needs.
    pub fn job_request(&self) -> Result<JobRequest> {
        let Some(input) = self.current_file.clone() else {
            bail!("Please upload a video first.");
        };
        Ok(JobRequest {
            input,
            settings: self.settings.clone(),
            output_dir: self.output_dir(),
        })
    }

    pub fn record_success(&mut self, request: &JobRequest, artifact: &EnhancedArtifact) -> u64 {
        self.history
            .push(&request.input.name, &request.settings, artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputFormat;
    use std::time::Duration;

    fn session() -> Session {
        Session::new(EnhancementSettings::default(), PathBuf::from("/tool/results"))
    }

    #[test]
    fn default_output_name_follows_file_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("holiday.clip.mov");
        std::fs::write(&clip, b"x").unwrap();

        let mut s = session();
        assert_eq!(s.default_output_name(), "enhanced_video.mp4");
        s.select_file(&clip).unwrap();
        s.settings.output_format = OutputFormat::Webm;
        assert_eq!(s.default_output_name(), "holiday.clip_enhanced.webm");
    }

    #[test]
    fn output_dir_uses_chosen_parent_or_default() {
        let mut s = session();
        assert_eq!(s.output_dir(), PathBuf::from("/tool/results"));
        s.set_output_path(PathBuf::from("/videos/done/clip_enhanced.mp4"));
        assert_eq!(s.output_dir(), PathBuf::from("/videos/done"));
        s.set_output_path(PathBuf::from("bare.mp4"));
        assert_eq!(s.output_dir(), PathBuf::from("/tool/results"));
    }

    #[test]
    fn select_file_rejects_missing_and_non_video() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"x").unwrap();

        let mut s = session();
        let err = s.select_file(&notes).unwrap_err();
        assert_eq!(err.to_string(), "Please upload a video file");
        assert!(s.select_file(&dir.path().join("ghost.mp4")).is_err());
        assert!(s.current_file.is_none());
    }

    #[test]
    fn job_request_requires_a_file() {
        let s = session();
        let err = s.job_request().unwrap_err();
        assert_eq!(err.to_string(), "Please upload a video first.");
    }

    #[test]
    fn record_success_snapshots_request() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"x").unwrap();

        let mut s = session();
        s.select_file(&clip).unwrap();
        let request = s.job_request().unwrap();
        s.settings.sharpening = 0;

        let artifact = EnhancedArtifact {
            path: request.output_dir.join("enhanced_clip.mp4"),
            output: String::new(),
            exit_code: Some(0),
            elapsed: Duration::from_secs(3),
        };
        let id = s.record_success(&request, &artifact);
        let entry = s.history.get(id).unwrap();
        assert_eq!(entry.original_name, "clip.mp4");
        assert_eq!(entry.settings.sharpening, 50);
    }
}
