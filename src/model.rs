use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File extensions accepted by the input picker.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "webm"];

/// Layout of the external Real-ESRGAN checkout the jobs are run against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLayout {
    pub project_dir: PathBuf,
    pub venv_dir: String,
    pub script: String,
    pub python: String,
}

impl ToolLayout {
    /// Platform activation script inside the virtual environment.
    pub fn activate_script(&self) -> PathBuf {
        let venv = self.project_dir.join(&self.venv_dir);
        if cfg!(windows) {
            venv.join("Scripts").join("activate.bat")
        } else {
            venv.join("bin").join("activate")
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.project_dir.join(&self.script)
    }

    /// Where artifacts land when the user never picked a save location.
    pub fn default_results_dir(&self) -> PathBuf {
        self.project_dir.join("results")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceConfig {
    pub layout: ToolLayout,
    pub settings: EnhancementSettings,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub max_buffer_bytes: usize,
    pub export_json: Option<PathBuf>,
}

/// Requested upscaling factor. Unknown labels are kept verbatim and map to
/// the fallback model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Upscaling {
    X2,
    X4,
    Other(String),
}

impl Upscaling {
    /// Cycle order used by the TUI.
    pub fn next(&self) -> Self {
        match self {
            Upscaling::X2 => Upscaling::X4,
            Upscaling::X4 => Upscaling::Other("1.5x".into()),
            Upscaling::Other(_) => Upscaling::X2,
        }
    }
}

impl fmt::Display for Upscaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upscaling::X2 => write!(f, "2x"),
            Upscaling::X4 => write!(f, "4x"),
            Upscaling::Other(label) => write!(f, "{label}"),
        }
    }
}

impl FromStr for Upscaling {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "2x" => Upscaling::X2,
            "4x" => Upscaling::X4,
            other => Upscaling::Other(other.to_string()),
        })
    }
}

impl From<String> for Upscaling {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(u) => u,
            Err(never) => match never {},
        }
    }
}

impl From<Upscaling> for String {
    fn from(u: Upscaling) -> Self {
        u.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NoiseReduction {
    Low,
    Medium,
    High,
}

impl NoiseReduction {
    pub fn next(self) -> Self {
        match self {
            NoiseReduction::Low => NoiseReduction::Medium,
            NoiseReduction::Medium => NoiseReduction::High,
            NoiseReduction::High => NoiseReduction::Low,
        }
    }
}

impl fmt::Display for NoiseReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoiseReduction::Low => "low",
            NoiseReduction::Medium => "medium",
            NoiseReduction::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Mp4,
    Avi,
    Mov,
    Mkv,
    Webm,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Avi => "avi",
            OutputFormat::Mov => "mov",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Webm => "webm",
        }
    }

    pub fn next(self) -> Self {
        match self {
            OutputFormat::Mp4 => OutputFormat::Avi,
            OutputFormat::Avi => OutputFormat::Mov,
            OutputFormat::Mov => OutputFormat::Mkv,
            OutputFormat::Mkv => OutputFormat::Webm,
            OutputFormat::Webm => OutputFormat::Mp4,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Frame rates offered by the TUI selector.
pub const FRAME_RATES: [&str; 4] = ["24", "30", "60", "original"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementSettings {
    pub upscaling: Upscaling,
    pub sharpening: u8,
    pub noise_reduction: NoiseReduction,
    pub frame_rate: String,
    pub output_format: OutputFormat,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            upscaling: Upscaling::X2,
            sharpening: 50,
            noise_reduction: NoiseReduction::Low,
            frame_rate: "30".into(),
            output_format: OutputFormat::Mp4,
        }
    }
}

impl EnhancementSettings {
    pub fn adjust_sharpening(&mut self, delta: i16) {
        let v = (self.sharpening as i16 + delta).clamp(0, 100);
        self.sharpening = v as u8;
    }

    pub fn cycle_frame_rate(&mut self) {
        let idx = FRAME_RATES
            .iter()
            .position(|r| *r == self.frame_rate)
            .map(|i| (i + 1) % FRAME_RATES.len())
            .unwrap_or(0);
        self.frame_rate = FRAME_RATES[idx].to_string();
    }

    /// One-line rendering used by history rows and text summaries.
    pub fn describe(&self) -> String {
        format!(
            "Upscaling: {} | Sharpening: {} | Noise Reduction: {} | Frame rate: {} | Format: {}",
            self.upscaling, self.sharpening, self.noise_reduction, self.frame_rate, self.output_format
        )
    }
}

/// A selected input video. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: PathBuf,
    pub mime_type: String,
}

impl FileRef {
    /// Build a reference for a supported video file; `None` for other extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let mime_type = match ext.as_str() {
            "mp4" => "video/mp4",
            "avi" => "video/x-msvideo",
            "mov" => "video/quicktime",
            "mkv" => "video/x-matroska",
            "webm" => "video/webm",
            _ => return None,
        };
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            name,
            path: path.to_path_buf(),
            mime_type: mime_type.to_string(),
        })
    }
}

/// Everything needed to start one enhancement job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: FileRef,
    pub settings: EnhancementSettings,
    pub output_dir: PathBuf,
}

/// Successful job output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedArtifact {
    pub path: PathBuf,
    /// Raw tool output (stdout, or stderr when stdout was empty).
    pub output: String,
    pub exit_code: Option<i32>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub original_name: String,
    pub enhanced_path: PathBuf,
    pub timestamp: String,
    pub settings: EnhancementSettings,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Preparing,
    Running,
    Validating,
    Complete,
}

impl JobPhase {
    pub fn percent(self) -> u16 {
        match self {
            JobPhase::Preparing => 10,
            JobPhase::Running => 30,
            JobPhase::Validating => 90,
            JobPhase::Complete => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobPhase::Preparing => "Preparing enhancement...",
            JobPhase::Running => "Running enhancement...",
            JobPhase::Validating => "Checking enhanced video...",
            JobPhase::Complete => "Enhancement complete!",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    PhaseStarted {
        phase: JobPhase,
    },
    OutputLine {
        line: String,
        stderr: bool,
    },
    Info(InfoEvent),
    JobCompleted {
        request: Box<JobRequest>,
        artifact: Box<EnhancedArtifact>,
    },
    JobFailed {
        request: Box<JobRequest>,
        message: String,
        output: Option<String>,
    },
}

/// Structured info events emitted by the engine and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Command { line: String },
    CreatedOutputDir { path: PathBuf },
    JobBusy,
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Command { line } => format!("Executing command: {line}"),
            InfoEvent::CreatedOutputDir { path } => {
                format!("Created output directory {}", path.display())
            }
            InfoEvent::JobBusy => "An enhancement is already running".to_string(),
        }
    }
}
