//! Error types for enhancement jobs.
//!
//! `EnhancementError` is the structured result of the job orchestrator;
//! `SpawnError` is what the host gateway reports when the external command
//! could not be run to completion.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Tail of each stream captured before a capture failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Failure while spawning or capturing the external command.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while running process: {0}")]
    Io(#[from] io::Error),

    #[error("I/O error while capturing process output: {source}")]
    Capture {
        #[source]
        source: io::Error,
        partial: PartialOutput,
    },

    /// Combined stdout/stderr grew past the capture limit; the child was killed.
    #[error("process output exceeded the {limit} byte capture buffer")]
    BufferExceeded { limit: usize, partial: PartialOutput },
}

impl SpawnError {
    /// Output read before the failure, when capture had started.
    pub fn partial_output(&self) -> Option<&PartialOutput> {
        match self {
            SpawnError::Capture { partial, .. } | SpawnError::BufferExceeded { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EnhancementError {
    /// The virtual environment activation script is absent.
    #[error("Activate script not found at {}", path.display())]
    MissingEnvironment { path: PathBuf },

    /// The external enhancement script is absent.
    #[error("Script not found at {}", path.display())]
    MissingTool { path: PathBuf },

    #[error("Input file not found at {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("Could not create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Enhancement command failed: {source}")]
    ExecutionFailure {
        #[source]
        source: SpawnError,
    },

    /// The process ran but the expected artifact is missing.
    #[error("Output file not created at {}", path.display())]
    ArtifactNotProduced {
        path: PathBuf,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl EnhancementError {
    /// Raw tool output attached to the failure, if any was captured.
    pub fn captured_output(&self) -> Option<String> {
        match self {
            EnhancementError::ArtifactNotProduced { stdout, stderr, .. } => {
                Some(format!("STDOUT: {stdout}\nSTDERR: {stderr}"))
            }
            EnhancementError::ExecutionFailure { source } => source
                .partial_output()
                .map(|p| format!("STDOUT: {}\nSTDERR: {}", p.stdout, p.stderr)),
            _ => None,
        }
    }

    /// True for failures detected before any process was started.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EnhancementError::MissingEnvironment { .. }
                | EnhancementError::MissingTool { .. }
                | EnhancementError::MissingInput { .. }
                | EnhancementError::OutputDirectory { .. }
        )
    }
}
