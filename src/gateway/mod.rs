//! Host process gateway.
//!
//! The boundary between the job orchestrator and the host: file selection and
//! process spawning. The orchestrator depends only on the [`HostGateway`]
//! contract so tests can substitute a recording fake.

mod dialogs;
mod process;

pub use process::ProcessOutput;

use crate::engine::command::CommandLine;
use crate::error::SpawnError;
use crate::model::{JobEvent, OutputFormat};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

pub trait HostGateway: Send + Sync {
    /// Ask the user for an input video. `None` when cancelled.
    fn pick_input_file(&self) -> impl Future<Output = Option<PathBuf>> + Send;

    /// Ask the user where to save the enhanced video. `None` when cancelled.
    fn pick_output_location(
        &self,
        default_name: &str,
        format: OutputFormat,
    ) -> impl Future<Output = Option<PathBuf>> + Send;

    /// Run a composed command line to completion, capturing its output.
    fn spawn_process(
        &self,
        command: &CommandLine,
        cwd: &Path,
        max_buffer_bytes: usize,
    ) -> impl Future<Output = Result<ProcessOutput, SpawnError>> + Send;
}

/// Gateway backed by native dialogs and real child processes.
#[derive(Debug, Clone, Default)]
pub struct DesktopGateway {
    events: Option<UnboundedSender<JobEvent>>,
}

impl DesktopGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every captured output line as a [`JobEvent::OutputLine`].
    pub fn with_events(events: UnboundedSender<JobEvent>) -> Self {
        Self {
            events: Some(events),
        }
    }
}

impl HostGateway for DesktopGateway {
    async fn pick_input_file(&self) -> Option<PathBuf> {
        let picked = dialogs::pick_input_file().await;
        tracing::debug!(?picked, "input picker closed");
        picked
    }

    async fn pick_output_location(
        &self,
        default_name: &str,
        format: OutputFormat,
    ) -> Option<PathBuf> {
        let picked = dialogs::pick_output_location(default_name, format).await;
        tracing::debug!(?picked, "save dialog closed");
        picked
    }

    async fn spawn_process(
        &self,
        command: &CommandLine,
        cwd: &Path,
        max_buffer_bytes: usize,
    ) -> Result<ProcessOutput, SpawnError> {
        process::run_captured(command, cwd, max_buffer_bytes, self.events.as_ref()).await
    }
}
