use crate::engine::EnhancementEngine;
use crate::gateway::{DesktopGateway, HostGateway};
use crate::model::{
    EnhanceConfig, EnhancementSettings, HistoryEntry, JobEvent, NoiseReduction, OutputFormat,
    ToolLayout, Upscaling,
};
use crate::session::Session;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "video-enhancer",
    version,
    about = "Real-ESRGAN video enhancement with optional TUI"
)]
pub struct Cli {
    /// Input video (mp4, avi, mov, mkv, webm). Opens a file picker when omitted
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Save location; the enhanced video is written into its directory
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Upscaling factor: 2x, 4x, or any other label for the anime video model
    #[arg(long, default_value = "2x")]
    pub upscaling: Upscaling,

    /// Sharpening strength (0-100)
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub sharpening: u8,

    #[arg(long, value_enum, default_value = "low")]
    pub noise_reduction: NoiseReduction,

    /// Target frame rate (24, 30, 60, original)
    #[arg(long, default_value = "30")]
    pub frame_rate: String,

    #[arg(long, value_enum, default_value = "mp4")]
    pub output_format: OutputFormat,

    /// Real-ESRGAN checkout the script runs from
    #[arg(long, default_value = "Real-ESRGAN-master")]
    pub project_dir: PathBuf,

    /// Virtual environment directory inside the project
    #[arg(long, default_value = ".venv")]
    pub venv_dir: String,

    /// Inference script inside the project
    #[arg(long, default_value = "inference_realesrgan_video.py")]
    pub script: String,

    /// Python interpreter used after activation
    #[arg(long, default_value = "python")]
    pub python: String,

    /// Combined stdout/stderr capture limit in MiB
    #[arg(long, default_value_t = 50)]
    pub max_buffer_mb: usize,

    /// Run one job and print the JSON result (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Run one job and print a text summary (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Export the history entry as JSON after a successful job
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    pub fn is_one_shot(&self) -> bool {
        self.json || self.text
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.is_one_shot() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Build an `EnhanceConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> EnhanceConfig {
    let project_dir = if args.project_dir.is_absolute() {
        args.project_dir.clone()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&args.project_dir))
            .unwrap_or_else(|_| args.project_dir.clone())
    };
    EnhanceConfig {
        layout: ToolLayout {
            project_dir,
            venv_dir: args.venv_dir.clone(),
            script: args.script.clone(),
            python: args.python.clone(),
        },
        settings: EnhancementSettings {
            upscaling: args.upscaling.clone(),
            sharpening: args.sharpening,
            noise_reduction: args.noise_reduction,
            frame_rate: args.frame_rate.clone(),
            output_format: args.output_format,
        },
        input: args.input.clone(),
        output: args.output.clone(),
        max_buffer_bytes: args.max_buffer_mb.saturating_mul(1024 * 1024),
        export_json: args.export_json.clone(),
    }
}

/// Session seeded from the configuration, with input resolved through the gateway when needed.
pub(crate) async fn prepare_session<G: HostGateway>(
    cfg: &EnhanceConfig,
    gateway: &G,
) -> Result<Session> {
    let mut session = Session::new(cfg.settings.clone(), cfg.layout.default_results_dir());
    let input = match cfg.input.clone() {
        Some(p) => p,
        None => gateway
            .pick_input_file()
            .await
            .context("no input file selected (pass --input)")?,
    };
    session.select_file(&input)?;
    if let Some(out) = cfg.output.clone() {
        session.set_output_path(out);
    }
    Ok(session)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    entry: &'a HistoryEntry,
    exit_code: Option<i32>,
    output: &'a str,
}

async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let gateway = DesktopGateway::new();
    let mut session = prepare_session(&cfg, &gateway).await?;
    let request = session.job_request()?;
    let (out_tx, out_handle) = spawn_output_writer();

    let engine = EnhancementEngine::new(gateway, cfg.layout.clone(), cfg.max_buffer_bytes);
    let outcome = engine
        .run_enhancement(&request.input, &request.settings, &request.output_dir)
        .await;

    let result = match outcome {
        Ok(artifact) => {
            let processed = crate::orchestrator::process_job_completion(
                &mut session,
                &request,
                &artifact,
                cfg.export_json.as_deref(),
            );
            for msg in processed.export_messages {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            let report = JsonReport {
                entry: &processed.entry,
                exit_code: artifact.exit_code,
                output: &artifact.output,
            };
            let out = serde_json::to_string_pretty(&report)?;
            let _ = out_tx.send(OutputLine::Stdout(out));
            Ok(())
        }
        Err(e) => {
            if let Some(output) = e.captured_output() {
                let _ = out_tx.send(OutputLine::Stderr(output));
            }
            Err(anyhow::Error::new(e).context("enhancement failed"))
        }
    };

    drop(out_tx);
    let _ = out_handle.await;
    result
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<JobEvent>();

    let gateway = DesktopGateway::with_events(evt_tx.clone());
    let mut session = prepare_session(&cfg, &gateway).await?;
    let request = session.job_request()?;

    let engine = EnhancementEngine::new(gateway, cfg.layout.clone(), cfg.max_buffer_bytes)
        .with_events(evt_tx);
    let job = request.clone();
    let handle = tokio::spawn(async move {
        engine
            .run_enhancement(&job.input, &job.settings, &job.output_dir)
            .await
    });

    while let Some(ev) = evt_rx.recv().await {
        match ev {
            JobEvent::PhaseStarted { phase } => {
                let _ = out_tx.send(OutputLine::Stderr(format!(
                    "== {} ({}%) ==",
                    phase.label(),
                    phase.percent()
                )));
            }
            JobEvent::OutputLine { line, .. } => {
                let _ = out_tx.send(OutputLine::Stderr(line));
            }
            JobEvent::Info(info) => {
                let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
            }
            JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. } => {}
        }
    }

    let result = match handle.await.context("enhancement task failed")? {
        Ok(artifact) => {
            let processed = crate::orchestrator::process_job_completion(
                &mut session,
                &request,
                &artifact,
                cfg.export_json.as_deref(),
            );
            let summary = crate::text_summary::build_text_summary(&processed.entry, &artifact);
            for line in summary.lines {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
            for msg in processed.export_messages {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            Ok(())
        }
        Err(e) => {
            if let Some(output) = e.captured_output() {
                let _ = out_tx.send(OutputLine::Stderr(output));
            }
            Err(anyhow::Error::new(e).context("enhancement failed"))
        }
    };

    drop(out_tx);
    let _ = out_handle.await;
    result
}
