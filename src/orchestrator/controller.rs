//! Job lifecycle controller.
//!
//! Owns the single in-flight enhancement and emits events for presentation layers.

use crate::engine::EnhancementEngine;
use crate::error::EnhancementError;
use crate::gateway::HostGateway;
use crate::model::{EnhancedArtifact, InfoEvent, JobEvent, JobRequest};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Enhance(Box<JobRequest>),
    Quit,
}

/// Internal handle for a running job.
struct RunCtx {
    request: JobRequest,
    handle: Option<tokio::task::JoinHandle<Result<EnhancedArtifact, EnhancementError>>>,
}

fn start_job<G: HostGateway + 'static>(
    engine: &Arc<EnhancementEngine<G>>,
    request: JobRequest,
) -> RunCtx {
    let engine = Arc::clone(engine);
    let job = request.clone();
    let handle = tokio::spawn(async move {
        engine
            .run_enhancement(&job.input, &job.settings, &job.output_dir)
            .await
    });
    RunCtx {
        request,
        handle: Some(handle),
    }
}

/// Run jobs on request from the UI and report their outcome back.
pub(crate) async fn run_controller<G: HostGateway + 'static>(
    engine: Arc<EnhancementEngine<G>>,
    event_tx: UnboundedSender<JobEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut run_ctx: Option<RunCtx> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Enhance(request)) => {
                        if run_ctx.is_some() {
                            tracing::debug!("enhance refused, job already running");
                            let _ = event_tx.send(JobEvent::Info(InfoEvent::JobBusy));
                        } else {
                            tracing::info!(input = %request.input.name, "starting enhancement");
                            run_ctx = Some(start_job(&engine, *request));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Dropping the task drops the child handle, which kills the process.
                        if let Some(mut ctx) = run_ctx.take() {
                            if let Some(h) = ctx.handle.take() {
                                tracing::info!("quitting with a job in flight, terminating it");
                                h.abort();
                            }
                        }
                        break Ok(());
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut run_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                let Some(join_res) = maybe_done else { continue };
                let Some(ctx) = run_ctx.take() else { continue };
                let request = Box::new(ctx.request);
                match join_res {
                    Ok(Ok(artifact)) => {
                        let _ = event_tx.send(JobEvent::JobCompleted {
                            request,
                            artifact: Box::new(artifact),
                        });
                    }
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "enhancement failed");
                        let _ = event_tx.send(JobEvent::JobFailed {
                            request,
                            message: e.to_string(),
                            output: e.captured_output(),
                        });
                    }
                    Err(e) => {
                        let _ = event_tx.send(JobEvent::JobFailed {
                            request,
                            message: format!("Enhancement task failed: {e}"),
                            output: None,
                        });
                    }
                }
            }
        }
    }
}
