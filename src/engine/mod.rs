pub mod command;

use crate::error::EnhancementError;
use crate::gateway::HostGateway;
use crate::model::{
    EnhancedArtifact, EnhancementSettings, FileRef, InfoEvent, JobEvent, JobPhase, ToolLayout,
};
use command::{
    build_command, expected_artifact, model_for, CommandParams, ModelChoice, ShellFlavor,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;

/// Transient description of one invocation. Derived fresh for every call.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: FileRef,
    pub output_dir: PathBuf,
    pub model: &'static str,
    pub scale: f32,
}

impl Job {
    pub fn derive(input: &FileRef, settings: &EnhancementSettings, output_dir: &Path) -> Self {
        let choice = model_for(&settings.upscaling);
        Self {
            input: input.clone(),
            output_dir: output_dir.to_path_buf(),
            model: choice.name,
            scale: choice.scale,
        }
    }

    pub fn expected_artifact(&self) -> PathBuf {
        expected_artifact(&self.input.path, &self.output_dir)
    }
}

fn resolve_output_dir(dir: &Path) -> Result<PathBuf, EnhancementError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|source| EnhancementError::OutputDirectory {
            path: dir.to_path_buf(),
            source,
        })
}

/// Drives a single enhancement from precondition checks to artifact validation.
pub struct EnhancementEngine<G> {
    gateway: G,
    layout: ToolLayout,
    max_buffer_bytes: usize,
    flavor: ShellFlavor,
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl<G: HostGateway> EnhancementEngine<G> {
    pub fn new(gateway: G, layout: ToolLayout, max_buffer_bytes: usize) -> Self {
        Self {
            gateway,
            layout,
            max_buffer_bytes,
            flavor: ShellFlavor::native(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, ev: JobEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(ev);
        }
    }

    pub async fn run_enhancement(
        &self,
        input: &FileRef,
        settings: &EnhancementSettings,
        output_dir: &Path,
    ) -> Result<EnhancedArtifact, EnhancementError> {
        let started = Instant::now();
        self.emit(JobEvent::PhaseStarted {
            phase: JobPhase::Preparing,
        });

        let activate = self.layout.activate_script();
        if !activate.exists() {
            return Err(EnhancementError::MissingEnvironment { path: activate });
        }
        let script = self.layout.script_path();
        if !script.exists() {
            return Err(EnhancementError::MissingTool { path: script });
        }
        if !input.path.exists() {
            return Err(EnhancementError::MissingInput {
                path: input.path.clone(),
            });
        }

        // The tool runs from the project dir, so a relative path would land there.
        let output_dir = resolve_output_dir(output_dir)?;
        let output_dir = output_dir.as_path();
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir).map_err(|source| {
                EnhancementError::OutputDirectory {
                    path: output_dir.to_path_buf(),
                    source,
                }
            })?;
            tracing::info!(dir = %output_dir.display(), "created output directory");
            self.emit(JobEvent::Info(InfoEvent::CreatedOutputDir {
                path: output_dir.to_path_buf(),
            }));
        }

        let job = Job::derive(input, settings, output_dir);
        let command = build_command(
            &CommandParams {
                layout: &self.layout,
                input: &job.input.path,
                output_dir: &job.output_dir,
                model: ModelChoice {
                    name: job.model,
                    scale: job.scale,
                },
            },
            self.flavor,
        );
        tracing::info!(
            input = %job.input.path.display(),
            model = job.model,
            scale = job.scale,
            "executing command: {command}"
        );
        self.emit(JobEvent::Info(InfoEvent::Command {
            line: command.to_string(),
        }));
        self.emit(JobEvent::PhaseStarted {
            phase: JobPhase::Running,
        });

        let output = self
            .gateway
            .spawn_process(&command, &self.layout.project_dir, self.max_buffer_bytes)
            .await
            .map_err(|source| EnhancementError::ExecutionFailure { source })?;

        // Exit status is informational only; the artifact decides success.
        if output.exit_code != Some(0) {
            tracing::warn!(exit_code = ?output.exit_code, "enhancement process exited abnormally");
        }

        self.emit(JobEvent::PhaseStarted {
            phase: JobPhase::Validating,
        });
        let artifact = job.expected_artifact();
        if !artifact.exists() {
            tracing::error!(path = %artifact.display(), "expected artifact missing");
            return Err(EnhancementError::ArtifactNotProduced {
                path: artifact,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        let elapsed = started.elapsed();
        tracing::info!(
            path = %artifact.display(),
            elapsed = %humantime::format_duration(std::time::Duration::from_secs(elapsed.as_secs())),
            "enhancement finished"
        );
        self.emit(JobEvent::PhaseStarted {
            phase: JobPhase::Complete,
        });

        Ok(EnhancedArtifact {
            path: artifact,
            output: if output.stdout.is_empty() {
                output.stderr
            } else {
                output.stdout
            },
            exit_code: output.exit_code,
            elapsed,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::command::CommandLine;
    use crate::error::SpawnError;
    use crate::gateway::ProcessOutput;
    use crate::model::{OutputFormat, Upscaling};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What the fake process does when spawned.
    #[derive(Clone)]
    pub(crate) enum FakeRun {
        /// Write the artifact, then exit with the given code.
        Produce { exit_code: i32 },
        /// Exit without writing anything.
        Nothing { exit_code: i32, stderr: String },
        Fail,
    }

    /// Gateway that records spawn calls instead of running anything.
    #[derive(Clone)]
    pub(crate) struct RecordingGateway {
        pub spawns: Arc<AtomicUsize>,
        pub commands: Arc<Mutex<Vec<CommandLine>>>,
        pub behaviour: FakeRun,
        pub artifact: Arc<Mutex<Option<PathBuf>>>,
    }

    impl RecordingGateway {
        pub fn new(behaviour: FakeRun) -> Self {
            Self {
                spawns: Arc::new(AtomicUsize::new(0)),
                commands: Arc::new(Mutex::new(Vec::new())),
                behaviour,
                artifact: Arc::new(Mutex::new(None)),
            }
        }

        /// Path the fake writes on `Produce`.
        pub fn produces(self, path: PathBuf) -> Self {
            *self.artifact.lock().unwrap() = Some(path);
            self
        }
    }

    impl HostGateway for RecordingGateway {
        async fn pick_input_file(&self) -> Option<PathBuf> {
            None
        }

        async fn pick_output_location(&self, _: &str, _: OutputFormat) -> Option<PathBuf> {
            None
        }

        async fn spawn_process(
            &self,
            command: &CommandLine,
            _cwd: &Path,
            _max_buffer_bytes: usize,
        ) -> Result<ProcessOutput, SpawnError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            self.commands.lock().unwrap().push(command.clone());
            match &self.behaviour {
                FakeRun::Produce { exit_code } => {
                    let target = self.artifact.lock().unwrap().clone();
                    if let Some(p) = target {
                        std::fs::write(p, b"video")?;
                    }
                    Ok(ProcessOutput {
                        stdout: "Testing 0 clip\n".into(),
                        stderr: String::new(),
                        exit_code: Some(*exit_code),
                    })
                }
                FakeRun::Nothing { exit_code, stderr } => Ok(ProcessOutput {
                    stdout: String::new(),
                    stderr: stderr.clone(),
                    exit_code: Some(*exit_code),
                }),
                FakeRun::Fail => Err(SpawnError::BufferExceeded {
                    limit: 8,
                    partial: Default::default(),
                }),
            }
        }
    }

    /// Real-ESRGAN checkout skeleton inside a temp dir.
    pub(crate) fn fake_project(root: &Path) -> ToolLayout {
        let layout = ToolLayout {
            project_dir: root.join("Real-ESRGAN-master"),
            venv_dir: ".venv".into(),
            script: "inference_realesrgan_video.py".into(),
            python: "python".into(),
        };
        let activate = layout.activate_script();
        std::fs::create_dir_all(activate.parent().unwrap()).unwrap();
        std::fs::write(&activate, "").unwrap();
        std::fs::write(layout.script_path(), "").unwrap();
        layout
    }

    pub(crate) fn input_file(root: &Path, name: &str) -> FileRef {
        let path = root.join(name);
        std::fs::write(&path, b"source").unwrap();
        FileRef::from_path(&path).unwrap()
    }

    #[tokio::test]
    async fn four_x_scenario_builds_expected_command_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let input = input_file(dir.path(), "clip.mp4");
        let out = dir.path().join("out");
        let gateway =
            RecordingGateway::new(FakeRun::Produce { exit_code: 0 }).produces(out.join("enhanced_clip.mp4"));
        let engine = EnhancementEngine::new(gateway.clone(), layout, 1024);
        let settings = EnhancementSettings {
            upscaling: Upscaling::X4,
            ..Default::default()
        };

        let artifact = engine.run_enhancement(&input, &settings, &out).await.unwrap();

        assert_eq!(artifact.path, out.join("enhanced_clip.mp4"));
        assert_eq!(artifact.output, "Testing 0 clip\n");
        let commands = gateway.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].line.contains("-n RealESRGAN_x4plus --outscale 4 --face_enhance"));
    }

    #[tokio::test]
    async fn missing_activation_script_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        std::fs::remove_file(layout.activate_script()).unwrap();
        let input = input_file(dir.path(), "clip.mp4");
        let gateway = RecordingGateway::new(FakeRun::Produce { exit_code: 0 });
        let engine = EnhancementEngine::new(gateway.clone(), layout, 1024);

        let err = engine
            .run_enhancement(&input, &EnhancementSettings::default(), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, EnhancementError::MissingEnvironment { .. }));
        assert_eq!(gateway.spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_script_is_reported_before_input() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        std::fs::remove_file(layout.script_path()).unwrap();
        let ghost = FileRef::from_path(&dir.path().join("ghost.mp4")).unwrap();
        let gateway = RecordingGateway::new(FakeRun::Produce { exit_code: 0 });
        let engine = EnhancementEngine::new(gateway.clone(), layout, 1024);

        let err = engine
            .run_enhancement(&ghost, &EnhancementSettings::default(), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, EnhancementError::MissingTool { .. }));
        assert_eq!(gateway.spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_input_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let ghost = FileRef::from_path(&dir.path().join("ghost.mp4")).unwrap();
        let gateway = RecordingGateway::new(FakeRun::Produce { exit_code: 0 });
        let engine = EnhancementEngine::new(gateway.clone(), layout, 1024);

        let err = engine
            .run_enhancement(&ghost, &EnhancementSettings::default(), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, EnhancementError::MissingInput { .. }));
        assert!(err.is_precondition());
        assert_eq!(gateway.spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clean_exit_without_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let input = input_file(dir.path(), "clip.mp4");
        let gateway = RecordingGateway::new(FakeRun::Nothing {
            exit_code: 0,
            stderr: "model weights missing".into(),
        });
        let engine = EnhancementEngine::new(gateway, layout, 1024);

        let err = engine
            .run_enhancement(&input, &EnhancementSettings::default(), &dir.path().join("out"))
            .await
            .unwrap_err();

        match err {
            EnhancementError::ArtifactNotProduced {
                path,
                exit_code,
                stderr,
                ..
            } => {
                assert_eq!(path, dir.path().join("out").join("enhanced_clip.mp4"));
                assert_eq!(exit_code, Some(0));
                assert_eq!(stderr, "model weights missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn artifact_wins_over_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let input = input_file(dir.path(), "clip.mov");
        let out = dir.path().join("nested").join("out");
        let gateway =
            RecordingGateway::new(FakeRun::Produce { exit_code: 1 }).produces(out.join("enhanced_clip.mov"));
        let engine = EnhancementEngine::new(gateway, layout, 1024);

        let artifact = engine
            .run_enhancement(&input, &EnhancementSettings::default(), &out)
            .await
            .unwrap();

        assert_eq!(artifact.path, out.join("enhanced_clip.mov"));
        assert_eq!(artifact.exit_code, Some(1));
    }

    #[tokio::test]
    async fn spawn_failure_is_execution_failure_and_engine_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let input = input_file(dir.path(), "clip.mp4");
        let gateway = RecordingGateway::new(FakeRun::Fail);
        let engine = EnhancementEngine::new(gateway.clone(), layout, 1024);

        for _ in 0..2 {
            let err = engine
                .run_enhancement(&input, &EnhancementSettings::default(), dir.path())
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                EnhancementError::ExecutionFailure {
                    source: SpawnError::BufferExceeded { .. }
                }
            ));
        }
        assert_eq!(gateway.spawns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn emits_phases_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_project(dir.path());
        let input = input_file(dir.path(), "clip.mp4");
        let gateway = RecordingGateway::new(FakeRun::Produce { exit_code: 0 })
            .produces(dir.path().join("enhanced_clip.mp4"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let engine = EnhancementEngine::new(gateway, layout, 1024).with_events(tx);

        engine
            .run_enhancement(&input, &EnhancementSettings::default(), dir.path())
            .await
            .unwrap();
        drop(engine);

        let mut phases = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let JobEvent::PhaseStarted { phase } = ev {
                phases.push(phase);
            }
        }
        assert_eq!(
            phases,
            vec![
                JobPhase::Preparing,
                JobPhase::Running,
                JobPhase::Validating,
                JobPhase::Complete
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn relative_output_dir_resolves_against_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut layout = fake_project(dir.path());
        layout.python = "sh".into();
        std::fs::write(
            layout.script_path(),
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
mkdir -p "$out"
cp "$in" "$out/enhanced_$(basename "$in")"
"#,
        )
        .unwrap();
        let input = input_file(dir.path(), "clip.mp4");

        let cwd_dir = tempfile::Builder::new()
            .prefix("rel-out")
            .tempdir_in(".")
            .unwrap();
        let relative = cwd_dir.path().join("out");
        assert!(relative.is_relative());

        let engine = EnhancementEngine::new(
            crate::gateway::DesktopGateway::new(),
            layout.clone(),
            1024 * 1024,
        );
        let artifact = engine
            .run_enhancement(&input, &EnhancementSettings::default(), &relative)
            .await
            .unwrap();

        let expected = std::env::current_dir()
            .unwrap()
            .join(&relative)
            .join("enhanced_clip.mp4");
        assert_eq!(artifact.path, expected);
        assert!(expected.exists());
        assert!(!layout.project_dir.join(&relative).exists());
    }
}
