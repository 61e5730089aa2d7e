//! Derivation of the external tool invocation.
//!
//! Everything here is pure: the same job and layout always render the same
//! command line.

use crate::model::{ToolLayout, Upscaling};
use std::fmt;
use std::path::{Path, PathBuf};

/// Real-ESRGAN model and output scale selected for a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelChoice {
    pub name: &'static str,
    pub scale: f32,
}

/// Fixed lookup from the upscaling setting. Only this field decides the model.
pub fn model_for(upscaling: &Upscaling) -> ModelChoice {
    match upscaling {
        Upscaling::X2 => ModelChoice {
            name: "RealESRGAN_x2plus",
            scale: 2.0,
        },
        Upscaling::X4 => ModelChoice {
            name: "RealESRGAN_x4plus",
            scale: 4.0,
        },
        Upscaling::Other(_) => ModelChoice {
            name: "realesr-animevideov3",
            scale: 1.5,
        },
    }
}

/// Path the tool is expected to write for `input`.
pub fn expected_artifact(input: &Path, output_dir: &Path) -> PathBuf {
    let base = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("enhanced_{base}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    Posix,
    Cmd,
}

impl ShellFlavor {
    pub fn native() -> Self {
        if cfg!(windows) {
            ShellFlavor::Cmd
        } else {
            ShellFlavor::Posix
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            ShellFlavor::Posix => "sh",
            ShellFlavor::Cmd => "cmd.exe",
        }
    }

    fn quote(self, arg: &str) -> String {
        match self {
            // Single quotes disable every expansion; an embedded quote is closed,
            // escaped, and reopened.
            ShellFlavor::Posix => format!("'{}'", arg.replace('\'', r"'\''")),
            // cmd.exe paths cannot contain '"'. Quotes do not stop %VAR% expansion
            // and a /C command line has no escape for '%', so such paths are passed
            // through as-is and a defined variable name inside them gets expanded.
            ShellFlavor::Cmd => format!("\"{arg}\""),
        }
    }
}

/// A composed shell command: activation step chained with the script call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub flavor: ShellFlavor,
    pub line: String,
}

impl CommandLine {
    /// Argument vector for the shell program.
    pub fn shell_args(&self) -> Vec<&str> {
        match self.flavor {
            ShellFlavor::Posix => vec!["-c", &self.line],
            ShellFlavor::Cmd => vec!["/C", &self.line],
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flavor {
            ShellFlavor::Posix => write!(f, "sh -c \"{}\"", self.line),
            ShellFlavor::Cmd => write!(f, "cmd.exe /c \"{}\"", self.line),
        }
    }
}

pub struct CommandParams<'a> {
    pub layout: &'a ToolLayout,
    pub input: &'a Path,
    pub output_dir: &'a Path,
    pub model: ModelChoice,
}

pub fn build_command(params: &CommandParams<'_>, flavor: ShellFlavor) -> CommandLine {
    let q = |p: &Path| flavor.quote(&p.to_string_lossy());
    let project = q(&params.layout.project_dir);
    let activate = q(&params.layout.activate_script());
    let script = q(&params.layout.script_path());

    let (cd, source) = match flavor {
        ShellFlavor::Posix => (format!("cd {project}"), format!(". {activate}")),
        ShellFlavor::Cmd => (format!("cd /d {project}"), format!("call {activate}")),
    };

    let line = format!(
        "{cd} && {source} && {python} {script} -i {input} -o {output} -n {model} --outscale {scale} --face_enhance",
        python = params.layout.python,
        input = q(params.input),
        output = q(params.output_dir),
        model = params.model.name,
        scale = params.model.scale,
    );

    CommandLine { flavor, line }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnhancementSettings;

    fn layout() -> ToolLayout {
        ToolLayout {
            project_dir: PathBuf::from("/opt/Real-ESRGAN master"),
            venv_dir: ".venv".into(),
            script: "inference_realesrgan_video.py".into(),
            python: "python".into(),
        }
    }

    #[test]
    fn model_mapping_is_fixed() {
        assert_eq!(
            model_for(&Upscaling::X2),
            ModelChoice {
                name: "RealESRGAN_x2plus",
                scale: 2.0
            }
        );
        assert_eq!(
            model_for(&Upscaling::X4),
            ModelChoice {
                name: "RealESRGAN_x4plus",
                scale: 4.0
            }
        );
        for label in ["1.5x", "3x", ""] {
            assert_eq!(
                model_for(&Upscaling::Other(label.into())),
                ModelChoice {
                    name: "realesr-animevideov3",
                    scale: 1.5
                }
            );
        }
    }

    #[test]
    fn other_settings_do_not_change_the_command() {
        let base = EnhancementSettings {
            upscaling: Upscaling::X4,
            ..Default::default()
        };
        let mut tweaked = base.clone();
        tweaked.sharpening = 5;
        tweaked.frame_rate = "60".into();
        tweaked.noise_reduction = crate::model::NoiseReduction::High;
        tweaked.output_format = crate::model::OutputFormat::Webm;

        let layout = layout();
        let render = |s: &EnhancementSettings| {
            build_command(
                &CommandParams {
                    layout: &layout,
                    input: Path::new("/in/clip.mp4"),
                    output_dir: Path::new("/out"),
                    model: model_for(&s.upscaling),
                },
                ShellFlavor::Posix,
            )
        };
        assert_eq!(render(&base), render(&tweaked));
    }

    #[cfg(unix)]
    #[test]
    fn posix_command_quotes_paths() {
        let layout = layout();
        let cmd = build_command(
            &CommandParams {
                layout: &layout,
                input: Path::new("/videos/it's clip.mp4"),
                output_dir: Path::new("/out dir"),
                model: model_for(&Upscaling::X4),
            },
            ShellFlavor::Posix,
        );
        assert_eq!(
            cmd.line,
            "cd '/opt/Real-ESRGAN master' && . '/opt/Real-ESRGAN master/.venv/bin/activate' && \
             python '/opt/Real-ESRGAN master/inference_realesrgan_video.py' \
             -i '/videos/it'\\''s clip.mp4' -o '/out dir' -n RealESRGAN_x4plus --outscale 4 --face_enhance"
        );
        assert_eq!(cmd.shell_args(), vec!["-c", cmd.line.as_str()]);
    }

    #[test]
    fn cmd_command_uses_call_and_double_quotes() {
        let layout = layout();
        let cmd = build_command(
            &CommandParams {
                layout: &layout,
                input: Path::new("clip.mp4"),
                output_dir: Path::new("out"),
                model: model_for(&Upscaling::Other("1.5x".into())),
            },
            ShellFlavor::Cmd,
        );
        assert!(cmd.line.starts_with("cd /d \"/opt/Real-ESRGAN master\" && call \""));
        assert!(cmd
            .line
            .ends_with("-i \"clip.mp4\" -o \"out\" -n realesr-animevideov3 --outscale 1.5 --face_enhance"));
    }

    #[test]
    fn cmd_quoting_leaves_percent_untouched() {
        assert_eq!(
            ShellFlavor::Cmd.quote(r"C:\clips\50% off.mp4"),
            r#""C:\clips\50% off.mp4""#
        );
    }

    #[test]
    fn artifact_name_prefixes_input_basename() {
        assert_eq!(
            expected_artifact(Path::new("/in/clip.mp4"), Path::new("/out")),
            PathBuf::from("/out/enhanced_clip.mp4")
        );
    }
}
