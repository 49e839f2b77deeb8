//! Translates an option snapshot and a target into the command that launches
//! the target with the frame generation layer enabled.
//!
//! Everything here is pure: no process is spawned and nothing is read from
//! disk, so the same inputs always give the same [`LaunchPlan`].

use std::fmt;

use crate::config::ExecutionConfig;
use crate::error::{LauncherError, Result};
use crate::options::OptionSet;
use crate::target::{TargetDescriptor, TargetKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: &'static str,
    pub value: String,
}

impl EnvVar {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    fn flag(name: &'static str, enabled: bool) -> Self {
        Self::new(name, if enabled { "1" } else { "0" })
    }
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub kind: TargetKind,
    pub env: Vec<EnvVar>,
    pub argv: Vec<String>,
}

impl LaunchPlan {
    pub fn program(&self) -> &str {
        // argv always holds at least the target itself
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    pub fn preview(&self) -> String {
        quote_command(&self.argv)
    }
}

pub fn quote_command(parts: &[String]) -> String {
    shlex::try_join(parts.iter().map(String::as_str)).unwrap_or_else(|_| parts.join(" "))
}

pub fn build_environment(options: &OptionSet, execution: &ExecutionConfig) -> Vec<EnvVar> {
    let mut env = vec![
        EnvVar::new("LSFG_MULTIPLIER", options.multiplier.to_string()),
        EnvVar::flag("LSFG_FLOW_SCALE", options.flow_scale),
        EnvVar::flag("LSFG_PERFORMANCE_MODE", options.performance_mode),
        EnvVar::flag("LSFG_HDR_MODE", options.hdr_mode),
    ];

    if let Some(mode) = options.present_mode.env_value() {
        env.push(EnvVar::new("LSFG_PRESENT_MODE", mode));
    }
    if let Some(process) = options.process_filter() {
        env.push(EnvVar::new("LSFG_PROCESS", process));
    }

    let mut layers = vec![execution.frame_generation_layer.trim()];
    if options.mangohud {
        env.push(EnvVar::new("MANGOHUD", "1"));
        layers.push(execution.mangohud_layer.trim());
    }
    layers.retain(|layer| !layer.is_empty());
    if layers.is_empty() {
        layers.push(DEFAULT_FRAME_GENERATION_LAYER);
    }
    env.push(EnvVar::new("VK_INSTANCE_LAYERS", layers.join(":")));

    if !execution.vk_layer_path.trim().is_empty() {
        env.push(EnvVar::new("VK_LAYER_PATH", execution.vk_layer_path.trim()));
    }

    env
}

const DEFAULT_FRAME_GENERATION_LAYER: &str = "lsfg_vk";

/// Fails with [`LauncherError::InvalidTarget`] when the app id or executable
/// is blank or would be misread by `flatpak run` / `env`, and with
/// [`LauncherError::ArgumentParse`] when either argument string has
/// unbalanced quoting.
pub fn build(options: &OptionSet, target: &TargetDescriptor, execution: &ExecutionConfig) -> Result<LaunchPlan> {
    let program = target.program().trim();
    if program.is_empty() {
        return Err(LauncherError::InvalidTarget(match target.kind() {
            TargetKind::Flatpak => "no Flatpak application selected".to_string(),
            TargetKind::Host => "no host command provided".to_string(),
        }));
    }
    if program.contains('\0') {
        return Err(LauncherError::InvalidTarget(format!("{:?} contains a NUL byte", program)));
    }
    match target.kind() {
        // `flatpak run` would take it as one of its own options
        TargetKind::Flatpak if program.starts_with('-') => {
            return Err(LauncherError::InvalidTarget(format!("{:?} is not a Flatpak application id", program)));
        }
        // `env` reads any operand with `=` as another assignment
        TargetKind::Host if program.contains('=') => {
            return Err(LauncherError::InvalidTarget(format!(
                "{:?} contains '=' and cannot be run through env",
                program
            )));
        }
        _ => {}
    }

    let target_args = tokenize("target arguments", target.extra_args())?;
    let option_args = tokenize("extra arguments", &options.extra_args)?;
    let env = build_environment(options, execution);

    let mut argv: Vec<String> = execution
        .host_wrapper
        .iter()
        .filter(|part| !part.trim().is_empty())
        .cloned()
        .collect();

    match target.kind() {
        TargetKind::Flatpak => {
            argv.push("flatpak".to_string());
            argv.push("run".to_string());
            argv.extend(env.iter().map(|var| format!("--env={}", var)));
        }
        TargetKind::Host => {
            argv.push("env".to_string());
            argv.extend(env.iter().map(EnvVar::to_string));
        }
    }
    argv.push(program.to_string());
    argv.extend(target_args);
    argv.extend(option_args);

    Ok(LaunchPlan {
        kind: target.kind(),
        env,
        argv,
    })
}

fn tokenize(field: &'static str, input: &str) -> Result<Vec<String>> {
    let input = input.trim();
    if input.contains('\0') {
        return Err(LauncherError::ArgumentParse {
            field,
            input: input.replace('\0', "\\0"),
        });
    }
    shlex::split(input).ok_or_else(|| LauncherError::ArgumentParse {
        field,
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Multiplier, PresentMode};
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn env_strings(plan: &LaunchPlan) -> Vec<String> {
        plan.env.iter().map(EnvVar::to_string).collect()
    }

    fn value_of<'a>(plan: &'a LaunchPlan, name: &str) -> Option<&'a str> {
        plan.env.iter().find(|var| var.name == name).map(|var| var.value.as_str())
    }

    fn vlc_options() -> OptionSet {
        OptionSet {
            multiplier: Multiplier::X4,
            flow_scale: false,
            performance_mode: true,
            hdr_mode: false,
            present_mode: PresentMode::Mailbox,
            process: String::new(),
            mangohud: false,
            extra_args: String::new(),
        }
    }

    #[test]
    fn flatpak_target_carries_env_flags() {
        let target = TargetDescriptor::flatpak("org.videolan.VLC", "--fullscreen");
        let plan = build(&vlc_options(), &target, &ExecutionConfig::default()).unwrap();

        assert_eq!(
            env_strings(&plan),
            strings(&[
                "LSFG_MULTIPLIER=4",
                "LSFG_FLOW_SCALE=0",
                "LSFG_PERFORMANCE_MODE=1",
                "LSFG_HDR_MODE=0",
                "LSFG_PRESENT_MODE=mailbox",
                "VK_INSTANCE_LAYERS=lsfg_vk",
                "VK_LAYER_PATH=/usr/share/vulkan/explicit_layer.d:/etc/vulkan/explicit_layer.d",
            ])
        );
        assert_eq!(
            plan.argv,
            strings(&[
                "flatpak-spawn",
                "--host",
                "flatpak",
                "run",
                "--env=LSFG_MULTIPLIER=4",
                "--env=LSFG_FLOW_SCALE=0",
                "--env=LSFG_PERFORMANCE_MODE=1",
                "--env=LSFG_HDR_MODE=0",
                "--env=LSFG_PRESENT_MODE=mailbox",
                "--env=VK_INSTANCE_LAYERS=lsfg_vk",
                "--env=VK_LAYER_PATH=/usr/share/vulkan/explicit_layer.d:/etc/vulkan/explicit_layer.d",
                "org.videolan.VLC",
                "--fullscreen",
            ])
        );
        assert_eq!(plan.program(), "flatpak-spawn");
        assert_eq!(plan.kind, TargetKind::Flatpak);
    }

    #[test]
    fn host_target_uses_env_invocation() {
        let options = OptionSet {
            process: "vkcube".into(),
            extra_args: "--width 640".into(),
            ..OptionSet::default()
        };
        let execution = ExecutionConfig {
            vk_layer_path: String::new(),
            ..ExecutionConfig::default()
        };
        let target = TargetDescriptor::host(" /usr/bin/vkcube ", "--present_mode 2");
        let plan = build(&options, &target, &execution).unwrap();

        assert_eq!(
            plan.argv,
            strings(&[
                "flatpak-spawn",
                "--host",
                "env",
                "LSFG_MULTIPLIER=2",
                "LSFG_FLOW_SCALE=0",
                "LSFG_PERFORMANCE_MODE=0",
                "LSFG_HDR_MODE=0",
                "LSFG_PROCESS=vkcube",
                "VK_INSTANCE_LAYERS=lsfg_vk",
                "/usr/bin/vkcube",
                "--present_mode",
                "2",
                "--width",
                "640",
            ])
        );
    }

    #[test]
    fn empty_wrapper_runs_directly() {
        let execution = ExecutionConfig {
            host_wrapper: Vec::new(),
            ..ExecutionConfig::default()
        };
        let plan = build(&OptionSet::default(), &TargetDescriptor::host("vkcube", ""), &execution).unwrap();
        assert_eq!(plan.program(), "env");
        assert_eq!(plan.args().last().map(String::as_str), Some("vkcube"));
    }

    #[test]
    fn instance_layers_are_never_empty() {
        let execution = ExecutionConfig {
            frame_generation_layer: "  ".into(),
            mangohud_layer: String::new(),
            ..ExecutionConfig::default()
        };
        for mangohud in [false, true] {
            let options = OptionSet {
                mangohud,
                ..OptionSet::default()
            };
            for config in [&execution, &ExecutionConfig::default()] {
                let env = build_environment(&options, config);
                let layers = env.iter().find(|var| var.name == "VK_INSTANCE_LAYERS").unwrap();
                assert!(!layers.value.is_empty());
            }
        }
    }

    #[test]
    fn auto_present_mode_is_omitted() {
        let target = TargetDescriptor::flatpak("com.example.Game", "");
        let execution = ExecutionConfig::default();

        let auto = build(&OptionSet::default(), &target, &execution).unwrap();
        assert_eq!(value_of(&auto, "LSFG_PRESENT_MODE"), None);

        for mode in [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate] {
            let options = OptionSet {
                present_mode: mode,
                ..OptionSet::default()
            };
            let plan = build(&options, &target, &execution).unwrap();
            assert_eq!(value_of(&plan, "LSFG_PRESENT_MODE"), Some(mode.as_str()));
        }
    }

    #[test]
    fn mangohud_toggle_is_idempotent() {
        let target = TargetDescriptor::flatpak("com.example.Game", "");
        let execution = ExecutionConfig::default();
        let off = OptionSet::default();
        let on = OptionSet {
            mangohud: true,
            ..OptionSet::default()
        };

        let before = build(&off, &target, &execution).unwrap();
        let with_hud = build(&on, &target, &execution).unwrap();
        let after = build(&off, &target, &execution).unwrap();
        let again = build(&off, &target, &execution).unwrap();

        assert_eq!(value_of(&with_hud, "MANGOHUD"), Some("1"));
        assert_eq!(
            value_of(&with_hud, "VK_INSTANCE_LAYERS"),
            Some("lsfg_vk:VK_LAYER_MangoHud_overlay_x86_64")
        );
        assert_eq!(with_hud.env.len(), before.env.len() + 1);
        assert_eq!(value_of(&after, "MANGOHUD"), None);
        assert_eq!(value_of(&after, "VK_INSTANCE_LAYERS"), Some("lsfg_vk"));
        assert_eq!(before, after);
        assert_eq!(after, again);
    }

    #[test]
    fn blank_executable_is_invalid_target() {
        let err = build(&OptionSet::default(), &TargetDescriptor::host("", "--flag"), &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, LauncherError::InvalidTarget(_)));

        let err = build(&OptionSet::default(), &TargetDescriptor::flatpak("   ", ""), &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, LauncherError::InvalidTarget(_)));
    }

    #[test]
    fn program_that_env_or_flatpak_would_misread_is_rejected() {
        let execution = ExecutionConfig::default();

        let err = build(&OptionSet::default(), &TargetDescriptor::host("/tmp/my dir/A=B", ""), &execution).unwrap_err();
        assert!(matches!(err, LauncherError::InvalidTarget(_)));

        for app_id in ["--help", "-v"] {
            let err = build(&OptionSet::default(), &TargetDescriptor::flatpak(app_id, ""), &execution).unwrap_err();
            assert!(matches!(err, LauncherError::InvalidTarget(_)));
        }

        // `=` is only a problem for the env form
        assert!(build(&OptionSet::default(), &TargetDescriptor::host("/opt/game-v2/run", "--opt=1"), &execution).is_ok());
    }

    #[test]
    fn invalid_target_wins_over_bad_arguments() {
        let err = build(&OptionSet::default(), &TargetDescriptor::host("", "'oops"), &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, LauncherError::InvalidTarget(_)));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let target = TargetDescriptor::flatpak("org.videolan.VLC", "--opt 'broken");
        let err = build(&OptionSet::default(), &target, &ExecutionConfig::default()).unwrap_err();
        match err {
            LauncherError::ArgumentParse { field, input } => {
                assert_eq!(field, "target arguments");
                assert_eq!(input, "--opt 'broken");
            }
            other => panic!("unexpected error: {other}"),
        }

        let options = OptionSet {
            extra_args: "\"--opt 'broken".into(),
            ..OptionSet::default()
        };
        let err = build(&options, &TargetDescriptor::flatpak("org.videolan.VLC", ""), &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, LauncherError::ArgumentParse { field: "extra arguments", .. }));
    }

    #[test]
    fn quoted_arguments_stay_single_tokens() {
        let target = TargetDescriptor::host("/opt/My Game/run.sh", "--name \"Player One\" --dir '/tmp/a b'");
        let plan = build(&OptionSet::default(), &target, &ExecutionConfig::default()).unwrap();
        let tail: Vec<&str> = plan.argv.iter().rev().take(5).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["/opt/My Game/run.sh", "--name", "Player One", "--dir", "/tmp/a b"]);
    }

    #[test]
    fn preview_quotes_shell_metacharacters() {
        let options = OptionSet {
            process: "my game".into(),
            ..OptionSet::default()
        };
        let execution = ExecutionConfig {
            host_wrapper: Vec::new(),
            vk_layer_path: String::new(),
            ..ExecutionConfig::default()
        };
        let target = TargetDescriptor::host("/opt/game", "'a;b' $HOME");
        let plan = build(&options, &target, &execution).unwrap();
        let preview = plan.preview();

        assert!(preview.starts_with("env "));
        assert!(!preview.contains(" a;b "));
        assert!(!preview.ends_with(" $HOME"));
        assert_eq!(shlex::split(&preview).unwrap(), plan.argv);
        assert_eq!(plan.argv.last().map(String::as_str), Some("$HOME"));
    }
}
