use std::collections::{BTreeSet, HashSet};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::builder::quote_command;
use crate::config::ExecutionConfig;
use crate::error::{LauncherError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl HostOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait HostExecutor: Send + Sync {
    fn run(&self, args: &[String]) -> std::io::Result<HostOutput>;

    fn spawn(&self, argv: &[String]) -> Result<u32>;
}

#[derive(Debug, Clone)]
pub struct HostShell {
    wrapper: Vec<String>,
}

impl HostShell {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            wrapper: config
                .host_wrapper
                .iter()
                .filter(|part| !part.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

impl HostExecutor for HostShell {
    fn run(&self, args: &[String]) -> std::io::Result<HostOutput> {
        let full: Vec<String> = self.wrapper.iter().chain(args).cloned().collect();
        let Some((program, rest)) = full.split_first() else {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"));
        };
        debug!(command = %quote_command(&full), "running host command");

        let output = Command::new(program).args(rest).stdin(Stdio::null()).output()?;
        Ok(HostOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn spawn(&self, argv: &[String]) -> Result<u32> {
        let Some((program, args)) = argv.split_first() else {
            return Err(LauncherError::InvalidTarget("empty command".to_string()));
        };

        // Dropping the handle neither waits for nor kills the child.
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| LauncherError::SpawnFailure {
                program: program.clone(),
                source,
            })?;

        Ok(child.id())
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Installed Flatpak app ids in listing order, without duplicates.
/// A failing `flatpak list` yields an empty list.
pub fn list_installed_flatpaks(executor: &dyn HostExecutor) -> Result<Vec<String>> {
    let output = executor.run(&owned(&["flatpak", "list", "--app", "--columns=application"]))?;
    if !output.success() {
        warn!(status = output.status, stderr = %output.stderr, "flatpak list failed");
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    Ok(output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect())
}

/// Commands resolvable on the host's PATH, sorted. `filter` is matched
/// case-insensitively against the name.
pub fn list_host_commands(executor: &dyn HostExecutor, filter: Option<&str>) -> Result<Vec<String>> {
    let output = executor.run(&owned(&["bash", "-c", "compgen -c"]))?;
    if !output.success() {
        warn!(status = output.status, stderr = %output.stderr, "host command enumeration failed");
        return Ok(Vec::new());
    }

    let needle = filter.map(|f| f.trim().to_lowercase()).filter(|f| !f.is_empty());
    let commands: BTreeSet<&str> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| needle.as_deref().is_none_or(|n| name.to_lowercase().contains(n)))
        .collect();

    Ok(commands.into_iter().map(str::to_string).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: &'static str,
    pub ok: bool,
    /// Failing optional items are reported but do not fail the check
    pub required: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.items.iter().all(|item| item.ok || !item.required)
    }
}

pub fn check(executor: &dyn HostExecutor, config: &ExecutionConfig) -> CheckReport {
    let mut report = CheckReport::default();

    let wrapper = config.host_wrapper.iter().find(|part| !part.trim().is_empty());
    report.items.push(match wrapper {
        None => CheckItem {
            name: "host wrapper",
            ok: true,
            required: true,
            detail: "none configured, commands run directly".to_string(),
        },
        Some(program) => match which::which(program) {
            Ok(path) => CheckItem {
                name: "host wrapper",
                ok: true,
                required: true,
                detail: path.display().to_string(),
            },
            Err(e) => CheckItem {
                name: "host wrapper",
                ok: false,
                required: true,
                detail: format!("{}: {}", program, e),
            },
        },
    });

    report.items.push(probe(executor, "flatpak", true, &owned(&["flatpak", "--version"])));

    let dirs: Vec<String> = config.layer_manifest_dirs.iter().map(|d| double_quote(d)).collect();
    let script = format!(
        "for d in {}; do for f in \"$d\"/*lsfg*.json; do [ -e \"$f\" ] && echo \"$f\"; done; done; true",
        dirs.join(" ")
    );
    let mut layer = probe(executor, "lsfg-vk layer", true, &owned(&["sh", "-c", script.as_str()]));
    if layer.ok && layer.detail.is_empty() {
        layer.ok = false;
        layer.detail = format!("no manifest found in {}", config.layer_manifest_dirs.join(", "));
    }
    report.items.push(layer);

    let mut mangohud = probe(executor, "mangohud", false, &owned(&["sh", "-c", "command -v mangohud"]));
    if !mangohud.ok {
        mangohud.detail = "not installed (only needed with --mangohud)".to_string();
    }
    report.items.push(mangohud);

    report
}

fn probe(executor: &dyn HostExecutor, name: &'static str, required: bool, args: &[String]) -> CheckItem {
    match executor.run(args) {
        Ok(output) if output.success() => CheckItem {
            name,
            ok: true,
            required,
            detail: output.stdout.lines().next().unwrap_or_default().to_string(),
        },
        Ok(output) => CheckItem {
            name,
            ok: false,
            required,
            detail: if output.stderr.is_empty() {
                format!("exited with status {}", output.status)
            } else {
                output.stderr
            },
        },
        Err(e) => CheckItem {
            name,
            ok: false,
            required,
            detail: e.to_string(),
        },
    }
}

// Double quotes keep `$HOME` expandable in configured directories.
fn double_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
