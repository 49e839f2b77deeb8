use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::builder::{self, LaunchPlan};
use crate::config::Config;
use crate::error::LauncherError;
use crate::host::{self, HostExecutor, HostShell};
use crate::options::{Multiplier, OptionOverrides, OptionSet, PresentMode};
use crate::presets::{Preset, SaveOutcome};
use crate::settings::Settings;
use crate::target::{TargetDescriptor, TargetKind};

const PROJECT_URL: &str = "https://github.com/0xREAVEN/lsfgvk-launcher";
const LAYER_URL: &str = "https://github.com/PancakeTAS/lsfg-vk";

#[derive(Parser)]
#[command(
    name = "lsfg-launch",
    author,
    version,
    about = "Launch Flatpak and host applications with lsfg-vk frame generation",
    long_about = "Builds the lsfg-vk (and optionally MangoHud) environment for a Flatpak app or a host program, \
                  previews the resulting command and launches it through the host execution wrapper"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show the command that would be launched")]
    Preview {
        #[command(flatten)]
        target: LaunchTarget,

        #[command(flatten)]
        options: OptionArgs,

        #[arg(long, help = "Do not remember these options and target")]
        no_save: bool,
    },

    #[command(about = "Launch the target with frame generation enabled")]
    Launch {
        #[command(flatten)]
        target: LaunchTarget,

        #[command(flatten)]
        options: OptionArgs,

        #[arg(long, help = "Do not remember these options and target")]
        no_save: bool,
    },

    #[command(about = "List Flatpak applications installed on the host")]
    Flatpaks,

    #[command(about = "List commands available on the host")]
    Commands {
        #[arg(help = "Only show commands containing this text")]
        filter: Option<String>,
    },

    #[command(about = "Check that the host wrapper, Flatpak and the layer are available")]
    Check,

    #[command(about = "Manage saved presets")]
    Preset {
        #[command(subcommand)]
        action: PresetCommands,
    },

    #[command(about = "Show, export, import or reset saved settings")]
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },

    #[command(about = "Show version and project links")]
    About,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(long, value_name = "APP_ID", conflicts_with = "host", help = "Flatpak application id to run")]
    pub flatpak: Option<String>,

    #[arg(long, value_name = "PATH", help = "Host command or executable path to run")]
    pub host: Option<String>,

    #[arg(
        long = "args",
        value_name = "ARGS",
        allow_hyphen_values = true,
        help = "Arguments for the target, shell quoted"
    )]
    pub target_args: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LaunchTarget {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, value_name = "NAME", conflicts_with_all = ["flatpak", "host"], help = "Use a saved preset")]
    pub preset: Option<String>,

    #[arg(long, value_enum, requires = "preset", help = "Preset target kind when the name is ambiguous")]
    pub kind: Option<TargetKind>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
    #[arg(short, long, help = "Frame multiplier (2, 3, 4, 6 or 8)")]
    pub multiplier: Option<Multiplier>,

    #[arg(long, value_name = "BOOL", value_parser = clap::builder::BoolishValueParser::new(), help = "Enable flow scale")]
    pub flow_scale: Option<bool>,

    #[arg(long, value_name = "BOOL", value_parser = clap::builder::BoolishValueParser::new(), help = "Enable performance mode")]
    pub performance: Option<bool>,

    #[arg(long, value_name = "BOOL", value_parser = clap::builder::BoolishValueParser::new(), help = "Enable HDR mode")]
    pub hdr: Option<bool>,

    #[arg(long, value_enum, help = "Swapchain present mode")]
    pub present_mode: Option<PresentMode>,

    #[arg(long, value_name = "NAME", help = "Only enable frame generation for this process (empty clears it)")]
    pub process: Option<String>,

    #[arg(long, value_name = "BOOL", value_parser = clap::builder::BoolishValueParser::new(), help = "Enable the MangoHud overlay")]
    pub mangohud: Option<bool>,

    #[arg(
        long,
        value_name = "ARGS",
        allow_hyphen_values = true,
        help = "Arguments appended after the target's own, shell quoted"
    )]
    pub extra_args: Option<String>,
}

impl From<&OptionArgs> for OptionOverrides {
    fn from(args: &OptionArgs) -> Self {
        Self {
            multiplier: args.multiplier,
            flow_scale: args.flow_scale,
            performance_mode: args.performance,
            hdr_mode: args.hdr,
            present_mode: args.present_mode,
            process: args.process.clone(),
            mangohud: args.mangohud,
            extra_args: args.extra_args.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum PresetCommands {
    #[command(about = "List saved presets")]
    List,

    #[command(about = "Show a preset and the command it builds")]
    Show {
        #[arg(help = "Preset name")]
        name: String,

        #[arg(long, value_enum, help = "Target kind when the name is ambiguous")]
        kind: Option<TargetKind>,
    },

    #[command(about = "Save the current options and target as a preset")]
    Save {
        #[arg(help = "Preset name")]
        name: String,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        options: OptionArgs,
    },

    #[command(about = "Delete a preset")]
    Remove {
        #[arg(help = "Preset name")]
        name: String,

        #[arg(long, value_enum, help = "Target kind when the name is ambiguous")]
        kind: Option<TargetKind>,
    },

    #[command(about = "Rename a preset")]
    Rename {
        #[arg(help = "Current preset name")]
        name: String,

        #[arg(help = "New preset name")]
        new_name: String,

        #[arg(long, value_enum, help = "Target kind when the name is ambiguous")]
        kind: Option<TargetKind>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    #[command(about = "Print the saved settings")]
    Show,

    #[command(about = "Print the settings and config file locations")]
    Path,

    #[command(about = "Export settings and presets to a file")]
    Export {
        #[arg(help = "Destination file")]
        file: PathBuf,
    },

    #[command(about = "Replace settings and presets with an exported file")]
    Import {
        #[arg(help = "File to import")]
        file: PathBuf,

        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },

    #[command(about = "Reset settings and presets to defaults")]
    Reset {
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

/// Loaded state shared by every command handler.
pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub executor: Arc<dyn HostExecutor>,
}

impl Session {
    pub fn load(config: Config, config_path: PathBuf) -> Result<Self> {
        let settings_path = config.settings_path();
        let settings = Settings::load(&settings_path)
            .with_context(|| format!("loading settings from {}", settings_path.display()))?;
        let executor: Arc<dyn HostExecutor> = Arc::new(HostShell::new(&config.execution));

        Ok(Self {
            config,
            config_path,
            settings_path,
            settings,
            executor,
        })
    }

    fn save_settings(&self) -> Result<()> {
        self.settings
            .save(&self.settings_path)
            .with_context(|| format!("saving settings to {}", self.settings_path.display()))
    }

    /// Resolves the option snapshot and target for one invocation.
    fn resolve(&self, launch: &LaunchTarget, options: &OptionArgs) -> Result<(OptionSet, TargetDescriptor)> {
        let overrides = OptionOverrides::from(options);

        let (base, target) = match &launch.preset {
            Some(name) => {
                let preset = self.settings.presets.resolve(name, launch.kind)?;
                debug!(preset = %preset.name, "using preset");
                (&preset.options, preset.target.clone())
            }
            None => (&self.settings.options, self.resolve_target(&launch.target)?),
        };

        let target = match &launch.target.target_args {
            Some(args) if launch.preset.is_some() => with_args(target, args),
            _ => target,
        };

        Ok((overrides.apply(base), target))
    }

    fn resolve_target(&self, args: &TargetArgs) -> Result<TargetDescriptor> {
        let extra = args.target_args.clone();

        if let Some(app_id) = &args.flatpak {
            return Ok(TargetDescriptor::flatpak(app_id.trim(), extra.unwrap_or_default()));
        }
        if let Some(path) = &args.host {
            return Ok(TargetDescriptor::host(path.trim(), extra.unwrap_or_default()));
        }

        match &self.settings.last_target {
            Some(last) => {
                debug!(target = %last, "reusing last target");
                Ok(match extra {
                    Some(extra) => with_args(last.clone(), &extra),
                    None => last.clone(),
                })
            }
            None => Err(LauncherError::InvalidTarget(
                "no target given, pass --flatpak <APP_ID> or --host <PATH>".to_string(),
            )
            .into()),
        }
    }

    fn remember(&mut self, options: OptionSet, target: TargetDescriptor) -> Result<()> {
        self.settings.options = options;
        self.settings.last_target = Some(target);
        self.save_settings()
    }
}

fn with_args(target: TargetDescriptor, args: &str) -> TargetDescriptor {
    match target {
        TargetDescriptor::Flatpak { app_id, .. } => TargetDescriptor::flatpak(app_id, args),
        TargetDescriptor::Host { executable_path, .. } => TargetDescriptor::host(executable_path, args),
    }
}

impl Cli {
    pub async fn execute(self, mut session: Session) -> Result<()> {
        match self.command {
            Commands::Preview { target, options, no_save } => {
                handle_preview(&mut session, &target, &options, no_save)
            }
            Commands::Launch { target, options, no_save } => {
                handle_launch(&mut session, &target, &options, no_save)
            }
            Commands::Flatpaks => handle_flatpaks(&session).await,
            Commands::Commands { filter } => handle_commands(&session, filter).await,
            Commands::Check => handle_check(&session).await,
            Commands::Preset { action } => handle_preset_command(&mut session, action),
            Commands::Settings { action } => handle_settings_command(&mut session, action),
            Commands::About => {
                print_about();
                Ok(())
            }
        }
    }
}

fn print_plan(plan: &LaunchPlan) {
    println!("{}", "Environment:".bold());
    for var in &plan.env {
        println!("  {}={}", var.name.cyan(), var.value);
    }
    println!();
    println!("{}", "Command:".bold());
    println!("{}", plan.preview());
}

fn handle_preview(session: &mut Session, target: &LaunchTarget, options: &OptionArgs, no_save: bool) -> Result<()> {
    let (options, target) = session.resolve(target, options)?;

    let plan = match builder::build(&options, &target, &session.config.execution) {
        Ok(plan) => plan,
        Err(e) => {
            println!("# ERROR: {}", e);
            return Err(e.into());
        }
    };
    print_plan(&plan);

    if !no_save {
        session.remember(options, target)?;
    }
    Ok(())
}

fn handle_launch(session: &mut Session, target: &LaunchTarget, options: &OptionArgs, no_save: bool) -> Result<()> {
    let (options, target) = session.resolve(target, options)?;

    let plan = builder::build(&options, &target, &session.config.execution).context("Build error")?;
    println!("{} Launching {}...", "🚀", target.program().trim().bold().green());
    debug!(program = plan.program(), args = ?plan.args(), "spawning");

    let pid = session.executor.spawn(&plan.argv).context("Launch failed")?;
    info!(pid, target = %target, "launched");
    println!("✅ Launched (PID: {})", pid);
    println!("{}", plan.preview().dimmed());

    // The process is already running, so a save failure must not fail the launch.
    let saved = if no_save { Ok(()) } else { session.remember(options, target) };
    if let Err(e) = saved {
        warn!(error = %format!("{:#}", e), "launched but could not save settings");
    }
    Ok(())
}

async fn handle_flatpaks(session: &Session) -> Result<()> {
    let executor = Arc::clone(&session.executor);
    let apps = tokio::task::spawn_blocking(move || host::list_installed_flatpaks(executor.as_ref())).await??;

    println!("{}", "📦 Installed Flatpak applications:".bold().cyan());
    if apps.is_empty() {
        println!("  No applications found (is Flatpak installed on the host?)");
    }
    for app in &apps {
        println!("  {}", app);
    }
    Ok(())
}

async fn handle_commands(session: &Session, filter: Option<String>) -> Result<()> {
    let executor = Arc::clone(&session.executor);
    let commands =
        tokio::task::spawn_blocking(move || host::list_host_commands(executor.as_ref(), filter.as_deref())).await??;

    if commands.is_empty() {
        println!("No matching host commands");
    }
    for command in &commands {
        println!("{}", command);
    }
    Ok(())
}

async fn handle_check(session: &Session) -> Result<()> {
    let executor = Arc::clone(&session.executor);
    let execution = session.config.execution.clone();
    let report = tokio::task::spawn_blocking(move || host::check(executor.as_ref(), &execution)).await?;

    println!("{}", "🔍 Launch environment:".bold().blue());
    for item in &report.items {
        let icon = match (item.ok, item.required) {
            (true, _) => "✅",
            (false, true) => "❌",
            (false, false) => "⚠️",
        };
        println!("  {} {}: {}", icon, item.name.bold(), item.detail.dimmed());
    }

    if report.passed() {
        println!("\n{}", "Ready to launch".green());
        Ok(())
    } else {
        bail!("some required components are missing")
    }
}

fn handle_preset_command(session: &mut Session, action: PresetCommands) -> Result<()> {
    match action {
        PresetCommands::List => {
            if session.settings.presets.is_empty() {
                println!("No presets saved. Use 'lsfg-launch preset save <NAME>' to create one.");
                return Ok(());
            }

            println!("{}", "⭐ Presets:".bold().yellow());
            for preset in session.settings.presets.list() {
                println!(
                    "  {} {} {}",
                    preset.name.bold().cyan(),
                    format!("[{}]", preset.kind()).dimmed(),
                    preset.target.program()
                );
            }
            Ok(())
        }
        PresetCommands::Show { name, kind } => {
            let preset = session.settings.presets.resolve(&name, kind)?;

            println!("{} {}", "Preset:".bold(), preset.name.cyan());
            println!("  Target: {}", preset.target);
            if let Some(saved_at) = preset.saved_at {
                println!("  Saved: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed());
            }
            print_options(&preset.options);
            println!();

            match builder::build(&preset.options, &preset.target, &session.config.execution) {
                Ok(plan) => print_plan(&plan),
                Err(e) => println!("# ERROR: {}", e),
            }
            Ok(())
        }
        PresetCommands::Save { name, target, options } => {
            let launch = LaunchTarget {
                target,
                ..LaunchTarget::default()
            };
            let (options, target) = session.resolve(&launch, &options)?;
            // Refuse to store something that could never launch.
            builder::build(&options, &target, &session.config.execution)?;

            let outcome = session.settings.presets.save(Preset::new(name.trim(), target, options))?;
            session.save_settings()?;

            match outcome {
                SaveOutcome::Created => println!("✅ Saved preset {}", name.trim().bold()),
                SaveOutcome::Updated => println!("✅ Updated preset {}", name.trim().bold()),
            }
            Ok(())
        }
        PresetCommands::Remove { name, kind } => {
            let removed = session.settings.presets.remove(&name, kind)?;
            session.save_settings()?;
            println!("🗑️ Removed preset {} [{}]", removed.name.bold(), removed.kind());
            Ok(())
        }
        PresetCommands::Rename { name, new_name, kind } => {
            session.settings.presets.rename(&name, kind, &new_name)?;
            session.save_settings()?;
            println!("✅ Renamed {} to {}", name.trim(), new_name.trim().bold());
            Ok(())
        }
    }
}

fn print_options(options: &OptionSet) {
    let toggle = |on: bool| if on { "on".green() } else { "off".red() };

    println!("  Multiplier: {}", options.multiplier.to_string().yellow());
    println!("  Flow scale: {}", toggle(options.flow_scale));
    println!("  Performance mode: {}", toggle(options.performance_mode));
    println!("  HDR: {}", toggle(options.hdr_mode));
    println!("  Present mode: {}", options.present_mode);
    if let Some(process) = options.process_filter() {
        println!("  Process: {}", process);
    }
    println!("  MangoHud: {}", toggle(options.mangohud));
    if !options.extra_args.is_empty() {
        println!("  Extra arguments: {}", options.extra_args);
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        println!("⚠️ {}", prompt);
        println!("Use --yes to confirm.");
        return Ok(false);
    }
    Ok(dialoguer::Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn handle_settings_command(session: &mut Session, action: SettingsCommands) -> Result<()> {
    match action {
        SettingsCommands::Show => {
            println!("{}", "⚙️  Saved options".bold().cyan());
            print_options(&session.settings.options);
            match &session.settings.last_target {
                Some(target) => println!("  Last target: {}", target),
                None => println!("  Last target: {}", "none".dimmed()),
            }
            println!("  Presets: {}", session.settings.presets.len());
            println!();
            println!("{}", session.settings.to_json()?);
            Ok(())
        }
        SettingsCommands::Path => {
            println!("Settings: {}", session.settings_path.display());
            println!("Config: {}", session.config_path.display());
            Ok(())
        }
        SettingsCommands::Export { file } => {
            session
                .settings
                .export(&file)
                .with_context(|| format!("exporting to {}", file.display()))?;
            println!("✅ Exported settings to {}", file.display().to_string().bold());
            Ok(())
        }
        SettingsCommands::Import { file, yes } => {
            let imported =
                Settings::import(&file).with_context(|| format!("importing {}", file.display()))?;
            if !yes && !confirm("Replace the current settings and presets?")? {
                return Ok(());
            }

            session.settings = imported;
            session.save_settings()?;
            println!(
                "✅ Imported {} preset(s) from {}",
                session.settings.presets.len(),
                file.display()
            );
            Ok(())
        }
        SettingsCommands::Reset { yes } => {
            if !yes && !confirm("Reset ALL settings and presets to defaults?")? {
                return Ok(());
            }

            session.settings = Settings::default();
            session.save_settings()?;
            println!("✅ Settings reset to defaults");
            println!("Settings file: {}", session.settings_path.display().to_string().dimmed());
            Ok(())
        }
    }
}

fn print_about() {
    println!("{} {}", "lsfg-launch".bold().cyan(), env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("lsfg-vk is a Vulkan layer. Target apps must use Vulkan (or OpenGL through Zink).");
    println!("  Project page: {}", PROJECT_URL.underline());
    println!("  lsfg-vk: {}", LAYER_URL.underline());
}
