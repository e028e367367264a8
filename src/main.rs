//! MultiJack - isolated game environments from a single install
//!
//! Command-line front end: settings, environment management, mod injection
//! and Steam launch options.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use multijack::config::{AppContext, Settings};
use multijack::environments::{Environment, Registry};
use multijack::error::{Error, Result};
use multijack::games::{self, GameInstall};
use multijack::inject::{self, InjectPrompt, Resolution};
use multijack::launcher;
use multijack::logging::{init_logger, log_error, log_info, log_warning};
use multijack::platform::Platform;
use multijack::steam;
use multijack::task::{Outcome, TaskContext, WalkReport};

/// Flag Steam passes through the launch options (`-launcher %command%`)
const STEAM_LAUNCHER_FLAG: &str = "-launcher";

#[derive(Parser)]
#[command(name = "multijack")]
#[command(about = "Run isolated, moddable copies of a game from one install", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List supported games found in the install location
    Games,

    /// List the environments of a game
    List {
        game: String,
    },

    /// Create a new environment
    Create {
        game: String,
        /// Display name of the environment
        name: String,
    },

    /// Delete an environment
    Delete {
        game: String,
        /// Environment id or display name
        env: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Overlay a mod folder onto an environment
    Inject {
        game: String,
        /// Environment id or display name
        env: String,
        mod_folder: PathBuf,

        /// Answer every prompt with yes / overwrite
        #[arg(short, long)]
        yes: bool,
    },

    /// List mod files that would replace executables of the vanilla game
    Scan {
        game: String,
        mod_folder: PathBuf,
    },

    /// Point Steam's launch options at this program
    LaunchOptions {
        /// Write the changes (Steam must be closed)
        #[arg(long)]
        apply: bool,
    },

    /// Start the vanilla game or one of its environments
    Launch {
        game: String,
        /// Environment id or display name (vanilla if omitted)
        env: Option<String>,
    },

    /// Invoked by Steam through the launch options
    #[command(hide = true)]
    SteamLaunch {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every setting
    Show,
    /// Fill unset settings with the platform defaults
    Init,
    /// Change one setting
    Set { key: String, value: String },
}

fn main() -> ExitCode {
    init_logger();

    // Steam invokes `multijack -launcher <game command...>`
    let args: Vec<String> = std::env::args()
        .map(|arg| {
            if arg == STEAM_LAUNCHER_FLAG {
                "steam-launch".to_string()
            } else {
                arg
            }
        })
        .collect();
    let cli = Cli::parse_from(args);

    let cancel = Arc::new(AtomicBool::new(false));
    let task = TaskContext::new(
        |_| {},
        |processed, total| {
            eprint!("\r{processed}/{total}");
            if processed == total {
                eprintln!();
            }
        },
        cancel,
    );
    let handler_task = task.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log_warning("Cancellation requested, stopping after the current file");
        handler_task.cancel();
    }) {
        log_warning(&format!("Could not install Ctrl-C handler: {}", e));
    }

    match run(cli.command, &task) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, task: &TaskContext) -> Result<()> {
    if let Commands::Config { action } = command {
        return run_config(action);
    }

    let ctx = AppContext::load()?;
    if let Some(step) = ctx.settings.missing_step() {
        log_warning(&format!(
            "Setup incomplete: {:?} is not set (use `multijack config set`)",
            step
        ));
    }

    match command {
        Commands::Config { .. } => Ok(()),
        Commands::Games => {
            let install_root = ctx.install_root();
            Error::require_dir("install location", &install_root)?;
            for game in games::installed_games(&install_root) {
                println!("{}\t{}", game.app_id, game.name);
            }
            Ok(())
        }
        Commands::List { game } => {
            for env in Registry::from_context(&ctx)?.list(&game)? {
                println!("{}\t{}", env.id, env.name);
            }
            Ok(())
        }
        Commands::Create { game, name } => {
            let install = GameInstall::resolve(&ctx.install_root(), &game)?;
            let registry = Registry::from_context(&ctx)?;
            let outcome = registry.create(&install, &name, ctx.platform, task)?;
            print_report(&outcome.report);
            if outcome.registered {
                println!("Created {} ({})", outcome.environment.name, outcome.environment.id);
            } else {
                log_warning(&format!(
                    "Nothing was placed in {}; the environment was not registered",
                    outcome.environment.path.display()
                ));
            }
            Ok(())
        }
        Commands::Delete { game, env, yes } => {
            let registry = Registry::from_context(&ctx)?;
            let env = registry.find(&game, &env)?;
            if !yes && !ask_yes_no(&format!("Delete environment '{}'?", env.name)) {
                log_info("Deletion aborted");
                return Ok(());
            }
            let report = registry.delete(&env)?;
            if !report.is_complete() {
                for (path, reason) in &report.failures {
                    log_warning(&format!("Left behind {}: {}", path.display(), reason));
                }
            }
            println!("Removed {} entries", report.removed);
            Ok(())
        }
        Commands::Inject { game, env, mod_folder, yes } => {
            let env = Registry::from_context(&ctx)?.find(&game, &env)?;
            let mut prompt = StdinPrompt { assume_yes: yes };
            let report = inject::inject_mod(
                &env,
                &mod_folder,
                &ctx.vanilla_root(&game),
                ctx.platform,
                task,
                &mut prompt,
            )?;
            print_report(&report);
            Ok(())
        }
        Commands::Scan { game, mod_folder } => {
            let findings = inject::scan(&mod_folder, &ctx.vanilla_root(&game))?;
            if findings.is_empty() {
                println!("No core files are replaced");
            }
            for rel in findings {
                println!("{}", rel.display());
            }
            Ok(())
        }
        Commands::LaunchOptions { apply } => run_launch_options(&ctx, apply),
        Commands::Launch { game, env } => {
            let target = launcher::resolve_launch_target(&ctx, &game, env.as_deref())?;
            launcher::launch(&target)
        }
        Commands::SteamLaunch { command } => steam_launch(&ctx, &command),
    }
}

fn run_config(action: ConfigAction) -> Result<()> {
    let mut settings = Settings::load()?;
    match action {
        ConfigAction::Show => {
            for key in Settings::KEYS {
                println!("{} = {}", key, settings.get(key)?);
            }
        }
        ConfigAction::Init => {
            let changed = settings.fill_defaults(Platform::current());
            settings.save()?;
            log_info(&format!("Initialized settings: {:?}", changed));
            warn_if_not_game_library(&settings);
        }
        ConfigAction::Set { key, value } => {
            settings.set_option(&key, value)?;
            warn_if_not_game_library(&settings);
            settings.save()?;
            log_info(&format!("Saved setting {}", key));
        }
    }
    Ok(())
}

fn warn_if_not_game_library(settings: &Settings) {
    let install = Path::new(&settings.install_location);
    if !settings.install_location.is_empty() && !games::looks_like_game_library(install) {
        log_warning(&format!("No supported games found in {}", install.display()));
    }
}

fn run_launch_options(ctx: &AppContext, apply: bool) -> Result<()> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::io("locating executable", Path::new("."), e))?;
    let option = steam::build_launch_option(&exe);
    let pending = steam::plan_launch_options(&ctx.steam_root(), &option)?;

    for config in &pending {
        println!("{}: {} apps to update", config.path.display(), config.changed_apps.len());
    }
    if !apply || pending.is_empty() {
        return Ok(());
    }

    if steam::is_steam_running(ctx.platform) {
        return Err(Error::Steam("close Steam before changing launch options".to_string()));
    }
    steam::apply_launch_options(&pending)
}

/// Pick an environment for the game Steam is about to start.
fn steam_launch(ctx: &AppContext, command: &[PathBuf]) -> Result<()> {
    // Steam exports the app id of the title it is starting
    let by_app_id = std::env::var("SteamAppId")
        .ok()
        .and_then(|id| id.parse::<u32>().ok())
        .and_then(games::find_by_app_id);

    let game = by_app_id
        .or_else(|| {
            command.first().and_then(|exe| {
                exe.ancestors()
                    .filter_map(|dir| dir.file_name())
                    .find_map(|name| games::find_by_name(&name.to_string_lossy()))
            })
        })
        .ok_or_else(|| Error::UnknownGame(format!("{:?}", command)))?;

    let envs = Registry::from_context(ctx)?.list(game.name)?;
    let env = choose_environment(game.name, &envs);
    let target = launcher::resolve_launch_target(ctx, game.name, env.map(|e| e.id.as_str()))?;
    launcher::launch(&target)
}

fn choose_environment<'a>(game: &str, envs: &'a [Environment]) -> Option<&'a Environment> {
    if envs.is_empty() {
        return None;
    }

    println!("{game}");
    println!("  0) vanilla");
    for (i, env) in envs.iter().enumerate() {
        println!("  {}) {}", i + 1, env.name);
    }
    let choice = read_line("Environment")?;
    match choice.parse::<usize>() {
        Ok(n) if n >= 1 => envs.get(n - 1),
        _ => None,
    }
}

fn print_report(report: &WalkReport) {
    for failure in report.failures() {
        log_warning(&format!("{}: {:?}", failure.path.display(), failure.kind));
    }
    let outcome = match report.outcome {
        Outcome::Completed => "completed",
        Outcome::Cancelled => "cancelled",
        Outcome::PartiallyFailed => "completed with failures",
    };
    println!(
        "{} of {} files processed, {} placed ({})",
        report.processed,
        report.total,
        report.created(),
        outcome
    );
}

// ============================================================================
// Prompts
// ============================================================================

struct StdinPrompt {
    assume_yes: bool,
}

impl InjectPrompt for StdinPrompt {
    fn confirm_override(&mut self, rel: &Path) -> bool {
        self.assume_yes
            || ask_yes_no(&format!(
                "The mod replaces {}, which can run code on your machine. Continue?",
                rel.display()
            ))
    }

    fn resolve_conflict(&mut self, rel: &Path) -> Resolution {
        if self.assume_yes {
            return Resolution::Overwrite;
        }
        loop {
            let answer = read_line(&format!(
                "{} differs from the mod's copy. [o]verwrite, [s]kip, [c]ancel all",
                rel.display()
            ));
            match answer.as_deref() {
                Some("o") | Some("overwrite") => return Resolution::Overwrite,
                Some("s") | Some("skip") => return Resolution::Skip,
                Some("c") | Some("cancel") | None => return Resolution::CancelAll,
                Some(_) => continue,
            }
        }
    }
}

fn ask_yes_no(question: &str) -> bool {
    matches!(
        read_line(&format!("{question} [y/N]")).as_deref(),
        Some("y") | Some("yes")
    )
}

/// Read one trimmed, lowercased answer. `None` on end of input.
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}: ");
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}
