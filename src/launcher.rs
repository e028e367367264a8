//! Environment launcher
//!
//! Starts the vanilla game or one of its environments. Used both by the
//! CLI and when Steam hands control over through `-launcher %command%`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::AppContext;
use crate::environments::Registry;
use crate::error::{Error, Result};
use crate::logging::log_action;

/// Executable to start for `game`, either vanilla (`env == None`) or from
/// the environment with the given id or display name.
pub fn resolve_launch_target(ctx: &AppContext, game: &str, env: Option<&str>) -> Result<PathBuf> {
    let exe = ctx.platform.game_executable(game);
    let target = match env {
        None => ctx.vanilla_root(game).join(exe),
        Some(id_or_name) => {
            let environment = Registry::from_context(ctx)?.find(game, id_or_name)?;
            environment.path.join(exe)
        }
    };

    if !target.is_file() {
        return Err(Error::ExecutableNotFound(target));
    }
    Ok(target)
}

/// Spawn `target` in its own process group, with its directory as the
/// working directory. Does not wait for it to exit.
pub fn launch(target: &Path) -> Result<()> {
    let workdir = target.parent().unwrap_or_else(|| Path::new("."));
    log_action(&format!("Launching executable: {}", target.display()));

    let mut cmd = Command::new(target);
    cmd.current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.spawn().map_err(|e| Error::io("launching game", target, e))?;
    Ok(())
}
