//! Steam integration module
//!
//! Handles per-user launch options and detection of a running Steam client.

mod launch_options;
mod paths;

pub use launch_options::{
    apply_launch_options, build_launch_option, launch_options_key, plan_launch_options,
    PendingConfig, BACKUP_SUFFIX,
};
pub use paths::{find_localconfigs, find_user_dirs};

use std::process::Command;

use crate::logging::log_warning;
use crate::platform::Platform;

/// Whether the Steam client is running.
///
/// Steam rewrites localconfig.vdf on exit, so launch options must only be
/// applied while it is closed. A failed check counts as not running.
pub fn is_steam_running(platform: Platform) -> bool {
    let process = platform.steam_process_name();

    let output = match platform {
        Platform::Windows => Command::new("tasklist")
            .args(["/FI", &format!("IMAGENAME eq {process}"), "/NH"])
            .output(),
        Platform::MacOs | Platform::Linux => Command::new("pgrep").args(["-x", process]).output(),
    };

    match output {
        Ok(output) => match platform {
            Platform::Windows => String::from_utf8_lossy(&output.stdout)
                .to_lowercase()
                .contains(process),
            Platform::MacOs | Platform::Linux => output.status.success(),
        },
        Err(e) => {
            log_warning(&format!("Could not check for a running Steam: {}", e));
            false
        }
    }
}
