//! Steam localconfig.vdf manipulation
//!
//! Points the launch options of every catalog title at the MultiJack
//! launcher so Steam starts the chosen environment instead of the vanilla
//! game.

use std::fs;
use std::path::{Path, PathBuf};

use super::paths::find_localconfigs;
use crate::error::{Error, Result};
use crate::games::KNOWN_GAMES;
use crate::logging::{log_action, log_error, log_info};
use crate::vdf::{self, Document};

/// Suffix of the copy written next to a localconfig.vdf before it is replaced
pub const BACKUP_SUFFIX: &str = ".mj.bak";

/// Dotted key holding the launch options of a Steam app
pub fn launch_options_key(app_id: u32) -> String {
    format!("UserLocalConfigStore.Software.Valve.Steam.apps.{app_id}.LaunchOptions")
}

/// Launch option that hands control to `launcher`.
///
/// Backslashes are doubled since VDF values are stored escaped.
pub fn build_launch_option(launcher: &Path) -> String {
    format!("{} -launcher %command%", launcher.display()).replace('\\', "\\\\")
}

/// A localconfig.vdf with at least one launch option to rewrite
#[derive(Debug, Clone)]
pub struct PendingConfig {
    pub path: PathBuf,
    pub document: Document,
    /// App ids whose launch options were absent or different
    pub changed_apps: Vec<u32>,
}

/// Compute the rewrites needed for every user under `steam_root`.
///
/// Files that cannot be read are logged and skipped. Nothing is written.
pub fn plan_launch_options(steam_root: &Path, launch_option: &str) -> Result<Vec<PendingConfig>> {
    Error::require_dir("Steam location", steam_root)?;

    let mut pending = Vec::new();
    for path in find_localconfigs(steam_root) {
        let mut document = match vdf::read_file(&path) {
            Ok(document) => document,
            Err(e) => {
                log_error(&format!("Skipping {}: {}", path.display(), e));
                continue;
            }
        };

        let mut changed_apps = Vec::new();
        for game in KNOWN_GAMES {
            let key = launch_options_key(game.steam_app_id);
            if vdf::get_path_str(&document, &key) != Some(launch_option) {
                vdf::set_path(&mut document, &key, launch_option);
                changed_apps.push(game.steam_app_id);
            }
        }

        if !changed_apps.is_empty() {
            pending.push(PendingConfig {
                path,
                document,
                changed_apps,
            });
        }
    }

    if pending.is_empty() {
        log_info("All launch options are already correct. No updates needed.");
    }
    Ok(pending)
}

/// Write the planned documents, keeping a backup of each original.
pub fn apply_launch_options(pending: &[PendingConfig]) -> Result<()> {
    for config in pending {
        let mut backup = config.path.clone().into_os_string();
        backup.push(BACKUP_SUFFIX);
        let backup = PathBuf::from(backup);

        fs::copy(&config.path, &backup)
            .map_err(|e| Error::io("backing up localconfig", &backup, e))?;
        vdf::write_file(&config.path, &config.document)?;
        log_action(&format!(
            "Updated launch options for {} apps in {}",
            config.changed_apps.len(),
            config.path.display()
        ));
    }
    Ok(())
}
