//! Steam path detection utilities
//!
//! Locates per-user configuration files under a Steam root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::log_warning;

// ============================================================================
// Core Path Detection
// ============================================================================

/// Numeric user directories under `<steam>/userdata`, sorted.
#[must_use]
pub fn find_user_dirs(steam_root: &Path) -> Vec<PathBuf> {
    let userdata = steam_root.join("userdata");
    let Ok(entries) = fs::read_dir(&userdata) else {
        log_warning(&format!("No userdata directory at {}", userdata.display()));
        return Vec::new();
    };

    let mut user_dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false)
        })
        .collect();

    user_dirs.sort();
    user_dirs
}

/// Every `localconfig.vdf` that exists under `<steam>/userdata/*/config`.
#[must_use]
pub fn find_localconfigs(steam_root: &Path) -> Vec<PathBuf> {
    find_user_dirs(steam_root)
        .into_iter()
        .map(|dir| dir.join("config").join("localconfig.vdf"))
        .filter(|path| path.is_file())
        .collect()
}
