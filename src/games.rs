//! Supported games
//!
//! Static catalog of the titles MultiJack manages, plus detection of which
//! of them are present in the user's install location.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A catalog entry for a supported title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownGame {
    /// Display name, also the install directory name under `steamapps/common`
    pub name: &'static str,
    /// Steam App ID
    pub steam_app_id: u32,
}

pub const KNOWN_GAMES: &[KnownGame] = &[
    KnownGame { name: "The Jackbox Party Pack", steam_app_id: 331670 },
    KnownGame { name: "The Jackbox Party Pack 2", steam_app_id: 397460 },
    KnownGame { name: "The Jackbox Party Pack 3", steam_app_id: 434170 },
    KnownGame { name: "The Jackbox Party Pack 4", steam_app_id: 610180 },
    KnownGame { name: "The Jackbox Party Pack 5", steam_app_id: 774461 },
    KnownGame { name: "The Jackbox Party Pack 6", steam_app_id: 1005300 },
    KnownGame { name: "The Jackbox Party Pack 7", steam_app_id: 1211630 },
    KnownGame { name: "The Jackbox Party Pack 8", steam_app_id: 1552350 },
    KnownGame { name: "The Jackbox Party Pack 9", steam_app_id: 1850960 },
    KnownGame { name: "The Jackbox Party Pack 10", steam_app_id: 2216830 },
    KnownGame { name: "The Jackbox Naughty Pack", steam_app_id: 2652000 },
    KnownGame { name: "The Jackbox Party Starter", steam_app_id: 1755580 },
    KnownGame { name: "The Jackbox Survey Scramble", steam_app_id: 2948640 },
    KnownGame { name: "Drawful 2", steam_app_id: 442070 },
    KnownGame { name: "Quiplash", steam_app_id: 351510 },
    KnownGame { name: "Quiplash 2 InterLASHional", steam_app_id: 1111940 },
    KnownGame { name: "Fibbage XL", steam_app_id: 448080 },
];

/// Directory-name prefixes that identify a folder holding supported titles.
pub const TITLE_PREFIXES: &[&str] = &["The Jackbox", "Quiplash", "Fibbage", "Drawful"];

/// An installed, supported title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInstall {
    pub name: String,
    pub app_id: u32,
    /// Root of the vanilla install
    pub root: PathBuf,
}

impl GameInstall {
    /// Resolve a catalog title inside `install_root`, failing if it is not
    /// in the catalog or not installed.
    pub fn resolve(install_root: &Path, name: &str) -> Result<Self> {
        let known = find_by_name(name).ok_or_else(|| Error::UnknownGame(name.to_string()))?;
        let root = install_root.join(known.name);
        Error::require_dir("vanilla install", &root)?;
        Ok(Self {
            name: known.name.to_string(),
            app_id: known.steam_app_id,
            root,
        })
    }
}

pub fn find_by_name(name: &str) -> Option<&'static KnownGame> {
    KNOWN_GAMES.iter().find(|g| g.name == name)
}

pub fn find_by_app_id(app_id: u32) -> Option<&'static KnownGame> {
    KNOWN_GAMES.iter().find(|g| g.steam_app_id == app_id)
}

/// Catalog titles with an install directory under `install_root`, sorted by name.
pub fn installed_games(install_root: &Path) -> Vec<GameInstall> {
    let Ok(entries) = fs::read_dir(install_root) else {
        return Vec::new();
    };

    let mut games: Vec<GameInstall> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let known = find_by_name(&dir_name)?;
            Some(GameInstall {
                name: known.name.to_string(),
                app_id: known.steam_app_id,
                root: entry.path(),
            })
        })
        .collect();

    games.sort_by(|a, b| a.name.cmp(&b.name));
    games
}

/// Whether `dir` directly contains at least one folder named like a supported title.
pub fn looks_like_game_library(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    entries.flatten().any(|entry| {
        entry.path().is_dir() && {
            let name = entry.file_name().to_string_lossy().to_string();
            TITLE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
        }
    })
}
