use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::{default_env_location, default_install_location, default_steam_location};
use crate::platform::Platform;

// ============================================================================
// User Settings
// ============================================================================

/// The four settings the setup wizard collects. An empty string means unset.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub steam_location: String,
    #[serde(default)]
    pub install_location: String,
    #[serde(default)]
    pub env_location: String,
}

/// First setting the wizard still has to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Language,
    SteamLocation,
    InstallLocation,
    EnvLocation,
}

impl Settings {
    pub const KEYS: [&'static str; 4] = [
        "language",
        "steam_location",
        "install_location",
        "env_location",
    ];

    fn get_path() -> PathBuf {
        mj_path!("config.json")
    }

    /// Load settings from the config directory.
    ///
    /// A missing file yields default (all unset) settings; a malformed file
    /// is an error so that hand edits are never silently discarded.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).map_err(|e| Error::io("reading settings", path, e))?;
        serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating config directory", parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| Error::io("writing settings", path, e))
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        match key {
            "language" => Ok(&self.language),
            "steam_location" => Ok(&self.steam_location),
            "install_location" => Ok(&self.install_location),
            "env_location" => Ok(&self.env_location),
            other => Err(Error::UnknownSetting(other.to_string())),
        }
    }

    /// Set one setting by its key. Unknown keys are rejected.
    pub fn set_option(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let slot = match key {
            "language" => &mut self.language,
            "steam_location" => &mut self.steam_location,
            "install_location" => &mut self.install_location,
            "env_location" => &mut self.env_location,
            other => return Err(Error::UnknownSetting(other.to_string())),
        };
        *slot = value.into();
        Ok(())
    }

    /// Fill every unset location with the platform default. Returns the keys
    /// that were changed.
    pub fn fill_defaults(&mut self, platform: Platform) -> Vec<&'static str> {
        let defaults = [
            ("language", "en".to_string()),
            ("steam_location", path_string(default_steam_location(platform))),
            ("install_location", path_string(default_install_location(platform))),
            ("env_location", path_string(default_env_location())),
        ];

        let mut changed = Vec::new();
        for (key, value) in defaults {
            let slot = match key {
                "language" => &mut self.language,
                "steam_location" => &mut self.steam_location,
                "install_location" => &mut self.install_location,
                _ => &mut self.env_location,
            };
            if slot.is_empty() {
                *slot = value;
                changed.push(key);
            }
        }
        changed
    }

    /// The first wizard step whose setting is still unusable, in wizard order.
    pub fn missing_step(&self) -> Option<SetupStep> {
        if self.language.is_empty() {
            return Some(SetupStep::Language);
        }
        if !is_populated_dir(&self.steam_location) {
            return Some(SetupStep::SteamLocation);
        }
        if !is_populated_dir(&self.install_location) {
            return Some(SetupStep::InstallLocation);
        }
        if self.env_location.is_empty() {
            return Some(SetupStep::EnvLocation);
        }
        None
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

fn is_populated_dir(location: &str) -> bool {
    if location.is_empty() {
        return false;
    }
    fs::read_dir(location).is_ok_and(|mut entries| entries.next().is_some())
}

// ============================================================================
// Application Context
// ============================================================================

/// Settings and platform handed to every component that needs paths.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub settings: Settings,
    pub platform: Platform,
}

impl AppContext {
    pub fn new(settings: Settings, platform: Platform) -> Self {
        Self { settings, platform }
    }

    pub fn load() -> Result<Self> {
        Ok(Self::new(Settings::load()?, Platform::current()))
    }

    pub fn steam_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.steam_location)
    }

    /// Directory that holds one vanilla install per game.
    pub fn install_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.install_location)
    }

    /// Vanilla install of a single game.
    pub fn vanilla_root(&self, game: &str) -> PathBuf {
        self.install_root().join(game)
    }

    /// Environment storage root (all games).
    pub fn env_root(&self) -> PathBuf {
        PathBuf::from(&self.settings.env_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&tmp.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.missing_step(), Some(SetupStep::Language));
    }

    #[test]
    fn fill_defaults_keeps_user_values() {
        let mut settings = Settings {
            steam_location: "/custom/steam".into(),
            ..Settings::default()
        };
        let changed = settings.fill_defaults(Platform::Linux);

        assert_eq!(changed, vec!["language", "install_location", "env_location"]);
        assert_eq!(settings.steam_location, "/custom/steam");
        assert!(settings.install_location.ends_with("common"));
        assert!(settings.fill_defaults(Platform::Linux).is_empty());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/config.json");

        let mut settings = Settings::default();
        settings.set_option("language", "eng").unwrap();
        settings.set_option("env_location", "/srv/envs").unwrap();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.language, "eng");
        assert_eq!(loaded.get("env_location").unwrap(), "/srv/envs");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set_option("theme", "dark"),
            Err(Error::UnknownSetting(_))
        ));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(Error::Json { .. })));
    }

    #[test]
    fn missing_step_walks_wizard_order() {
        let tmp = tempfile::tempdir().unwrap();
        let steam = tmp.path().join("steam");
        fs::create_dir_all(steam.join("steamapps")).unwrap();

        let mut settings = Settings {
            language: "eng".into(),
            ..Default::default()
        };
        assert_eq!(settings.missing_step(), Some(SetupStep::SteamLocation));

        settings.steam_location = steam.to_string_lossy().into_owned();
        assert_eq!(settings.missing_step(), Some(SetupStep::InstallLocation));

        // Steam root is populated, so it doubles as an install root here
        settings.install_location = settings.steam_location.clone();
        assert_eq!(settings.missing_step(), Some(SetupStep::EnvLocation));

        settings.env_location = "/envs".into();
        assert_eq!(settings.missing_step(), None);
    }
}
