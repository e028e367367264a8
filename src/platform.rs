//! Host platform model
//!
//! Materialization and launching differ per platform: which files must be
//! real copies, where the game executable lives, and where mod content goes.

use std::fmt;
use std::path::PathBuf;

/// The desktop platform an install was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::Linux => "linux",
        }
    }

    /// Path of the game's launch executable, relative to its install root.
    pub fn game_executable(&self, game: &str) -> PathBuf {
        match self {
            Platform::Windows => PathBuf::from(format!("{}.exe", game)),
            Platform::MacOs => PathBuf::from(format!("{game}.app/Contents/MacOS/{game}")),
            Platform::Linux => PathBuf::from("Launcher.sh"),
        }
    }

    /// Directory inside an environment that mod folders are overlaid onto,
    /// relative to the environment root.
    pub fn mod_content_dir(&self, game: &str) -> PathBuf {
        match self {
            Platform::MacOs => PathBuf::from(format!("{}.app/Contents/Resources/macos", game)),
            Platform::Windows | Platform::Linux => PathBuf::new(),
        }
    }

    /// Name of the process that signals a running Steam client.
    pub fn steam_process_name(&self) -> &'static str {
        match self {
            Platform::Windows => "steam.exe",
            Platform::MacOs | Platform::Linux => "steamwebhelper",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_paths_follow_platform_conventions() {
        assert_eq!(Platform::Windows.game_executable("Drawful 2"), PathBuf::from("Drawful 2.exe"));
        assert_eq!(
            Platform::MacOs.game_executable("Quiplash"),
            PathBuf::from("Quiplash.app/Contents/MacOS/Quiplash")
        );
        assert_eq!(Platform::Linux.game_executable("Quiplash"), PathBuf::from("Launcher.sh"));
    }

    #[test]
    fn mod_content_dir_only_nests_on_macos() {
        assert!(Platform::Linux.mod_content_dir("Quiplash").as_os_str().is_empty());
        assert_eq!(
            Platform::MacOs.mod_content_dir("Quiplash"),
            PathBuf::from("Quiplash.app/Contents/Resources/macos")
        );
    }
}
