use std::{path::PathBuf, sync::LazyLock};

use crate::platform::Platform;

/// Environment variable that relocates the MultiJack config directory.
pub const CONFIG_DIR_ENV: &str = "MULTIJACK_CONFIG_DIR";

pub static DEFAULT_MJ_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }

    let home = dirs::home_dir().unwrap_or_default();
    match Platform::current() {
        Platform::Windows => dirs::config_dir()
            .unwrap_or_else(|| home.join("AppData").join("Roaming"))
            .join("MultiJack"),
        Platform::MacOs => home.join("Library/Application Support/MultiJack"),
        Platform::Linux => home.join(".config/multijack"),
    }
});

/// Computes a path inside the MultiJack config directory.
///
/// Returns a `&Path` referencing the config directory itself if no arguments are passed in, or a
/// `PathBuf` created by joining all of the arguments to the base config directory if at least
/// one argument is passed in.
///
/// # Examples
///
/// ```ignore
/// let settings = mj_path!("config.json");
/// let logs = mj_path!("logs");
/// ```
#[macro_export]
macro_rules! mj_path {
    () => {
        $crate::paths::DEFAULT_MJ_PATH.as_path()
    };

    ( $( $path:expr ),+ $(,)? ) => {
        [
            $crate::paths::DEFAULT_MJ_PATH.as_path(),
            $( std::path::Path::new(&$path) ),+
        ].into_iter().collect::<std::path::PathBuf>()
    };
}

/// Default Steam installation root for a platform.
#[must_use]
pub fn default_steam_location(platform: Platform) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    match platform {
        Platform::Windows => PathBuf::from(r"C:\Program Files (x86)\Steam"),
        Platform::MacOs => home.join("Library/Application Support/Steam"),
        Platform::Linux => home.join(".local/share/Steam"),
    }
}

/// Default directory holding the vanilla game installs (`steamapps/common`).
#[must_use]
pub fn default_install_location(platform: Platform) -> PathBuf {
    default_steam_location(platform).join("steamapps").join("common")
}

/// Default environment storage root, kept next to the settings file.
#[must_use]
pub fn default_env_location() -> PathBuf {
    mj_path!("env")
}
