//! Error types shared across MultiJack
//!
//! Only setup-time problems are errors. Per-file failures during a walk are
//! reported as diagnostics instead (see [`crate::task::WalkReport`]).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required root directory is unset, missing or not a directory
    #[error("{role} not found: {}", path.display())]
    MissingRoot { role: &'static str, path: PathBuf },

    #[error("invalid environment name: {0:?}")]
    InvalidName(String),

    #[error("unknown game: {0}")]
    UnknownGame(String),

    #[error("environment not found: {game}/{env}")]
    EnvironmentNotFound { game: String, env: String },

    #[error("folder does not look like a mod: {}", .0.display())]
    NotAMod(PathBuf),

    #[error("executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("JSON error for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context} ({}): {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("steam: {0}")]
    Steam(String),
}

impl Error {
    pub fn io(context: &'static str, path: &Path, source: io::Error) -> Self {
        Error::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Fails with [`Error::MissingRoot`] unless `path` is an existing directory.
    pub fn require_dir(role: &'static str, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() || !path.is_dir() {
            return Err(Error::MissingRoot {
                role,
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_name_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Json {
            path: PathBuf::from("/tmp/settings.json"),
            source,
        };
        let message = err.to_string();
        assert!(message.starts_with("JSON error for /tmp/settings.json: "), "{message}");
        assert!(!message.contains("parsing"), "{message}");
    }
}
