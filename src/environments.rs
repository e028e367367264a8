//! Environment registry
//!
//! Environments live at `<env root>/<game>/<id>/`. A directory counts as an
//! environment only if it carries the descriptor file; anything else under
//! a game folder is ignored.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::AppContext;
use crate::error::{Error, Result};
use crate::games::GameInstall;
use crate::logging::{log_action, log_error, log_info, log_warning};
use crate::platform::Platform;
use crate::shadow::materialize;
use crate::task::{TaskContext, WalkReport};

/// Sentinel descriptor marking a directory as an environment
pub const DESCRIPTOR_FILE: &str = "DO_NOT_REMOVE.json";

/// Descriptor format version written by this build
pub const DESCRIPTOR_VERSION: u32 = 0;

// ============================================================================
// Types
// ============================================================================

/// On-disk descriptor (`DO_NOT_REMOVE.json`)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub id: String,
    pub game: String,
    #[serde(default)]
    pub version: u32,
}

/// One overlay instance of a game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub game: String,
    pub version: u32,
    pub path: PathBuf,
}

impl Environment {
    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            name: self.name.clone(),
            id: self.id.clone(),
            game: self.game.clone(),
            version: self.version,
        }
    }

    /// The environment's own copy of the game executable.
    pub fn executable(&self, platform: Platform) -> PathBuf {
        self.path.join(platform.game_executable(&self.game))
    }

    /// Where mod folders are overlaid inside this environment.
    pub fn mod_content_root(&self, platform: Platform) -> PathBuf {
        self.path.join(platform.mod_content_dir(&self.game))
    }
}

/// Result of [`Registry::create`]
#[derive(Debug)]
pub struct CreateOutcome {
    pub environment: Environment,
    /// False if materialization placed nothing and no descriptor was written
    pub registered: bool,
    pub report: WalkReport,
}

/// Result of [`Registry::delete`]
#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Registry
// ============================================================================

pub struct Registry {
    root: PathBuf,
}

impl Registry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_context(ctx: &AppContext) -> Result<Self> {
        let root = ctx.env_root();
        if root.as_os_str().is_empty() {
            return Err(Error::MissingRoot {
                role: "environment storage",
                path: root,
            });
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self, game: &str) -> PathBuf {
        self.root.join(game)
    }

    /// All environments of `game`, sorted by display name.
    ///
    /// Creates the game's storage directory if it does not exist yet.
    pub fn list(&self, game: &str) -> Result<Vec<Environment>> {
        let game_dir = self.game_dir(game);
        fs::create_dir_all(&game_dir)
            .map_err(|e| Error::io("creating environment storage", &game_dir, e))?;

        let entries = fs::read_dir(&game_dir)
            .map_err(|e| Error::io("reading environment storage", &game_dir, e))?;

        let mut envs: Vec<Environment> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| read_environment(game, &entry.path()))
            .collect();

        envs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(envs)
    }

    /// Find an environment by id, falling back to display name.
    pub fn find(&self, game: &str, id_or_name: &str) -> Result<Environment> {
        let envs = self.list(game)?;
        envs.iter()
            .find(|env| env.id == id_or_name)
            .or_else(|| envs.iter().find(|env| env.name == id_or_name))
            .cloned()
            .ok_or_else(|| Error::EnvironmentNotFound {
                game: game.to_string(),
                env: id_or_name.to_string(),
            })
    }

    /// Create and materialize a new environment of `game` named `name`.
    ///
    /// The descriptor is written only if materialization placed at least one
    /// file; otherwise the directory is left unregistered for the caller to
    /// inspect or discard.
    pub fn create(
        &self,
        game: &GameInstall,
        name: &str,
        platform: Platform,
        ctx: &TaskContext,
    ) -> Result<CreateOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }
        Error::require_dir("vanilla install", &game.root)?;

        let game_dir = self.game_dir(&game.name);
        fs::create_dir_all(&game_dir)
            .map_err(|e| Error::io("creating environment storage", &game_dir, e))?;

        let id = unique_id(&game_dir);
        let path = game_dir.join(&id);
        fs::create_dir(&path).map_err(|e| Error::io("creating environment", &path, e))?;
        log_action(&format!("Creating environment '{}' ({}) for {}", name, id, game.name));

        let report = materialize(&game.root, &path, platform, ctx)?;

        let environment = Environment {
            id,
            name: name.to_string(),
            game: game.name.clone(),
            version: DESCRIPTOR_VERSION,
            path,
        };

        let registered = report.created() > 0;
        if registered {
            write_descriptor(&environment)?;
            log_info(&format!("Environment '{}' registered", environment.name));
        } else {
            log_warning(&format!(
                "Environment '{}' produced no files and was not registered",
                environment.name
            ));
        }

        Ok(CreateOutcome {
            environment,
            registered,
            report,
        })
    }

    /// Recursively remove an environment directory.
    ///
    /// Removal is best-effort: entries that cannot be removed are collected
    /// in the report. Links are removed without touching their targets.
    pub fn delete(&self, env: &Environment) -> Result<DeleteReport> {
        let escapes = env.path.components().any(|c| c == Component::ParentDir);
        if escapes || !env.path.starts_with(&self.root) || env.path == self.root {
            return Err(Error::EnvironmentNotFound {
                game: env.game.clone(),
                env: env.id.clone(),
            });
        }

        let mut report = DeleteReport::default();
        if !env.path.exists() {
            log_warning(&format!("Environment folder not found: {}", env.path.display()));
            return Ok(report);
        }

        log_action(&format!("Deleting environment '{}' ({})", env.name, env.id));
        for entry in WalkDir::new(&env.path).contents_first(true).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| env.path.clone());
                    report.failures.push((path, e.to_string()));
                    continue;
                }
            };

            let result = if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())
            } else {
                fs::remove_file(entry.path())
            };

            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    log_error(&format!("Failed to remove {}: {}", entry.path().display(), e));
                    report.failures.push((entry.path().to_path_buf(), e.to_string()));
                }
            }
        }

        log_info(&format!(
            "Deleted environment {} ({} entries removed, {} failures)",
            env.path.display(),
            report.removed,
            report.failures.len()
        ));
        Ok(report)
    }
}

// ============================================================================
// Internal Functions
// ============================================================================

fn read_environment(game: &str, dir: &Path) -> Option<Environment> {
    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    if !descriptor_path.is_file() {
        return None;
    }

    let dir_name = dir.file_name()?.to_string_lossy().to_string();
    let descriptor = fs::read_to_string(&descriptor_path)
        .ok()
        .and_then(|content| serde_json::from_str::<Descriptor>(&content).ok());

    match descriptor {
        Some(descriptor) => Some(Environment {
            id: dir_name,
            name: descriptor.name,
            game: game.to_string(),
            version: descriptor.version,
            path: dir.to_path_buf(),
        }),
        None => {
            log_warning(&format!(
                "Unreadable descriptor in {}, using folder name",
                dir.display()
            ));
            Some(Environment {
                id: dir_name.clone(),
                name: dir_name,
                game: game.to_string(),
                version: DESCRIPTOR_VERSION,
                path: dir.to_path_buf(),
            })
        }
    }
}

fn write_descriptor(env: &Environment) -> Result<()> {
    let path = env.path.join(DESCRIPTOR_FILE);
    let json = serde_json::to_string_pretty(&env.descriptor()).map_err(|source| Error::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|e| Error::io("writing descriptor", &path, e))
}

/// Random version-4 UUID string
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An id not yet used by any entry in `game_dir`.
fn unique_id(game_dir: &Path) -> String {
    loop {
        let id = generate_id();
        if fs::symlink_metadata(game_dir.join(&id)).is_err() {
            return id;
        }
    }
}
