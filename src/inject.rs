//! Mod injection
//!
//! Overlays an external mod folder onto a materialized environment. Files
//! that are still reference links are replaced by real copies so the
//! vanilla install is never written through a link. Conflicting files
//! suspend the walk until the caller decides what to do with them.
//!
//! Before injecting, [`scan`] looks for mod files that would replace an
//! executable or library of the vanilla install.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::environments::Environment;
use crate::error::{Error, Result};
use crate::logging::{log_action, log_copy, log_error, log_info, log_warning};
use crate::platform::Platform;
use crate::shadow::{detach_linked_dirs, entry_exists, is_link, remove_link};
use crate::task::{DiagnosticKind, TaskContext, WalkReport};

/// Suffixes of files treated as executable code
pub const EXECUTABLE_SUFFIXES: &[&str] = &[".exe", ".dll", ".sh", ".dylib", "_Vulkan", "_OpenGL"];

/// Shared objects, optionally versioned (`libfoo.so`, `libfoo.so.2`, `libfoo.so.1.2`)
static SHARED_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.so(\.\d+)*$").expect("static regex"));

/// Directory suffixes found in game content folders
const MOD_DIR_SUFFIXES: &[&str] = &["games", "content", "videos"];

/// File suffixes found in game content folders
const MOD_FILE_SUFFIXES: &[&str] = &[".swf", ".jet", ".json", ".usm"];

// ============================================================================
// Pre-flight checks
// ============================================================================

pub fn is_executable_like(file_name: &str) -> bool {
    EXECUTABLE_SUFFIXES.iter().any(|s| file_name.ends_with(s))
        || SHARED_OBJECT_RE.is_match(file_name)
}

/// Relative paths of executable-like files under `root`.
fn executable_paths(root: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .flatten()
        .filter(|entry| !entry.file_type().is_dir())
        .filter(|entry| is_executable_like(&entry.file_name().to_string_lossy()))
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Executable-like files the mod would put at the same place as a vanilla one.
pub fn scan(mod_root: &Path, vanilla_root: &Path) -> Result<Vec<PathBuf>> {
    Error::require_dir("mod folder", mod_root)?;
    Error::require_dir("vanilla install", vanilla_root)?;

    let vanilla = executable_paths(vanilla_root);
    let findings: Vec<PathBuf> = executable_paths(mod_root)
        .into_iter()
        .filter(|rel| vanilla.contains(rel))
        .collect();

    for rel in &findings {
        log_warning(&format!("Mod replaces core file: {}", rel.display()));
    }
    Ok(findings)
}

/// Ask about each finding in turn. Returns false at the first decline.
pub fn review_findings(findings: &[PathBuf], mut confirm: impl FnMut(&Path) -> bool) -> bool {
    for rel in findings {
        if !confirm(rel) {
            log_info(&format!("Injection aborted at {}", rel.display()));
            return false;
        }
    }
    true
}

/// Whether `dir` contains anything that looks like game content.
pub fn looks_like_mod(dir: &Path) -> bool {
    WalkDir::new(dir).min_depth(1).into_iter().flatten().any(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            MOD_DIR_SUFFIXES.iter().any(|s| name.ends_with(s))
        } else {
            MOD_FILE_SUFFIXES.iter().any(|s| name.ends_with(s))
        }
    })
}

// ============================================================================
// Injection state machine
// ============================================================================

/// Answer to a conflicting file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the environment's file with the mod's
    Overwrite,
    /// Keep the environment's file and continue
    Skip,
    /// Stop the whole injection
    CancelAll,
}

/// Where an injection stopped
#[derive(Debug, Clone)]
pub enum InjectStep {
    /// The file at this relative path differs from the mod's; call
    /// [`InjectionSession::resolve`] before advancing again
    Conflict(PathBuf),
    Finished(WalkReport),
}

/// An injection that can be suspended at each conflict.
pub struct InjectionSession {
    mod_root: PathBuf,
    dest_root: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    pending: Option<PathBuf>,
    finished: bool,
    report: WalkReport,
    ctx: TaskContext,
}

enum FileStep {
    Done,
    Conflict,
}

impl InjectionSession {
    /// Prepare an injection of `mod_root` into `dest_root`. The directory
    /// skeleton is mirrored immediately; no file is touched until
    /// [`advance`](Self::advance).
    pub fn start(mod_root: &Path, dest_root: &Path, ctx: TaskContext) -> Result<Self> {
        Error::require_dir("mod folder", mod_root)?;
        Error::require_dir("environment directory", dest_root)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(mod_root).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log_error(&format!("Error walking {}: {}", mod_root.display(), e));
                    continue;
                }
            };
            let Ok(rel) = entry.path().strip_prefix(mod_root) else {
                continue;
            };
            if entry.file_type().is_dir() {
                let dir = dest_root.join(rel);
                // Never create directories through a link into the vanilla install
                if let Err(e) = detach_linked_dirs(dest_root, rel) {
                    log_error(&format!("Failed to detach {}: {}", dir.display(), e));
                    continue;
                }
                if let Err(e) = fs::create_dir_all(&dir) {
                    log_error(&format!("Failed to create directory {}: {}", dir.display(), e));
                }
            } else {
                files.push(rel.to_path_buf());
            }
        }

        log_action(&format!(
            "Injecting {} files from {} into {}",
            files.len(),
            mod_root.display(),
            dest_root.display()
        ));

        Ok(Self {
            mod_root: mod_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            report: WalkReport::new(files.len()),
            files,
            next: 0,
            pending: None,
            finished: false,
            ctx,
        })
    }

    /// The conflict awaiting a decision, if any.
    pub fn pending_conflict(&self) -> Option<&Path> {
        self.pending.as_deref()
    }

    /// Run until the next conflict or the end of the walk.
    pub fn advance(&mut self) -> InjectStep {
        if let Some(rel) = &self.pending {
            return InjectStep::Conflict(rel.clone());
        }

        while !self.finished && self.next < self.files.len() {
            if self.ctx.is_cancelled() {
                log_info("Injection cancelled by user");
                self.finish(true);
                break;
            }

            let rel = self.files[self.next].clone();
            self.ctx.set_status(format!("Processing: {}", rel.display()));
            match self.process(&rel) {
                FileStep::Done => self.complete_file(),
                FileStep::Conflict => {
                    self.pending = Some(rel.clone());
                    return InjectStep::Conflict(rel);
                }
            }
        }

        if !self.finished {
            self.finish(false);
        }
        InjectStep::Finished(self.report.clone())
    }

    /// Decide the pending conflict. Does nothing if no conflict is pending.
    pub fn resolve(&mut self, resolution: Resolution) {
        let Some(rel) = self.pending.take() else {
            return;
        };

        match resolution {
            Resolution::Overwrite => {
                let kind = self.copy_file(&rel, DiagnosticKind::Overwritten);
                self.report.record(&rel, kind);
                self.complete_file();
            }
            Resolution::Skip => {
                log_info(&format!("Kept existing file: {}", rel.display()));
                self.report.record(&rel, DiagnosticKind::KeptExisting);
                self.complete_file();
            }
            Resolution::CancelAll => {
                log_info(&format!("Skipped conflicting mod at {}", rel.display()));
                self.finish(true);
            }
        }
    }

    fn process(&mut self, rel: &Path) -> FileStep {
        let dest = self.dest_root.join(rel);

        if let Err(e) = detach_linked_dirs(&self.dest_root, rel.parent().unwrap_or(Path::new(""))) {
            log_error(&format!("Failed to detach parent of {}: {}", dest.display(), e));
            self.report.record(rel, DiagnosticKind::Failed(e.to_string()));
            return FileStep::Done;
        }

        if is_link(&dest) {
            log_info(&format!("Removing existing symlink: {}", dest.display()));
            if let Err(e) = remove_link(&dest) {
                log_error(&format!("Failed to remove symlink {}: {}", dest.display(), e));
                self.report.record(rel, DiagnosticKind::Failed(e.to_string()));
                return FileStep::Done;
            }
            self.report.record(rel, DiagnosticKind::Unlinked);
        }

        if !entry_exists(&dest) {
            let kind = self.copy_file(rel, DiagnosticKind::Copied);
            self.report.record(rel, kind);
            return FileStep::Done;
        }

        if dest.is_dir() {
            log_error(&format!("Destination is a directory: {}", dest.display()));
            self.report
                .record(rel, DiagnosticKind::Failed("destination is a directory".to_string()));
            return FileStep::Done;
        }

        match same_content(&self.mod_root.join(rel), &dest) {
            Ok(true) => {
                log_info(&format!("Files are identical, skipping: {}", dest.display()));
                self.report.record(rel, DiagnosticKind::Identical);
                FileStep::Done
            }
            Ok(false) => FileStep::Conflict,
            Err(e) => {
                log_error(&format!("Error comparing {}: {}", dest.display(), e));
                self.report.record(rel, DiagnosticKind::Failed(e.to_string()));
                FileStep::Done
            }
        }
    }

    fn copy_file(&self, rel: &Path, success: DiagnosticKind) -> DiagnosticKind {
        let src = self.mod_root.join(rel);
        let dest = self.dest_root.join(rel);
        match fs::copy(&src, &dest) {
            Ok(_) => {
                log_copy(&format!("{:?}: {}", success, rel.display()));
                success
            }
            Err(e) => {
                log_error(&format!(
                    "Error copying file {} -> {}: {}",
                    src.display(),
                    dest.display(),
                    e
                ));
                DiagnosticKind::Failed(e.to_string())
            }
        }
    }

    fn complete_file(&mut self) {
        self.next += 1;
        self.report.processed += 1;
        self.ctx.set_progress(self.report.processed, self.report.total);
    }

    fn finish(&mut self, cancelled: bool) {
        self.finished = true;
        self.report.finish(cancelled);
    }
}

/// Byte-wise comparison of two files.
fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut left = BufReader::new(File::open(a)?);
    let mut right = BufReader::new(File::open(b)?);
    let mut left_buf = [0u8; 8192];
    let mut right_buf = [0u8; 8192];

    loop {
        let n = left.read(&mut left_buf)?;
        if n == 0 {
            return Ok(true);
        }
        right.read_exact(&mut right_buf[..n])?;
        if left_buf[..n] != right_buf[..n] {
            return Ok(false);
        }
    }
}

// ============================================================================
// Drivers
// ============================================================================

/// Run an injection to completion, asking `resolve` at every conflict.
pub fn inject(
    mod_root: &Path,
    dest_root: &Path,
    ctx: &TaskContext,
    mut resolve: impl FnMut(&Path) -> Resolution,
) -> Result<WalkReport> {
    let mut session = InjectionSession::start(mod_root, dest_root, ctx.clone())?;
    loop {
        match session.advance() {
            InjectStep::Conflict(rel) => session.resolve(resolve(&rel)),
            InjectStep::Finished(report) => return Ok(report),
        }
    }
}

/// Decisions an interactive caller makes during a mod injection
pub trait InjectPrompt {
    /// A mod file would replace this vanilla executable or library.
    /// Returning false aborts before any file is written.
    fn confirm_override(&mut self, rel: &Path) -> bool;

    /// The environment already has a different file at this path.
    fn resolve_conflict(&mut self, rel: &Path) -> Resolution;
}

/// Validate, scan and inject `mod_root` into `env`.
///
/// If the vanilla install is missing the scan is skipped with a warning.
pub fn inject_mod(
    env: &Environment,
    mod_root: &Path,
    vanilla_root: &Path,
    platform: Platform,
    ctx: &TaskContext,
    prompt: &mut impl InjectPrompt,
) -> Result<WalkReport> {
    Error::require_dir("mod folder", mod_root)?;
    if !looks_like_mod(mod_root) {
        return Err(Error::NotAMod(mod_root.to_path_buf()));
    }

    let content_dir = platform.mod_content_dir(&env.game);
    if let Err(e) = detach_linked_dirs(&env.path, &content_dir) {
        return Err(Error::io("detaching mod content directory", &env.path.join(&content_dir), e));
    }

    let dest_root = env.mod_content_root(platform);
    if !dest_root.is_dir() {
        return Err(Error::EnvironmentNotFound {
            game: env.game.clone(),
            env: env.id.clone(),
        });
    }

    if vanilla_root.is_dir() {
        let findings = scan(mod_root, vanilla_root)?;
        if !review_findings(&findings, |rel| prompt.confirm_override(rel)) {
            let mut report = WalkReport::new(0);
            report.finish(true);
            return Ok(report);
        }
    } else {
        log_error(&format!("Vanilla game path not found: {}", vanilla_root.display()));
    }

    inject(mod_root, &dest_root, ctx, |rel| prompt.resolve_conflict(rel))
}
