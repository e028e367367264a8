//! Shadow tree materialization
//!
//! Builds an environment from a vanilla install: the directory skeleton is
//! recreated first, then every file becomes either a reference link back to
//! the vanilla file or, where the platform needs a genuine binary, a real
//! copy. Re-running on a partially built tree resumes it: entries that
//! already exist are left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::logging::{log_copy, log_error, log_info, log_link, log_warning};
use crate::platform::Platform;
use crate::task::{DiagnosticKind, TaskContext, WalkReport};

/// Files with this suffix are runtime logs and never enter an environment.
pub const LOG_SUFFIX: &str = "-log.txt";

/// Native launcher stubs at the top of a Linux install.
pub const LINUX_STUB_SUFFIXES: &[&str] = &["_Vulkan", "_OpenGL"];

/// How one vanilla file is represented inside an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowEntry {
    Link,
    Copy,
}

/// Decide how `rel` (relative to `src_root`) is materialized, or `None`
/// if it is excluded.
pub fn classify(src_root: &Path, rel: &Path, platform: Platform) -> Option<ShadowEntry> {
    let name = rel.file_name()?.to_string_lossy();

    // The bundle binary is checked in place by the OS and must be genuine
    if platform == Platform::MacOs && is_bundle_executable(src_root, rel) {
        return Some(ShadowEntry::Copy);
    }

    if name.ends_with(LOG_SUFFIX) {
        return None;
    }

    match platform {
        Platform::Linux
            if rel.components().count() == 1
                && LINUX_STUB_SUFFIXES.iter().any(|s| name.ends_with(s)) =>
        {
            Some(ShadowEntry::Copy)
        }
        Platform::Windows if name.to_ascii_lowercase().ends_with(".exe") => {
            Some(ShadowEntry::Copy)
        }
        _ => Some(ShadowEntry::Link),
    }
}

/// `<game>.app/Contents/MacOS/<game>`, where `<game>` is the install folder name.
fn is_bundle_executable(src_root: &Path, rel: &Path) -> bool {
    let Some(game) = src_root.file_name() else {
        return false;
    };
    rel == Platform::MacOs.game_executable(&game.to_string_lossy())
}

/// Recreate `src_root` under `dest_root` as a shadow tree.
///
/// Fails only if either root is missing. Per-file problems are recorded in
/// the returned report and the walk moves on. Cancellation is checked before
/// each file; a cancelled walk leaves what it placed.
pub fn materialize(
    src_root: &Path,
    dest_root: &Path,
    platform: Platform,
    ctx: &TaskContext,
) -> Result<WalkReport> {
    Error::require_dir("vanilla install", src_root)?;
    Error::require_dir("environment directory", dest_root)?;

    let src_root = std::path::absolute(src_root)
        .map_err(|e| Error::io("resolving vanilla install", src_root, e))?;

    let (dirs, files) = scan_tree(&src_root);

    for rel in &dirs {
        let dest = dest_root.join(rel);
        if let Err(e) = fs::create_dir_all(&dest) {
            log_error(&format!("Failed to create directory {}: {}", dest.display(), e));
        }
    }

    let total = files.len();
    let mut report = WalkReport::new(total);
    let mut cancelled = false;

    for rel in &files {
        if ctx.is_cancelled() {
            log_info("Materialization cancelled by user");
            cancelled = true;
            break;
        }

        let src = src_root.join(rel);
        let dest = dest_root.join(rel);
        ctx.set_status(format!("Processing: {}", rel.display()));

        match classify(&src_root, rel, platform) {
            None => report.record(rel, DiagnosticKind::SkippedLog),
            Some(_) if entry_exists(&dest) => {
                log_warning(&format!("Already exists: {}", dest.display()));
                report.record(rel, DiagnosticKind::AlreadyExists);
            }
            Some(entry) => {
                let kind = place(entry, &src, &dest);
                report.record(rel, kind);
            }
        }

        report.processed += 1;
        ctx.set_progress(report.processed, total);
    }

    report.finish(cancelled);
    log_info(&format!(
        "Materialized {} -> {}: {} linked, {} copied, {} already present, {} failed ({:?})",
        src_root.display(),
        dest_root.display(),
        report.count(&DiagnosticKind::Linked),
        report.count(&DiagnosticKind::Copied),
        report.count(&DiagnosticKind::AlreadyExists),
        report.failures().count(),
        report.outcome,
    ));
    Ok(report)
}

/// Relative directory and file paths under `root`, sorted, directories first
/// in walk order.
fn scan_tree(root: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log_error(&format!("Error walking {}: {}", root.display(), e));
                continue;
            }
        };
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        if entry.file_type().is_dir() {
            dirs.push(rel.to_path_buf());
        } else {
            files.push(rel.to_path_buf());
        }
    }

    (dirs, files)
}

fn place(entry: ShadowEntry, src: &Path, dest: &Path) -> DiagnosticKind {
    match entry {
        ShadowEntry::Copy => match fs::copy(src, dest) {
            Ok(_) => {
                log_copy(&format!("Copied file: {} -> {}", src.display(), dest.display()));
                DiagnosticKind::Copied
            }
            Err(e) => {
                log_error(&format!(
                    "Error copying {} -> {}: {}",
                    src.display(),
                    dest.display(),
                    e
                ));
                DiagnosticKind::Failed(e.to_string())
            }
        },
        ShadowEntry::Link => match create_link(src, dest) {
            Ok(()) if fs::metadata(dest).is_ok() => {
                log_link(&format!("Symlink created: {} -> {}", dest.display(), src.display()));
                DiagnosticKind::Linked
            }
            Ok(()) => {
                log_error(&format!("Failed to verify symlink: {}", dest.display()));
                DiagnosticKind::Failed("link does not resolve".to_string())
            }
            Err(e) => {
                log_error(&format!(
                    "Error linking {} -> {}: {}",
                    dest.display(),
                    src.display(),
                    e
                ));
                DiagnosticKind::Failed(e.to_string())
            }
        },
    }
}

// ============================================================================
// Filesystem helpers
// ============================================================================

/// Create a file reference link at `link` pointing to `target`.
pub fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}

/// Remove the link at `path` without touching what it points to.
pub fn remove_link(path: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if path.is_dir() {
            return fs::remove_dir(path);
        }
    }
    fs::remove_file(path)
}

/// Turn every linked directory between `root` and `root/rel` (inclusive)
/// into a real directory whose entries link to the original children.
///
/// Afterwards nothing written below `root/rel` can land outside `root`.
/// Links to files and missing components are left as they are.
pub fn detach_linked_dirs(root: &Path, rel: &Path) -> io::Result<()> {
    let mut current = root.to_path_buf();
    for component in rel.components() {
        current.push(component);
        if !is_link(&current) || !current.is_dir() {
            continue;
        }

        let target = fs::canonicalize(&current)?;
        let children = fs::read_dir(&target)?.collect::<io::Result<Vec<_>>>()?;
        remove_link(&current)?;
        fs::create_dir(&current)?;
        for child in children {
            create_link(&child.path(), &current.join(child.file_name()))?;
        }
        log_link(&format!(
            "Detached linked directory {} ({} entries)",
            current.display(),
            fs::read_dir(&current).map(|d| d.count()).unwrap_or(0)
        ));
    }
    Ok(())
}

/// Whether `path` itself is a reference link (not followed).
pub fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Whether anything, including a dangling link, occupies `path`.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Outcome;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn classify_skips_logs_everywhere() {
        let root = Path::new("/games/Quiplash");
        for platform in [Platform::Windows, Platform::MacOs, Platform::Linux] {
            assert_eq!(classify(root, Path::new("readme-log.txt"), platform), None);
            assert_eq!(classify(root, Path::new("sub/game-log.txt"), platform), None);
        }
    }

    #[test]
    fn classify_copies_bundle_binary_on_macos_only() {
        let root = Path::new("/games/Quiplash");
        let binary = Path::new("Quiplash.app/Contents/MacOS/Quiplash");
        assert_eq!(classify(root, binary, Platform::MacOs), Some(ShadowEntry::Copy));
        assert_eq!(classify(root, binary, Platform::Linux), Some(ShadowEntry::Link));

        let other = Path::new("Quiplash.app/Contents/MacOS/helper");
        assert_eq!(classify(root, other, Platform::MacOs), Some(ShadowEntry::Link));
    }

    #[test]
    fn classify_copies_top_level_linux_stubs() {
        let root = Path::new("/games/Quiplash");
        assert_eq!(
            classify(root, Path::new("Quiplash_Vulkan"), Platform::Linux),
            Some(ShadowEntry::Copy)
        );
        assert_eq!(
            classify(root, Path::new("Quiplash_OpenGL"), Platform::Linux),
            Some(ShadowEntry::Copy)
        );
        assert_eq!(
            classify(root, Path::new("bin/Quiplash_Vulkan"), Platform::Linux),
            Some(ShadowEntry::Link)
        );
        assert_eq!(
            classify(root, Path::new("Quiplash_Vulkan"), Platform::Windows),
            Some(ShadowEntry::Link)
        );
    }

    #[test]
    fn classify_copies_windows_executables() {
        let root = Path::new("/games/Quiplash");
        assert_eq!(
            classify(root, Path::new("Quiplash.EXE"), Platform::Windows),
            Some(ShadowEntry::Copy)
        );
        assert_eq!(
            classify(root, Path::new("data/b.json"), Platform::Windows),
            Some(ShadowEntry::Link)
        );
    }

    #[test]
    fn materialize_builds_windows_shadow_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Quiplash");
        let dest = tmp.path().join("env");
        write(&src, "a.exe", "MZ");
        write(&src, "data/b.json", "{}");
        write(&src, "readme-log.txt", "log");
        fs::create_dir_all(src.join("empty/nested")).unwrap();
        fs::create_dir(&dest).unwrap();

        let report = materialize(&src, &dest, Platform::Windows, &TaskContext::silent()).unwrap();

        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.total, 3);
        assert_eq!(report.processed, 3);
        assert!(!is_link(&dest.join("a.exe")));
        assert_eq!(fs::read_to_string(dest.join("a.exe")).unwrap(), "MZ");
        assert!(is_link(&dest.join("data/b.json")));
        assert_eq!(fs::read_to_string(dest.join("data/b.json")).unwrap(), "{}");
        assert!(!entry_exists(&dest.join("readme-log.txt")));
        assert!(dest.join("empty/nested").is_dir());
    }

    #[test]
    fn second_run_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Quiplash");
        let dest = tmp.path().join("env");
        write(&src, "Quiplash_Vulkan", "elf");
        write(&src, "games/one.jet", "jet");
        write(&src, "games/two.swf", "swf");
        fs::create_dir(&dest).unwrap();

        let first = materialize(&src, &dest, Platform::Linux, &TaskContext::silent()).unwrap();
        assert_eq!(first.created(), 3);

        let second = materialize(&src, &dest, Platform::Linux, &TaskContext::silent()).unwrap();
        assert_eq!(second.outcome, Outcome::Completed);
        assert_eq!(second.created(), 0);
        assert_eq!(second.count(&DiagnosticKind::AlreadyExists), 3);
        assert!(!is_link(&dest.join("Quiplash_Vulkan")));
        assert!(is_link(&dest.join("games/one.jet")));
    }

    #[test]
    fn macos_bundle_binary_is_a_real_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Drawful 2");
        let dest = tmp.path().join("env");
        write(&src, "Drawful 2.app/Contents/MacOS/Drawful 2", "macho");
        write(&src, "Drawful 2.app/Contents/Info.plist", "plist");
        fs::create_dir(&dest).unwrap();

        materialize(&src, &dest, Platform::MacOs, &TaskContext::silent()).unwrap();

        assert!(!is_link(&dest.join("Drawful 2.app/Contents/MacOS/Drawful 2")));
        assert!(is_link(&dest.join("Drawful 2.app/Contents/Info.plist")));
    }

    #[test]
    fn cancel_stops_between_files_and_resume_finishes() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Quiplash");
        let dest = tmp.path().join("env");
        for name in ["a.jet", "b.jet", "c.jet"] {
            write(&src, name, name);
        }
        fs::create_dir(&dest).unwrap();

        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let ctx = {
            let cancel_in_cb = cancel.clone();
            let progress = progress.clone();
            TaskContext::new(
                |_| {},
                move |done, total| {
                    progress.lock().unwrap().push((done, total));
                    cancel_in_cb.store(true, Ordering::Relaxed);
                },
                cancel.clone(),
            )
        };

        let report = materialize(&src, &dest, Platform::Linux, &ctx).unwrap();
        assert_eq!(report.outcome, Outcome::Cancelled);
        assert_eq!(report.processed, 1);
        assert_eq!(*progress.lock().unwrap(), vec![(1, 3)]);
        assert!(entry_exists(&dest.join("a.jet")));
        assert!(!entry_exists(&dest.join("b.jet")));

        let resumed = materialize(&src, &dest, Platform::Linux, &TaskContext::silent()).unwrap();
        assert_eq!(resumed.outcome, Outcome::Completed);
        assert_eq!(resumed.created(), 2);
        assert_eq!(resumed.count(&DiagnosticKind::AlreadyExists), 1);
    }

    #[test]
    fn cancelled_before_start_places_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Quiplash");
        let dest = tmp.path().join("env");
        write(&src, "games/a.jet", "a");
        fs::create_dir(&dest).unwrap();

        let ctx = TaskContext::silent();
        ctx.cancel();
        let report = materialize(&src, &dest, Platform::Linux, &ctx).unwrap();

        assert_eq!(report.outcome, Outcome::Cancelled);
        assert_eq!(report.created(), 0);
        assert!(dest.join("games").is_dir());
        assert!(!entry_exists(&dest.join("games/a.jet")));
    }

    #[test]
    fn missing_roots_fail_before_walking() {
        let tmp = tempfile::tempdir().unwrap();
        let err = materialize(
            &tmp.path().join("nope"),
            tmp.path(),
            Platform::Linux,
            &TaskContext::silent(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingRoot { role: "vanilla install", .. }));

        let err = materialize(
            tmp.path(),
            &tmp.path().join("nope"),
            Platform::Linux,
            &TaskContext::silent(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingRoot { role: "environment directory", .. }));
    }

    #[test]
    fn failed_entries_do_not_stop_the_walk() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("Quiplash");
        let dest = tmp.path().join("env");
        write(&src, "a/one.jet", "1");
        write(&src, "b/two.jet", "2");
        write(&src, "c/three.jet", "3");
        // A plain file where the shadow tree needs the `b` directory
        write(&dest, "b", "in the way");

        let report = materialize(&src, &dest, Platform::Linux, &TaskContext::silent()).unwrap();

        assert_eq!(report.outcome, Outcome::PartiallyFailed);
        assert_eq!(report.processed, report.total);
        let failed: Vec<_> = report.failures().map(|d| d.path.clone()).collect();
        assert_eq!(failed, vec![PathBuf::from("b/two.jet")]);
        assert!(is_link(&dest.join("a/one.jet")));
        assert!(is_link(&dest.join("c/three.jet")));
        assert_eq!(fs::read_to_string(dest.join("b")).unwrap(), "in the way");
    }

    #[cfg(unix)]
    #[test]
    fn detach_replaces_linked_ancestors_with_real_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let vanilla = tmp.path().join("vanilla");
        let env = tmp.path().join("env");
        write(&vanilla, "x/y/f.jet", "f");
        write(&vanilla, "x/g.jet", "g");
        fs::create_dir(&env).unwrap();
        create_link(&vanilla.join("x"), &env.join("x")).unwrap();

        detach_linked_dirs(&env, Path::new("x/y")).unwrap();

        for dir in ["x", "x/y"] {
            assert!(!is_link(&env.join(dir)), "{dir}");
            assert!(env.join(dir).is_dir(), "{dir}");
        }
        assert!(is_link(&env.join("x/g.jet")));
        assert!(is_link(&env.join("x/y/f.jet")));
        assert_eq!(fs::read_to_string(env.join("x/y/f.jet")).unwrap(), "f");

        fs::write(env.join("x/y/new.jet"), "new").unwrap();
        assert!(!vanilla.join("x/y/new.jet").exists());
    }
}
