//! End-to-end flows across the registry, shadow tree, injection engine and
//! the VDF codec.

use std::fs;
use std::path::{Path, PathBuf};

use multijack::environments::{Registry, DESCRIPTOR_FILE};
use multijack::games::GameInstall;
use multijack::inject::{self, InjectPrompt, Resolution};
use multijack::platform::Platform;
use multijack::shadow::{self, is_link};
use multijack::task::{DiagnosticKind, Outcome, TaskContext};
use multijack::vdf;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn vanilla_quiplash(root: &Path) -> GameInstall {
    let game_root = root.join("common/Quiplash");
    write(&game_root, "Quiplash.exe", "binary");
    write(&game_root, "data/a.txt", "vanilla data");
    write(&game_root, "run-log.txt", "old log");
    GameInstall {
        name: "Quiplash".to_string(),
        app_id: 351510,
        root: game_root,
    }
}

struct AlwaysDecline;

impl InjectPrompt for AlwaysDecline {
    fn confirm_override(&mut self, _rel: &Path) -> bool {
        false
    }

    fn resolve_conflict(&mut self, _rel: &Path) -> Resolution {
        Resolution::CancelAll
    }
}

#[cfg(unix)]
#[test]
fn windows_tree_materializes_then_accepts_a_mod() {
    let tmp = tempfile::tempdir().unwrap();
    let game = vanilla_quiplash(tmp.path());
    let registry = Registry::new(tmp.path().join("env"));

    let created = registry
        .create(&game, "Party", Platform::Windows, &TaskContext::silent())
        .unwrap();
    assert!(created.registered);
    assert_eq!(created.report.outcome, Outcome::Completed);

    let env = created.environment;
    assert!(env.path.join(DESCRIPTOR_FILE).is_file());
    assert!(!is_link(&env.path.join("Quiplash.exe")));
    assert!(is_link(&env.path.join("data/a.txt")));
    assert!(!env.path.join("run-log.txt").exists());

    // Running the shadow walk again places nothing new
    let again =
        shadow::materialize(&game.root, &env.path, Platform::Windows, &TaskContext::silent())
            .unwrap();
    assert_eq!(again.created(), 0);
    assert_eq!(again.count(&DiagnosticKind::AlreadyExists), 2);

    let mod_root = tmp.path().join("mod");
    write(&mod_root, "data/a.txt", "modded data");
    write(&mod_root, "games/Quiplash/content/q.jet", "{}");

    let report = inject::inject(&mod_root, &env.path, &TaskContext::silent(), |_| {
        Resolution::Overwrite
    })
    .unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(fs::read_to_string(env.path.join("data/a.txt")).unwrap(), "modded data");
    assert_eq!(fs::read_to_string(game.root.join("data/a.txt")).unwrap(), "vanilla data");

    assert_eq!(registry.list("Quiplash").unwrap(), vec![env.clone()]);
    let deleted = registry.delete(&env).unwrap();
    assert!(deleted.is_complete());
    assert!(!env.path.exists());
    assert!(game.root.join("data/a.txt").is_file());
}

#[test]
fn declined_core_override_leaves_environment_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let game = vanilla_quiplash(tmp.path());
    let registry = Registry::new(tmp.path().join("env"));
    let env = registry
        .create(&game, "Clean", Platform::Windows, &TaskContext::silent())
        .unwrap()
        .environment;

    let mod_root = tmp.path().join("mod");
    write(&mod_root, "Quiplash.exe", "patched");
    write(&mod_root, "games/new.jet", "{}");

    let report = inject::inject_mod(
        &env,
        &mod_root,
        &game.root,
        Platform::Windows,
        &TaskContext::silent(),
        &mut AlwaysDecline,
    )
    .unwrap();

    assert_eq!(report.outcome, Outcome::Cancelled);
    assert_eq!(report.processed, 0);
    assert_eq!(fs::read_to_string(env.path.join("Quiplash.exe")).unwrap(), "binary");
    assert!(!env.path.join("games").exists());
}

#[test]
fn launch_option_round_trips_through_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path: PathBuf = tmp.path().join("localconfig.vdf");

    let mut doc = vdf::Document::new();
    vdf::set_path(&mut doc, "A.B.LaunchOptions", "wrapper %command%");
    vdf::write_file(&path, &doc).unwrap();

    let reread = vdf::read_file(&path).unwrap();
    assert_eq!(
        vdf::get_path_str(&reread, "A.B.LaunchOptions"),
        Some("wrapper %command%")
    );
}
