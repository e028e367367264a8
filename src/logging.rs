//! MultiJack Logging System
//!
//! Timestamped, level-prefixed log lines written to the console and to a
//! per-session file under the config directory.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use crate::platform::Platform;

static LOGGER: OnceLock<Arc<Mutex<MjLogger>>> = OnceLock::new();

// ============================================================================
// System Information Detection
// ============================================================================

#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub app_version: String,
    pub platform: Platform,
    pub kernel: String,
    pub session_type: String,
}

impl SystemInfo {
    pub fn detect() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: Platform::current(),
            kernel: detect_kernel(),
            session_type: detect_session_type(),
        }
    }

    pub fn to_log_header(&self) -> String {
        format!(
r#"================================================================================
MultiJack Log - {}
================================================================================
Application:   MultiJack v{}
System Info:
  Platform:    {}
  Kernel:      {}
  Session:     {}
================================================================================
"#,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.app_version,
            self.platform,
            self.kernel,
            self.session_type,
        )
    }
}

fn detect_session_type() -> String {
    std::env::var("XDG_SESSION_TYPE").unwrap_or_else(|_| "Unknown".to_string())
}

fn detect_kernel() -> String {
    if Platform::current() == Platform::Windows {
        return std::env::var("OS").unwrap_or_else(|_| "Windows".to_string());
    }
    if let Ok(output) = Command::new("uname").arg("-r").output() {
        if output.status.success() {
            return String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
    }
    "Unknown".to_string()
}

// ============================================================================
// Log Levels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogLevel {
    Info,
    Action, // User-initiated operations (create, inject, delete)
    Link,
    Copy,
    Warning,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Action => "[ACTION]",
            LogLevel::Link => "[LINK]",
            LogLevel::Copy => "[COPY]",
            LogLevel::Warning => "[WARNING]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

// ============================================================================
// MultiJack Logger
// ============================================================================

/// Session log files kept in the log directory; older ones are pruned
const KEEP_LOG_FILES: usize = 10;

pub struct MjLogger {
    log_file: Option<File>,
    log_path: Option<PathBuf>,
}

impl MjLogger {
    pub fn new() -> Self {
        let log_dir: PathBuf = mj_path!("logs");
        if fs::create_dir_all(&log_dir).is_err() {
            return Self::console_only();
        }
        prune_old_logs(&log_dir, KEEP_LOG_FILES.saturating_sub(1));

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("multijack_{}.log", stamp));
        let log_file = OpenOptions::new().create(true).append(true).open(&log_path).ok();

        let mut logger = Self {
            log_path: log_file.as_ref().map(|_| log_path),
            log_file,
        };
        if let Some(file) = logger.log_file.as_mut() {
            let _ = write!(file, "{}", SystemInfo::detect().to_log_header());
        }
        logger
    }

    /// A logger that only prints to the console.
    pub fn console_only() -> Self {
        Self {
            log_file: None,
            log_path: None,
        }
    }

    /// File this session logs to, if one could be opened.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        let line = format!("[{}] {} {}", Local::now().format("%H:%M:%S"), level.prefix(), message);

        if let Some(file) = self.log_file.as_mut() {
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
        }

        match level {
            LogLevel::Warning | LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }
}

/// Delete all but the `keep` newest `multijack_*.log` files in `dir`.
///
/// File names embed the session timestamp, so name order is age order.
fn prune_old_logs(dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut logs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| {
                    let name = name.to_string_lossy();
                    name.starts_with("multijack_") && name.ends_with(".log")
                })
                .unwrap_or(false)
        })
        .collect();

    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for old in logs.into_iter().take(excess) {
        let _ = fs::remove_file(old);
    }
}

impl Default for MjLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Global Logger Access
// ============================================================================

/// Initialize the global logger (call once at startup)
pub fn init_logger() {
    LOGGER.get_or_init(|| Arc::new(Mutex::new(MjLogger::new())));
}

/// Get the global logger instance
///
/// Library code logging before `init_logger` (tests, embedding) gets a
/// console-only logger.
fn logger() -> Arc<Mutex<MjLogger>> {
    LOGGER
        .get_or_init(|| Arc::new(Mutex::new(MjLogger::console_only())))
        .clone()
}

// ============================================================================
// Convenience Logging Functions
// ============================================================================

pub fn log_info(message: &str) {
    logger().lock().log(LogLevel::Info, message);
}

pub fn log_action(message: &str) {
    logger().lock().log(LogLevel::Action, message);
}

pub fn log_link(message: &str) {
    logger().lock().log(LogLevel::Link, message);
}

pub fn log_copy(message: &str) {
    logger().lock().log(LogLevel::Copy, message);
}

pub fn log_warning(message: &str) {
    logger().lock().log(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    logger().lock().log(LogLevel::Error, message);
}
