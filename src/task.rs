//! Shared plumbing for long-running filesystem walks
//!
//! Walks report progress through a [`TaskContext`], poll its cancel flag
//! between files, and return a [`WalkReport`] instead of failing on
//! per-file errors.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Task Context
// ============================================================================

/// Context for background walk tasks
#[derive(Clone)]
pub struct TaskContext {
    pub status_callback: Arc<dyn Fn(String) + Send + Sync>,
    pub progress_callback: Arc<dyn Fn(usize, usize) + Send + Sync>,
    pub cancel_flag: Arc<AtomicBool>,
}

impl TaskContext {
    pub fn new(
        status: impl Fn(String) + Send + Sync + 'static,
        progress: impl Fn(usize, usize) + Send + Sync + 'static,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            status_callback: Arc::new(status),
            progress_callback: Arc::new(progress),
            cancel_flag: cancel,
        }
    }

    /// A context that reports nothing and is never cancelled from outside.
    pub fn silent() -> Self {
        Self::new(|_| {}, |_, _| {}, Arc::new(AtomicBool::new(false)))
    }

    pub fn set_status(&self, msg: String) {
        (self.status_callback)(msg);
    }

    /// Report `processed` of `total` files done.
    pub fn set_progress(&self, processed: usize, total: usize) {
        (self.progress_callback)(processed, total);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

// ============================================================================
// Walk Results
// ============================================================================

/// How a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Stopped by the cancel flag or a declined prompt; nothing was rolled back
    Cancelled,
    /// Ran to the end, but at least one file could not be placed
    PartiallyFailed,
}

/// What happened to a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Reference link created back to the vanilla file
    Linked,
    /// Real copy created
    Copied,
    /// Destination entry was already present and left untouched
    AlreadyExists,
    /// Log file excluded from materialization
    SkippedLog,
    /// A reference link was removed so the file could be replaced by a copy
    Unlinked,
    /// Destination already had identical content
    Identical,
    /// Conflicting destination replaced after confirmation
    Overwritten,
    /// Conflicting destination kept after the user chose to skip it
    KeptExisting,
    /// Link or copy failed; the walk continued
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path relative to the walk's source root
    pub path: PathBuf,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone)]
pub struct WalkReport {
    pub outcome: Outcome,
    pub processed: usize,
    pub total: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl WalkReport {
    pub fn new(total: usize) -> Self {
        Self {
            outcome: Outcome::Completed,
            processed: 0,
            total,
            diagnostics: Vec::new(),
        }
    }

    pub fn record(&mut self, path: &Path, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic {
            path: path.to_path_buf(),
            kind,
        });
    }

    pub fn count(&self, kind: &DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| &d.kind == kind).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::Failed(_)))
    }

    /// Entries newly placed at the destination by this walk.
    pub fn created(&self) -> usize {
        self.count(&DiagnosticKind::Linked)
            + self.count(&DiagnosticKind::Copied)
            + self.count(&DiagnosticKind::Overwritten)
    }

    /// Set the final outcome once the walk stops.
    pub fn finish(&mut self, cancelled: bool) {
        self.outcome = if cancelled {
            Outcome::Cancelled
        } else if self.failures().next().is_some() {
            Outcome::PartiallyFailed
        } else {
            Outcome::Completed
        };
    }
}
