// src/config.rs
//
// =============================================================================
// CHROMALOG: CONFIGURATION (v 0.3)
// =============================================================================
//
// Two layers:
// 1. LoggerConfig  - startup choices, serde-friendly so hosts can embed it
//                    in their own configuration files.
// 2. RuntimeOptions - the few values consumers re-read at call time
//                    (entry limit, error-only visibility). Atomics, shared
//                    between the host and the pipeline threads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// When the disk writer threads push bytes to the OS.
///
/// `Immediate` flushes after every dequeued chunk: crash-safety per line at
/// the cost of throughput. `Periodic` flushes once more than five seconds
/// have passed since the last flush, trading a small durability window for
/// batching. Both are deliberate, supported policies; `Periodic` is the
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    Immediate,
    #[default]
    Periodic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory the session `.log`/`.html` pair is created in.
    pub logs_dir: PathBuf,

    /// Disk flush policy.
    pub flush_policy: FlushPolicy,

    /// Default number of palette colours cycled by delimited segments.
    /// Anything outside `1..=PALETTE.len()` (including -1) means "use the
    /// whole palette".
    pub default_colours: i32,

    /// Delimiter splitting plain and highlighted segments.
    pub delimiter: char,

    /// Initial display entry limit. Mutable later via `RuntimeOptions`.
    pub max_entries: usize,

    /// Start with info entries demoted to save-only.
    pub show_only_errors: bool,

    /// Skip the disk sink entirely (display and history conversion still
    /// run). Useful for hosts that only want the window.
    pub disk_enabled: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("var/logs"),
            flush_policy: FlushPolicy::default(),
            default_colours: -1,
            delimiter: '`',
            max_entries: 500,
            show_only_errors: false,
            disk_enabled: true,
        }
    }
}

/// Options the pipeline re-reads at call time. Shared by `Arc`; safe to
/// mutate from any thread while the consumers run.
#[derive(Debug)]
pub struct RuntimeOptions {
    max_entries: AtomicUsize,
    show_only_errors: AtomicBool,
}

impl RuntimeOptions {
    pub fn new(max_entries: usize, show_only_errors: bool) -> Self {
        Self {
            max_entries: AtomicUsize::new(max_entries),
            show_only_errors: AtomicBool::new(show_only_errors),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries.load(Ordering::Relaxed)
    }

    pub fn set_max_entries(&self, limit: usize) {
        self.max_entries.store(limit, Ordering::Relaxed);
    }

    pub fn show_only_errors(&self) -> bool {
        self.show_only_errors.load(Ordering::Relaxed)
    }

    pub fn set_show_only_errors(&self, on: bool) {
        self.show_only_errors.store(on, Ordering::Relaxed);
    }
}

impl From<&LoggerConfig> for RuntimeOptions {
    fn from(cfg: &LoggerConfig) -> Self {
        Self::new(cfg.max_entries, cfg.show_only_errors)
    }
}
