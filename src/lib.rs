// src/lib.rs
//
// =============================================================================
// CHROMALOG: LIBRARY ROOT
// =============================================================================
//
// This file declares the module tree and exports public types.

// 1. Declare Modules
pub mod config;
pub mod disk;
pub mod display;
pub mod entry;
pub mod history;
pub mod logger;
pub mod style;
pub mod term;

// 2. Re-exports (The Public API)
// These allow `use chromalog::Logger` or `use chromalog::StyleHandle` to
// work without walking the module tree.

pub use config::{FlushPolicy, LoggerConfig, RuntimeOptions};
pub use disk::{DiskHandle, DiskSink};
pub use display::{DisplayBuffer, DisplaySink, DisplayView, ScrollGate};
pub use entry::LogEntry;
pub use history::HistoryAccumulator;
pub use logger::{Logger, SessionPaths};
pub use style::{Colour, StyleHandle, StyleRegistry, BLACK, DATE_GREY, LABEL_GREEN, PALETTE, RED};
pub use term::TermDisplay;
