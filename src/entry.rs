// src/entry.rs
//
// =============================================================================
// CHROMALOG: LOG ENTRY (v 0.3)
// =============================================================================
//
// One unit of output flowing through the pipeline. Immutable once enqueued;
// cloned into the display queue, then forwarded by the display consumer to
// the history and disk stages. The old three-parallel-queue design (text,
// attributes, save-flag advanced independently) is collapsed into this one
// composite value so the queues can never drift out of lock-step.

use crate::style::StyleHandle;
use chrono::{DateTime, Local};

#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Raw payload. May contain the colour delimiter and a terminating
    /// newline marking line completion.
    pub text: String,

    /// Interned style for the whole segment.
    pub style: StyleHandle,

    /// Persist to disk/history but never render on screen.
    pub save_only: bool,

    /// Assigned at formatting time by the facade; never mutated afterwards.
    pub stamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, style: StyleHandle, save_only: bool) -> Self {
        Self {
            text: text.into(),
            style,
            save_only,
            stamp: Local::now(),
        }
    }

    /// True once this segment completes a display line.
    pub fn ends_line(&self) -> bool {
        self.text.contains('\n')
    }
}
