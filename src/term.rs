// src/term.rs
//
// =============================================================================
// CHROMALOG: TERMINAL VIEW (v 0.3)
// =============================================================================
//
// A `DisplayView` that renders styled segments straight to stdout with
// crossterm. Printed lines cannot be taken back, so eviction only shrinks
// the modelled window count; a widget-backed view would remove the lines
// for real.

use crate::display::DisplayView;
use crate::style::StyleHandle;
use anyhow::{Context, Result};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::QueueableCommand;
use std::io::{self, Write};

pub struct TermDisplay {
    stdout: io::Stdout,
    /// Completed lines currently counted against the eviction window.
    window: usize,
}

impl TermDisplay {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            window: 0,
        }
    }
}

impl Default for TermDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayView for TermDisplay {
    fn insert_at_tail(&mut self, text: &str, style: &StyleHandle) -> Result<()> {
        let colour = style.colour();
        self.stdout
            .queue(SetForegroundColor(Color::Rgb {
                r: colour.r,
                g: colour.g,
                b: colour.b,
            }))
            .context("set colour")?;
        if style.bold() {
            self.stdout.queue(SetAttribute(Attribute::Bold)).context("set bold")?;
        }
        if style.italic() {
            self.stdout
                .queue(SetAttribute(Attribute::Italic))
                .context("set italic")?;
        }
        self.stdout.queue(Print(text)).context("print segment")?;
        self.stdout
            .queue(SetAttribute(Attribute::Reset))
            .context("reset attributes")?;
        self.stdout.queue(ResetColor).context("reset colour")?;

        self.window += text.matches('\n').count();
        if text.contains('\n') {
            self.stdout.flush().context("flush line")?;
        }
        Ok(())
    }

    fn evict_from_head(&mut self, count: usize) {
        self.window = self.window.saturating_sub(count);
    }

    fn entry_count(&self) -> usize {
        self.window
    }

    fn scroll_to_tail(&mut self) {
        // The terminal cursor already follows the tail.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_tracks_completed_lines_only() {
        let mut view = TermDisplay::new();
        assert_eq!(view.entry_count(), 0);
        // Open fragment, then the line completes, then two more at once.
        let style = crate::style::StyleRegistry::new().plain(crate::style::BLACK);
        view.insert_at_tail("open", &style).expect("insert");
        assert_eq!(view.entry_count(), 0);
        view.insert_at_tail(" closed\n", &style).expect("insert");
        assert_eq!(view.entry_count(), 1);
        view.insert_at_tail("a\nb\n", &style).expect("insert");
        assert_eq!(view.entry_count(), 3);
        view.evict_from_head(2);
        assert_eq!(view.entry_count(), 1);
        view.evict_from_head(5);
        assert_eq!(view.entry_count(), 0);
    }
}
