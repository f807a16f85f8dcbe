// src/logger.rs
//
// =============================================================================
// CHROMALOG: LOG FACADE & ENTRY FORMATTER (v 0.3)
// =============================================================================
//
// The only entry point external callers use. Composes the style registry,
// display sink and history accumulator into atomic multi-segment log
// entries with consistent ordering.
//
// Design notes carried over from the redesign:
// - No singleton, no lazy first-call magic: an explicit `Logger` value with
//   `init` and `shutdown`.
// - No operation here returns an error or panics outward; the logging
//   facility's own failure must never crash the host it instruments.
// - Within one producer thread, posting order is delivery order to every
//   sink. Across producer threads only queue-admission order holds; that
//   non-determinism is inherent and accepted.

use crate::config::{LoggerConfig, RuntimeOptions};
use crate::disk::DiskSink;
use crate::display::{DisplaySink, DisplayView, ScrollGate};
use crate::entry::LogEntry;
use crate::history::HistoryAccumulator;
use crate::style::{StyleHandle, StyleRegistry, BLACK, DATE_GREY, LABEL_GREEN, PALETTE, RED};
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound on the shutdown drain + finalise sequence. A stuck drain
/// must not prevent process termination.
const FINALISE_WAIT: Duration = Duration::from_secs(5);

const INFO_LABEL: &str = "Info:   ";
const ERROR_OPEN: &str = "!! ERROR >>   ";
const ERROR_CLOSE: &str = "   << ERROR !!\n";
const EXCEPTION_LABEL: &str = "!! EXCEPTION !!\n";

/// Paths of the current session's on-disk artefacts.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub text: PathBuf,
    pub html: PathBuf,
    pub archive: PathBuf,
}

// ============================================================================
// 1. THE LOGGER
// ============================================================================

pub struct Logger {
    registry: Arc<StyleRegistry>,
    opts: Arc<RuntimeOptions>,
    gate: Arc<ScrollGate>,
    delimiter: char,
    default_colours: i32,

    closed: AtomicBool,
    display: Option<DisplaySink>,
    history: Option<HistoryAccumulator>,
    disk: Option<DiskSink>,
    session: Option<SessionPaths>,
}

impl Logger {
    /// Builds the whole pipeline: style registry, disk sink (or a disabled
    /// stand-in when the files cannot be created), history accumulator and
    /// display consumer. Never fails: a sink that cannot start is reported
    /// once on the fallback channel and logging continues without it.
    pub fn init(config: LoggerConfig, view: impl DisplayView + Send + 'static) -> Self {
        let registry = Arc::new(StyleRegistry::new());
        let opts = Arc::new(RuntimeOptions::from(&config));
        let gate = Arc::new(ScrollGate::new());

        let disk = if config.disk_enabled {
            match DiskSink::open(&config.logs_dir, &registry.style_block(), config.flush_policy) {
                Ok(sink) => sink,
                Err(e) => {
                    log::error!(
                        "chromalog: session log files unavailable, continuing on screen only: {e}"
                    );
                    DiskSink::disabled()
                }
            }
        } else {
            DiskSink::disabled()
        };

        let session = match (disk.text_path(), disk.html_path(), disk.archive_path()) {
            (Some(t), Some(h), Some(a)) => Some(SessionPaths {
                text: t.to_path_buf(),
                html: h.to_path_buf(),
                archive: a.to_path_buf(),
            }),
            _ => None,
        };

        let history = HistoryAccumulator::spawn(disk.handle());

        let shared: Arc<Mutex<dyn DisplayView + Send>> = Arc::new(Mutex::new(view));
        let display = DisplaySink::spawn(
            shared,
            gate.clone(),
            opts.clone(),
            history.sender(),
            disk.handle(),
        );

        Self {
            registry,
            opts,
            gate,
            delimiter: config.delimiter,
            default_colours: config.default_colours,
            closed: AtomicBool::new(false),
            display: Some(display),
            history: Some(history),
            disk: Some(disk),
            session,
        }
    }

    pub fn options(&self) -> Arc<RuntimeOptions> {
        self.opts.clone()
    }

    /// The latch a UI toggles while the user holds the scrollbar.
    pub fn scroll_gate(&self) -> Arc<ScrollGate> {
        self.gate.clone()
    }

    pub fn registry(&self) -> Arc<StyleRegistry> {
        self.registry.clone()
    }

    pub fn session_paths(&self) -> Option<&SessionPaths> {
        self.session.as_ref()
    }

    // ------------------------------------------------------------------
    // Low-level posting primitives
    // ------------------------------------------------------------------

    /// Posts one raw styled segment. Blocks briefly when the display queue
    /// is full (backpressure); becomes a no-op after shutdown.
    pub fn post(&self, text: impl Into<String>, style: StyleHandle, save_only: bool) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(display) = &self.display {
            display.post(LogEntry::new(text, style, save_only));
        }
    }

    /// Sends straight to the HTML history, bypassing the display stage.
    pub fn add_to_history(&self, text: impl Into<String>, style: StyleHandle) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(history) = &self.history {
            history.add(LogEntry::new(text, style, true));
        }
    }

    // ------------------------------------------------------------------
    // Public posting interface
    // ------------------------------------------------------------------

    /// Informing entry. Wrap words in the delimiter character to colour
    /// them; colouring cycles through the default number of palette
    /// colours.
    pub fn info(&self, entry: &str) {
        self.info_coloured(entry, self.default_colours);
    }

    /// Informing entry with an explicit colour count (`-1` for the whole
    /// palette).
    pub fn info_coloured(&self, entry: &str, colours: i32) {
        let base = self.registry.plain(BLACK);
        let label = self.registry.label(LABEL_GREEN);
        let save_only = self.opts.show_only_errors();

        self.post_stamp(&base, save_only);
        self.post(INFO_LABEL, label, save_only);

        let mut segments =
            colour_cycled(&self.registry, entry, &base, colours, self.delimiter);
        match segments.last_mut() {
            Some(last) => last.0.push('\n'),
            None => segments.push((String::from("\n"), base)),
        }
        for (text, style) in segments {
            self.post(text, style, save_only);
        }
    }

    /// Several informing entries, posted back to back.
    pub fn infos(&self, entries: &[&str]) {
        for entry in entries {
            self.info(entry);
        }
    }

    /// Strings joined by `separator`, each coloured by cycling the palette.
    /// With `black_last` the final string stays in the base colour.
    pub fn info_coloured_separator(
        &self,
        colours: i32,
        black_last: bool,
        separator: &str,
        strings: &[&str],
    ) {
        let base = self.registry.plain(BLACK);
        let label = self.registry.label(LABEL_GREEN);
        let save_only = self.opts.show_only_errors();
        let n = resolve_colours(colours);

        self.post_stamp(&base, save_only);
        self.post(INFO_LABEL, label, save_only);

        for (i, s) in strings.iter().enumerate() {
            let last = i + 1 == strings.len();
            let style = if last && black_last {
                base.clone()
            } else {
                self.registry.plain(PALETTE[i % n])
            };
            self.post(*s, style, save_only);
            if !last {
                self.post(separator, base.clone(), save_only);
            }
        }
        self.post("\n", base, save_only);
    }

    /// Error entry, framed by the symmetric open/close labels. Delimited
    /// words cycle the palette against the red base.
    pub fn error(&self, entry: &str) {
        let base = self.registry.plain(RED);
        let label = self.registry.label(RED);

        self.post_stamp(&base, false);
        self.post(ERROR_OPEN, label.clone(), false);
        for (text, style) in colour_cycled(&self.registry, entry, &base, -1, self.delimiter) {
            self.post(text, style, false);
        }
        self.post(ERROR_CLOSE, label, false);
    }

    /// Several error entries, posted back to back.
    pub fn errors(&self, entries: &[&str]) {
        for entry in entries {
            self.error(entry);
        }
    }

    /// Exception entry: the error's chain and backtrace, one entry per
    /// physical line in the base error colour, then a terminating blank
    /// entry.
    pub fn exception(&self, error: &anyhow::Error) {
        let base = self.registry.plain(RED);

        self.post_stamp(&base, false);
        self.post(EXCEPTION_LABEL, self.registry.label(RED), false);

        let rendered = format!("{error:?}");
        for line in rendered.lines() {
            self.post(format!("{line}\n"), base.clone(), false);
        }
        self.post("\n", base, false);
    }

    fn post_stamp(&self, base: &StyleHandle, save_only: bool) {
        let now = Local::now();
        self.post(
            now.format("%d-%b-%Y ").to_string(),
            self.registry.plain(DATE_GREY),
            save_only,
        );
        self.post(now.format("%H:%M:%S: ").to_string(), base.clone(), save_only);
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Runs the shutdown sequence exactly once: stop accepting, drain all
    /// four queues in dependency order, finalise the disk sink (archive +
    /// delete), all under a bounded wait. Also runs from `Drop`. Safe even
    /// when initialisation partially failed.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let display = self.display.take();
        let history = self.history.take();
        let disk = self.disk.take();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            // Dependency order: the display consumer owns a history sender
            // and a disk handle, the history consumer owns the HTML disk
            // handle; each join releases the next stage's queue.
            if let Some(display) = display {
                display.shutdown();
            }
            if let Some(history) = history {
                history.shutdown();
            }
            if let Some(disk) = disk {
                disk.finalise();
            }
            let _ = done_tx.send(());
        });

        if done_rx.recv_timeout(FINALISE_WAIT).is_err() {
            log::warn!(
                "chromalog: shutdown drain did not finish within {FINALISE_WAIT:?}; exiting anyway"
            );
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

// ============================================================================
// 2. SEGMENT-AND-COLOUR-CYCLE
// ============================================================================

/// Clamp a requested colour count to the palette: anything outside
/// `1..=PALETTE.len()` (notably `-1`) means "use them all".
fn resolve_colours(colours: i32) -> usize {
    if colours < 1 || colours as usize > PALETTE.len() {
        PALETTE.len()
    } else {
        colours as usize
    }
}

/// The shared primitive behind every posting variant: splits `text` on the
/// delimiter into alternating plain/highlight segments. Even segments keep
/// the base style; odd segment `i` takes `PALETTE[(i / 2) % n]`. A string
/// with an unmatched trailing delimiter (or no delimiter at all) renders
/// whole in the base style.
pub(crate) fn colour_cycled(
    registry: &StyleRegistry,
    text: &str,
    base: &StyleHandle,
    colours: i32,
    delimiter: char,
) -> Vec<(String, StyleHandle)> {
    let parts: Vec<&str> = text.split(delimiter).collect();

    // One part: nothing to colour. Even part count: odd number of
    // delimiters, i.e. an unmatched trailing one.
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return vec![(text.to_string(), base.clone())];
    }

    let n = resolve_colours(colours);
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            if i % 2 == 0 {
                (part.to_string(), base.clone())
            } else {
                (part.to_string(), registry.plain(PALETTE[(i / 2) % n]))
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str, colours: i32) -> Vec<(String, StyleHandle)> {
        let registry = StyleRegistry::new();
        let base = registry.plain(BLACK);
        colour_cycled(&registry, text, &base, colours, '`')
    }

    #[test]
    fn round_trip_colour_segmentation() {
        let segments = split("a`b`c`d`e", 2);
        let texts: Vec<&str> = segments.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d", "e"]);

        // Styles: [base, colour0, base, colour1, base].
        let registry = StyleRegistry::new();
        assert_eq!(segments[0].1.colour(), BLACK);
        assert_eq!(segments[1].1, registry.plain(PALETTE[0]));
        assert_eq!(segments[2].1.colour(), BLACK);
        assert_eq!(segments[3].1, registry.plain(PALETTE[1]));
        assert_eq!(segments[4].1.colour(), BLACK);

        // Rejoining reproduces the original minus delimiters.
        assert_eq!(texts.concat(), "abcde");
    }

    #[test]
    fn colour_cycle_wraps_around_the_requested_count() {
        let segments = split("a`b`c`d`e`f`g", 2);
        assert_eq!(segments.len(), 7);
        let registry = StyleRegistry::new();
        assert_eq!(segments[1].1, registry.plain(PALETTE[0]));
        assert_eq!(segments[3].1, registry.plain(PALETTE[1]));
        assert_eq!(segments[5].1, registry.plain(PALETTE[0]));
    }

    #[test]
    fn unmatched_trailing_delimiter_is_a_colouring_noop() {
        let segments = split("plain `half", -1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].0, "plain `half");
        assert_eq!(segments[0].1.colour(), BLACK);
    }

    #[test]
    fn undelimited_text_stays_in_the_base_colour() {
        let segments = split("no markers here", -1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].1.colour(), BLACK);
    }

    #[test]
    fn colour_count_outside_range_means_whole_palette() {
        assert_eq!(resolve_colours(-1), PALETTE.len());
        assert_eq!(resolve_colours(0), PALETTE.len());
        assert_eq!(resolve_colours(99), PALETTE.len());
        assert_eq!(resolve_colours(3), 3);
    }
}
