// src/history.rs
//
// =============================================================================
// CHROMALOG: HISTORY ACCUMULATOR (v 0.3)
// =============================================================================
//
// Converts every posted entry (save-only included) into a styled HTML
// fragment and forwards it to the disk sink's HTML stream.
//
// Deliberately decoupled from the display sink: disk conversion latency
// must never throttle what the user sees on screen, and trimming the
// screen must never lose historical fidelity. The queue here is unbounded;
// a full session's HTML history is expected to be complete.

use crate::disk::DiskHandle;
use crate::entry::LogEntry;
use crate::style::StyleHandle;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Producer handle + consumer thread for the history stage.
pub struct HistoryAccumulator {
    tx: Sender<LogEntry>,
    worker: JoinHandle<()>,
}

impl HistoryAccumulator {
    pub fn spawn(disk: DiskHandle) -> Self {
        let (tx, rx) = unbounded::<LogEntry>();
        let worker = thread::spawn(move || consume(rx, disk));
        Self { tx, worker }
    }

    /// Extra sender for the display consumer, which forwards every flushed
    /// entry here.
    pub fn sender(&self) -> Sender<LogEntry> {
        self.tx.clone()
    }

    /// Enqueues one entry for conversion. Never blocks meaningfully and
    /// never drops.
    pub fn add(&self, entry: LogEntry) {
        let _ = self.tx.send(entry);
    }

    /// Drains the queue and joins the consumer. All cloned senders must be
    /// gone by the time this is called or the drain never terminates.
    pub fn shutdown(self) {
        drop(self.tx);
        if self.worker.join().is_err() {
            log::error!("chromalog: history consumer panicked during drain");
        }
    }
}

fn consume(rx: Receiver<LogEntry>, disk: DiskHandle) {
    while let Ok(entry) = rx.recv() {
        disk.write_html(render_span(&entry.text, &entry.style));
    }
}

/// One `<span>` per entry, classed by the style registry's deterministic
/// name. Whitespace is encoded so visual spacing survives the conversion.
pub fn render_span(text: &str, style: &StyleHandle) -> String {
    format!(
        "<span class=\"{}\">{}</span>",
        style.css_class(),
        escape_html(text)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br />\n"),
            '\t' => out.push_str("&#9;"),
            ' ' => out.push_str("&nbsp;"),
            '\r' => {} // stripped, same as the disk sink
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleRegistry, BLACK};

    #[test]
    fn escapes_structural_characters() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
    }

    #[test]
    fn encodes_whitespace_for_fidelity() {
        assert_eq!(escape_html("a b\tc\n"), "a&nbsp;b&#9;c<br />\n");
    }

    #[test]
    fn span_carries_the_css_class() {
        let reg = StyleRegistry::new();
        let style = reg.plain(BLACK);
        let span = render_span("hi", &style);
        assert_eq!(
            span,
            format!("<span class=\"{}\">hi</span>", style.css_class())
        );
    }

    #[test]
    fn consumer_forwards_to_disabled_disk_without_blocking() {
        let reg = StyleRegistry::new();
        let history = HistoryAccumulator::spawn(crate::disk::DiskSink::disabled().handle());
        history.add(LogEntry::new("x\n", reg.plain(BLACK), false));
        history.shutdown();
    }
}
