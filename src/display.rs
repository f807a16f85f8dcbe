// src/display.rs
//
// =============================================================================
// CHROMALOG: DISPLAY SINK (v 0.3)
// =============================================================================
//
// Maintains the bounded, ordered, evictable on-screen entry log.
//
// The concrete rendering technology lives behind the `DisplayView` trait;
// this crate ships `DisplayBuffer` (in-memory reference implementation,
// readable concurrently by a UI) and `TermDisplay` (ANSI terminal, see
// src/term.rs).
//
// Entry lifecycle per batch:
//   Received  - dequeued from the bounded primary queue (capacity 10)
//   Buffered  - accumulated until a newline arrives or one slot remains
//   Flushed   - inserted at the view's tail under one mutex (save-only
//               entries skipped), then forwarded to history and disk
//   Trimmed   - over-limit entries evicted from the head
//   Scrolled  - view advanced to the tail unless the user holds the
//               scrollbar (the gate blocks the consumer, never drops)

use crate::config::RuntimeOptions;
use crate::disk::DiskHandle;
use crate::entry::LogEntry;
use crate::style::StyleHandle;
use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Capacity of the primary entry queue. Full queue = producer blocks.
pub const DISPLAY_QUEUE_CAPACITY: usize = 10;

/// Capacity of the per-line accumulation buffer; a batch is flushed when a
/// newline is seen or one slot remains.
pub const ACCUMULATOR_CAPACITY: usize = 100;

// ============================================================================
// 1. THE DISPLAY CAPABILITY
// ============================================================================

/// What the core needs from a rendering surface. Implementations handle
/// their own interior state; the sink serialises the whole
/// insert/evict/scroll cycle under one mutex so readers never observe a
/// buffer mid-eviction.
pub trait DisplayView {
    /// Appends a styled run at the tail. Text may contain newlines; a
    /// newline completes the current entry (line).
    fn insert_at_tail(&mut self, text: &str, style: &StyleHandle) -> Result<()>;

    /// Removes `count` completed entries from the head (oldest first).
    fn evict_from_head(&mut self, count: usize);

    /// Number of completed entries currently retained.
    fn entry_count(&self) -> usize;

    /// Advances the view position to the newest entry.
    fn scroll_to_tail(&mut self);
}

// ============================================================================
// 2. REFERENCE IMPLEMENTATION
// ============================================================================

#[derive(Default)]
struct BufferInner {
    lines: VecDeque<Vec<(String, StyleHandle)>>,
    open: Vec<(String, StyleHandle)>,
    scrolls: u64,
}

/// In-memory display surface: completed lines of styled segments.
///
/// Clone-shared: the pipeline mutates one clone while a UI (or test)
/// reads another.
#[derive(Clone, Default)]
pub struct DisplayBuffer {
    inner: Arc<Mutex<BufferInner>>,
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the visible lines, segment texts concatenated.
    pub fn visible_lines(&self) -> Vec<String> {
        let inner = lock_recover(&self.inner);
        inner
            .lines
            .iter()
            .map(|segs| segs.iter().map(|(t, _)| t.as_str()).collect())
            .collect()
    }

    /// Snapshot including styles, for assertions on colouring.
    pub fn styled_lines(&self) -> Vec<Vec<(String, StyleHandle)>> {
        lock_recover(&self.inner).lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock_recover(&self.inner).lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the pipeline auto-scrolled this view.
    pub fn scroll_count(&self) -> u64 {
        lock_recover(&self.inner).scrolls
    }
}

impl DisplayView for DisplayBuffer {
    fn insert_at_tail(&mut self, text: &str, style: &StyleHandle) -> Result<()> {
        let mut inner = lock_recover(&self.inner);

        let mut rest = text;
        while let Some(pos) = rest.find('\n') {
            let (head, tail) = rest.split_at(pos + 1);
            let head = &head[..head.len() - 1]; // drop the newline itself
            if !head.is_empty() {
                inner.open.push((head.to_string(), style.clone()));
            }
            let line = std::mem::take(&mut inner.open);
            inner.lines.push_back(line);
            rest = tail;
        }

        if !rest.is_empty() {
            inner.open.push((rest.to_string(), style.clone()));
        }
        Ok(())
    }

    fn evict_from_head(&mut self, count: usize) {
        let mut inner = lock_recover(&self.inner);
        for _ in 0..count {
            if inner.lines.pop_front().is_none() {
                break;
            }
        }
    }

    fn entry_count(&self) -> usize {
        lock_recover(&self.inner).lines.len()
    }

    fn scroll_to_tail(&mut self) {
        lock_recover(&self.inner).scrolls += 1;
    }
}

fn lock_recover<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking reader must not take the whole pipeline down with it.
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// 3. MANUAL-SCROLL GATE
// ============================================================================

/// Latch toggled by the UI when the user grabs the scrollbar. While held,
/// the display consumer blocks before mutating the view: entries are
/// delayed, never lost, and ordering is preserved.
#[derive(Default)]
pub struct ScrollGate {
    held: Mutex<bool>,
    released: Condvar,
}

impl ScrollGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&self) {
        *lock_recover(&self.held) = true;
    }

    pub fn release(&self) {
        *lock_recover(&self.held) = false;
        self.released.notify_all();
    }

    pub fn is_held(&self) -> bool {
        *lock_recover(&self.held)
    }

    fn wait_until_released(&self) {
        let mut held = lock_recover(&self.held);
        while *held {
            held = match self.released.wait(held) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

// ============================================================================
// 4. THE CONSUMER
// ============================================================================

/// Producer handle + consumer thread for the display stage.
pub struct DisplaySink {
    tx: Sender<LogEntry>,
    worker: JoinHandle<()>,
}

impl DisplaySink {
    /// Starts the consumer. Every flushed entry is forwarded to the history
    /// queue and the disk text queue; save-only entries skip the view.
    pub fn spawn(
        view: Arc<Mutex<dyn DisplayView + Send>>,
        gate: Arc<ScrollGate>,
        opts: Arc<RuntimeOptions>,
        history_tx: Sender<LogEntry>,
        disk: DiskHandle,
    ) -> Self {
        let (tx, rx) = bounded::<LogEntry>(DISPLAY_QUEUE_CAPACITY);
        let worker = thread::spawn(move || consume(rx, view, gate, opts, history_tx, disk));
        Self { tx, worker }
    }

    /// Blocking post: suspends the caller while the primary queue is full.
    /// This is deliberate backpressure, not an error.
    pub fn post(&self, entry: LogEntry) {
        let _ = self.tx.send(entry);
    }

    /// Stops accepting, drains everything already queued, and joins the
    /// consumer thread.
    pub fn shutdown(self) {
        drop(self.tx);
        if self.worker.join().is_err() {
            log::error!("chromalog: display consumer panicked during drain");
        }
    }
}

fn consume(
    rx: Receiver<LogEntry>,
    view: Arc<Mutex<dyn DisplayView + Send>>,
    gate: Arc<ScrollGate>,
    opts: Arc<RuntimeOptions>,
    history_tx: Sender<LogEntry>,
    disk: DiskHandle,
) {
    let mut pending: Vec<LogEntry> = Vec::with_capacity(ACCUMULATOR_CAPACITY);

    while let Ok(entry) = rx.recv() {
        let flush_now = entry.ends_line() || pending.len() + 1 >= ACCUMULATOR_CAPACITY - 1;
        pending.push(entry);
        if flush_now {
            flush_batch(&mut pending, &view, &gate, &opts, &history_tx, &disk);
        }
    }

    // Channel closed: drain whatever is still buffered, newline or not.
    if !pending.is_empty() {
        flush_batch(&mut pending, &view, &gate, &opts, &history_tx, &disk);
    }
}

fn flush_batch(
    pending: &mut Vec<LogEntry>,
    view: &Arc<Mutex<dyn DisplayView + Send>>,
    gate: &ScrollGate,
    opts: &RuntimeOptions,
    history_tx: &Sender<LogEntry>,
    disk: &DiskHandle,
) {
    // A manual scroll pre-empts writes: block here, in queue order, until
    // the interaction ends.
    gate.wait_until_released();

    {
        let mut view = lock_recover(view);
        let mut inserted = false;

        for entry in pending.iter() {
            if entry.save_only {
                continue;
            }
            match view.insert_at_tail(&entry.text, &entry.style) {
                Ok(()) => inserted = true,
                // A single bad insert must never halt the consumer.
                Err(e) => log::error!("chromalog: display insert failed, entry skipped: {e}"),
            }
        }

        let max = opts.max_entries();
        let count = view.entry_count();
        if count > max {
            view.evict_from_head(count - max);
        }

        if inserted && !gate.is_held() {
            view.scroll_to_tail();
        }
    }

    // Forward outside the display lock so disk backpressure never stalls
    // concurrent UI reads.
    for entry in pending.drain(..) {
        let text = entry.text.clone();
        let _ = history_tx.send(entry);
        disk.write_text(text);
    }
}

// ============================================================================
// TESTS
// ============================================================================
