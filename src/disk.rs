// src/disk.rs
//
// =============================================================================
// CHROMALOG: DISK SINK (v 0.3)
// =============================================================================
//
// Durably persists raw bytes to the two append-only session files:
//
//   <yyyy-MM-dd_HH-mm-ss>.log   plain text, CR stripped, low latency
//   <yyyy-MM-dd_HH-mm-ss>.html  styled history, batch friendly
//
// Each stream has its own bounded queue and exactly one dedicated writer
// thread. A full queue blocks the producer: that is the pipeline's only
// backpressure mechanism, applied to slow producers instead of dropping
// entries.
//
// Failure containment: any I/O error disables the affected stream for the
// rest of the session and is reported once to the fallback channel. The
// writer thread keeps draining (discarding) so producers never deadlock.
// Nothing in here may crash the host application.

use crate::config::FlushPolicy;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Capacity of each per-stream queue.
pub const DISK_QUEUE_CAPACITY: usize = 100;

/// Periodic mode flushes once this much time has passed since the last one.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Idle tick so pending bytes do not sit unflushed while queues are empty.
const IDLE_TICK: Duration = Duration::from_secs(1);

const HTML_EPILOGUE: &str = "\n</body></html>\n";

#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    #[error("failed to prepare session log files: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// 1. PRODUCER HANDLE
// ============================================================================

/// Cheap cloneable sender side of the sink, held by the display and history
/// consumers. On a disabled sink every write is a no-op.
#[derive(Clone, Default)]
pub struct DiskHandle {
    text_tx: Option<Sender<String>>,
    html_tx: Option<Sender<String>>,
}

impl DiskHandle {
    /// Enqueues onto the plain-text stream. Blocks while the queue is full.
    pub fn write_text(&self, chunk: String) {
        if let Some(tx) = &self.text_tx {
            // Err only after shutdown has dropped the consumer; nothing to do.
            let _ = tx.send(chunk);
        }
    }

    /// Enqueues onto the HTML stream. Blocks while the queue is full.
    pub fn write_html(&self, chunk: String) {
        if let Some(tx) = &self.html_tx {
            let _ = tx.send(chunk);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.text_tx.is_some()
    }
}

// ============================================================================
// 2. THE SINK
// ============================================================================

struct SessionFiles {
    text_path: PathBuf,
    html_path: PathBuf,
    archive_path: PathBuf,
}

/// Owner side: worker threads plus the session file paths needed by
/// `finalise`. Held by the `Logger`; the consumers only hold `DiskHandle`s.
pub struct DiskSink {
    handle: DiskHandle,
    workers: Vec<JoinHandle<()>>,
    files: Option<SessionFiles>,
}

impl DiskSink {
    /// Creates the logs directory and the time-stamped session file pair,
    /// writes the HTML prologue (including one CSS rule per registered
    /// style), and starts both writer threads.
    pub fn open(
        logs_dir: &Path,
        style_block: &str,
        policy: FlushPolicy,
    ) -> Result<Self, DiskError> {
        fs::create_dir_all(logs_dir)?;

        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let text_path = logs_dir.join(format!("{stamp}.log"));
        let html_path = logs_dir.join(format!("{stamp}.html"));
        let archive_path = logs_dir.join(format!("{stamp}_log.tar.gz"));

        let text_file = File::create(&text_path)?;

        let mut html_file = File::create(&html_path)?;
        html_file.write_all(
            format!("<html><head>\n{style_block}\n</head><body>\n").as_bytes(),
        )?;

        let (text_tx, text_rx) = bounded::<String>(DISK_QUEUE_CAPACITY);
        let (html_tx, html_rx) = bounded::<String>(DISK_QUEUE_CAPACITY);

        let workers = vec![
            thread::spawn(move || run_writer(text_rx, text_file, policy, "text", None)),
            thread::spawn(move || run_writer(html_rx, html_file, policy, "html", Some(HTML_EPILOGUE))),
        ];

        Ok(Self {
            handle: DiskHandle {
                text_tx: Some(text_tx),
                html_tx: Some(html_tx),
            },
            workers,
            files: Some(SessionFiles {
                text_path,
                html_path,
                archive_path,
            }),
        })
    }

    /// A sink whose writes are all no-ops. Used when initialisation failed:
    /// logging continues on screen only.
    pub fn disabled() -> Self {
        Self {
            handle: DiskHandle::default(),
            workers: Vec::new(),
            files: None,
        }
    }

    pub fn handle(&self) -> DiskHandle {
        self.handle.clone()
    }

    pub fn text_path(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.text_path.as_path())
    }

    pub fn html_path(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.html_path.as_path())
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.archive_path.as_path())
    }

    /// One-shot shutdown: drains and closes both streams (the HTML writer
    /// appends the epilogue on its way out), packs both files into
    /// `<stamp>_log.tar.gz`, and deletes the originals. Safe on a sink that
    /// never received a single write, and best-effort throughout: a failed
    /// archive step leaves the raw files in place rather than erroring out.
    ///
    /// The caller must have dropped every cloned `DiskHandle` first, or the
    /// writer threads will not observe disconnection.
    pub fn finalise(mut self) {
        self.handle = DiskHandle::default();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("chromalog: disk writer thread panicked during drain");
            }
        }

        let Some(files) = self.files.take() else {
            return;
        };

        if let Err(e) = archive_session(&files) {
            log::error!(
                "chromalog: failed to archive session logs into {}: {e}",
                files.archive_path.display()
            );
            return;
        }

        for path in [&files.text_path, &files.html_path] {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("chromalog: could not remove {}: {e}", path.display());
            }
        }
    }
}

fn archive_session(files: &SessionFiles) -> anyhow::Result<()> {
    let out = File::create(&files.archive_path)?;
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for path in [&files.text_path, &files.html_path] {
        let name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("session file has no name: {}", path.display()))?;
        builder.append_path_with_name(path, name)?;
    }

    builder.into_inner()?.finish()?;
    Ok(())
}

// ============================================================================
// 3. WRITER THREADS
// ============================================================================

fn run_writer(
    rx: Receiver<String>,
    file: File,
    policy: FlushPolicy,
    stream: &'static str,
    epilogue: Option<&'static str>,
) {
    let mut writer = BufWriter::new(file);
    let mut failed = false;
    let mut dirty = false;
    let mut last_flush = Instant::now();

    loop {
        match rx.recv_timeout(IDLE_TICK) {
            Ok(chunk) => {
                if failed {
                    // Keep draining so producers never block on a dead sink.
                    continue;
                }

                // Normalise line endings for the on-disk form.
                let cleaned = chunk.replace('\r', "");

                if let Err(e) = writer.write_all(cleaned.as_bytes()) {
                    report_failure(stream, &e);
                    failed = true;
                    continue;
                }
                dirty = true;

                let due = match policy {
                    FlushPolicy::Immediate => true,
                    FlushPolicy::Periodic => last_flush.elapsed() > FLUSH_INTERVAL,
                };
                if due {
                    match writer.flush() {
                        Ok(()) => {
                            dirty = false;
                            last_flush = Instant::now();
                        }
                        Err(e) => {
                            report_failure(stream, &e);
                            failed = true;
                        }
                    }
                }
            }

            Err(RecvTimeoutError::Timeout) => {
                // Idle: push out anything the periodic policy is sitting on.
                if !failed && dirty && last_flush.elapsed() > FLUSH_INTERVAL {
                    match writer.flush() {
                        Ok(()) => {
                            dirty = false;
                            last_flush = Instant::now();
                        }
                        Err(e) => {
                            report_failure(stream, &e);
                            failed = true;
                        }
                    }
                }
            }

            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if failed {
        return;
    }

    if let Some(tail) = epilogue {
        if let Err(e) = writer.write_all(tail.as_bytes()) {
            report_failure(stream, &e);
            return;
        }
    }

    if let Err(e) = writer.flush() {
        report_failure(stream, &e);
    }
}

/// One diagnostic per occurrence, on the fallback channel. No retry loop: a
/// broken disk or handle is assumed to stay broken for the session.
fn report_failure(stream: &str, err: &std::io::Error) {
    log::error!("chromalog: {stream} stream failed, persistence disabled for this session: {err}");
}

// ============================================================================
// TESTS
// ============================================================================
