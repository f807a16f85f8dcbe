// tests/pipeline.rs
//
// End-to-end runs of the whole pipeline: facade -> display consumer ->
// history -> disk writers -> archive. Each test gets its own logs
// directory under the system temp dir.

use chromalog::{
    DisplayBuffer, FlushPolicy, Logger, LoggerConfig, BLACK, PALETTE,
};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn temp_logs_dir(tag: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "chromalog_pipeline_{}_{}_{}",
        tag,
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

fn read_archive(path: &Path) -> Vec<(String, String)> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).expect("open archive")));
    let mut out = Vec::new();
    for entry in archive.entries().expect("archive entries") {
        let mut entry = entry.expect("archive entry");
        let name = entry.path().expect("entry name").to_string_lossy().into_owned();
        let mut body = String::new();
        entry.read_to_string(&mut body).expect("entry body");
        out.push((name, body));
    }
    out
}

fn archived_text(path: &Path) -> String {
    read_archive(path)
        .into_iter()
        .find(|(n, _)| n.ends_with(".log"))
        .expect("archive holds a .log member")
        .1
}

fn archived_html(path: &Path) -> String {
    read_archive(path)
        .into_iter()
        .find(|(n, _)| n.ends_with(".html"))
        .expect("archive holds a .html member")
        .1
}

fn config_in(dir: &Path, max_entries: usize) -> LoggerConfig {
    LoggerConfig {
        logs_dir: dir.to_path_buf(),
        flush_policy: FlushPolicy::Immediate,
        max_entries,
        ..LoggerConfig::default()
    }
}

fn wait_until(what: &str, mut ready: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !ready() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

// ----------------------------------------------------------------------------
// Eviction and persistence
// ----------------------------------------------------------------------------

#[test]
fn eviction_keeps_newest_on_screen_but_everything_on_disk() {
    let dir = temp_logs_dir("evict");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 3), buffer.clone());
    let archive = logger.session_paths().expect("disk enabled").archive.clone();

    for entry in ["A", "B", "C", "D"] {
        logger.info(entry);
    }
    logger.shutdown();

    // With a limit of 3, posting A..D leaves exactly B, C, D visible.
    let visible = buffer.visible_lines();
    assert_eq!(visible.len(), 3);
    assert!(visible[0].ends_with("B"), "got {:?}", visible);
    assert!(visible[1].ends_with("C"));
    assert!(visible[2].ends_with("D"));

    // The archive's text log still has all four, in posting order.
    let text = archived_text(&archive);
    let positions: Vec<usize> = ["A\n", "B\n", "C\n", "D\n"]
        .iter()
        .map(|needle| text.find(*needle).unwrap_or_else(|| panic!("{needle:?} missing")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "disk order broken");

    // And the HTML history converted every entry to a styled span.
    let html = archived_html(&archive);
    assert!(html.contains("<style>"));
    assert!(html.contains(">A<br />"), "history span for A missing");
    assert!(html.contains(">D<br />"));
    assert!(html.trim_end().ends_with("</body></html>"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn single_producer_order_is_preserved_end_to_end() {
    let dir = temp_logs_dir("order");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());
    let archive = logger.session_paths().expect("disk enabled").archive.clone();

    for i in 0..50 {
        logger.info(&format!("entry-{i:03}"));
    }
    logger.shutdown();

    let visible = buffer.visible_lines();
    assert_eq!(visible.len(), 50);
    for (i, line) in visible.iter().enumerate() {
        assert!(
            line.ends_with(&format!("entry-{i:03}")),
            "line {i} out of order: {line}"
        );
    }

    let text = archived_text(&archive);
    let positions: Vec<usize> = (0..50)
        .map(|i| text.find(&format!("entry-{i:03}")).expect("entry on disk"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    fs::remove_dir_all(&dir).ok();
}

// ----------------------------------------------------------------------------
// Save-only and error-only visibility
// ----------------------------------------------------------------------------

#[test]
fn show_only_errors_demotes_info_to_disk_and_history() {
    let dir = temp_logs_dir("errors_only");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());
    let archive = logger.session_paths().expect("disk enabled").archive.clone();

    logger.options().set_show_only_errors(true);
    logger.info("hidden-info");
    logger.error("loud-failure");
    logger.shutdown();

    let visible = buffer.visible_lines().join("\n");
    assert!(!visible.contains("hidden-info"), "demoted info reached the screen");
    assert!(visible.contains("loud-failure"));
    assert!(visible.contains("!! ERROR >>"));
    assert!(visible.contains("<< ERROR !!"));

    // Demotion is about the screen only: both entries persist.
    let text = archived_text(&archive);
    assert!(text.contains("hidden-info"));
    assert!(text.contains("loud-failure"));

    let html = archived_html(&archive);
    assert!(html.contains("hidden-info"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn exception_renders_one_line_per_frame() {
    use anyhow::Context;

    let dir = temp_logs_dir("exception");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());

    let failure = std::fs::read_to_string(dir.join("missing-input"))
        .context("reading missing-input")
        .expect_err("file must not exist");
    logger.exception(&failure);
    logger.shutdown();

    let visible = buffer.visible_lines();
    let label_line = visible
        .iter()
        .position(|l| l.contains("!! EXCEPTION !!"))
        .expect("exception label line");
    // The context line follows the label, each frame on its own line.
    assert!(visible[label_line + 1..]
        .iter()
        .any(|l| l.contains("reading missing-input")));

    fs::remove_dir_all(&dir).ok();
}

// ----------------------------------------------------------------------------
// Colour cycling through the whole pipeline
// ----------------------------------------------------------------------------

#[test]
fn delimited_segments_arrive_styled_and_in_place() {
    let dir = temp_logs_dir("colours");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());

    logger.info_coloured("a`b`c`d`e", 2);
    logger.shutdown();

    let lines = buffer.styled_lines();
    assert_eq!(lines.len(), 1);
    let segments = &lines[0];

    // Tail of the line: a, b, c, d, e after the stamp and label segments.
    let tail: Vec<&str> = segments
        .iter()
        .map(|(t, _)| t.as_str())
        .skip(segments.len() - 5)
        .collect();
    assert_eq!(tail, vec!["a", "b", "c", "d", "e"]);

    let styles: Vec<_> = segments.iter().skip(segments.len() - 5).collect();
    assert_eq!(styles[0].1.colour(), BLACK);
    assert_eq!(styles[1].1.colour(), PALETTE[0]);
    assert_eq!(styles[2].1.colour(), BLACK);
    assert_eq!(styles[3].1.colour(), PALETTE[1]);
    assert_eq!(styles[4].1.colour(), BLACK);

    fs::remove_dir_all(&dir).ok();
}

// ----------------------------------------------------------------------------
// Scroll gate and backpressure
// ----------------------------------------------------------------------------

#[test]
fn held_gate_delays_visibility_without_losing_entries() {
    let dir = temp_logs_dir("gate");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());

    let gate = logger.scroll_gate();
    gate.hold();

    logger.info("delayed-entry");
    thread::sleep(Duration::from_millis(100));
    assert!(buffer.is_empty(), "entry surfaced while the gate was held");

    gate.release();
    wait_until("the delayed entry to surface", || {
        buffer.visible_lines().iter().any(|l| l.contains("delayed-entry"))
    });

    logger.shutdown();
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn full_primary_queue_blocks_the_producer() {
    let dir = temp_logs_dir("backpressure");
    let buffer = DisplayBuffer::new();
    let logger = Arc::new(Logger::init(config_in(&dir, 500), buffer.clone()));

    // Park the consumer inside a flush.
    let gate = logger.scroll_gate();
    gate.hold();
    logger.info("first");
    thread::sleep(Duration::from_millis(100));

    // Fill the primary queue (capacity 10) with non-terminated fragments.
    let style = logger.registry().plain(BLACK);
    for i in 0..10 {
        logger.post(format!("fragment-{i}"), style.clone(), false);
    }

    // The next post has nowhere to go and must block.
    let unblocked = Arc::new(AtomicBool::new(false));
    let producer = {
        let logger = Arc::clone(&logger);
        let style = style.clone();
        let unblocked = Arc::clone(&unblocked);
        thread::spawn(move || {
            logger.post("overflow\n".to_string(), style, false);
            unblocked.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(
        !unblocked.load(Ordering::SeqCst),
        "producer pushed past a full queue"
    );

    gate.release();
    producer.join().expect("producer join");
    assert!(unblocked.load(Ordering::SeqCst));

    wait_until("the overflow line to surface", || {
        buffer.visible_lines().iter().any(|l| l.contains("overflow"))
    });

    match Arc::try_unwrap(logger) {
        Ok(logger) => logger.shutdown(),
        Err(_) => panic!("logger still shared after join"),
    }
    fs::remove_dir_all(&dir).ok();
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[test]
fn disk_disabled_runs_screen_only() {
    let buffer = DisplayBuffer::new();
    let config = LoggerConfig {
        disk_enabled: false,
        max_entries: 500,
        ..LoggerConfig::default()
    };
    let logger = Logger::init(config, buffer.clone());
    assert!(logger.session_paths().is_none());

    logger.info("screen only");
    logger.shutdown();

    assert!(buffer
        .visible_lines()
        .iter()
        .any(|l| l.contains("screen only")));
}

#[test]
fn drop_without_explicit_shutdown_still_archives() {
    let dir = temp_logs_dir("drop");
    let buffer = DisplayBuffer::new();
    let logger = Logger::init(config_in(&dir, 500), buffer.clone());
    let archive = logger.session_paths().expect("disk enabled").archive.clone();

    logger.info("rescued by drop");
    drop(logger);

    assert!(archive.exists(), "drop did not finalise the session");
    assert!(archived_text(&archive).contains("rescued by drop"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn concurrent_producers_lose_nothing_and_stay_fifo_per_thread() {
    let dir = temp_logs_dir("producers");
    let buffer = DisplayBuffer::new();
    let logger = Arc::new(Logger::init(config_in(&dir, 500), buffer.clone()));
    let archive = logger.session_paths().expect("disk enabled").archive.clone();

    let workers: Vec<_> = (0..2)
        .map(|p| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..20 {
                    logger.info(&format!("p{p}-{i:02}"));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("producer join");
    }

    match Arc::try_unwrap(logger) {
        Ok(logger) => logger.shutdown(),
        Err(_) => panic!("logger still shared after join"),
    }

    // Interleaving across producers is unspecified, but nothing may be
    // lost and each producer's own entries stay in order.
    let text = archived_text(&archive);
    for p in 0..2 {
        let positions: Vec<usize> = (0..20)
            .map(|i| {
                text.find(&format!("p{p}-{i:02}"))
                    .unwrap_or_else(|| panic!("p{p}-{i:02} missing from disk"))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "producer {p} reordered");
    }
    assert_eq!(buffer.visible_lines().len(), 40);

    fs::remove_dir_all(&dir).ok();
}
