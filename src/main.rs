// src/main.rs
//
// =============================================================================
// CHROMALOG: DEMO ENTRY POINT (v 0.3)
// =============================================================================
//
// Drives the whole pipeline against a terminal view: styled info and error
// traffic, delimited colour cycling, a second producer thread, an
// exception dump, then a clean shutdown that archives the session.

use anyhow::{anyhow, Context, Result};
use chromalog::{FlushPolicy, Logger, LoggerConfig, TermDisplay};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(name = "chromalog", version, about = "Asynchronous styled log pipeline demo")]
struct Cli {
    /// Directory for the session's text/HTML logs and the final archive.
    #[arg(long, default_value = "var/logs")]
    logs_dir: PathBuf,

    /// Visible-line cap before the oldest lines are evicted.
    #[arg(long, default_value_t = 500)]
    max_entries: usize,

    /// Flush every chunk to disk as it arrives instead of on a timer.
    #[arg(long)]
    immediate_flush: bool,

    /// Run screen-only, with no session files.
    #[arg(long)]
    no_disk: bool,

    /// Demote info traffic to the files and history only.
    #[arg(long)]
    show_only_errors: bool,

    /// How many numbered demo entries the background producer posts.
    #[arg(long, default_value_t = 20)]
    entries: usize,
}

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = LoggerConfig {
        logs_dir: cli.logs_dir,
        flush_policy: if cli.immediate_flush {
            FlushPolicy::Immediate
        } else {
            FlushPolicy::Periodic
        },
        max_entries: cli.max_entries,
        show_only_errors: cli.show_only_errors,
        disk_enabled: !cli.no_disk,
        ..LoggerConfig::default()
    };

    let logger = Arc::new(Logger::init(config, TermDisplay::new()));
    let archive = logger
        .session_paths()
        .map(|paths| paths.archive.clone());

    run_demo(&logger, cli.entries)?;

    match Arc::try_unwrap(logger) {
        Ok(logger) => logger.shutdown(),
        Err(_) => return Err(anyhow!("a producer still holds the logger at shutdown")),
    }

    if let Some(archive) = archive {
        println!("session archived at {}", archive.display());
    }
    Ok(())
}

// ============================================================================
// 3. DEMO TRAFFIC
// ============================================================================

fn run_demo(logger: &Arc<Logger>, entries: usize) -> Result<()> {
    logger.info("pipeline up");
    logger.info("plain text with `highlighted` words `cycling` the `palette`");
    logger.info_coloured("two colours only: `one` and `two` and `one` again", 2);
    logger.info_coloured_separator(-1, true, " / ", &["alpha", "beta", "gamma", "done"]);
    logger.infos(&["first of a batch", "second of a batch"]);

    logger.error("a framed error with a `highlighted` cause");
    logger.errors(&["first failure", "second failure"]);

    // A background producer interleaving with the main thread.
    let producer = {
        let logger = Arc::clone(logger);
        thread::spawn(move || {
            for i in 0..entries {
                logger.info(&format!("background entry `{i}`"));
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    logger.info("main thread still posting while the producer runs");

    if let Err(failure) = std::fs::read_to_string("definitely/not/a/real/path")
        .context("reading the demo's missing input")
    {
        logger.exception(&failure);
    }

    producer
        .join()
        .map_err(|_| anyhow!("demo producer panicked"))?;
    logger.info("demo finished, shutting down");
    Ok(())
}
