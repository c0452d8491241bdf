//! astrum-send - Background daemon for scheduled publishing
//!
//! Drains the task queue, turns matching weekly slots into publish tasks
//! and runs the daily maintenance job (analytics, then AI usage reset).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use libastrum::{AstrumError, AstrumService, Config, Result};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "astrum-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
astrum-send - Background daemon for scheduled publishing

DESCRIPTION:
    astrum-send is a long-running daemon. Every poll interval it:
      - queues publication for weekly slots matching the current minute
      - runs due tasks from the queue (publish_content, collect_analytics,
        reset_ai_usage), up to the configured batch limit

    Once a day at scheduler.daily_time (23:45 local by default) it collects
    platform analytics and resets the AI usage counters. A run missed
    while the daemon was not running is skipped.

USAGE:
    # Run in foreground (logs to stderr)
    astrum-send

    # Process due tasks once and exit
    astrum-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current iteration)

CONFIGURATION:
    Configuration file: ~/.config/astrumverse/config.toml

    [scheduler]
    daily_time = \"23:45\"
    poll_interval = 60  # seconds between polls
    batch_limit = 10    # tasks per poll

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due tasks once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libastrum::logging::init_for_daemon(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let poll_interval = cli.poll_interval.unwrap_or(config.scheduler.poll_interval).max(1);
    let service = Arc::new(AstrumService::from_config(config).await?);

    info!("astrum-send daemon starting");

    if cli.once {
        let summary = service.process_due_tasks().await?;
        info!(
            "Processed tasks once ({} completed, {} failed), exiting",
            summary.completed, summary.failed
        );
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let (scheduler, scheduler_handle) = service.daily_scheduler()?;
    info!(
        "Poll interval: {}s, daily job at {}",
        poll_interval,
        scheduler.at().format("%H:%M")
    );
    let daily = tokio::spawn(scheduler.run(service.clone()));

    run_daemon_loop(&service, poll_interval, shutdown).await;

    scheduler_handle.shutdown();
    if let Err(e) = daily.await {
        error!("Daily scheduler task ended abnormally: {}", e);
    }

    info!("astrum-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| AstrumError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

async fn run_daemon_loop(service: &AstrumService, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    // Slots whose occurrence falls between two checks are queued on the later one
    let mut last_slot_check = Local::now();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        let now = Local::now();
        match service.queue_due_slots(last_slot_check, now).await {
            Ok(queued) if !queued.is_empty() => {
                info!("Queued {} task(s) from weekly slots", queued.len())
            }
            Ok(_) => {}
            Err(e) => error!("Error checking weekly slots: {}", e),
        }
        last_slot_check = now;

        match service.process_due_tasks().await {
            Ok(summary) if summary.total() > 0 => info!(
                "Processed {} task(s): {} completed, {} failed",
                summary.total(),
                summary.completed,
                summary.failed
            ),
            Ok(_) => {}
            Err(e) => error!("Error processing tasks: {}", e),
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}
