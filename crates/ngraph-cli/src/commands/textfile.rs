//! `ngraph textfile` — Write metrics for the node-exporter text-file collector.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Args;
use ngraph_collector::collector::Collector;
use ngraph_collector::metrics::render_text;
use ngraph_collector::textfile::TextfileWriter;
use ngraph_common::config::{CollectorConfig, TextfileConfig};
use ngraph_common::constants;
use ngraph_common::error::NgraphError;

/// Slice in which the interval sleep checks for shutdown.
const SLEEP_TICK: Duration = Duration::from_millis(200);

/// Arguments for the `textfile` command.
#[derive(Args, Debug)]
pub struct TextfileArgs {
    /// Directory receiving `ngraph.prom`.
    #[arg(long, default_value = constants::DEFAULT_TEXTFILE_DIR, env = "NGRAPH_TEXTFILE_DIR")]
    pub output_dir: PathBuf,

    /// Seconds between collection passes.
    #[arg(long, default_value_t = constants::DEFAULT_INTERVAL_SECS, env = "NGRAPH_INTERVAL")]
    pub interval: u64,

    /// Write a single file and exit.
    #[arg(long)]
    pub once: bool,
}

/// Executes the `textfile` command.
///
/// A failed pass is logged and the previous file is kept. Runs until
/// Ctrl-C unless `--once` is given.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the signal handler
/// cannot be installed, or a `--once` pass fails.
pub fn execute(args: TextfileArgs, config: CollectorConfig) -> anyhow::Result<()> {
    let textfile = TextfileConfig::new(args.output_dir, Duration::from_secs(args.interval))?;
    let writer = TextfileWriter::from_config(&textfile);
    let collector = Collector::new(config);

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })?;

    tracing::info!(
        path = %writer.target().display(),
        interval_secs = textfile.interval.as_secs(),
        "writing metrics file"
    );

    if args.once {
        return write_once(&collector, &writer, &stop).map_err(Into::into);
    }

    while !stop.load(Ordering::Relaxed) {
        match write_once(&collector, &writer, &stop) {
            Ok(()) | Err(NgraphError::Cancelled) => {}
            Err(e) => tracing::error!(error = %e, "collection pass failed"),
        }
        sleep_unless_stopped(textfile.interval, &stop);
    }
    tracing::info!("shutting down");
    Ok(())
}

fn write_once(
    collector: &Collector,
    writer: &TextfileWriter,
    stop: &AtomicBool,
) -> ngraph_common::error::Result<()> {
    let snapshot = collector.collect(stop)?;
    writer.write(&render_text(&snapshot.counts)?)
}

/// Sleeps for `interval`, returning early once `stop` is set.
fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(SLEEP_TICK.min(deadline - now));
    }
}
