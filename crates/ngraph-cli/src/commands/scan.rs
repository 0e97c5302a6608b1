//! `ngraph scan` — Run one collection pass and print the result.

use std::sync::atomic::AtomicBool;

use clap::Args;
use ngraph_collector::collector::Collector;
use ngraph_collector::metrics::render_text;
use ngraph_common::config::CollectorConfig;

use crate::output;

/// Arguments for the `scan` command.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Print the aggregated tuples as JSON instead of metrics.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `scan` command.
///
/// # Errors
///
/// Returns an error if the pass fails or its output cannot be rendered.
pub fn execute(args: &ScanArgs, config: CollectorConfig) -> anyhow::Result<()> {
    let collector = Collector::new(config);
    let snapshot = collector.collect(&AtomicBool::new(false))?;
    tracing::info!("{}", output::format_stats(&snapshot.stats));

    let rendered = if args.json {
        output::to_json(&snapshot.counts)?
    } else {
        render_text(&snapshot.counts)?
    };
    print!("{rendered}");
    Ok(())
}
