//! Formatted output helpers for CLI commands.

use ngraph_collector::collector::PassStats;
use ngraph_common::types::AggregateCounts;

/// Renders counts as a pretty JSON array sorted by tuple, one object per
/// tuple with `source`, `destination`, `direction`, and `count`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(counts: &AggregateCounts) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(&counts.sorted())?;
    json.push('\n');
    Ok(json)
}

/// One-line summary of a pass.
#[must_use]
pub fn format_stats(stats: &PassStats) -> String {
    let mut line = format!(
        "scanned {} namespace{}",
        stats.namespaces_scanned,
        plural(stats.namespaces_scanned)
    );
    if stats.namespaces_skipped > 0 {
        line.push_str(&format!(", skipped {}", stats.namespaces_skipped));
    }
    if stats.records_skipped > 0 {
        line.push_str(&format!(
            ", {} unreadable socket{}",
            stats.records_skipped,
            plural(stats.records_skipped)
        ));
    }
    if stats.records_excluded > 0 {
        line.push_str(&format!(", {} excluded", stats.records_excluded));
    }
    line
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
