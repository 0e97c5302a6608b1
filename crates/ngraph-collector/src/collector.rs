//! One collection pass across network namespaces.
//!
//! Namespace switching is thread-scoped, so a pass is strictly sequential
//! and runs on its own short-lived OS thread. A session that fails to
//! restore can only taint that thread, which exits when the pass ends.

use std::sync::atomic::{AtomicBool, Ordering};

use ngraph_common::config::{CollectorConfig, SourceAddress};
use ngraph_common::constants::SCAN_THREAD_NAME;
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::AggregateCounts;
use ngraph_core::namespace::{ProcFs, ProcessTable, enumerate_namespaces};
use ngraph_core::socket::{NetnsSocketScanner, SocketScanner};

use crate::aggregate::Aggregator;
use crate::classify::Classifier;

/// What happened during a pass besides counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Namespaces whose sockets were read.
    pub namespaces_scanned: usize,
    /// Namespaces skipped because entering or reading them failed.
    pub namespaces_skipped: usize,
    /// Socket rows that could not be decoded.
    pub records_skipped: usize,
    /// Established sockets dropped by exclusion rules.
    pub records_excluded: usize,
}

/// Result of one pass.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Aggregated tuples.
    pub counts: AggregateCounts,
    /// Pass statistics.
    pub stats: PassStats,
}

/// Runs collection passes against the live host.
#[derive(Debug, Clone)]
pub struct Collector {
    config: CollectorConfig,
}

impl Collector {
    /// Creates a collector with the given configuration.
    #[must_use]
    pub const fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Runs one pass on a dedicated thread and waits for it.
    ///
    /// The port range and host address are read first; failing either
    /// aborts the pass. Failures scoped to a namespace or socket row are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the port range or host address cannot be
    /// determined, the process table cannot be listed, the pass is
    /// cancelled, or the worker thread cannot run.
    pub fn collect(&self, cancel: &AtomicBool) -> Result<Snapshot> {
        let range = ngraph_core::port_range::read_port_range(&self.config.port_range_path)?;
        let host_ip = match self.config.source_address {
            SourceAddress::Host => Some(ngraph_core::local_ip::local_ipv4()?),
            SourceAddress::Socket => None,
        };
        let classifier = Classifier::from_config(&self.config, range, host_ip)?;
        let table = ProcFs::new(&self.config.proc_root);
        let all_namespaces = self.config.all_namespaces;

        std::thread::scope(|scope| {
            let worker = std::thread::Builder::new()
                .name(SCAN_THREAD_NAME.into())
                .spawn_scoped(scope, || {
                    let mut scanner = NetnsSocketScanner::new();
                    run_pass(&classifier, all_namespaces, &table, &mut scanner, cancel)
                })
                .map_err(|e| NgraphError::Worker {
                    message: format!("spawn {SCAN_THREAD_NAME}: {e}"),
                })?;
            worker.join().map_err(|_| NgraphError::Worker {
                message: format!("{SCAN_THREAD_NAME} panicked"),
            })?
        })
    }
}

/// Runs one pass on the calling thread.
///
/// Namespaces are scanned one after another; `cancel` is checked before
/// each one.
///
/// # Errors
///
/// Returns an error if the process table cannot be listed or the pass is
/// cancelled.
pub fn run_pass<T, S>(
    classifier: &Classifier,
    all_namespaces: bool,
    table: &T,
    scanner: &mut S,
    cancel: &AtomicBool,
) -> Result<Snapshot>
where
    T: ProcessTable + ?Sized,
    S: SocketScanner + ?Sized,
{
    let namespaces = enumerate_namespaces(table, all_namespaces)?;
    let mut stats = PassStats::default();
    let mut aggregator = Aggregator::new(classifier);

    for handle in &namespaces {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!(ns = %handle.id, "collection pass cancelled");
            return Err(NgraphError::Cancelled);
        }
        match scanner.scan(handle) {
            Ok(scan) => {
                stats.namespaces_scanned += 1;
                stats.records_skipped += scan.skipped;
                aggregator.add_all(&scan.records);
            }
            Err(e) => {
                tracing::warn!(ns = %handle.id, pid = handle.pid, error = %e, "skipping namespace");
                stats.namespaces_skipped += 1;
            }
        }
    }

    stats.records_excluded = aggregator.excluded();
    let counts = aggregator.finish();
    tracing::debug!(
        range = %classifier.port_range(),
        namespaces = stats.namespaces_scanned,
        skipped_namespaces = stats.namespaces_skipped,
        skipped_records = stats.records_skipped,
        excluded = stats.records_excluded,
        tuples = counts.len(),
        "collection pass complete"
    );
    Ok(Snapshot { counts, stats })
}
