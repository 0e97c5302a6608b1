//! Prometheus rendering of aggregated connections.
//!
//! Two gauge families share the `src_ip`/`dst_ip` labels. Labels follow the
//! traffic: for outbound tuples the local address is `src_ip`, for inbound
//! tuples the peer is.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use ngraph_common::constants::{INCOMING_METRIC_NAME, OUTGOING_METRIC_NAME};
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{AggregateCounts, Direction};
use prometheus::core::{Collector as PromCollector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::collector::Collector;

const LABELS: [&str; 2] = ["src_ip", "dst_ip"];

fn render_error(e: &prometheus::Error) -> NgraphError {
    NgraphError::Render {
        message: e.to_string(),
    }
}

/// The incoming and outgoing gauge families.
#[derive(Clone)]
pub struct ConnectionGauges {
    incoming: GaugeVec,
    outgoing: GaugeVec,
}

impl ConnectionGauges {
    /// Creates empty gauge families.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric descriptors are rejected.
    pub fn new() -> Result<Self> {
        let incoming = GaugeVec::new(
            Opts::new(
                INCOMING_METRIC_NAME,
                "Total number of incoming network connections between source and destination IP addresses.",
            ),
            &LABELS,
        )
        .map_err(|e| render_error(&e))?;
        let outgoing = GaugeVec::new(
            Opts::new(
                OUTGOING_METRIC_NAME,
                "Total number of outgoing network connections between source and destination IP addresses.",
            ),
            &LABELS,
        )
        .map_err(|e| render_error(&e))?;
        Ok(Self { incoming, outgoing })
    }

    /// Replaces every sample with `counts`.
    #[allow(clippy::cast_precision_loss)]
    pub fn update(&self, counts: &AggregateCounts) {
        self.incoming.reset();
        self.outgoing.reset();
        for (tuple, count) in counts.iter() {
            let (family, src, dst) = match tuple.direction {
                Direction::Outbound => (&self.outgoing, &tuple.source, &tuple.destination),
                Direction::Inbound => (&self.incoming, &tuple.destination, &tuple.source),
            };
            family
                .with_label_values(&[src.as_str(), dst.as_str()])
                .set(count as f64);
        }
    }

    /// Registers both families with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if either family is already registered.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.incoming.clone()))
            .map_err(|e| render_error(&e))?;
        registry
            .register(Box::new(self.outgoing.clone()))
            .map_err(|e| render_error(&e))?;
        Ok(())
    }

    fn descs(&self) -> Vec<&Desc> {
        let mut descs = self.incoming.desc();
        descs.extend(self.outgoing.desc());
        descs
    }

    fn families(&self) -> Vec<MetricFamily> {
        let mut families = self.incoming.collect();
        families.extend(self.outgoing.collect());
        families
    }
}

/// Renders `counts` in the Prometheus text exposition format.
///
/// Samples are sorted by label values, so equal counts render identically.
///
/// # Errors
///
/// Returns an error if the metrics cannot be registered or encoded.
pub fn render_text(counts: &AggregateCounts) -> Result<String> {
    let registry = Registry::new();
    let gauges = ConnectionGauges::new()?;
    gauges.register(&registry)?;
    gauges.update(counts);
    encode(&registry.gather())
}

/// Encodes metric families in the text exposition format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode(families: &[MetricFamily]) -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(families, &mut buf)
        .map_err(|e| render_error(&e))?;
    String::from_utf8(buf).map_err(|e| NgraphError::Render {
        message: e.to_string(),
    })
}

/// Prometheus collector that runs a pass on every scrape.
///
/// Scrapes are serialized: a second scrape waits for the running pass and
/// then starts its own. A failed pass is logged and yields the families
/// without samples.
pub struct ConnectionsExporter {
    collector: Collector,
    gauges: ConnectionGauges,
    pass: Mutex<()>,
    cancel: Arc<AtomicBool>,
}

impl ConnectionsExporter {
    /// Wraps `collector` for registration with a Prometheus registry.
    ///
    /// Setting `cancel` aborts an in-flight pass between namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric descriptors are rejected.
    pub fn new(collector: Collector, cancel: Arc<AtomicBool>) -> Result<Self> {
        Ok(Self {
            collector,
            gauges: ConnectionGauges::new()?,
            pass: Mutex::new(()),
            cancel,
        })
    }
}

impl PromCollector for ConnectionsExporter {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.descs()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _pass = self
            .pass
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match self.collector.collect(&self.cancel) {
            Ok(snapshot) => self.gauges.update(&snapshot.counts),
            Err(e) => {
                tracing::error!(error = %e, "error getting connections");
                self.gauges.update(&AggregateCounts::new());
            }
        }
        self.gauges.families()
    }
}
