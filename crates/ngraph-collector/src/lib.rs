//! Connection collection pipeline for ngraph.
//!
//! A pass enumerates network namespaces, scans each one's established TCP
//! sockets, classifies every socket by direction, drops excluded
//! addresses, and counts the resulting tuples. Renderers turn the counts
//! into Prometheus metrics or text exposition.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod aggregate;
pub mod classify;
pub mod collector;
pub mod metrics;
pub mod textfile;
