//! Integration tests for a full collection pass.
//!
//! A pass is driven against an in-memory process table and socket scanner:
//! 1. Namespace enumeration and deduplication
//! 2. Direction classification
//! 3. Exclusions and public address collapsing
//! 4. Per-namespace failure isolation
//! 5. Cancellation
//! 6. Rendering of the resulting counts

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use ngraph_collector::classify::{Classifier, SourceLabel};
use ngraph_collector::collector::{PassStats, run_pass};
use ngraph_collector::metrics::render_text;
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{
    ConnectionRecord, ConnectionTuple, Direction, ExclusionList, NamespaceHandle, NamespaceId,
    PortRange, TcpState,
};
use ngraph_core::namespace::ProcessTable;
use ngraph_core::socket::{NamespaceScan, SocketScanner};

// ── Fakes ────────────────────────────────────────────────────────────

struct FakeTable {
    procs: Vec<(i32, u64)>,
}

impl ProcessTable for FakeTable {
    fn pids(&self) -> Result<Vec<i32>> {
        Ok(self.procs.iter().map(|(pid, _)| *pid).collect())
    }

    fn netns_of(&self, pid: i32) -> Result<NamespaceHandle> {
        let path = PathBuf::from(format!("/proc/{pid}/ns/net"));
        let (_, inode) = self
            .procs
            .iter()
            .find(|(p, _)| *p == pid)
            .ok_or_else(|| NgraphError::Io {
                path: path.clone(),
                source: std::io::ErrorKind::NotFound.into(),
            })?;
        Ok(NamespaceHandle {
            id: NamespaceId::new(*inode),
            pid,
            path,
        })
    }
}

/// Serves canned sockets per namespace inode; inodes without an entry fail
/// as if `setns` had been refused.
#[derive(Default)]
struct FakeScanner {
    sockets: HashMap<u64, Vec<ConnectionRecord>>,
    scanned: Vec<u64>,
}

impl FakeScanner {
    fn with(mut self, inode: u64, records: Vec<ConnectionRecord>) -> Self {
        let _ = self.sockets.insert(inode, records);
        self
    }
}

impl SocketScanner for FakeScanner {
    fn scan(&mut self, handle: &NamespaceHandle) -> Result<NamespaceScan> {
        self.scanned.push(handle.id.inode());
        let records = self
            .sockets
            .get(&handle.id.inode())
            .cloned()
            .ok_or_else(|| NgraphError::Namespace {
                id: handle.id,
                message: "setns: Operation not permitted".into(),
            })?;
        Ok(NamespaceScan {
            records,
            skipped: 0,
        })
    }
}

fn established(local: [u8; 4], port: u16, remote: [u8; 4]) -> ConnectionRecord {
    ConnectionRecord {
        local_address: IpAddr::from(local),
        remote_address: IpAddr::from(remote),
        local_port: port,
        state: TcpState::Established,
    }
}

fn classifier(exclusions: &str) -> Classifier {
    Classifier::new(
        PortRange::new(32768, 60999).expect("valid range"),
        ExclusionList::parse(exclusions),
        false,
        SourceLabel::Socket,
    )
}

fn tuple(src: &str, dst: &str, direction: Direction) -> ConnectionTuple {
    ConnectionTuple {
        source: src.into(),
        destination: dst.into(),
        direction,
    }
}

fn single_namespace_table() -> FakeTable {
    FakeTable {
        procs: vec![(1, 100)],
    }
}

// ── Classification ───────────────────────────────────────────────────

#[test]
fn pass_classifies_by_local_port() {
    let mut scanner = FakeScanner::default().with(
        100,
        vec![
            established([10, 32, 0, 4], 443, [10, 32, 0, 5]),
            established([10, 32, 0, 4], 54321, [10, 32, 0, 6]),
        ],
    );
    let snapshot = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass");

    let counts = snapshot.counts;
    assert_eq!(counts.get(&tuple("10.32.0.4", "10.32.0.5", Direction::Inbound)), 1);
    assert_eq!(counts.get(&tuple("10.32.0.4", "10.32.0.6", Direction::Outbound)), 1);
    assert_eq!(counts.total(), 2);
}

#[test]
fn range_boundaries_are_outbound() {
    let mut scanner = FakeScanner::default().with(
        100,
        vec![
            established([10, 0, 0, 1], 32768, [10, 0, 0, 2]),
            established([10, 0, 0, 1], 60999, [10, 0, 0, 3]),
            established([10, 0, 0, 1], 61000, [10, 0, 0, 4]),
        ],
    );
    let counts = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass")
    .counts;

    assert_eq!(counts.get(&tuple("10.0.0.1", "10.0.0.2", Direction::Outbound)), 1);
    assert_eq!(counts.get(&tuple("10.0.0.1", "10.0.0.3", Direction::Outbound)), 1);
    assert_eq!(counts.get(&tuple("10.0.0.1", "10.0.0.4", Direction::Inbound)), 1);
}

#[test]
fn identical_connections_are_counted_together() {
    let mut scanner = FakeScanner::default().with(
        100,
        vec![
            established([10, 0, 0, 2], 40001, [10, 0, 0, 9]),
            established([10, 0, 0, 2], 40002, [10, 0, 0, 9]),
        ],
    );
    let counts = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass")
    .counts;

    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get(&tuple("10.0.0.2", "10.0.0.9", Direction::Outbound)), 2);
}

// ── Exclusions and public addresses ──────────────────────────────────

#[test]
fn excluded_peer_is_dropped_and_counted() {
    let mut scanner = FakeScanner::default().with(
        100,
        vec![
            established([10, 0, 0, 2], 443, [10, 32, 68, 5]),
            established([10, 0, 0, 2], 443, [10, 0, 0, 9]),
        ],
    );
    let snapshot = run_pass(
        &classifier("10.32.68"),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass");

    assert_eq!(snapshot.stats.records_excluded, 1);
    assert_eq!(snapshot.counts.total(), 1);
    assert!(
        snapshot
            .counts
            .iter()
            .all(|(t, _)| !t.destination.starts_with("10.32.68"))
    );
}

#[test]
fn public_peer_collapses_to_external_ip() {
    let mut scanner =
        FakeScanner::default().with(100, vec![established([10, 0, 0, 2], 51000, [8, 8, 8, 8])]);
    let counts = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass")
    .counts;

    assert_eq!(counts.get(&tuple("10.0.0.2", "external_ip", Direction::Outbound)), 1);
}

// ── Namespaces ───────────────────────────────────────────────────────

#[test]
fn each_namespace_is_scanned_once() {
    let table = FakeTable {
        procs: vec![(1, 100), (2, 100), (50, 200), (51, 200), (52, 200), (60, 300)],
    };
    let mut scanner = FakeScanner::default()
        .with(100, vec![established([10, 0, 0, 1], 443, [10, 0, 0, 2])])
        .with(200, vec![established([10, 1, 0, 1], 443, [10, 0, 0, 2])])
        .with(300, vec![]);
    let snapshot = run_pass(
        &classifier(""),
        true,
        &table,
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass");

    assert_eq!(scanner.scanned, vec![100, 200, 300]);
    assert_eq!(snapshot.stats.namespaces_scanned, 3);
    assert_eq!(snapshot.counts.total(), 2);
}

#[test]
fn restricted_mode_scans_only_init_namespace() {
    let table = FakeTable {
        procs: vec![(1, 100), (50, 200)],
    };
    let mut scanner = FakeScanner::default()
        .with(100, vec![established([10, 0, 0, 1], 443, [10, 0, 0, 2])])
        .with(200, vec![established([10, 1, 0, 1], 443, [10, 0, 0, 2])]);
    run_pass(
        &classifier(""),
        false,
        &table,
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass");

    assert_eq!(scanner.scanned, vec![100]);
}

#[test]
fn failing_namespace_is_skipped() {
    let table = FakeTable {
        procs: vec![(1, 100), (50, 200), (60, 300)],
    };
    // 200 has no canned sockets, so entering it fails.
    let mut scanner = FakeScanner::default()
        .with(100, vec![established([10, 0, 0, 1], 443, [10, 0, 0, 2])])
        .with(300, vec![established([10, 2, 0, 1], 443, [10, 0, 0, 2])]);
    let snapshot = run_pass(
        &classifier(""),
        true,
        &table,
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass");

    assert_eq!(
        snapshot.stats,
        PassStats {
            namespaces_scanned: 2,
            namespaces_skipped: 1,
            records_skipped: 0,
            records_excluded: 0,
        }
    );
    assert_eq!(snapshot.counts.total(), 2);
}

#[test]
fn cancelled_pass_returns_cancelled() {
    let mut scanner =
        FakeScanner::default().with(100, vec![established([10, 0, 0, 1], 443, [10, 0, 0, 2])]);
    let err = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(true),
    )
    .unwrap_err();

    assert!(matches!(err, NgraphError::Cancelled));
    assert!(scanner.scanned.is_empty());
}

#[test]
fn passes_do_not_share_counts() {
    let mut scanner =
        FakeScanner::default().with(100, vec![established([10, 0, 0, 1], 443, [10, 0, 0, 2])]);
    let table = single_namespace_table();
    let c = classifier("");
    let cancel = AtomicBool::new(false);

    let first = run_pass(&c, false, &table, &mut scanner, &cancel).expect("first pass");
    let second = run_pass(&c, false, &table, &mut scanner, &cancel).expect("second pass");

    assert_eq!(first.counts.total(), 1);
    assert_eq!(second.counts.total(), 1);
}

// ── Rendering ────────────────────────────────────────────────────────

#[test]
fn pass_output_renders_both_families() {
    let mut scanner = FakeScanner::default().with(
        100,
        vec![
            established([10, 32, 0, 4], 443, [10, 32, 0, 5]),
            established([10, 32, 0, 4], 54321, [10, 32, 0, 6]),
        ],
    );
    let counts = run_pass(
        &classifier(""),
        false,
        &single_namespace_table(),
        &mut scanner,
        &AtomicBool::new(false),
    )
    .expect("pass")
    .counts;
    let text = render_text(&counts).expect("render");

    let incoming = text
        .lines()
        .find(|l| l.starts_with("network_connections_incoming_total{"))
        .expect("incoming sample");
    assert!(incoming.contains(r#"src_ip="10.32.0.5""#));
    assert!(incoming.contains(r#"dst_ip="10.32.0.4""#));

    let outgoing = text
        .lines()
        .find(|l| l.starts_with("network_connections_outgoing_total{"))
        .expect("outgoing sample");
    assert!(outgoing.contains(r#"src_ip="10.32.0.4""#));
    assert!(outgoing.contains(r#"dst_ip="10.32.0.6""#));
}
