//! Established TCP sockets of a network namespace.
//!
//! Reads the kernel's `tcp` and `tcp6` tables through
//! `/proc/thread-self/net`, which reflects the namespace of the calling
//! thread rather than the process leader's.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

use ngraph_common::constants::{THREAD_SELF_TCP, THREAD_SELF_TCP6};
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{ConnectionRecord, NamespaceHandle, TcpState};

use crate::namespace::session::NamespaceSession;

/// Established connections found in one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScan {
    /// Established sockets, IPv4 first, then IPv6.
    pub records: Vec<ConnectionRecord>,
    /// Table rows dropped because they could not be decoded.
    pub skipped: usize,
}

/// Source of established TCP sockets per namespace.
pub trait SocketScanner {
    /// Lists the established TCP sockets visible inside `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be entered or a socket
    /// table cannot be read. Undecodable rows are counted, not returned
    /// as errors.
    fn scan(&mut self, handle: &NamespaceHandle) -> Result<NamespaceScan>;
}

/// Scanner that enters each namespace with `setns(2)`.
///
/// Must run on a thread that is not shared with unrelated work: between
/// [`NamespaceSession::enter`] and its drop, every file the thread opens
/// resolves network state in the scanned namespace.
#[derive(Debug, Clone)]
pub struct NetnsSocketScanner {
    tcp: PathBuf,
    tcp6: PathBuf,
}

impl NetnsSocketScanner {
    /// Creates a scanner reading the calling thread's socket tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tcp: PathBuf::from(THREAD_SELF_TCP),
            tcp6: PathBuf::from(THREAD_SELF_TCP6),
        }
    }
}

impl Default for NetnsSocketScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketScanner for NetnsSocketScanner {
    fn scan(&mut self, handle: &NamespaceHandle) -> Result<NamespaceScan> {
        let session = NamespaceSession::enter(handle)?;

        let mut scan = NamespaceScan::default();
        read_established(&self.tcp, &mut scan)?;
        read_established(&self.tcp6, &mut scan)?;

        session.leave()?;
        tracing::debug!(
            ns = %handle.id,
            pid = handle.pid,
            established = scan.records.len(),
            skipped = scan.skipped,
            "scanned namespace"
        );
        Ok(scan)
    }
}

/// Appends the established rows of the table at `path` to `scan`.
///
/// # Errors
///
/// Returns an error if the table cannot be read.
pub fn read_established(path: &Path, scan: &mut NamespaceScan) -> Result<()> {
    let content = std::fs::read_to_string(path).map_err(|e| NgraphError::SocketTable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_table(&content, scan);
    Ok(())
}

/// Parses a whole `/proc/net/tcp`-format table, header included.
pub fn parse_table(content: &str, scan: &mut NamespaceScan) {
    for line in content.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(Some(record)) => scan.records.push(record),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "skipping socket row");
                scan.skipped += 1;
            }
        }
    }
}

/// Parses one table row, returning `None` for sockets that are not
/// established.
///
/// # Errors
///
/// Returns an address error if an established row has a malformed
/// address, port, or state column.
pub fn parse_line(line: &str) -> Result<Option<ConnectionRecord>> {
    let malformed = || NgraphError::AddressParse {
        address: line.trim().to_owned(),
    };

    // sl local_address rem_address st ...
    let mut fields = line.split_whitespace().skip(1);
    let (Some(local), Some(remote), Some(state)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };

    let state = u8::from_str_radix(state, 16).map_err(|_| malformed())?;
    let state = TcpState::from_code(state);
    if state != TcpState::Established {
        return Ok(None);
    }

    let (local_address, local_port) = parse_endpoint(local)?;
    let (remote_address, _) = parse_endpoint(remote)?;
    Ok(Some(ConnectionRecord {
        local_address,
        remote_address,
        local_port,
        state,
    }))
}

/// Decodes a `HEXADDR:HEXPORT` endpoint.
///
/// The kernel prints each 32-bit word of the address in host byte order.
/// IPv4-mapped IPv6 addresses are returned as IPv4.
///
/// # Errors
///
/// Returns an address error on anything but 8 or 32 hex digits followed by
/// a hex port.
pub fn parse_endpoint(endpoint: &str) -> Result<(IpAddr, u16)> {
    let malformed = || NgraphError::AddressParse {
        address: endpoint.to_owned(),
    };
    let (addr, port) = endpoint.split_once(':').ok_or_else(malformed)?;
    let port = u16::from_str_radix(port, 16).map_err(|_| malformed())?;

    let ip = match addr.len() {
        8 => {
            let word = u32::from_str_radix(addr, 16).map_err(|_| malformed())?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let hex = addr.get(i * 8..i * 8 + 8).ok_or_else(malformed)?;
                let word = u32::from_str_radix(hex, 16).map_err(|_| malformed())?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            let v6 = Ipv6Addr::from(octets);
            v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4)
        }
        _ => return Err(malformed()),
    };
    Ok((ip, port))
}
