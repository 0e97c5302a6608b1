//! Domain primitive types used across the ngraph workspace.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The host's ephemeral local port interval, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Creates a range, returning `None` when `min > max`.
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Option<Self> {
        if min > max {
            return None;
        }
        Some(Self { min, max })
    }

    /// Lower bound of the range.
    #[must_use]
    pub const fn min(&self) -> u16 {
        self.min
    }

    /// Upper bound of the range.
    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }

    /// Returns `true` if `port` lies within the range, bounds included.
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Kernel-assigned identity of a network namespace (the inode of its
/// `/proc/<pid>/ns/net` link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(u64);

impl NamespaceId {
    /// Wraps a raw namespace inode.
    #[must_use]
    pub const fn new(inode: u64) -> Self {
        Self(inode)
    }

    /// Returns the raw inode number.
    #[must_use]
    pub const fn inode(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net:[{}]", self.0)
    }
}

/// A distinct network namespace together with one process living in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceHandle {
    /// Namespace identity.
    pub id: NamespaceId,
    /// Representative process owning the namespace.
    pub pid: i32,
    /// Path of the namespace file used to enter it.
    pub path: PathBuf,
}

/// Which side opened a connection, inferred from the local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The peer connected to this host.
    Inbound,
    /// This host connected to the peer.
    Outbound,
}

impl Direction {
    /// Classifies a local port against the ephemeral range.
    ///
    /// Ephemeral ports are handed to the connecting side, so a local port
    /// inside the range means this host initiated the connection.
    #[must_use]
    pub const fn from_local_port(port: u16, range: &PortRange) -> Self {
        if range.contains(port) {
            Self::Outbound
        } else {
            Self::Inbound
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// TCP socket state as encoded in the kernel's socket tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpState {
    /// Connected and able to transfer data.
    Established,
    /// Active open in progress.
    SynSent,
    /// Passive open in progress.
    SynRecv,
    /// Local close, waiting for the peer's ack.
    FinWait1,
    /// Local close acknowledged, waiting for the peer's FIN.
    FinWait2,
    /// Waiting for stray segments to drain.
    TimeWait,
    /// Closed.
    Close,
    /// Peer closed, waiting for the local close.
    CloseWait,
    /// Waiting for the final ack.
    LastAck,
    /// Accepting connections.
    Listen,
    /// Both sides closing simultaneously.
    Closing,
    /// A state code this crate does not know.
    Unknown(u8),
}

impl TcpState {
    /// Decodes the numeric state used by `/proc/net/tcp`.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Established,
            0x02 => Self::SynSent,
            0x03 => Self::SynRecv,
            0x04 => Self::FinWait1,
            0x05 => Self::FinWait2,
            0x06 => Self::TimeWait,
            0x07 => Self::Close,
            0x08 => Self::CloseWait,
            0x09 => Self::LastAck,
            0x0A => Self::Listen,
            0x0B => Self::Closing,
            other => Self::Unknown(other),
        }
    }
}

/// One row of a kernel socket table snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Local socket address.
    pub local_address: IpAddr,
    /// Remote socket address.
    pub remote_address: IpAddr,
    /// Local socket port.
    pub local_port: u16,
    /// Socket state.
    pub state: TcpState,
}

impl ConnectionRecord {
    /// Returns `true` when the socket is in the established state.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state == TcpState::Established
    }
}

/// The unit of aggregation: a (source, destination, direction) triple.
///
/// `source` is the local end of the socket as reported by the collector and
/// `destination` the peer end. Renderers orient the labels by `direction`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionTuple {
    /// Local address label.
    pub source: String,
    /// Peer address label, possibly the external placeholder.
    pub destination: String,
    /// Connection direction.
    pub direction: Direction,
}

/// A single address-prefix exclusion.
///
/// Matching is textual, not CIDR-aware: `10.3` excludes both `10.3.0.1`
/// and `10.32.68.5`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionRule(String);

impl ExclusionRule {
    /// Creates a rule from user input, trimming surrounding whitespace.
    #[must_use]
    pub fn new(pattern: impl AsRef<str>) -> Self {
        Self(pattern.as_ref().trim().to_owned())
    }

    /// Returns the prefix this rule matches.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty rules are placeholders and never match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `address` starts with this rule.
    #[must_use]
    pub fn matches(&self, address: &str) -> bool {
        !self.is_empty() && address.starts_with(&self.0)
    }
}

/// Ordered list of exclusion rules; an address is excluded if any rule
/// matches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList(Vec<ExclusionRule>);

impl ExclusionList {
    /// Parses a comma-separated list such as `10.32,192.168`.
    ///
    /// Empty segments (from `""`, `"10.32,"` or `",10.32"`) are kept as
    /// inert rules.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self(input.split(',').map(ExclusionRule::new).collect())
    }

    /// Builds a list from already separated patterns.
    #[must_use]
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(patterns.into_iter().map(ExclusionRule::new).collect())
    }

    /// Returns `true` if any non-empty rule is a prefix of `address`.
    #[must_use]
    pub fn excludes(&self, address: &str) -> bool {
        self.0.iter().any(|rule| rule.matches(address))
    }

    /// Iterates over the rules that can match something.
    pub fn effective_rules(&self) -> impl Iterator<Item = &ExclusionRule> {
        self.0.iter().filter(|rule| !rule.is_empty())
    }
}

impl FromStr for ExclusionList {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Occurrence count of each distinct tuple seen during one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    counts: HashMap<ConnectionTuple, u64>,
}

impl AggregateCounts {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `tuple`.
    pub fn increment(&mut self, tuple: ConnectionTuple) {
        *self.counts.entry(tuple).or_insert(0) += 1;
    }

    /// Returns the count for `tuple`, zero if never seen.
    #[must_use]
    pub fn get(&self, tuple: &ConnectionTuple) -> u64 {
        self.counts.get(tuple).copied().unwrap_or(0)
    }

    /// Number of distinct tuples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` when nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterates over tuples and counts in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionTuple, u64)> {
        self.counts.iter().map(|(tuple, count)| (tuple, *count))
    }

    /// Returns the entries sorted by tuple, for deterministic output.
    #[must_use]
    pub fn sorted(&self) -> Vec<TupleCount> {
        let mut entries: Vec<TupleCount> = self
            .counts
            .iter()
            .map(|(tuple, count)| TupleCount {
                tuple: tuple.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| a.tuple.cmp(&b.tuple));
        entries
    }
}

impl Extend<ConnectionTuple> for AggregateCounts {
    fn extend<T: IntoIterator<Item = ConnectionTuple>>(&mut self, iter: T) {
        for tuple in iter {
            self.increment(tuple);
        }
    }
}

impl FromIterator<ConnectionTuple> for AggregateCounts {
    fn from_iter<T: IntoIterator<Item = ConnectionTuple>>(iter: T) -> Self {
        let mut counts = Self::new();
        counts.extend(iter);
        counts
    }
}

/// A tuple paired with its count, as exported in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleCount {
    /// The aggregated tuple.
    #[serde(flatten)]
    pub tuple: ConnectionTuple,
    /// Number of established connections matching it.
    pub count: u64,
}
