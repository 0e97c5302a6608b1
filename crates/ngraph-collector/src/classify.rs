//! Connection direction, exclusion, and address labelling.

use std::net::{IpAddr, Ipv4Addr};

use ngraph_common::config::{CollectorConfig, SourceAddress};
use ngraph_common::constants::{EXTERNAL_IP, PRIVATE_IPV4_RANGES};
use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::{ConnectionRecord, ConnectionTuple, Direction, ExclusionList, PortRange};

/// How the source label of a tuple is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLabel {
    /// Every tuple carries this host address.
    Fixed(Ipv4Addr),
    /// Every tuple carries its socket's local address.
    Socket,
}

/// Maps raw socket records to aggregation tuples.
#[derive(Debug, Clone)]
pub struct Classifier {
    range: PortRange,
    exclusions: ExclusionList,
    allow_public_ip: bool,
    source: SourceLabel,
}

impl Classifier {
    /// Creates a classifier from its parts.
    #[must_use]
    pub const fn new(
        range: PortRange,
        exclusions: ExclusionList,
        allow_public_ip: bool,
        source: SourceLabel,
    ) -> Self {
        Self {
            range,
            exclusions,
            allow_public_ip,
            source,
        }
    }

    /// Builds a classifier for one pass.
    ///
    /// `host_ip` is required when the configuration reports the host
    /// address as source.
    ///
    /// # Errors
    ///
    /// Returns an error if the host address is required but missing.
    pub fn from_config(
        config: &CollectorConfig,
        range: PortRange,
        host_ip: Option<Ipv4Addr>,
    ) -> Result<Self> {
        let source = match (config.source_address, host_ip) {
            (SourceAddress::Host, Some(ip)) => SourceLabel::Fixed(ip),
            (SourceAddress::Host, None) => return Err(NgraphError::LocalAddressNotFound),
            (SourceAddress::Socket, _) => SourceLabel::Socket,
        };
        Ok(Self::new(
            range,
            config.exclusions.clone(),
            config.allow_public_ip,
            source,
        ))
    }

    /// Ephemeral range used for direction.
    #[must_use]
    pub const fn port_range(&self) -> PortRange {
        self.range
    }

    /// Classifies `record`, returning `None` if either address is excluded.
    #[must_use]
    pub fn classify(&self, record: &ConnectionRecord) -> Option<ConnectionTuple> {
        let local = record.local_address.to_string();
        let remote = record.remote_address.to_string();
        if self.exclusions.excludes(&local) || self.exclusions.excludes(&remote) {
            return None;
        }

        let source = match self.source {
            SourceLabel::Fixed(ip) => ip.to_string(),
            SourceLabel::Socket => local,
        };
        let destination = if self.allow_public_ip || is_private(record.remote_address) {
            remote
        } else {
            EXTERNAL_IP.to_owned()
        };

        Some(ConnectionTuple {
            source,
            destination,
            direction: Direction::from_local_port(record.local_port, &self.range),
        })
    }
}

/// Returns `true` if `ip` falls in a loopback, private, carrier-grade NAT,
/// or link-local IPv4 range. IPv6 addresses are never private here.
#[must_use]
pub fn is_private(ip: IpAddr) -> bool {
    let IpAddr::V4(v4) = ip else {
        return false;
    };
    let addr = u32::from(v4);
    PRIVATE_IPV4_RANGES.iter().any(|&(network, prefix)| {
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        addr & mask == u32::from(network) & mask
    })
}
