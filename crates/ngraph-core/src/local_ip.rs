//! Host address resolution.

use std::net::Ipv4Addr;

use ngraph_common::error::{NgraphError, Result};

/// Returns the first non-loopback IPv4 address configured on the host.
///
/// Must be called from the host network namespace; inside another
/// namespace it would report that namespace's interfaces.
///
/// # Errors
///
/// Returns an error if interfaces cannot be listed or none carries a
/// usable IPv4 address.
pub fn local_ipv4() -> Result<Ipv4Addr> {
    let addrs = nix::ifaddrs::getifaddrs().map_err(|e| NgraphError::Io {
        path: "getifaddrs".into(),
        source: e.into(),
    })?;
    let candidates = addrs.filter_map(|ifaddr| {
        ifaddr
            .address
            .as_ref()
            .and_then(|addr| addr.as_sockaddr_in())
            .map(nix::sys::socket::SockaddrIn::ip)
    });
    let ip = first_routable_ipv4(candidates).ok_or(NgraphError::LocalAddressNotFound)?;
    tracing::debug!(%ip, "resolved local address");
    Ok(ip)
}

/// Picks the first address that is neither loopback nor unspecified.
#[must_use]
pub fn first_routable_ipv4(candidates: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    candidates
        .into_iter()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}
