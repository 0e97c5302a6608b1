//! System-wide constants and default paths.

use std::net::Ipv4Addr;

/// Kernel file holding the ephemeral local port range.
pub const IP_LOCAL_PORT_RANGE_FILE: &str = "/proc/sys/net/ipv4/ip_local_port_range";

/// Mount point of the process filesystem.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Network namespace of the calling thread, as seen through procfs.
pub const THREAD_SELF_NETNS: &str = "/proc/thread-self/ns/net";

/// IPv4 TCP socket table of the calling thread's network namespace.
pub const THREAD_SELF_TCP: &str = "/proc/thread-self/net/tcp";

/// IPv6 TCP socket table of the calling thread's network namespace.
pub const THREAD_SELF_TCP6: &str = "/proc/thread-self/net/tcp6";

/// PID of the init process whose namespace is the host's primary one.
pub const INIT_PID: i32 = 1;

/// Placeholder reported instead of a public peer address.
pub const EXTERNAL_IP: &str = "external_ip";

/// IPv4 ranges (network, prefix length) considered private when collapsing
/// public peers: loopback, RFC 1918, carrier-grade NAT, and link-local.
pub const PRIVATE_IPV4_RANGES: &[(Ipv4Addr, u8)] = &[
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
];

/// Metric family for connections accepted by this host.
pub const INCOMING_METRIC_NAME: &str = "network_connections_incoming_total";

/// Metric family for connections initiated by this host.
pub const OUTGOING_METRIC_NAME: &str = "network_connections_outgoing_total";

/// Default HTTP listen address for the exporter.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9234";

/// Default HTTP path serving metrics.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default directory for the text-file output.
pub const DEFAULT_TEXTFILE_DIR: &str = "/var/lib/ngraph";

/// Name of the text-file written by the text-file output.
pub const TEXTFILE_NAME: &str = "ngraph.prom";

/// Default interval between text-file collection passes, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 15;

/// Name given to the OS thread that performs namespace switching.
pub const SCAN_THREAD_NAME: &str = "ngraph-netns";
