//! Configuration models for the collector and its outputs.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{NgraphError, Result};
use crate::types::ExclusionList;

/// Which address is reported as the source of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceAddress {
    /// The host's primary non-loopback IPv4 address, for every socket.
    #[default]
    Host,
    /// The literal local address of each socket.
    Socket,
}

/// Settings for a collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Scan every network namespace instead of only the init process's.
    pub all_namespaces: bool,
    /// Address prefixes whose connections are dropped.
    pub exclusions: ExclusionList,
    /// Report public peer addresses verbatim instead of `external_ip`.
    pub allow_public_ip: bool,
    /// Source label policy.
    pub source_address: SourceAddress,
    /// File holding the ephemeral port range.
    pub port_range_path: PathBuf,
    /// Mount point of procfs.
    pub proc_root: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            all_namespaces: false,
            exclusions: ExclusionList::default(),
            allow_public_ip: false,
            source_address: SourceAddress::default(),
            port_range_path: PathBuf::from(constants::IP_LOCAL_PORT_RANGE_FILE),
            proc_root: PathBuf::from(constants::DEFAULT_PROC_ROOT),
        }
    }
}

/// Settings for the HTTP exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Address the HTTP server binds to.
    pub listen_address: SocketAddr,
    /// Path serving the metrics.
    pub metrics_path: String,
}

impl ExporterConfig {
    /// Creates an exporter configuration, validating the metrics path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not start with `/` or is the root
    /// path, which is reserved for the landing page.
    pub fn new(listen_address: SocketAddr, metrics_path: impl Into<String>) -> Result<Self> {
        let metrics_path = metrics_path.into();
        if !metrics_path.starts_with('/') || metrics_path == "/" {
            return Err(NgraphError::Config {
                message: format!("metrics path must be a non-root absolute path, got {metrics_path:?}"),
            });
        }
        Ok(Self {
            listen_address,
            metrics_path,
        })
    }
}

/// Settings for the periodic text-file output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextfileConfig {
    /// Directory receiving the metrics file.
    pub output_dir: PathBuf,
    /// Delay between passes.
    pub interval: Duration,
}

impl TextfileConfig {
    /// Creates a text-file configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero.
    pub fn new(output_dir: impl Into<PathBuf>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(NgraphError::Config {
                message: "text-file interval must be greater than zero".into(),
            });
        }
        Ok(Self {
            output_dir: output_dir.into(),
            interval,
        })
    }

    /// Full path of the metrics file.
    #[must_use]
    pub fn output_file(&self) -> PathBuf {
        self.output_dir.join(constants::TEXTFILE_NAME)
    }
}

impl Default for TextfileConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(constants::DEFAULT_TEXTFILE_DIR),
            interval: Duration::from_secs(constants::DEFAULT_INTERVAL_SECS),
        }
    }
}
