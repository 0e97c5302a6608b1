//! Unified error types for the ngraph workspace.
//!
//! A collection pass aborts on configuration failures (port range, local
//! address, process table) and skips past namespace and address failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::NamespaceId;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NgraphError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The ephemeral port range file has unexpected content.
    #[error("invalid port range in {path}: {message}")]
    PortRange {
        /// File the range was read from.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The host has no non-loopback IPv4 address.
    #[error("local IP not found")]
    LocalAddressNotFound,

    /// The process table could not be listed.
    #[error("process table unavailable: {message}")]
    ProcessTable {
        /// Description of the failure.
        message: String,
    },

    /// Entering or leaving a network namespace failed.
    #[error("network namespace {id}: {message}")]
    Namespace {
        /// Namespace involved in the failed switch.
        id: NamespaceId,
        /// Description of the failure.
        message: String,
    },

    /// A kernel socket table could not be read.
    #[error("socket table {path}: {message}")]
    SocketTable {
        /// Table that failed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// An address could not be decoded.
    #[error("invalid IP address: {address}")]
    AddressParse {
        /// The offending text.
        address: String,
    },

    /// Metric rendering or registration failed.
    #[error("metric rendering failed: {message}")]
    Render {
        /// Description of the failure.
        message: String,
    },

    /// The thread running a collection pass could not be started or died.
    #[error("collection worker failed: {message}")]
    Worker {
        /// Description of the failure.
        message: String,
    },

    /// The pass was cancelled before it completed.
    #[error("collection pass cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NgraphError>;
