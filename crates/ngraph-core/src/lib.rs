//! # ngraph-core
//!
//! Low-level Linux primitives behind an ngraph collection pass.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: discovering distinct network namespaces from the
//!   process table and entering them with `setns(2)` for a bounded scope.
//! - **Socket tables**: reading established TCP sockets from the calling
//!   thread's `/proc/thread-self/net/tcp{,6}`.
//! - **Host facts**: the ephemeral port range and the primary IPv4 address.
//!
//! Every operation that touches the active namespace is thread-scoped; see
//! [`namespace::session`] for the restore guarantees.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod local_ip;
pub mod namespace;
pub mod port_range;
pub mod socket;
