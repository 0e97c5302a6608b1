//! # ngraph-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire ngraph workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the value types that flow through a
//! collection pass, from the raw socket record to the aggregated counts.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
