//! Ephemeral port range reader.
//!
//! The kernel exposes the range as two whitespace-separated integers,
//! e.g. `32768	60999`.

use std::path::Path;

use ngraph_common::error::{NgraphError, Result};
use ngraph_common::types::PortRange;

/// Reads the ephemeral port range from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold two
/// valid ports with `min <= max`.
pub fn read_port_range(path: &Path) -> Result<PortRange> {
    let content = std::fs::read_to_string(path).map_err(|e| NgraphError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let range = parse_port_range(&content, path)?;
    tracing::debug!(path = %path.display(), range = %range, "read ephemeral port range");
    Ok(range)
}

/// Parses port range file content; `path` is only used for error context.
///
/// # Errors
///
/// Returns an error if fewer than two fields are present, a field is not a
/// port number, or the bounds are inverted.
pub fn parse_port_range(content: &str, path: &Path) -> Result<PortRange> {
    let invalid = |message: String| NgraphError::PortRange {
        path: path.to_path_buf(),
        message,
    };

    let mut fields = content.split_whitespace();
    let (Some(min), Some(max)) = (fields.next(), fields.next()) else {
        return Err(invalid(format!("expected two ports, got {:?}", content.trim())));
    };
    let min: u16 = min
        .parse()
        .map_err(|e| invalid(format!("lower bound {min:?}: {e}")))?;
    let max: u16 = max
        .parse()
        .map_err(|e| invalid(format!("upper bound {max:?}: {e}")))?;

    PortRange::new(min, max).ok_or_else(|| invalid(format!("lower bound {min} exceeds upper bound {max}")))
}
