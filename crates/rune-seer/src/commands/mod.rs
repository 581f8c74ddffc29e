//! Command implementations.

use anyhow::Context;
use camino::Utf8Path;

pub mod analyze;
pub mod details;
pub mod info;
pub mod serve;

/// Read a file as raw bytes and validate its size against the configured limit.
///
/// Bytes are returned undecoded so malformed UTF-8 can be reported rather
/// than rejected.
pub fn read_input_file(path: &Utf8Path, max_bytes: Option<usize>) -> anyhow::Result<Vec<u8>> {
    // Preflight: check file size via metadata before reading into memory.
    let metadata =
        std::fs::metadata(path.as_std_path()).with_context(|| format!("failed to read {path}"))?;
    if let Some(max) = max_bytes {
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > max {
            anyhow::bail!("input too large: {path} is {size} bytes (limit: {max} bytes)");
        }
    }

    std::fs::read(path.as_std_path()).with_context(|| format!("failed to read {path}"))
}

/// Reject inline input over the configured limit.
pub fn check_input_len(len: usize, max_bytes: Option<usize>) -> anyhow::Result<()> {
    if let Some(max) = max_bytes
        && len > max
    {
        anyhow::bail!("input too large: {len} bytes (limit: {max} bytes)");
    }
    Ok(())
}
