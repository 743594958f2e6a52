//! Binary layout shared by the live mapping and disk recordings.
//!
//! Both channels start with the same primary header and describe their variables
//! with the same fixed-size records:
//!
//! - [`header`] decodes the primary header and its rotating buffer descriptors
//! - [`variables`] decodes variable records into a [`Catalog`](crate::Catalog)
//!
//! All multi-byte fields are little-endian. Decoding never trusts a length or
//! offset before checking it against the bytes actually available.

pub mod header;
pub mod variables;

pub use header::{MAX_BUFS, STATUS_CONNECTED, SDK_VERSION, TelemetryHeader, VarBuf};
pub use variables::{VAR_HEADER_SIZE, parse_catalog};

use crate::{Result, TelemetryError};

pub(crate) fn read_i32_le(data: &[u8], offset: usize, context: &str) -> Result<i32> {
    let bytes = field(data, offset, 4, context)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_i64_le(data: &[u8], offset: usize, context: &str) -> Result<i64> {
    let bytes = field(data, offset, 8, context)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(raw))
}

pub(crate) fn read_f64_le(data: &[u8], offset: usize, context: &str) -> Result<f64> {
    let bytes = field(data, offset, 8, context)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(raw))
}

fn field<'a>(data: &'a [u8], offset: usize, len: usize, context: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| TelemetryError::truncated(context, offset.saturating_add(len), data.len()))
}

/// Decode a NUL-terminated fixed-width string field.
pub(crate) fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Convert a header field that must be non-negative.
pub(crate) fn non_negative(value: i32, context: &str, field: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| TelemetryError::malformed(context, format!("{field} is negative ({value})")))
}
