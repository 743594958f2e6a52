//! Variable record decoding.
//!
//! Each variable is described by a 144-byte record:
//!
//! ```text
//! offset  size  field
//!      0     4  type          0 char, 1 bool, 2 int, 3 bitfield, 4 float, 5 double
//!      4     4  offset        byte offset inside a sample
//!      8     4  count         number of elements
//!     12     1  countAsTime
//!     16    32  name          NUL-terminated
//!     48    64  desc          NUL-terminated
//!    112    32  unit          NUL-terminated
//! ```

use tracing::{debug, trace};

use super::{c_string, read_i32_le};
use crate::{Catalog, Result, TelemetryError, VariableDescriptor, VariableType};

/// Size of one variable record in bytes
pub const VAR_HEADER_SIZE: usize = 144;

const NAME_RANGE: std::ops::Range<usize> = 16..48;
const DESC_RANGE: std::ops::Range<usize> = 48..112;
const UNIT_RANGE: std::ops::Range<usize> = 112..144;

/// Decode `count` consecutive variable records into a catalog addressing samples of
/// `buffer_len` bytes.
///
/// Fails with `Truncated` when `bytes` is shorter than `count` records and with
/// `Malformed` when a record's type is unknown or its elements fall outside the sample.
pub fn parse_catalog(bytes: &[u8], count: usize, buffer_len: usize) -> Result<Catalog> {
    let needed = count
        .checked_mul(VAR_HEADER_SIZE)
        .ok_or_else(|| TelemetryError::malformed("variable table", "record count overflows"))?;
    if bytes.len() < needed {
        return Err(TelemetryError::truncated("variable table", needed, bytes.len()));
    }

    let descriptors = bytes[..needed]
        .chunks_exact(VAR_HEADER_SIZE)
        .enumerate()
        .map(|(index, record)| decode_record(index, record))
        .collect::<Result<Vec<_>>>()?;

    debug!(variables = descriptors.len(), buffer_len, "Decoded variable table");
    Catalog::new(descriptors, buffer_len)
}

fn decode_record(index: usize, record: &[u8]) -> Result<VariableDescriptor> {
    let context = "variable record";
    let code = read_i32_le(record, 0, context)?;
    let offset = read_i32_le(record, 4, context)?;
    let count = read_i32_le(record, 8, context)?;
    let name = c_string(&record[NAME_RANGE]);

    trace!(index, name = %name, code, offset, count, "Decoding variable record");

    let var_type = VariableType::from_code(code).ok_or_else(|| {
        TelemetryError::malformed(context, format!("variable '{name}' has unknown type {code}"))
    })?;
    let byte_offset = usize::try_from(offset).map_err(|_| {
        TelemetryError::malformed(context, format!("variable '{name}' has offset {offset}"))
    })?;
    let element_count = usize::try_from(count).ok().filter(|c| *c >= 1).ok_or_else(|| {
        TelemetryError::malformed(context, format!("variable '{name}' has count {count}"))
    })?;

    Ok(VariableDescriptor {
        name,
        var_type,
        element_count,
        byte_offset,
        count_as_time: record[12] != 0,
        unit: c_string(&record[UNIT_RANGE]),
        description: c_string(&record[DESC_RANGE]),
    })
}
