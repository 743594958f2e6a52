//! Variable catalog: the ordered table of variable descriptors for one channel session.

use serde::{Deserialize, Serialize};

use super::VariableType;
use crate::{Result, TelemetryError};

/// Metadata for one named telemetry variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Variable name as published by the simulator
    pub name: String,
    /// Declared element type
    pub var_type: VariableType,
    /// Number of elements (1 for scalars)
    pub element_count: usize,
    /// Byte offset of element 0 within a sample
    pub byte_offset: usize,
    /// Whether the elements form a time series
    pub count_as_time: bool,
    /// Units of measurement (e.g. "m/s")
    pub unit: String,
    /// Human-readable description
    pub description: String,
}

impl VariableDescriptor {
    /// Total bytes occupied by all elements.
    pub fn byte_len(&self) -> usize {
        self.var_type.size().saturating_mul(self.element_count)
    }

    /// Byte range of element `entry`, or `None` when `entry` is out of range.
    pub fn element_range(&self, entry: usize) -> Option<std::ops::Range<usize>> {
        if entry >= self.element_count {
            return None;
        }
        let size = self.var_type.size();
        let start = self.byte_offset + entry * size;
        Some(start..start + size)
    }
}

/// Parsed table of variable descriptors plus the sample length they address.
///
/// Descriptors keep their on-the-wire order. Lookups by name scan linearly and the
/// first match wins, so a catalog with duplicated names behaves like the simulator's
/// own lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    descriptors: Vec<VariableDescriptor>,
    buffer_len: usize,
}

impl Catalog {
    /// Build a catalog, checking every descriptor fits inside `buffer_len`.
    pub fn new(descriptors: Vec<VariableDescriptor>, buffer_len: usize) -> Result<Self> {
        for descriptor in &descriptors {
            if descriptor.element_count == 0 {
                return Err(TelemetryError::malformed(
                    "variable catalog",
                    format!("variable '{}' has no elements", descriptor.name),
                ));
            }
            let end = descriptor.byte_offset.checked_add(descriptor.byte_len());
            if end.is_none_or(|end| end > buffer_len) {
                return Err(TelemetryError::malformed(
                    "variable catalog",
                    format!(
                        "variable '{}' at offset {} with {} x {} bytes exceeds sample length {}",
                        descriptor.name,
                        descriptor.byte_offset,
                        descriptor.element_count,
                        descriptor.var_type.size(),
                        buffer_len
                    ),
                ));
            }
        }
        Ok(Self { descriptors, buffer_len })
    }

    /// Index of the first descriptor named `name` (case-sensitive).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.descriptors.iter().position(|d| d.name == name)
    }

    /// Descriptor at `index`, `None` past the end.
    pub fn descriptor_at(&self, index: usize) -> Option<&VariableDescriptor> {
        self.descriptors.get(index)
    }

    /// Descriptor of the first variable named `name`.
    pub fn descriptor(&self, name: &str) -> Option<&VariableDescriptor> {
        self.index_of(name).map(|index| &self.descriptors[index])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Sample length in bytes addressed by this catalog.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.descriptors.iter()
    }
}
