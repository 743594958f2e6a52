//! Fixed-length byte buffer holding one sample of every variable.

use super::{Value, VariableDescriptor};

/// One frame of raw telemetry, addressed through catalog offsets.
///
/// The length is fixed when the owning channel opens. Live channels overwrite it in
/// place on every fresh frame; disk channels overwrite it on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
}

impl SampleBuffer {
    /// Zero-filled buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Resize to `len` bytes and zero the contents.
    pub(crate) fn reset(&mut self, len: usize) {
        self.bytes.clear();
        self.bytes.resize(len, 0);
    }

    /// Bytes of element `entry` of `descriptor`, bounds-checked against both the
    /// element count and the buffer length.
    pub fn element(&self, descriptor: &VariableDescriptor, entry: usize) -> Option<&[u8]> {
        let range = descriptor.element_range(entry)?;
        self.bytes.get(range)
    }

    /// Decode element `entry` of `descriptor`.
    pub fn value(&self, descriptor: &VariableDescriptor, entry: usize) -> Option<Value> {
        read_value(&self.bytes, descriptor, entry)
    }
}

impl From<Vec<u8>> for SampleBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// Decode element `entry` of `descriptor` from an arbitrary sample slice.
pub(crate) fn read_value(data: &[u8], descriptor: &VariableDescriptor, entry: usize) -> Option<Value> {
    let range = descriptor.element_range(entry)?;
    Value::decode(descriptor.var_type, data.get(range)?)
}
