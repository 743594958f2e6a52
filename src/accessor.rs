//! Variable lookup by name.
//!
//! A [`VariableHandle`] binds a variable name to a catalog index the first time it
//! is read and caches that index until the source reports a new [`Generation`].
//! Reading through a handle never fails: a variable missing from the current
//! session, or an element past the end of an array, reads as the type's default.
//!
//! ```rust
//! use std::sync::Arc;
//! use irtelemetry::types::{Catalog, FramePacket, Generation, VariableDescriptor, VariableType};
//! use irtelemetry::VariableHandle;
//!
//! let gear = VariableDescriptor {
//!     name: "Gear".to_string(),
//!     var_type: VariableType::Int32,
//!     element_count: 1,
//!     byte_offset: 0,
//!     count_as_time: false,
//!     unit: String::new(),
//!     description: "Current gear".to_string(),
//! };
//! let catalog = Arc::new(Catalog::new(vec![gear], 4)?);
//! let frame = FramePacket::new(3i32.to_le_bytes().to_vec(), 0, 0, 1, Generation::next(), catalog);
//!
//! let mut handle = VariableHandle::new("Gear");
//! assert_eq!(handle.get_i32(&frame, 0), 3);
//! assert_eq!(handle.get_f64(&frame, 0), 3.0);
//! assert_eq!(handle.get_i32(&frame, 1), 0);
//! # Ok::<(), irtelemetry::TelemetryError>(())
//! ```

use tracing::trace;

use crate::types::read_value;
use crate::{Catalog, FramePacket, Generation, Value, VariableDescriptor};

/// Anything that holds one sample described by a catalog.
pub trait TelemetrySource {
    /// Changes whenever the catalog may have changed.
    fn generation(&self) -> Generation;

    fn catalog(&self) -> &Catalog;

    /// Bytes of the current sample.
    fn sample(&self) -> &[u8];
}

impl TelemetrySource for FramePacket {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn sample(&self) -> &[u8] {
        &self.data
    }
}

/// Lazily resolved, generation-checked reference to a variable.
#[derive(Debug, Clone)]
pub struct VariableHandle {
    name: String,
    generation: Option<Generation>,
    index: Option<usize>,
    resolves: usize,
}

impl VariableHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), generation: None, index: None, resolves: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Catalog index for `source`, scanning the catalog only when the source's
    /// generation differs from the one last resolved against.
    pub fn resolve<S: TelemetrySource + ?Sized>(&mut self, source: &S) -> Option<usize> {
        let generation = source.generation();
        if self.generation != Some(generation) {
            self.index = source.catalog().index_of(&self.name);
            self.generation = Some(generation);
            self.resolves += 1;
            trace!(name = %self.name, index = ?self.index, generation = generation.get(), "Resolved variable");
        }
        self.index
    }

    /// Number of catalog scans performed so far.
    pub fn resolve_count(&self) -> usize {
        self.resolves
    }

    /// Whether the variable exists in the source's current catalog.
    pub fn is_valid<S: TelemetrySource + ?Sized>(&mut self, source: &S) -> bool {
        self.resolve(source).is_some()
    }

    pub fn descriptor<'a, S: TelemetrySource + ?Sized>(&mut self, source: &'a S) -> Option<&'a VariableDescriptor> {
        let index = self.resolve(source)?;
        source.catalog().descriptor_at(index)
    }

    pub fn unit<'a, S: TelemetrySource + ?Sized>(&mut self, source: &'a S) -> Option<&'a str> {
        self.descriptor(source).map(|d| d.unit.as_str())
    }

    pub fn description<'a, S: TelemetrySource + ?Sized>(&mut self, source: &'a S) -> Option<&'a str> {
        self.descriptor(source).map(|d| d.description.as_str())
    }

    /// Elements in the variable; 0 when it is not present.
    pub fn element_count<S: TelemetrySource + ?Sized>(&mut self, source: &S) -> usize {
        self.descriptor(source).map_or(0, |d| d.element_count)
    }

    /// Element `entry` decoded with its declared type.
    pub fn value<S: TelemetrySource + ?Sized>(&mut self, source: &S, entry: usize) -> Option<Value> {
        let descriptor = self.descriptor(source)?;
        read_value(source.sample(), descriptor, entry)
    }

    /// `false` when unavailable.
    pub fn get_bool<S: TelemetrySource + ?Sized>(&mut self, source: &S, entry: usize) -> bool {
        self.value(source, entry).is_some_and(|v| v.as_bool())
    }

    /// `0` when unavailable.
    pub fn get_i32<S: TelemetrySource + ?Sized>(&mut self, source: &S, entry: usize) -> i32 {
        self.value(source, entry).map_or(0, |v| v.as_i32())
    }

    /// `0.0` when unavailable.
    pub fn get_f32<S: TelemetrySource + ?Sized>(&mut self, source: &S, entry: usize) -> f32 {
        self.value(source, entry).map_or(0.0, |v| v.as_f32())
    }

    /// `0.0` when unavailable.
    pub fn get_f64<S: TelemetrySource + ?Sized>(&mut self, source: &S, entry: usize) -> f64 {
        self.value(source, entry).map_or(0.0, |v| v.as_f64())
    }
}
