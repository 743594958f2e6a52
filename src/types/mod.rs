//! Core types for telemetry data representation.
//!
//! ## Architecture
//!
//! - [`VariableType`] maps the simulator's type codes to element sizes
//! - [`VariableDescriptor`] and [`Catalog`] describe where each variable lives
//! - [`SampleBuffer`] holds one frame of raw bytes addressed by the catalog
//! - [`Value`] is one decoded element, with the numeric coercions used by accessors
//! - [`FramePacket`] is an owned, shareable sample for the async feeds
//! - [`Generation`] tags every channel open so cached lookups can be invalidated
//!
//! ## Usage Example
//!
//! ```rust
//! use irtelemetry::types::{Catalog, SampleBuffer, Value, VariableDescriptor, VariableType};
//!
//! let rpm = VariableDescriptor {
//!     name: "RPM".to_string(),
//!     var_type: VariableType::Float32,
//!     element_count: 1,
//!     byte_offset: 0,
//!     count_as_time: false,
//!     unit: "revs/min".to_string(),
//!     description: "Engine rpm".to_string(),
//! };
//! let catalog = Catalog::new(vec![rpm], 4).unwrap();
//!
//! let sample = SampleBuffer::from(4500.0f32.to_le_bytes().to_vec());
//! let descriptor = catalog.descriptor_at(catalog.index_of("RPM").unwrap()).unwrap();
//! assert_eq!(sample.value(descriptor, 0), Some(Value::Float32(4500.0)));
//! assert_eq!(sample.value(descriptor, 1), None);
//! ```

mod catalog;
mod frame;
mod sample;
mod variable_type;

pub use catalog::{Catalog, VariableDescriptor};
pub use frame::{FramePacket, Generation};
pub(crate) use sample::read_value;
pub use sample::SampleBuffer;
pub use variable_type::{Value, VariableType};
