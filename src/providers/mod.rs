//! [`Provider`](crate::provider::Provider) implementations.
//!
//! - [`DiskPlayback`] replays a recording, paced by its `SessionTime`
//! - [`LiveFeed`] follows the simulator through a [`LiveChannel`](crate::live::LiveChannel)

pub mod disk;
pub mod live;

pub use disk::DiskPlayback;
pub use live::LiveFeed;
