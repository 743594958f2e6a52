//! Frame packets and channel generations

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Catalog;

/// Token identifying one connection or file-open of a channel.
///
/// A fresh generation is issued every time a channel attaches to the simulator or
/// opens a file, so handles resolved against an older catalog can tell they are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

impl Generation {
    /// Generation of a channel that has never been opened.
    pub const NONE: Generation = Generation(0);

    /// Issue a process-unique generation.
    pub fn next() -> Self {
        Generation(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Owned snapshot of one sample, published by the async feeds.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Sample bytes (shared, never mutated)
    pub data: Arc<[u8]>,

    /// Sample index for disk sources, running frame count for live sources
    pub index: usize,

    /// Simulator tick of this sample
    pub tick: i32,

    /// Session-info update counter at the time of the sample
    pub session_version: i32,

    /// Generation of the channel that produced the sample
    pub generation: Generation,

    /// Catalog describing `data`
    pub catalog: Arc<Catalog>,
}

impl FramePacket {
    pub fn new(
        data: Vec<u8>,
        index: usize,
        tick: i32,
        session_version: i32,
        generation: Generation,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self { data: data.into(), index, tick, session_version, generation, catalog }
    }
}
