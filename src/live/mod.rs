//! Live telemetry from the simulator's shared memory.
//!
//! [`LiveChannel`] moves through `Closed → Opening → Attached → Closed`. Each call
//! to [`LiveChannel::wait_for_frame`] selects the rotating slot with the highest
//! tick, copies it into the sample buffer and re-reads the tick to reject torn
//! copies. A tick that goes backwards means the simulator restarted: the channel
//! reports [`FrameResult::Disconnected`], closes, and re-opens with a new
//! [`Generation`](crate::Generation) on the next call.
//!
//! ```rust,no_run
//! use irtelemetry::live::{FrameResult, LiveChannel};
//! use irtelemetry::{LiveConfig, VariableHandle};
//!
//! let config = LiveConfig::default();
//! let timeout = config.frame_timeout;
//! let mut live = LiveChannel::new(config);
//! let mut rpm = VariableHandle::new("RPM");
//! loop {
//!     match live.wait_for_frame(timeout)? {
//!         FrameResult::Fresh { tick } => println!("{tick}: {}", rpm.get_f32(&live, 0)),
//!         FrameResult::Unavailable => std::thread::sleep(std::time::Duration::from_secs(1)),
//!         _ => {}
//!     }
//! }
//! # Ok::<(), irtelemetry::TelemetryError>(())
//! ```

mod channel;
pub mod region;


pub use channel::{ChannelState, FrameResult, LiveChannel};
pub use region::{RegionOpener, SharedRegion, SystemOpener, WaitResult};
