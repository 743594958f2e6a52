//! Windows shared-memory region.
//!
//! Opens the simulator's file mapping and data-ready event read-only and exposes
//! them through [`SharedRegion`]. Handles are closed on drop.

use std::ptr::NonNull;
use std::time::Duration;

use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
    OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use windows::Win32::System::Threading::{
    OpenEventW, SYNCHRONIZATION_ACCESS_RIGHTS, WaitForSingleObject,
};
use windows::core::PCWSTR;

use crate::live::{RegionOpener, SharedRegion, WaitResult};
use crate::{Result, TelemetryError};

/// Name of the telemetry file mapping
pub const MEMMAP_NAME: &str = "Local\\IRSDKMemMapFileName";
/// Name of the data-ready event
pub const DATA_VALID_EVENT_NAME: &str = "Local\\IRSDKDataValidEvent";

/// `SYNCHRONIZE` access right
const SYNCHRONIZE: u32 = 0x0010_0000;

/// Opens the simulator's well-known shared memory objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedMemoryOpener;

impl RegionOpener for SharedMemoryOpener {
    type Region = SharedMemoryRegion;

    fn open(&mut self) -> Result<SharedMemoryRegion> {
        SharedMemoryRegion::open()
    }
}

/// Read-only view of the telemetry mapping plus the data-ready event.
pub struct SharedMemoryRegion {
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
    event: HANDLE,
}

impl SharedMemoryRegion {
    fn open() -> Result<Self> {
        trace!("Opening simulator shared memory");

        // A missing mapping means the simulator is not running
        let mapping = unsafe {
            let name = wide_string(MEMMAP_NAME);
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(name.as_ptr()))
                .map_err(|_| TelemetryError::unavailable("shared memory mapping not found"))?
        };

        let base = unsafe {
            let view = MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0);
            match NonNull::new(view.Value as *mut u8) {
                Some(base) => base,
                None => {
                    let error = windows::core::Error::from_thread();
                    let _ = CloseHandle(mapping);
                    return Err(TelemetryError::windows_api_error("MapViewOfFile", error));
                }
            }
        };

        let len = unsafe {
            let mut info = MEMORY_BASIC_INFORMATION::default();
            let written = VirtualQuery(
                Some(base.as_ptr() as *const _),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            );
            if written == 0 { 0 } else { info.RegionSize }
        };

        let event = unsafe {
            let name = wide_string(DATA_VALID_EVENT_NAME);
            OpenEventW(SYNCHRONIZATION_ACCESS_RIGHTS(SYNCHRONIZE), false, PCWSTR::from_raw(name.as_ptr()))
        };
        let event = match event {
            Ok(event) => event,
            Err(error) => {
                unsafe {
                    let _ = UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS { Value: base.as_ptr() as *mut _ });
                    let _ = CloseHandle(mapping);
                }
                return Err(TelemetryError::windows_api_error("OpenEventW", error));
            }
        };

        debug!(len, "Mapped simulator shared memory");
        Ok(Self { mapping, base, len, event })
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(TelemetryError::truncated("shared memory", offset.saturating_add(len), self.len)),
        }
    }
}

impl SharedRegion for SharedMemoryRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn read_i32(&self, offset: usize) -> Result<i32> {
        self.check(offset, 4)?;
        if offset % 4 != 0 {
            return Err(TelemetryError::malformed("shared memory", format!("unaligned field at {offset}")));
        }
        // SAFETY: bounds and alignment checked; the view stays mapped while self lives
        let value = unsafe { std::ptr::read_volatile(self.base.as_ptr().add(offset) as *const i32) };
        Ok(i32::from_le(value))
    }

    fn copy_to(&self, offset: usize, target: &mut [u8]) -> Result<()> {
        self.check(offset, target.len())?;
        // SAFETY: bounds checked; target is a distinct owned buffer
        unsafe {
            std::ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), target.as_mut_ptr(), target.len());
        }
        Ok(())
    }

    fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        match unsafe { WaitForSingleObject(self.event, ms) } {
            WAIT_OBJECT_0 => Ok(WaitResult::Signaled),
            WAIT_TIMEOUT => Ok(WaitResult::Timeout),
            _ => Err(TelemetryError::windows_api_error(
                "WaitForSingleObject",
                windows::core::Error::from_thread(),
            )),
        }
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
            let _ = CloseHandle(self.event);
        }
    }
}

// SAFETY: the region holds kernel handles and a read-only view; all access goes
// through bounds-checked copies
unsafe impl Send for SharedMemoryRegion {}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
