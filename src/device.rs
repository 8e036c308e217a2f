//! Device discovery and runtime queries.

use std::ffi::CStr;
use std::panic;

use once_cell::sync::OnceCell;

use crate::error::{DeviceMemoryError, MemResult};
use crate::ffi;

static AVAILABLE: OnceCell<bool> = OnceCell::new();

/// Whether a usable HIP device is present.
///
/// Probes the runtime once and caches the answer. A missing runtime
/// library aborts the probe, not the process.
pub fn gpu_available() -> bool {
    *AVAILABLE.get_or_init(|| {
        let probe = panic::catch_unwind(|| unsafe {
            if ffi::hipInit(0) != ffi::HIP_SUCCESS {
                return false;
            }
            let mut count = 0i32;
            ffi::hipGetDeviceCount(&mut count) == ffi::HIP_SUCCESS && count > 0
        });
        let available = probe.unwrap_or(false);
        tracing::debug!("HIP device available: {}", available);
        available
    })
}

/// Number of HIP devices visible to the runtime.
pub fn device_count() -> MemResult<i32> {
    let mut count = 0i32;
    let result = unsafe { ffi::hipGetDeviceCount(&mut count) };
    if result != ffi::HIP_SUCCESS {
        return Err(DeviceMemoryError::DeviceNotFound);
    }
    Ok(count)
}

/// Selects the device subsequent calls operate on.
pub fn set_device(device_id: i32) -> MemResult<()> {
    let result = unsafe { ffi::hipSetDevice(device_id) };
    if result != ffi::HIP_SUCCESS {
        return Err(DeviceMemoryError::from_native(
            result,
            format!("hipSetDevice({})", device_id),
        ));
    }
    Ok(())
}

/// Free and total memory on the current device, in bytes.
pub fn mem_info() -> MemResult<(usize, usize)> {
    let mut free: usize = 0;
    let mut total: usize = 0;
    let result = unsafe { ffi::hipMemGetInfo(&mut free, &mut total) };
    if result != ffi::HIP_SUCCESS {
        return Err(DeviceMemoryError::from_native(result, "hipMemGetInfo"));
    }
    Ok((free, total))
}

/// Blocks until all work on the current device has completed.
pub fn synchronize() -> MemResult<()> {
    let result = unsafe { ffi::hipDeviceSynchronize() };
    if result != ffi::HIP_SUCCESS {
        return Err(DeviceMemoryError::from_native(result, "hipDeviceSynchronize"));
    }
    Ok(())
}

/// Human-readable description of a HIP status code.
pub fn error_string(code: i32) -> String {
    unsafe {
        let message = ffi::hipGetErrorString(code);
        if message.is_null() {
            return format!("unknown error {}", code);
        }
        CStr::from_ptr(message.cast()).to_string_lossy().into_owned()
    }
}
