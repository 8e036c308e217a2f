//! Direct HIP device memory resource.

use std::any::Any;
use std::ffi::c_void;
use std::ptr;

use crate::device;
use crate::error::{DeviceMemoryError, MemResult};
use crate::ffi;
use crate::mr::resource::{DeviceMemoryResource, DevicePtr};
use crate::stream::StreamToken;

/// Allocates with `hipMalloc` and frees with `hipFree`.
///
/// The resource holds no state, so every instance is interchangeable
/// with every other: memory allocated through one can be freed through
/// any other. Streams are accepted and ignored because the underlying
/// calls are synchronous and device-wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HipMemoryResource;

impl HipMemoryResource {
    pub fn new() -> Self {
        HipMemoryResource
    }
}

impl DeviceMemoryResource for HipMemoryResource {
    fn allocate(&self, bytes: usize, _stream: StreamToken) -> MemResult<DevicePtr> {
        if bytes == 0 {
            return Ok(DevicePtr::null());
        }
        if bytes > 1024 * 1024 * 1024 {
            tracing::warn!("Large device allocation requested: {} MB", bytes / (1024 * 1024));
        }
        let mut raw: *mut c_void = ptr::null_mut();
        let result = unsafe { ffi::hipMalloc(&mut raw, bytes) };
        if result != ffi::HIP_SUCCESS {
            tracing::debug!("hipMalloc of {} bytes failed with code {}", bytes, result);
            return Err(DeviceMemoryError::alloc_failed(result, bytes));
        }
        if raw.is_null() {
            return Err(DeviceMemoryError::DeviceFault {
                code: result,
                detail: format!("hipMalloc of {} bytes returned a null pointer", bytes),
            });
        }
        tracing::trace!("Allocated {} bytes at {:?}", bytes, raw);
        Ok(DevicePtr::from_raw(raw))
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, _stream: StreamToken) {
        if ptr.is_null() {
            return;
        }
        let result = unsafe { ffi::hipFree(ptr.as_raw()) };
        if result != ffi::HIP_SUCCESS {
            // A rejected free means the pointer was never valid here,
            // was freed twice, or the allocation state is otherwise
            // corrupt. There is no way to continue safely.
            panic!(
                "hipFree failed with code {} ({}) while releasing {} bytes at {:?}",
                result,
                device::error_string(result),
                bytes,
                ptr
            );
        }
        tracing::trace!("Freed {} bytes at {:?}", bytes, ptr);
    }

    fn supports_streams(&self) -> bool {
        false
    }

    fn supports_get_mem_info(&self) -> bool {
        true
    }

    /// Device-wide counters from `hipMemGetInfo`, not per-resource ones.
    fn get_mem_info(&self, _stream: StreamToken) -> MemResult<(usize, usize)> {
        device::mem_info()
    }

    fn is_equal(&self, other: &dyn DeviceMemoryResource) -> bool {
        other.as_any().is::<HipMemoryResource>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
