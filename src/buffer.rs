//! An owned, resizable block of device memory.

use std::ffi::c_void;
use std::sync::Arc;

use crate::error::{DeviceMemoryError, MemResult};
use crate::ffi;
use crate::mr::resource::{DeviceMemoryResource, DevicePtr};
use crate::stream::StreamToken;

/// Untyped device memory owned through a [`DeviceMemoryResource`].
///
/// The buffer tracks a size and a capacity separately: shrinking is
/// free until [`shrink_to_fit`](DeviceBuffer::shrink_to_fit), growing
/// past the capacity reallocates and copies. The memory is returned to
/// the resource on drop, on the stream of the latest operation.
///
/// Not `Clone`: the buffer is sole owner of its allocation.
#[derive(Debug)]
pub struct DeviceBuffer {
    data: DevicePtr,
    size: usize,
    capacity: usize,
    stream: StreamToken,
    mr: Arc<dyn DeviceMemoryResource>,
}

impl DeviceBuffer {
    /// Allocates an uninitialized buffer of `bytes` from `mr`.
    ///
    /// A zero-byte buffer performs no allocation at all.
    pub fn new(
        bytes: usize,
        stream: StreamToken,
        mr: Arc<dyn DeviceMemoryResource>,
    ) -> MemResult<Self> {
        let data = if bytes > 0 {
            mr.allocate(bytes, stream)?
        } else {
            DevicePtr::null()
        };
        Ok(DeviceBuffer {
            data,
            size: bytes,
            capacity: bytes,
            stream,
            mr,
        })
    }

    /// Allocates a buffer holding a copy of `host`.
    pub fn from_host(
        host: &[u8],
        stream: StreamToken,
        mr: Arc<dyn DeviceMemoryResource>,
    ) -> MemResult<Self> {
        let buffer = Self::new(host.len(), stream, mr)?;
        if !host.is_empty() {
            Self::copy_bytes(
                buffer.data.as_raw(),
                host.as_ptr() as *const c_void,
                host.len(),
                ffi::HIP_MEMCPY_HOST_TO_DEVICE,
            )?;
        }
        Ok(buffer)
    }

    /// Copies the buffer's contents into `out`, which must hold at
    /// least [`size`](DeviceBuffer::size) bytes.
    pub fn to_host(&self, out: &mut [u8]) -> MemResult<()> {
        if out.len() < self.size {
            return Err(DeviceMemoryError::InvalidArgument(format!(
                "destination holds {} bytes but the buffer holds {}",
                out.len(),
                self.size
            )));
        }
        if self.size > 0 {
            Self::copy_bytes(
                out.as_mut_ptr() as *mut c_void,
                self.data.as_raw() as *const c_void,
                self.size,
                ffi::HIP_MEMCPY_DEVICE_TO_HOST,
            )?;
        }
        Ok(())
    }

    /// Ensures capacity for `new_capacity` bytes, reallocating and
    /// copying the current contents if needed. The size is unchanged.
    pub fn reserve(&mut self, new_capacity: usize, stream: StreamToken) -> MemResult<()> {
        self.stream = stream;
        if new_capacity <= self.capacity {
            return Ok(());
        }
        self.reallocate(new_capacity, self.size, stream)
    }

    /// Sets the size to `new_size`.
    ///
    /// Shrinking keeps the allocation and its contents. Growing past
    /// the capacity reallocates, preserving the old contents; the bytes
    /// beyond them are uninitialized.
    pub fn resize(&mut self, new_size: usize, stream: StreamToken) -> MemResult<()> {
        self.stream = stream;
        if new_size > self.capacity {
            self.reallocate(new_size, self.size, stream)?;
        }
        self.size = new_size;
        Ok(())
    }

    /// Releases spare capacity so that capacity equals size.
    pub fn shrink_to_fit(&mut self, stream: StreamToken) -> MemResult<()> {
        self.stream = stream;
        if self.size == self.capacity {
            return Ok(());
        }
        self.reallocate(self.size, self.size, stream)
    }

    /// Device pointer to the buffer's memory. Null when the buffer has
    /// never allocated.
    pub fn data(&self) -> DevicePtr {
        self.data
    }

    /// Bytes of live data.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes actually allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stream of the most recent operation; also the stream the final
    /// deallocation will use.
    pub fn stream(&self) -> StreamToken {
        self.stream
    }

    pub fn set_stream(&mut self, stream: StreamToken) {
        self.stream = stream;
    }

    /// The resource the memory came from and will return to.
    pub fn memory_resource(&self) -> &Arc<dyn DeviceMemoryResource> {
        &self.mr
    }

    fn copy_bytes(dst: *mut c_void, src: *const c_void, count: usize, kind: i32) -> MemResult<()> {
        let result = unsafe { ffi::hipMemcpy(dst, src, count, kind) };
        if result != ffi::HIP_SUCCESS {
            return Err(DeviceMemoryError::from_native(
                result,
                format!("hipMemcpy of {} bytes", count),
            ));
        }
        Ok(())
    }

    /// Moves the buffer into a fresh allocation of `new_capacity`
    /// bytes, carrying over the first `keep` bytes. `keep` never
    /// exceeds `new_capacity`.
    fn reallocate(&mut self, new_capacity: usize, keep: usize, stream: StreamToken) -> MemResult<()> {
        tracing::trace!(
            "Moving buffer of capacity {} into a {} byte allocation, keeping {} bytes",
            self.capacity,
            new_capacity,
            keep
        );
        let new_data = if new_capacity > 0 {
            self.mr.allocate(new_capacity, stream)?
        } else {
            DevicePtr::null()
        };
        if keep > 0 {
            if let Err(err) = Self::copy_bytes(
                new_data.as_raw(),
                self.data.as_raw() as *const c_void,
                keep,
                ffi::HIP_MEMCPY_DEVICE_TO_DEVICE,
            ) {
                self.mr.deallocate(new_data, new_capacity, stream);
                return Err(err);
            }
        }
        if self.capacity > 0 {
            self.mr.deallocate(self.data, self.capacity, stream);
        }
        self.data = new_data;
        self.capacity = new_capacity;
        Ok(())
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if self.capacity > 0 {
            self.mr.deallocate(self.data, self.capacity, self.stream);
        }
    }
}
