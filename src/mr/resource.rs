//! The device memory resource trait and the pointer type it deals in.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;

use crate::error::MemResult;
use crate::stream::StreamToken;

/// A pointer into device memory.
///
/// Only valid for device-side use; never dereference it on the host.
/// The null pointer doubles as the zero-byte allocation sentinel.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DevicePtr(*mut c_void);

impl DevicePtr {
    /// The null pointer.
    pub fn null() -> Self {
        DevicePtr(std::ptr::null_mut())
    }

    /// Wraps a raw device address.
    pub fn from_raw(raw: *mut c_void) -> Self {
        DevicePtr(raw)
    }

    /// The raw address to hand to the runtime.
    pub fn as_raw(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

// SAFETY: the wrapped address lives in the device address space and is
// never dereferenced on the host, so moving or sharing the handle
// between threads is safe.
unsafe impl Send for DevicePtr {}
unsafe impl Sync for DevicePtr {}

/// Allocates and frees device memory.
///
/// Implementations are stateless or internally synchronized, so a
/// resource shared behind an `Arc` can serve concurrent callers.
pub trait DeviceMemoryResource: Send + Sync + fmt::Debug {
    /// Allocates at least `bytes` of device memory, aligned to
    /// [`DEVICE_ALLOCATION_ALIGNMENT`](crate::align::DEVICE_ALLOCATION_ALIGNMENT).
    ///
    /// A zero-byte request may return the null sentinel instead of a
    /// usable pointer. Exhaustion is reported as
    /// [`OutOfMemory`](crate::error::DeviceMemoryError::OutOfMemory),
    /// which callers may recover from; other failures are faults.
    fn allocate(&self, bytes: usize, stream: StreamToken) -> MemResult<DevicePtr>;

    /// Returns memory obtained from [`allocate`](Self::allocate).
    ///
    /// `bytes` must equal the size the allocation was made with; a
    /// mismatched size is outside the contract and the behavior is
    /// undefined. `stream` orders the release and need not be the
    /// allocating stream. Freeing the null sentinel is a no-op. A free
    /// the runtime rejects cannot be recovered from and panics.
    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: StreamToken);

    /// Whether this resource orders allocations against the stream it
    /// is given. Resources that do not still accept any token.
    fn supports_streams(&self) -> bool {
        false
    }

    /// Whether [`get_mem_info`](Self::get_mem_info) reports live numbers.
    fn supports_get_mem_info(&self) -> bool {
        false
    }

    /// Free and total memory visible to this resource, in bytes.
    ///
    /// Resources without accounting report `(0, 0)`.
    fn get_mem_info(&self, _stream: StreamToken) -> MemResult<(usize, usize)> {
        Ok((0, 0))
    }

    /// Whether memory allocated from `self` can be freed through
    /// `other` and vice versa.
    ///
    /// This is a capability comparison, not reference identity: two
    /// distinct instances backed by the same allocation mechanism
    /// compare equal.
    fn is_equal(&self, other: &dyn DeviceMemoryResource) -> bool;

    /// Downcasting hook for [`is_equal`](Self::is_equal) implementations.
    fn as_any(&self) -> &dyn Any;
}

impl<'a> PartialEq for dyn DeviceMemoryResource + 'a {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}
