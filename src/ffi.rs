//! HIP FFI bindings
//!
//! With the `rocm` feature enabled the declarations below bind to the
//! ROCm HIP runtime (`amdhip64`, linked by build.rs). Without it, a
//! host-memory shim exports the same symbols with the same status-code
//! behavior, so the allocation contract is exercisable on machines with
//! no GPU. Either way every function is `unsafe`: callers own pointer
//! validity, and sizes passed to `hipFree` bookkeeping must match the
//! original allocation.

#[cfg(feature = "rocm")]
use std::ffi::c_void;

/// HIP success code
pub const HIP_SUCCESS: i32 = 0;

/// `hipErrorInvalidValue`: a pointer or argument was malformed.
pub const HIP_ERROR_INVALID_VALUE: i32 = 1;

/// `hipErrorOutOfMemory`: the device cannot satisfy the allocation.
pub const HIP_ERROR_OUT_OF_MEMORY: i32 = 2;

/// HIP memory copy kinds
pub const HIP_MEMCPY_HOST_TO_DEVICE: i32 = 1;
pub const HIP_MEMCPY_DEVICE_TO_HOST: i32 = 2;
pub const HIP_MEMCPY_DEVICE_TO_DEVICE: i32 = 3;

#[cfg(feature = "rocm")]
#[link(name = "amdhip64")]
extern "C" {
    pub fn hipInit(flags: u32) -> i32;
    pub fn hipGetDeviceCount(count: *mut i32) -> i32;
    pub fn hipSetDevice(device_id: i32) -> i32;
    pub fn hipMalloc(ptr: *mut *mut c_void, size: usize) -> i32;
    pub fn hipFree(ptr: *mut c_void) -> i32;
    pub fn hipMemcpy(dst: *mut c_void, src: *const c_void, count: usize, kind: i32) -> i32;
    pub fn hipStreamCreate(stream: *mut *mut c_void) -> i32;
    pub fn hipStreamDestroy(stream: *mut c_void) -> i32;
    pub fn hipStreamSynchronize(stream: *mut c_void) -> i32;
    pub fn hipDeviceSynchronize() -> i32;
    pub fn hipGetErrorString(error: i32) -> *const i8;
    pub fn hipMemGetInfo(free: *mut usize, total: *mut usize) -> i32;
}

#[cfg(not(feature = "rocm"))]
pub use host_shim::*;

/// Host-memory stand-in for the HIP runtime.
///
/// A process-global registry tracks live allocations against a fixed
/// budget, so `hipMemGetInfo` accounting and the out-of-memory path are
/// deterministic. Unknown or repeated frees report
/// `hipErrorInvalidValue`, like the real runtime.
#[cfg(not(feature = "rocm"))]
mod host_shim {
    #![allow(non_snake_case)]
    #![allow(clippy::missing_safety_doc)]

    use std::alloc::{self, Layout};
    use std::collections::HashMap;
    use std::ffi::c_void;
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, MutexGuard};

    use once_cell::sync::Lazy;

    use super::{HIP_ERROR_INVALID_VALUE, HIP_ERROR_OUT_OF_MEMORY, HIP_SUCCESS};
    use crate::align::DEVICE_ALLOCATION_ALIGNMENT;

    /// Bytes the emulated device exposes. Small enough that requests
    /// over budget are refused before any real host allocation happens.
    const SHIM_TOTAL_BYTES: usize = 1 << 30;

    struct ShimHeap {
        /// Live allocation address -> size handed out for it.
        live: HashMap<usize, usize>,
        in_use: usize,
    }

    static HEAP: Lazy<Mutex<ShimHeap>> = Lazy::new(|| {
        Mutex::new(ShimHeap {
            live: HashMap::new(),
            in_use: 0,
        })
    });

    static NEXT_STREAM: AtomicUsize = AtomicUsize::new(1);

    fn heap() -> MutexGuard<'static, ShimHeap> {
        match HEAP.lock() {
            Ok(guard) => guard,
            // the map stays usable after a panic elsewhere
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub unsafe fn hipInit(flags: u32) -> i32 {
        if flags != 0 {
            return HIP_ERROR_INVALID_VALUE;
        }
        HIP_SUCCESS
    }

    pub unsafe fn hipGetDeviceCount(count: *mut i32) -> i32 {
        if count.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        *count = 1;
        HIP_SUCCESS
    }

    pub unsafe fn hipSetDevice(device_id: i32) -> i32 {
        if device_id != 0 {
            return HIP_ERROR_INVALID_VALUE;
        }
        HIP_SUCCESS
    }

    pub unsafe fn hipMalloc(ptr: *mut *mut c_void, size: usize) -> i32 {
        if ptr.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        if size == 0 {
            // hipMalloc(0) succeeds and hands back a null pointer
            *ptr = ptr::null_mut();
            return HIP_SUCCESS;
        }
        let mut heap = heap();
        // over-budget requests fail the way an exhausted device does,
        // even for sizes no host allocator could represent
        if heap.in_use.saturating_add(size) > SHIM_TOTAL_BYTES {
            return HIP_ERROR_OUT_OF_MEMORY;
        }
        let layout = match Layout::from_size_align(size, DEVICE_ALLOCATION_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => return HIP_ERROR_INVALID_VALUE,
        };
        let raw = alloc::alloc(layout);
        if raw.is_null() {
            return HIP_ERROR_OUT_OF_MEMORY;
        }
        heap.live.insert(raw as usize, size);
        heap.in_use += size;
        *ptr = raw as *mut c_void;
        HIP_SUCCESS
    }

    pub unsafe fn hipFree(ptr: *mut c_void) -> i32 {
        if ptr.is_null() {
            // freeing the null pointer is legal and does nothing
            return HIP_SUCCESS;
        }
        let size = {
            let mut heap = heap();
            match heap.live.remove(&(ptr as usize)) {
                Some(size) => {
                    heap.in_use -= size;
                    size
                }
                // unknown or already-freed pointer
                None => return HIP_ERROR_INVALID_VALUE,
            }
        };
        let layout = Layout::from_size_align_unchecked(size, DEVICE_ALLOCATION_ALIGNMENT);
        alloc::dealloc(ptr as *mut u8, layout);
        HIP_SUCCESS
    }

    pub unsafe fn hipMemcpy(dst: *mut c_void, src: *const c_void, count: usize, _kind: i32) -> i32 {
        if count == 0 {
            return HIP_SUCCESS;
        }
        if dst.is_null() || src.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        // all shim memory is host memory; the copy kind changes nothing
        ptr::copy(src as *const u8, dst as *mut u8, count);
        HIP_SUCCESS
    }

    pub unsafe fn hipStreamCreate(stream: *mut *mut c_void) -> i32 {
        if stream.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        // fabricated non-null handle; the shim has no ordering to do
        let handle = NEXT_STREAM.fetch_add(1, Ordering::Relaxed);
        *stream = handle as *mut c_void;
        HIP_SUCCESS
    }

    pub unsafe fn hipStreamDestroy(stream: *mut c_void) -> i32 {
        if stream.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        HIP_SUCCESS
    }

    pub unsafe fn hipStreamSynchronize(_stream: *mut c_void) -> i32 {
        HIP_SUCCESS
    }

    pub unsafe fn hipDeviceSynchronize() -> i32 {
        HIP_SUCCESS
    }

    pub unsafe fn hipGetErrorString(error: i32) -> *const i8 {
        let message: &'static [u8] = match error {
            HIP_SUCCESS => b"hipSuccess\0",
            HIP_ERROR_INVALID_VALUE => b"hipErrorInvalidValue\0",
            HIP_ERROR_OUT_OF_MEMORY => b"hipErrorOutOfMemory\0",
            _ => b"hipErrorUnknown\0",
        };
        message.as_ptr() as *const i8
    }

    pub unsafe fn hipMemGetInfo(free: *mut usize, total: *mut usize) -> i32 {
        if free.is_null() || total.is_null() {
            return HIP_ERROR_INVALID_VALUE;
        }
        let heap = heap();
        *free = SHIM_TOTAL_BYTES - heap.in_use;
        *total = SHIM_TOTAL_BYTES;
        HIP_SUCCESS
    }
}

#[cfg(all(test, not(feature = "rocm")))]
mod tests {
    use std::ffi::c_void;
    use std::ptr;

    use serial_test::serial;

    use super::*;

    unsafe fn malloc(size: usize) -> (i32, *mut c_void) {
        let mut raw: *mut c_void = ptr::null_mut();
        let code = hipMalloc(&mut raw, size);
        (code, raw)
    }

    unsafe fn free_bytes_now() -> usize {
        let mut free = 0usize;
        let mut total = 0usize;
        assert_eq!(hipMemGetInfo(&mut free, &mut total), HIP_SUCCESS);
        free
    }

    #[test]
    fn zero_size_malloc_is_null_and_success() {
        unsafe {
            let (code, raw) = malloc(0);
            assert_eq!(code, HIP_SUCCESS);
            assert!(raw.is_null());
        }
    }

    #[test]
    fn freeing_null_is_a_no_op() {
        unsafe {
            assert_eq!(hipFree(ptr::null_mut()), HIP_SUCCESS);
        }
    }

    #[test]
    fn freeing_an_unknown_pointer_is_invalid_value() {
        unsafe {
            assert_eq!(hipFree(0xdead_beef_usize as *mut c_void), HIP_ERROR_INVALID_VALUE);
        }
    }

    #[test]
    #[serial]
    fn double_free_is_invalid_value() {
        unsafe {
            let (code, raw) = malloc(512);
            assert_eq!(code, HIP_SUCCESS);
            assert_eq!(hipFree(raw), HIP_SUCCESS);
            assert_eq!(hipFree(raw), HIP_ERROR_INVALID_VALUE);
        }
    }

    #[test]
    #[serial]
    fn mem_info_tracks_live_allocations() {
        unsafe {
            let before = free_bytes_now();
            let (code, raw) = malloc(64 * 1024);
            assert_eq!(code, HIP_SUCCESS);
            assert_eq!(free_bytes_now(), before - 64 * 1024);
            assert_eq!(hipFree(raw), HIP_SUCCESS);
            assert_eq!(free_bytes_now(), before);
        }
    }

    #[test]
    #[serial]
    fn over_budget_requests_are_refused() {
        unsafe {
            let free = free_bytes_now();
            let (code, raw) = malloc(free + 1);
            assert_eq!(code, HIP_ERROR_OUT_OF_MEMORY);
            assert!(raw.is_null());
            // accounting is untouched by the refusal
            assert_eq!(free_bytes_now(), free);
        }
    }

    #[test]
    fn memcpy_moves_bytes() {
        unsafe {
            let source = [7u8, 8, 9, 10];
            let mut sink = [0u8; 4];
            let code = hipMemcpy(
                sink.as_mut_ptr() as *mut c_void,
                source.as_ptr() as *const c_void,
                source.len(),
                HIP_MEMCPY_HOST_TO_DEVICE,
            );
            assert_eq!(code, HIP_SUCCESS);
            assert_eq!(sink, source);
        }
    }

    #[test]
    fn streams_are_non_null_and_distinct() {
        unsafe {
            let mut first: *mut c_void = ptr::null_mut();
            let mut second: *mut c_void = ptr::null_mut();
            assert_eq!(hipStreamCreate(&mut first), HIP_SUCCESS);
            assert_eq!(hipStreamCreate(&mut second), HIP_SUCCESS);
            assert!(!first.is_null());
            assert_ne!(first, second);
            assert_eq!(hipStreamDestroy(first), HIP_SUCCESS);
            assert_eq!(hipStreamDestroy(second), HIP_SUCCESS);
        }
    }
}
