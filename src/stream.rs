//! HIP stream handling
//!
//! `StreamToken` is the value passed through allocation calls: a copyable
//! handle that identifies the stream an operation is ordered against,
//! with the null stream as the default. `HipStream` owns a real stream
//! created through the runtime and destroys it on drop.

use std::ffi::c_void;
use std::ptr;

use crate::error::{DeviceMemoryError, MemResult};
use crate::ffi;

/// Identifies the stream a memory operation is ordered against.
///
/// Resources accept a token with every allocate and deallocate call.
/// Resources that do not order work by stream ignore the token rather
/// than reject it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StreamToken(*mut c_void);

impl StreamToken {
    /// Wraps a raw stream handle.
    pub fn from_raw(raw: *mut c_void) -> Self {
        StreamToken(raw)
    }

    /// The raw handle to hand to the runtime.
    pub fn as_raw(self) -> *mut c_void {
        self.0
    }

    /// Whether this is the default (null) stream.
    pub fn is_default(self) -> bool {
        self.0.is_null()
    }
}

impl Default for StreamToken {
    /// The null stream, which imposes no ordering of its own.
    fn default() -> Self {
        StreamToken(ptr::null_mut())
    }
}

// SAFETY: the token is an opaque handle owned by the HIP runtime; it is
// never dereferenced on the host and the runtime is thread-safe.
unsafe impl Send for StreamToken {}
unsafe impl Sync for StreamToken {}

/// An owned HIP stream. Destroyed when dropped.
#[derive(Debug)]
pub struct HipStream {
    stream: *mut c_void,
}

impl HipStream {
    /// Creates a new stream on the current device.
    pub fn new() -> MemResult<Self> {
        let mut stream: *mut c_void = ptr::null_mut();
        let result = unsafe { ffi::hipStreamCreate(&mut stream) };
        if result != ffi::HIP_SUCCESS {
            return Err(DeviceMemoryError::from_native(result, "hipStreamCreate"));
        }
        if stream.is_null() {
            return Err(DeviceMemoryError::DeviceFault {
                code: result,
                detail: "hipStreamCreate returned a null stream handle".to_string(),
            });
        }
        tracing::debug!("Created HIP stream: {:?}", stream);
        Ok(HipStream { stream })
    }

    /// Blocks until all work queued on this stream has completed.
    pub fn synchronize(&self) -> MemResult<()> {
        let result = unsafe { ffi::hipStreamSynchronize(self.stream) };
        if result != ffi::HIP_SUCCESS {
            return Err(DeviceMemoryError::from_native(result, "hipStreamSynchronize"));
        }
        Ok(())
    }

    /// The raw stream handle.
    pub fn as_ptr(&self) -> *mut c_void {
        self.stream
    }

    /// A token naming this stream, for allocation calls.
    pub fn token(&self) -> StreamToken {
        StreamToken(self.stream)
    }
}

impl From<&HipStream> for StreamToken {
    fn from(stream: &HipStream) -> Self {
        stream.token()
    }
}

impl Drop for HipStream {
    fn drop(&mut self) {
        if !self.stream.is_null() {
            unsafe {
                ffi::hipStreamDestroy(self.stream);
            }
        }
    }
}

// SAFETY: the stream handle is owned by the HIP runtime and all
// operations on it go through the thread-safe HIP API.
unsafe impl Send for HipStream {}
unsafe impl Sync for HipStream {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_default_token_is_the_null_stream() {
        let token = StreamToken::default();
        assert!(token.is_default());
        assert!(token.as_raw().is_null());
    }

    #[test]
    fn tokens_compare_by_handle() {
        let a = StreamToken::from_raw(0x1000 as *mut _);
        let b = StreamToken::from_raw(0x1000 as *mut _);
        let c = StreamToken::from_raw(0x2000 as *mut _);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_default());
    }

    #[cfg(not(feature = "rocm"))]
    #[test]
    fn owned_streams_expose_their_handle() {
        let stream = HipStream::new().expect("stream creation failed");
        assert!(!stream.as_ptr().is_null());
        assert_eq!(stream.token().as_raw(), stream.as_ptr());
        stream.synchronize().expect("synchronize failed");

        let token: StreamToken = (&stream).into();
        assert_eq!(token, stream.token());
    }
}
