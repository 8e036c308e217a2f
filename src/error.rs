//! Error types for device memory operations.

use thiserror::Error;

use crate::device;
use crate::ffi;

/// Failure classes surfaced by memory resources and device queries.
///
/// A failed deallocation is deliberately absent: a free the runtime
/// rejects means an invariant was already broken upstream (double free,
/// wrong resource, corrupted pointer), so that path panics instead of
/// returning an error.
#[derive(Error, Debug, Clone)]
pub enum DeviceMemoryError {
    /// The device could not satisfy an allocation of `requested` bytes.
    #[error("out of device memory: {requested} bytes requested")]
    OutOfMemory {
        /// Size of the refused request, in bytes.
        requested: usize,
    },

    /// A request was malformed before it reached the device.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The runtime reported a failure unrelated to allocation pressure.
    #[error("device fault: {detail}")]
    DeviceFault {
        /// Raw HIP status code.
        code: i32,
        /// Failing call and the runtime's error string.
        detail: String,
    },

    /// No usable HIP device or runtime is present.
    #[error("no HIP device found")]
    DeviceNotFound,

    /// Internal bookkeeping lock poisoned by a panicking thread.
    #[error("internal lock poisoned - this indicates a bug: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for DeviceMemoryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DeviceMemoryError::LockPoisoned(format!("Lock poisoned: {}", err))
    }
}

/// Result type for device memory operations.
pub type MemResult<T> = Result<T, DeviceMemoryError>;

impl DeviceMemoryError {
    /// Translate a non-success HIP status into an error.
    ///
    /// `op` names the failing call; the runtime's own error string is
    /// appended. Allocation sites translate `hipErrorOutOfMemory`
    /// themselves so the error can carry the requested size; see
    /// [`DeviceMemoryError::alloc_failed`].
    pub fn from_native(code: i32, op: impl AsRef<str>) -> Self {
        let detail = format!(
            "{} failed with code {} ({})",
            op.as_ref(),
            code,
            device::error_string(code)
        );
        match code {
            ffi::HIP_ERROR_INVALID_VALUE => DeviceMemoryError::InvalidArgument(detail),
            _ => DeviceMemoryError::DeviceFault { code, detail },
        }
    }

    /// Translate a failed device allocation of `requested` bytes.
    pub fn alloc_failed(code: i32, requested: usize) -> Self {
        if code == ffi::HIP_ERROR_OUT_OF_MEMORY {
            return DeviceMemoryError::OutOfMemory { requested };
        }
        Self::from_native(code, format!("hipMalloc of {} bytes", requested))
    }

    /// Check if this error is recoverable (temporary condition)
    ///
    /// Out-of-memory is the one recoverable class: the caller can free
    /// memory, retry with a smaller request, or fall back to another
    /// resource. Faults, bad arguments and missing devices are not
    /// fixed by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceMemoryError::OutOfMemory { .. })
    }

    /// Check if this error is permanent (should never retry)
    pub fn is_permanent(&self) -> bool {
        !self.is_recoverable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_out_of_memory_is_recoverable() {
        assert!(DeviceMemoryError::OutOfMemory { requested: 1024 }.is_recoverable());
        assert!(DeviceMemoryError::InvalidArgument("bad".into()).is_permanent());
        assert!(DeviceMemoryError::DeviceFault {
            code: 3,
            detail: "boom".into()
        }
        .is_permanent());
        assert!(DeviceMemoryError::DeviceNotFound.is_permanent());
    }

    #[test]
    fn native_codes_map_to_the_right_variants() {
        let err = DeviceMemoryError::alloc_failed(ffi::HIP_ERROR_OUT_OF_MEMORY, 4096);
        assert!(matches!(
            err,
            DeviceMemoryError::OutOfMemory { requested: 4096 }
        ));

        let err = DeviceMemoryError::from_native(ffi::HIP_ERROR_INVALID_VALUE, "hipSetDevice(3)");
        assert!(matches!(err, DeviceMemoryError::InvalidArgument(_)));

        let err = DeviceMemoryError::from_native(77, "hipMemGetInfo");
        match err {
            DeviceMemoryError::DeviceFault { code, detail } => {
                assert_eq!(code, 77);
                assert!(detail.contains("hipMemGetInfo"));
            }
            other => panic!("expected DeviceFault, got {:?}", other),
        }
    }
}
