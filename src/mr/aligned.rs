//! Adaptor that strengthens the alignment of an upstream resource.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::align::{align_up, checked_align_up, is_supported_alignment, DEVICE_ALLOCATION_ALIGNMENT};
use crate::error::{DeviceMemoryError, MemResult};
use crate::mr::resource::{DeviceMemoryResource, DevicePtr};
use crate::stream::StreamToken;

/// Hands out pointers aligned to a caller-chosen power of two by
/// over-allocating from an upstream resource and offsetting into the
/// block.
///
/// Requests below `alignment_threshold` pass through untouched. When a
/// returned pointer had to be shifted, the original upstream pointer is
/// remembered so deallocation can return the true allocation.
#[derive(Debug)]
pub struct AlignedAdaptor {
    upstream: Arc<dyn DeviceMemoryResource>,
    /// Shifted pointer handed out -> pointer the upstream returned.
    /// Only allocations that actually needed shifting are recorded.
    pointers: Mutex<HashMap<DevicePtr, DevicePtr>>,
    alignment: usize,
    alignment_threshold: usize,
}

impl AlignedAdaptor {
    /// Wraps `upstream` with the default device alignment, which makes
    /// every request a pass-through.
    pub fn new(upstream: Arc<dyn DeviceMemoryResource>) -> Self {
        AlignedAdaptor {
            upstream,
            pointers: Mutex::new(HashMap::new()),
            alignment: DEVICE_ALLOCATION_ALIGNMENT,
            alignment_threshold: 0,
        }
    }

    /// Wraps `upstream` so that requests of at least
    /// `alignment_threshold` bytes come back aligned to `alignment`.
    ///
    /// `alignment` must be a power of two no smaller than
    /// [`DEVICE_ALLOCATION_ALIGNMENT`].
    pub fn with_alignment(
        upstream: Arc<dyn DeviceMemoryResource>,
        alignment: usize,
        alignment_threshold: usize,
    ) -> MemResult<Self> {
        if !is_supported_alignment(alignment) || alignment < DEVICE_ALLOCATION_ALIGNMENT {
            return Err(DeviceMemoryError::InvalidArgument(format!(
                "alignment {} is not a power of two of at least {}",
                alignment, DEVICE_ALLOCATION_ALIGNMENT
            )));
        }
        Ok(AlignedAdaptor {
            upstream,
            pointers: Mutex::new(HashMap::new()),
            alignment,
            alignment_threshold,
        })
    }

    pub fn upstream(&self) -> &Arc<dyn DeviceMemoryResource> {
        &self.upstream
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn alignment_threshold(&self) -> usize {
        self.alignment_threshold
    }

    /// Requests the upstream already aligns, or below the threshold,
    /// skip the padding machinery entirely.
    fn pass_through(&self, bytes: usize) -> bool {
        self.alignment == DEVICE_ALLOCATION_ALIGNMENT || bytes < self.alignment_threshold
    }

    /// Bytes to request upstream so a suitably aligned block of `bytes`
    /// fits inside. `None` when the padded size overflows.
    fn upstream_allocation_size(&self, bytes: usize) -> Option<usize> {
        checked_align_up(bytes, self.alignment)?
            .checked_add(self.alignment - DEVICE_ALLOCATION_ALIGNMENT)
    }
}

impl DeviceMemoryResource for AlignedAdaptor {
    fn allocate(&self, bytes: usize, stream: StreamToken) -> MemResult<DevicePtr> {
        if self.pass_through(bytes) {
            return self.upstream.allocate(bytes, stream);
        }
        let size = self.upstream_allocation_size(bytes).ok_or_else(|| {
            DeviceMemoryError::InvalidArgument(format!(
                "request of {} bytes overflows when padded to alignment {}",
                bytes, self.alignment
            ))
        })?;
        let pointer = self.upstream.allocate(size, stream)?;
        let aligned = DevicePtr::from_raw(align_up(pointer.as_raw() as usize, self.alignment) as *mut _);
        if aligned != pointer {
            match self.pointers.lock() {
                Ok(mut pointers) => {
                    pointers.insert(aligned, pointer);
                }
                Err(err) => {
                    // the allocation cannot be tracked, so it must not escape
                    self.upstream.deallocate(pointer, size, stream);
                    return Err(err.into());
                }
            }
        }
        Ok(aligned)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: StreamToken) {
        if self.pass_through(bytes) {
            self.upstream.deallocate(ptr, bytes, stream);
            return;
        }
        let size = match self.upstream_allocation_size(bytes) {
            Some(size) => size,
            // allocate rejects sizes that overflow when padded, so this
            // memory cannot have come from this adaptor
            None => panic!("deallocate of {} bytes that this adaptor never allocated", bytes),
        };
        let pointer = {
            let mut pointers = self
                .pointers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            // absent from the map means the upstream pointer happened
            // to be aligned already and was handed out unshifted
            pointers.remove(&ptr).unwrap_or(ptr)
        };
        self.upstream.deallocate(pointer, size, stream);
    }

    fn supports_streams(&self) -> bool {
        self.upstream.supports_streams()
    }

    fn supports_get_mem_info(&self) -> bool {
        self.upstream.supports_get_mem_info()
    }

    fn get_mem_info(&self, stream: StreamToken) -> MemResult<(usize, usize)> {
        self.upstream.get_mem_info(stream)
    }

    fn is_equal(&self, other: &dyn DeviceMemoryResource) -> bool {
        match other.as_any().downcast_ref::<AlignedAdaptor>() {
            Some(cast) => {
                self.upstream.is_equal(cast.upstream.as_ref())
                    && self.alignment == cast.alignment
                    && self.alignment_threshold == cast.alignment_threshold
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
