//! Adaptor that retries exhausted allocations on an alternate resource.

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{DeviceMemoryError, MemResult};
use crate::mr::resource::{DeviceMemoryResource, DevicePtr};
use crate::stream::StreamToken;

/// Allocates from a primary resource and falls back to an alternate
/// when the primary reports it is out of memory.
///
/// Only [`OutOfMemory`](DeviceMemoryError::OutOfMemory) triggers the
/// fallback; faults and invalid arguments propagate untouched. Pointers
/// served by the alternate are remembered so each deallocation goes
/// back to the resource that produced the pointer.
#[derive(Debug)]
pub struct FallbackAdaptor {
    primary: Arc<dyn DeviceMemoryResource>,
    alternate: Arc<dyn DeviceMemoryResource>,
    alternate_allocations: Mutex<HashSet<DevicePtr>>,
}

impl FallbackAdaptor {
    pub fn new(
        primary: Arc<dyn DeviceMemoryResource>,
        alternate: Arc<dyn DeviceMemoryResource>,
    ) -> Self {
        FallbackAdaptor {
            primary,
            alternate,
            alternate_allocations: Mutex::new(HashSet::new()),
        }
    }

    pub fn primary(&self) -> &Arc<dyn DeviceMemoryResource> {
        &self.primary
    }

    pub fn alternate(&self) -> &Arc<dyn DeviceMemoryResource> {
        &self.alternate
    }
}

impl DeviceMemoryResource for FallbackAdaptor {
    fn allocate(&self, bytes: usize, stream: StreamToken) -> MemResult<DevicePtr> {
        match self.primary.allocate(bytes, stream) {
            Ok(ptr) => Ok(ptr),
            Err(DeviceMemoryError::OutOfMemory { requested }) => {
                tracing::debug!(
                    "primary resource out of memory for {} bytes, using alternate",
                    requested
                );
                let ptr = self.alternate.allocate(bytes, stream)?;
                match self.alternate_allocations.lock() {
                    Ok(mut allocations) => {
                        allocations.insert(ptr);
                        Ok(ptr)
                    }
                    Err(err) => {
                        // an untracked pointer would be freed through
                        // the wrong resource later
                        self.alternate.deallocate(ptr, bytes, stream);
                        Err(err.into())
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: StreamToken) {
        let from_alternate = {
            let mut allocations = self
                .alternate_allocations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            allocations.remove(&ptr)
        };
        if from_alternate {
            self.alternate.deallocate(ptr, bytes, stream);
        } else {
            self.primary.deallocate(ptr, bytes, stream);
        }
    }

    fn supports_streams(&self) -> bool {
        self.primary.supports_streams()
    }

    fn supports_get_mem_info(&self) -> bool {
        self.primary.supports_get_mem_info()
    }

    fn get_mem_info(&self, stream: StreamToken) -> MemResult<(usize, usize)> {
        self.primary.get_mem_info(stream)
    }

    /// Two fallback adaptors are interchangeable when their primaries
    /// are; against anything else the primary decides.
    fn is_equal(&self, other: &dyn DeviceMemoryResource) -> bool {
        match other.as_any().downcast_ref::<FallbackAdaptor>() {
            Some(cast) => self.primary.is_equal(cast.primary.as_ref()),
            None => self.primary.is_equal(other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mr::hip::HipMemoryResource;

    #[test]
    fn starts_with_no_alternate_allocations() {
        let fallback = FallbackAdaptor::new(
            Arc::new(HipMemoryResource::new()),
            Arc::new(HipMemoryResource::new()),
        );
        let allocations = fallback
            .alternate_allocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        assert!(allocations.is_empty());
    }

    #[test]
    fn capabilities_follow_the_primary() {
        let fallback = FallbackAdaptor::new(
            Arc::new(HipMemoryResource::new()),
            Arc::new(HipMemoryResource::new()),
        );
        assert!(!fallback.supports_streams());
        assert!(fallback.supports_get_mem_info());
    }
}
