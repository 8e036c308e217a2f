//! Shared test fixture.
//!
//! Initializes logging once and probes for a device. On the host shim
//! a device is always available; with the `rocm` feature the probe can
//! fail on GPU-less machines and tests skip themselves.

use once_cell::sync::Lazy;

use rocmem::mr::DeviceMemoryResource;
use rocmem::stream::StreamToken;

static TEST_ENV: Lazy<bool> = Lazy::new(|| {
    rocmem::logging::init_logging_default();
    rocmem::device::gpu_available()
});

/// True when allocation tests can run. Prints a skip notice otherwise.
pub fn device_ready() -> bool {
    if !*TEST_ENV {
        eprintln!("skipping: no HIP device available");
        return false;
    }
    true
}

/// Free bytes the resource reports right now.
pub fn free_bytes(mr: &dyn DeviceMemoryResource) -> usize {
    match mr.get_mem_info(StreamToken::default()) {
        Ok((free, _total)) => free,
        Err(err) => panic!("get_mem_info failed: {}", err),
    }
}

/// Runtimes round allocations up to page granularity, so free-memory
/// counters may come back slightly lower than they started.
#[cfg(feature = "rocm")]
const GPU_GRANULARITY_SLACK: usize = 8 * 1024 * 1024;

/// Asserts that freeing everything restored the free-memory counter.
#[cfg(not(feature = "rocm"))]
pub fn assert_free_restored(before: usize, after: usize) {
    assert_eq!(after, before, "free memory not restored");
}

#[cfg(feature = "rocm")]
pub fn assert_free_restored(before: usize, after: usize) {
    assert!(
        after >= before.saturating_sub(GPU_GRANULARITY_SLACK),
        "free memory not restored: {} before, {} after",
        before,
        after
    );
}
