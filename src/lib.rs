//! rocmem - Device memory resources for AMD GPUs
//!
//! Allocation in this crate goes through the
//! [`DeviceMemoryResource`](mr::DeviceMemoryResource) trait:
//! [`HipMemoryResource`](mr::HipMemoryResource) forwards straight to
//! the HIP runtime, and adaptors compose policies over any resource,
//! alignment with [`AlignedAdaptor`](mr::AlignedAdaptor) and
//! out-of-memory fallback with [`FallbackAdaptor`](mr::FallbackAdaptor).
//! [`DeviceBuffer`](buffer::DeviceBuffer) owns a resizable allocation
//! obtained from whichever resource it is given.
//!
//! With the `rocm` feature the crate links against `amdhip64`. Without
//! it, a host-memory shim with the same symbols and status codes backs
//! the whole API, so everything is testable on machines with no GPU.

pub mod align;
pub mod buffer;
pub mod device;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod mr;
pub mod stream;

pub use buffer::DeviceBuffer;
pub use error::{DeviceMemoryError, MemResult};
pub use mr::{AlignedAdaptor, DeviceMemoryResource, DevicePtr, FallbackAdaptor, HipMemoryResource};
pub use stream::{HipStream, StreamToken};
