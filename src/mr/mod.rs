//! Device memory resources.
//!
//! [`DeviceMemoryResource`] is the allocation interface,
//! [`HipMemoryResource`] the direct runtime-backed implementation, and
//! the adaptors layer alignment and fallback policies over any resource.

pub mod aligned;
pub mod fallback;
pub mod hip;
pub mod resource;

pub use aligned::AlignedAdaptor;
pub use fallback::FallbackAdaptor;
pub use hip::HipMemoryResource;
pub use resource::{DeviceMemoryResource, DevicePtr};
