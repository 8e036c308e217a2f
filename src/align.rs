//! Alignment arithmetic for device allocations.

/// Alignment every device memory resource guarantees, in bytes.
///
/// Matches the strongest alignment the HIP allocator itself hands out,
/// so a resource that forwards straight to `hipMalloc` satisfies it
/// without adjustment.
pub const DEVICE_ALLOCATION_ALIGNMENT: usize = 256;

/// Whether `alignment` can be requested at all. Only powers of two are
/// meaningful for address arithmetic.
pub fn is_supported_alignment(alignment: usize) -> bool {
    alignment.is_power_of_two()
}

/// Rounds `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be a power of two. Intended for addresses, where
/// the padding the caller reserved makes overflow unreachable.
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(is_supported_alignment(alignment));
    (value + alignment - 1) & !(alignment - 1)
}

/// Rounds `value` down to the nearest multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(is_supported_alignment(alignment));
    value & !(alignment - 1)
}

/// Whether `value` is a multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(is_supported_alignment(alignment));
    value & (alignment - 1) == 0
}

/// Rounds `value` up to the nearest multiple of `alignment`, or `None`
/// if the rounded value does not fit in a `usize`. For size math on
/// caller-supplied byte counts.
pub fn checked_align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(is_supported_alignment(alignment));
    value.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}
