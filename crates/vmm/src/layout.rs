//! Geometry of the simulated machine.
//!
//! The simulated machine uses 20-bit virtual addresses split into three fields:
//! - Bits 0-9: Page offset (1 KiB pages)
//! - Bits 10-14: Page index (second-level table)
//! - Bits 15-19: Segment index (first-level table)
//!
//! Physical memory is 1 MiB, carved into 1024 frames of one page each. The per-process
//! virtual ceiling reuses `RAM_SIZE`, so a single process can never map more than the whole
//! of physical memory.

/// Number of bits in the page offset.
pub const OFFSET_BITS: usize = 10;

/// Number of bits in the page (second-level) index.
pub const PAGE_BITS: usize = 5;

/// Number of bits in the segment (first-level) index.
pub const SEGMENT_BITS: usize = 5;

/// Total number of bits in a virtual address.
pub const ADDRESS_BITS: usize = 20;

/// Page size in bytes (1 KiB = 2^10).
pub const PAGE_SIZE: usize = 1 << OFFSET_BITS;

/// Number of physical frames.
pub const NUM_PAGES: usize = 1 << (ADDRESS_BITS - OFFSET_BITS);

/// Size of the physical store in bytes.
pub const RAM_SIZE: usize = 1 << ADDRESS_BITS;

/// Maximum number of entries in a first-level table.
pub const SEGMENT_ENTRIES: usize = 1 << SEGMENT_BITS;

/// Maximum number of entries in a second-level table.
pub const PAGE_ENTRIES: usize = 1 << PAGE_BITS;

/// Capacity of a [`ProcessQueue`](crate::ProcessQueue).
pub const MAX_QUEUE_SIZE: usize = 10;

const _: () = assert!(ADDRESS_BITS == OFFSET_BITS + PAGE_BITS + SEGMENT_BITS);
const _: () = assert!(RAM_SIZE == NUM_PAGES * PAGE_SIZE);

/// Returns the offset of `address` within its page.
#[inline]
pub const fn page_offset(address: usize) -> usize {
    address & (PAGE_SIZE - 1)
}

/// Returns the second-level (page) index of `address`.
#[inline]
pub const fn page_index(address: usize) -> usize {
    (address >> OFFSET_BITS) & (PAGE_ENTRIES - 1)
}

/// Returns the first-level (segment) index of `address`.
///
/// Bits above [`ADDRESS_BITS`] are kept, so an address past the end of the virtual space
/// yields a segment index that no table will ever contain.
#[inline]
pub const fn segment_index(address: usize) -> usize {
    address >> (OFFSET_BITS + PAGE_BITS)
}

/// Returns the number of pages needed to hold `size` bytes.
#[inline]
pub const fn pages_for(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}
