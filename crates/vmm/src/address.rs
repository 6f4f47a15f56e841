//! Address types for the simulated physical store and per-process virtual address spaces.
//!
//! Both types are plain newtypes over `usize`. Virtual addresses are not validated on
//! construction: a break pointer may legitimately sit one past the end of the virtual space,
//! and an out-of-range address simply never translates.

use core::fmt;
use core::ops::{Add, Sub};

use crate::{FrameNumber, layout};

/// Macro to define common address type functionality.
///
/// This macro generates the basic structure and methods common to both physical
/// and virtual address types, reducing code duplication.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new address.
            #[inline]
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Returns the offset of this address within its page.
            #[inline]
            pub const fn page_offset(self) -> usize {
                layout::page_offset(self.0)
            }

            /// Checks if the address is aligned to a page boundary.
            #[inline]
            pub const fn is_page_aligned(self) -> bool {
                self.page_offset() == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#07x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#07x}", self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(addr: usize) -> Self {
                Self::new(addr)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(addr: $name) -> Self {
                addr.0
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                Self::new(self.0 + rhs)
            }
        }

        impl Sub<usize> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: usize) -> Self::Output {
                Self::new(self.0 - rhs)
            }
        }

        impl Sub<$name> for $name {
            type Output = usize;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "An address in the simulated physical store.\n\n\
     The high bits select a frame, the low `OFFSET_BITS` bits select a byte inside it."
);

impl PhysicalAddress {
    /// Builds the physical address of byte `offset` inside `frame`.
    #[inline]
    pub const fn from_parts(frame: FrameNumber, offset: usize) -> Self {
        Self((frame.as_usize() << layout::OFFSET_BITS) | layout::page_offset(offset))
    }

    /// Returns the frame this address falls in.
    #[inline]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(self.0 >> layout::OFFSET_BITS)
    }
}

impl_address_common!(
    VirtualAddress,
    "An address in a process's virtual address space.\n\n\
     Split into a segment index (first-level table), a page index (second-level table)\n\
     and a page offset."
);

impl VirtualAddress {
    /// The address that is never handed out by the allocator.
    pub const NULL: Self = Self(0);

    /// Returns true if this is [`VirtualAddress::NULL`].
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the first-level (segment) index.
    #[inline]
    pub const fn segment_index(self) -> usize {
        layout::segment_index(self.0)
    }

    /// Returns the second-level (page) index.
    #[inline]
    pub const fn page_index(self) -> usize {
        layout::page_index(self.0)
    }

    /// Returns the address of the `n`th page after the page containing this address.
    #[inline]
    pub const fn nth_page(self, n: usize) -> Self {
        Self(self.0 + n * layout::PAGE_SIZE)
    }
}
