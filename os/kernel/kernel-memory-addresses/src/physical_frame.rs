use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress, VirtualPage};
use core::fmt;

/// A 4 KiB aligned frame of physical memory.
///
/// Frames are identified by their frame number (`address >> 12`). The frame
/// allocator hands them out and page table entries store their numbers.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(u64);

impl PhysicalFrame {
    /// The frame containing `address`.
    #[inline]
    #[must_use]
    pub const fn containing(address: PhysicalAddress) -> Self {
        Self(address.as_u64() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(number)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn start_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }

    /// One past the last byte of the frame.
    #[inline]
    #[must_use]
    pub const fn end_address(self) -> PhysicalAddress {
        PhysicalAddress::new((self.0 << PAGE_SHIFT) + PAGE_SIZE)
    }

    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The virtual page with the same number, i.e. where this frame lives
    /// under an identity mapping.
    #[inline]
    #[must_use]
    pub const fn identity_page(self) -> VirtualPage {
        VirtualPage::from_number(self.0)
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(0x{:016X})", self.start_address().as_u64())
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.start_address(), f)
    }
}

impl From<PhysicalFrame> for PhysicalAddress {
    #[inline]
    fn from(value: PhysicalFrame) -> Self {
        value.start_address()
    }
}
