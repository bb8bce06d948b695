use crate::{PAGE_SHIFT, VirtualAddress};
use core::fmt;

/// Mask of the 36 page-number bits translated by 4-level paging.
const PAGE_NUMBER_MASK: u64 = (1 << 36) - 1;

/// A 4 KiB page of virtual address space.
///
/// Stores the start address rather than the page number so that pages in the
/// higher half keep their sign-extended (canonical) form.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(VirtualAddress);

impl VirtualPage {
    /// The page containing `address`.
    #[inline]
    #[must_use]
    pub const fn containing(address: VirtualAddress) -> Self {
        Self(VirtualAddress::new(
            address.as_u64() & !((1 << PAGE_SHIFT) - 1),
        ))
    }

    /// Page with the given number, as used for identity mappings of low memory.
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(VirtualAddress::new(number << PAGE_SHIFT))
    }

    /// The 36-bit page number (the canonical sign extension is dropped).
    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        (self.0.as_u64() >> PAGE_SHIFT) & PAGE_NUMBER_MASK
    }

    #[inline]
    #[must_use]
    pub const fn start_address(self) -> VirtualAddress {
        self.0
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page(0x{:016X})", self.0.as_u64())
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<VirtualPage> for VirtualAddress {
    #[inline]
    fn from(value: VirtualPage) -> Self {
        value.start_address()
    }
}
