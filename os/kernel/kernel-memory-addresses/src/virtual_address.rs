use crate::PAGE_SIZE;
use core::fmt;
use core::ops::{Add, AddAssign};

/// Highest address of the lower canonical half.
const LOWER_HALF_END: u64 = 0x0000_7fff_ffff_ffff;

/// Lowest address of the higher canonical half.
const HIGHER_HALF_START: u64 = 0xffff_8000_0000_0000;

/// Virtual memory address.
///
/// With 4-level paging only 48 bits are translated; bits 48..=63 must be
/// copies of bit 47. Addresses that violate this rule fall into the
/// non-canonical gap and are never valid; see [`VirtualAddress::is_canonical`].
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize as u64)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the address lies in one of the two canonical halves.
    ///
    /// ```rust
    /// # use kernel_memory_addresses::VirtualAddress;
    /// assert!(VirtualAddress::new(0xdead_beef_000).is_canonical());
    /// assert!(!VirtualAddress::new(0x0000_8000_0000_0000).is_canonical());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_canonical(self) -> bool {
        self.0 <= LOWER_HALF_END || self.0 >= HIGHER_HALF_START
    }

    /// Byte offset within the containing page.
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0 & (PAGE_SIZE - 1)
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
