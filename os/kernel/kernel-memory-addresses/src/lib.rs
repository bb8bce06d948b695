//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses, physical frames and
//! virtual pages used by the frame allocator and the page table engine.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM or MMIO). |
//! | [`VirtualAddress`] | A byte address in the current (paged) address space. |
//! | [`PhysicalFrame`] | A 4 KiB aligned unit of physical memory. |
//! | [`VirtualPage`] | A 4 KiB aligned unit of virtual address space. |
//!
//! Only 4 KiB granularity is modeled; huge pages are not used by the kernel.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_0000_0040_1234);
//! let page = VirtualPage::containing(va);
//! assert_eq!(page.start_address().as_u64(), 0x40_1000);
//! assert_eq!(page.start_address() + va.page_offset(), va);
//!
//! let frame = PhysicalFrame::containing(PhysicalAddress::new(0xb8123));
//! assert_eq!(frame.number(), 0xb8);
//! assert_eq!(frame.identity_page().number(), 0xb8);
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - All alignment and offset calculations are `const fn`.
//! - Physical and virtual addresses never convert into each other implicitly;
//!   the only bridge is [`PhysicalFrame::identity_page`], which states the
//!   identity-mapping intent explicitly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod physical_address;
mod physical_frame;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a frame / page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: u32 = 12;

/// Align `value` down to a multiple of `align` (power of two).
///
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0x1fff, 0x1000), 0x1000);
/// assert_eq!(align_down(0x2000, 0x1000), 0x2000);
/// ```
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Align `value` up to a multiple of `align` (power of two).
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0x1001, 0x1000), 0x2000);
/// assert_eq!(align_up(0x2000, 0x1000), 0x2000);
/// ```
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_frame_round_trip_through_numbers() {
        let frame = PhysicalFrame::from_number(0x1234);
        assert_eq!(frame.start_address().as_u64(), 0x1234_000);
        assert_eq!(PhysicalFrame::containing(frame.start_address() + 0xfff), frame);

        let page = VirtualPage::from_number(0x1234);
        assert_eq!(page.start_address().as_u64(), 0x1234_000);
        assert_eq!(frame.identity_page(), page);
    }

    #[test]
    fn higher_half_pages_stay_canonical() {
        let va = VirtualAddress::new(0xffff_ffff_ffff_f000);
        let page = VirtualPage::containing(va);
        assert_eq!(page.start_address(), va);
        assert!(page.start_address().is_canonical());
    }

    #[test]
    fn canonical_gap_is_rejected() {
        assert!(VirtualAddress::new(0x0000_7fff_ffff_ffff).is_canonical());
        assert!(!VirtualAddress::new(0x0000_8000_0000_0000).is_canonical());
        assert!(!VirtualAddress::new(0xffff_7fff_ffff_ffff).is_canonical());
        assert!(VirtualAddress::new(0xffff_8000_0000_0000).is_canonical());
    }

    #[test]
    fn frames_are_ordered_by_address() {
        let a = PhysicalFrame::containing(PhysicalAddress::new(0x1000));
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.start_address().as_u64(), 0x2000);
    }

    #[test]
    fn formatting_is_hex() {
        let pa = PhysicalAddress::new(0xb8000);
        assert_eq!(format!("{pa:?}"), "PA(0x00000000000B8000)");
        assert_eq!(format!("{pa}"), "0x00000000000B8000");
        let va = VirtualAddress::new(0xdead_beef_000);
        assert_eq!(format!("{va:?}"), "VA(0x00000DEADBEEF000)");
    }
}
