//! # Page Tables and Table Indices
//!
//! - [`TableLevel`]: the four paging levels, level 4 being the root.
//! - [`TableIndex`]: a 9-bit slot number within one table.
//! - [`PageTable`]: a 4 KiB-aligned array of 512 entries.
//!
//! Live tables are only ever touched through raw pointers handed out by the
//! [`Mmu`](crate::Mmu); the helpers here read and write single entries
//! without creating references into memory the CPU also walks.

use crate::PageTableEntry;
use core::fmt;
use kernel_info::memory::RECURSIVE_INDEX;
use kernel_memory_addresses::VirtualPage;

/// Number of entries per table.
pub const ENTRY_COUNT: usize = 512;

/// One of the four paging levels.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum TableLevel {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl TableLevel {
    /// Levels in walk order, root first.
    pub const WALK: [Self; 4] = [Self::Four, Self::Three, Self::Two, Self::One];

    #[inline]
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// The level of the tables this level's entries point to.
    ///
    /// Level 1 entries point at data frames; the level stays at `One`.
    #[inline]
    #[must_use]
    pub const fn below(self) -> Self {
        match self {
            Self::Four => Self::Three,
            Self::Three => Self::Two,
            Self::Two | Self::One => Self::One,
        }
    }

    /// The slot `page` selects at this level (VA bits `12 + 9 * (level - 1)`
    /// and up).
    ///
    /// ```rust
    /// # use kernel_memory_addresses::{VirtualAddress, VirtualPage};
    /// # use kernel_vmem::TableLevel;
    /// let page = VirtualPage::containing(VirtualAddress::new(0x0000_0dea_dbee_f000));
    /// assert_eq!(TableLevel::Four.index_of(page).as_usize(), 27);
    /// assert_eq!(TableLevel::One.index_of(page).as_usize(), 0xef);
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, page: VirtualPage) -> TableIndex {
        let shift = 12 + 9 * (self as u64 - 1);
        TableIndex::new(((page.start_address().as_u64() >> shift) & 0x1ff) as u16)
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Slot number within a page table, `0..512`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

impl TableIndex {
    /// The level-4 slot that points back at the level-4 table.
    pub const RECURSIVE: Self = Self::new(RECURSIVE_INDEX);

    /// ### Debug assertions
    /// - Asserts `v < 512` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!((v as usize) < ENTRY_COUNT);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page table of any level: 512 entries, one frame in size.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRY_COUNT],
}

const _: () = assert!(size_of::<PageTable>() == 4096);

impl PageTable {
    /// Read the entry at `index`.
    ///
    /// # Safety
    /// `table` must point to a mapped, readable page table.
    #[inline]
    #[must_use]
    pub unsafe fn read(table: *const Self, index: TableIndex) -> PageTableEntry {
        unsafe {
            table
                .cast::<PageTableEntry>()
                .add(index.as_usize())
                .read_volatile()
        }
    }

    /// Overwrite the entry at `index`.
    ///
    /// # Safety
    /// `table` must point to a mapped, writable page table. The caller is
    /// responsible for any TLB maintenance the change requires.
    #[inline]
    pub unsafe fn write(table: *mut Self, index: TableIndex, entry: PageTableEntry) {
        unsafe {
            table
                .cast::<PageTableEntry>()
                .add(index.as_usize())
                .write_volatile(entry);
        }
    }

    /// Mark every entry absent.
    ///
    /// # Safety
    /// See [`PageTable::write`].
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn zero(table: *mut Self) {
        for index in 0..ENTRY_COUNT {
            unsafe { Self::write(table, TableIndex::new(index as u16), PageTableEntry::new()) };
        }
    }

    /// Whether every entry is absent.
    ///
    /// # Safety
    /// See [`PageTable::read`].
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub unsafe fn is_empty(table: *const Self) -> bool {
        (0..ENTRY_COUNT)
            .all(|index| unsafe { Self::read(table, TableIndex::new(index as u16)) }.is_unused())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};

    #[test]
    fn indices_follow_the_level_shift() {
        let page = VirtualPage::containing(VirtualAddress::new(0x0000_4444_4444_0000));
        assert_eq!(TableLevel::Four.index_of(page).as_usize(), 0x88);
        assert_eq!(TableLevel::Three.index_of(page).as_usize(), 0x111);
        assert_eq!(TableLevel::Two.index_of(page).as_usize(), 0x22);
        assert_eq!(TableLevel::One.index_of(page).as_usize(), 0x40);
    }

    #[test]
    fn higher_half_indices_ignore_sign_extension() {
        let page = VirtualPage::containing(VirtualAddress::new(0xffff_ffff_ffff_f000));
        for level in TableLevel::WALK {
            assert_eq!(level.index_of(page), TableIndex::RECURSIVE);
        }
    }

    #[test]
    fn raw_entry_access() {
        let mut table = PageTable {
            entries: [PageTableEntry::new(); ENTRY_COUNT],
        };
        let ptr: *mut PageTable = &raw mut table;
        unsafe {
            assert!(PageTable::is_empty(ptr));
            PageTable::write(ptr, TableIndex::new(3), PageTableEntry::table(PhysicalFrame::from_number(9)));
            assert!(!PageTable::is_empty(ptr));
            assert_eq!(PageTable::read(ptr, TableIndex::new(3)).frame().number(), 9);
            PageTable::zero(ptr);
            assert!(PageTable::is_empty(ptr));
        }
    }
}
