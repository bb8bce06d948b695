//! # Recursive Table Addressing
//!
//! Slot 511 of the active level-4 table points at the level-4 table itself.
//! A walk through that slot stops one level early, so the tables become
//! ordinary memory at fixed virtual addresses:
//!
//! ```text
//! level 4 table             511 | 511 | 511 | 511
//! level 3 table for (a)     511 | 511 | 511 |  a
//! level 2 table for (a,b)   511 | 511 |  a  |  b
//! level 1 table for (a,b,c) 511 |  a  |  b  |  c
//! ```
//!
//! Each child address is derived from its parent as
//! `(parent << 9) | (index << 12)`. Because the first index is always 511,
//! every derived address stays in the canonical higher half.

use crate::table::{TableIndex, TableLevel};
use core::fmt;
use kernel_info::memory::TABLE4_ADDRESS;
use kernel_memory_addresses::VirtualAddress;

/// A page table of the active hierarchy, identified by where the recursive
/// slot makes it visible.
///
/// No pointer is stored: whether the address resolves to a table depends on
/// the current state of slot 511, which this type cannot know.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct RecursiveTable {
    address: VirtualAddress,
    level: TableLevel,
}

impl RecursiveTable {
    /// The active level-4 table.
    pub const ROOT: Self = Self {
        address: VirtualAddress::new(TABLE4_ADDRESS),
        level: TableLevel::Four,
    };

    /// The table that entry `index` of this table points to.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn child(self, index: TableIndex) -> Self {
        debug_assert!(!matches!(self.level, TableLevel::One));
        Self {
            address: VirtualAddress::new(
                (self.address.as_u64() << 9) | ((index.as_u16() as u64) << 12),
            ),
            level: self.level.below(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn address(self) -> VirtualAddress {
        self.address
    }

    #[inline]
    #[must_use]
    pub const fn level(self) -> TableLevel {
        self.level
    }
}

impl fmt::Debug for RecursiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}@{:?}", self.level, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualPage;

    #[test]
    fn child_addresses_shift_in_the_index() {
        let t3 = RecursiveTable::ROOT.child(TableIndex::new(0));
        assert_eq!(t3.address().as_u64(), 0xffff_ffff_ffe0_0000);
        assert_eq!(t3.level(), TableLevel::Three);

        let t2 = t3.child(TableIndex::new(1));
        assert_eq!(t2.address().as_u64(), 0xffff_ffff_c000_1000);

        let t1 = t2.child(TableIndex::new(2));
        assert_eq!(t1.address().as_u64(), 0xffff_ff80_0020_2000);
        assert_eq!(t1.level(), TableLevel::One);
        assert!(t1.address().is_canonical());
    }

    #[test]
    fn root_is_its_own_recursive_child() {
        assert_eq!(
            RecursiveTable::ROOT.child(TableIndex::RECURSIVE).address(),
            RecursiveTable::ROOT.address()
        );
    }

    #[test]
    fn tables_for_the_scratch_page() {
        let page = VirtualPage::containing(VirtualAddress::new(0x0000_0dea_dbee_f000));
        let t1 = [TableLevel::Four, TableLevel::Three, TableLevel::Two]
            .into_iter()
            .fold(RecursiveTable::ROOT, |table, level| table.child(level.index_of(page)));
        assert_eq!(t1.level(), TableLevel::One);
        assert_eq!(t1.address().as_u64(), 0xffff_ff86_f56d_f000);
    }
}
