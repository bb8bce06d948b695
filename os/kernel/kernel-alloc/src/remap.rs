//! # Kernel Remap
//!
//! Builds a fresh level-4 hierarchy that identity-maps exactly the
//! whitelisted regions, then switches the CPU to it.
//!
//! The new hierarchy is populated with the ordinary mapping operations. The
//! trick is the recursive slot: while slot 511 of the *active* level-4 table
//! points at the new root, every recursive table address resolves into the
//! new hierarchy. The old root stays reachable through the scratch page, so
//! the slot can be restored afterwards.
//!
//! ```text
//!   active L4 (old)             new L4
//!   ┌───────────┐             ┌───────────┐
//!   │ [27] ─────┼──► scratch  │           │
//!   │ [511] ────┼────────────►│ [511] ──┐ │
//!   └───────────┘             └─────────┼─┘
//!                                  ▲    │
//!                                  └────┘
//! ```
//!
//! Once populated, [`commit_address_space`] turns on `NX` and write
//! protection, loads the new root and unmaps the identity page of the old
//! root, which is what sits directly below the boot stack.

use crate::{FrameAllocator, TempFramePool};
use kernel_info::memory::TEMP_PAGE_ADDRESS;
use kernel_info::region::MemoryRegion;
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress, VirtualPage};
use kernel_vmem::{
    CreatedTables, FrameSink, Mmu, PageTable, PageTableEntry, RecursivePageTable, RetainFrame,
    TableIndex, UnmapPolicy,
};
use log::{debug, info, trace};

/// The page used to reach frames that are not mapped yet.
pub const SCRATCH_PAGE: VirtualPage = VirtualPage::containing(VirtualAddress::new(TEMP_PAGE_ADDRESS));

/// Leaf flags for a region: writable if the region is, `NX` unless it is
/// executable.
#[must_use]
pub const fn region_flags(region: &MemoryRegion) -> PageTableEntry {
    PageTableEntry::new()
        .with_writable(region.writable)
        .with_no_execute(!region.executable)
}

/// Build a new level-4 hierarchy identity-mapping `regions` and return its
/// root frame.
///
/// The active hierarchy is left as it was found: slot 511 points at the old
/// root again, the scratch page is unmapped and its tables are back in
/// `temp`. Tables of the new hierarchy come from `frames`.
///
/// Every frame of every region is mapped exactly once; regions that share a
/// frame are fatal.
pub fn remap_kernel<M: Mmu>(
    mmu: &mut M,
    frames: &mut FrameAllocator,
    temp: &mut TempFramePool,
    regions: &[MemoryRegion],
) -> PhysicalFrame {
    let old_root = mmu.root();
    let new_root = frames.allocate_frame();
    debug!("remapping kernel: {old_root:?} -> {new_root:?}");

    let mut table = RecursivePageTable::new(mmu);

    // New root: empty except for its own recursive slot.
    let (scratch, created) = open_scratch(&mut table, new_root, temp);
    unsafe {
        PageTable::zero(scratch);
        PageTable::write(scratch, TableIndex::RECURSIVE, PageTableEntry::table(new_root));
    }
    close_scratch(&mut table, created, temp);

    // Point the active slot 511 at the new root, keeping the old root
    // reachable through the scratch page.
    let (scratch, created) = open_scratch(&mut table, old_root, temp);
    unsafe { PageTable::write(scratch, TableIndex::RECURSIVE, PageTableEntry::table(new_root)) };
    table.mmu().flush_all();

    for region in regions {
        trace!("identity mapping {region:?}");
        let flags = region_flags(region);
        for frame in region.frames() {
            table.identity_map(frame, flags, frames);
        }
    }

    let scratch = table.mmu().table_ptr(SCRATCH_PAGE.start_address());
    unsafe { PageTable::write(scratch, TableIndex::RECURSIVE, PageTableEntry::table(old_root)) };
    table.mmu().flush_all();
    close_scratch(&mut table, created, temp);

    info!("new page table hierarchy at {new_root:?}");
    new_root
}

/// Switch the CPU to the hierarchy rooted at `new_root`.
///
/// Enables `NX` and write protection, loads the root, and unmaps the
/// identity page of `old_root`. That page lies directly below the boot
/// stack, so an overflow faults instead of corrupting memory. The new
/// hierarchy must map `old_root`'s frame.
pub fn commit_address_space<M: Mmu>(
    mmu: &mut M,
    new_root: PhysicalFrame,
    old_root: PhysicalFrame,
    frames: &mut dyn FrameSink,
) {
    mmu.enable_no_execute();
    mmu.enable_write_protect();
    mmu.set_root(new_root);
    info!("switched to {new_root:?}");

    RecursivePageTable::new(mmu).unmap_page(old_root.identity_page(), frames, UnmapPolicy::HaltOnMissing);
    debug!("guard page at {:?}", old_root.start_address());
}

fn open_scratch<M: Mmu>(
    table: &mut RecursivePageTable<'_, M>,
    frame: PhysicalFrame,
    temp: &mut TempFramePool,
) -> (*mut PageTable, CreatedTables) {
    let writable = PageTableEntry::new().with_writable(true);
    let created = table.map_page_to_frame(SCRATCH_PAGE, frame, writable, temp);
    (table.mmu().table_ptr(SCRATCH_PAGE.start_address()), created)
}

/// Unmap the scratch page without giving its frame away and return the
/// tables opening it created to the pool.
fn close_scratch<M: Mmu>(
    table: &mut RecursivePageTable<'_, M>,
    created: CreatedTables,
    temp: &mut TempFramePool,
) {
    table.unmap_page(SCRATCH_PAGE, &mut RetainFrame, UnmapPolicy::HaltOnMissing);
    table.release_empty_tables(SCRATCH_PAGE, created, temp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::TableLevel;

    #[test]
    fn scratch_page_uses_its_own_level4_slot() {
        assert_eq!(SCRATCH_PAGE.start_address().as_u64(), 0xdea_dbee_f000);
        let slot = TableLevel::Four.index_of(SCRATCH_PAGE);
        assert_eq!(slot.as_u16(), 27);
        assert_ne!(slot, TableIndex::RECURSIVE);
    }

    #[test]
    fn region_flags_follow_permissions() {
        let text = MemoryRegion::from_range(0, 0x1000).with_executable(true);
        let data = MemoryRegion::from_range(0, 0x1000).with_writable(true);
        assert!(!region_flags(&text).writable());
        assert!(!region_flags(&text).no_execute());
        assert!(region_flags(&data).writable());
        assert!(region_flags(&data).no_execute());
    }
}
