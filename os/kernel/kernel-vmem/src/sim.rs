//! # Simulated MMU
//!
//! A host-side stand-in for the paging hardware. Physical memory is a sparse
//! set of zero-initialised frames that come into existence on first use;
//! every table pointer the engine asks for is resolved by walking the
//! simulated hierarchy from the root register, exactly as the CPU resolves a
//! recursive address.
//!
//! The simulator also keeps a translation cache. A resolved page stays
//! cached until it is flushed, so code that forgets a TLB flush after
//! changing a mapping keeps seeing the old frame, as it would on hardware.
//! Touching an address without a present translation is a page fault and
//! panics.
//!
//! ```rust
//! # use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};
//! # use kernel_vmem::{Mmu, RecursiveTable, sim::SimulatedMmu};
//! let root = PhysicalFrame::from_number(0x100);
//! let mmu = SimulatedMmu::new(root);
//! assert_eq!(mmu.root(), root);
//! assert_eq!(mmu.walk(RecursiveTable::ROOT.address()), Some(root));
//! ```

use crate::{Mmu, PageTable, PageTableEntry, TableIndex, TableLevel};
use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use alloc::collections::BTreeMap;
use core::ptr::NonNull;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};

pub struct SimulatedMmu {
    memory: BTreeMap<u64, NonNull<PageTable>>,
    root: PhysicalFrame,
    tlb: BTreeMap<VirtualPage, PhysicalFrame>,
    page_flushes: usize,
    full_flushes: usize,
    no_execute: bool,
    write_protect: bool,
}

impl SimulatedMmu {
    /// A machine whose active level-4 table lives in `root`, empty except for
    /// the recursive slot.
    #[must_use]
    pub fn new(root: PhysicalFrame) -> Self {
        let mut mmu = Self {
            memory: BTreeMap::new(),
            root,
            tlb: BTreeMap::new(),
            page_flushes: 0,
            full_flushes: 0,
            no_execute: false,
            write_protect: false,
        };
        mmu.set_entry(root, TableIndex::RECURSIVE, PageTableEntry::table(root));
        mmu
    }

    fn frame_ptr(&mut self, frame: PhysicalFrame) -> *mut PageTable {
        self.memory
            .entry(frame.number())
            .or_insert_with(|| {
                let layout = Layout::new::<PageTable>();
                let ptr = unsafe { alloc_zeroed(layout) }.cast::<PageTable>();
                NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout))
            })
            .as_ptr()
    }

    /// Entry `index` of the table stored in physical `frame`.
    #[must_use]
    pub fn entry(&self, frame: PhysicalFrame, index: TableIndex) -> PageTableEntry {
        self.memory
            .get(&frame.number())
            .map_or(PageTableEntry::new(), |table| unsafe {
                PageTable::read(table.as_ptr(), index)
            })
    }

    /// Write a table entry directly into physical memory, bypassing
    /// translation. Used to stage boot-time layouts.
    pub fn set_entry(&mut self, frame: PhysicalFrame, index: TableIndex, entry: PageTableEntry) {
        let table = self.frame_ptr(frame);
        unsafe { PageTable::write(table, index, entry) };
    }

    /// The leaf entry for `page`, walking physical memory from the root
    /// without consulting the translation cache.
    #[must_use]
    pub fn leaf_entry(&self, page: VirtualPage) -> Option<PageTableEntry> {
        let mut table = self.root;
        for level in TableLevel::WALK {
            let entry = self.entry(table, level.index_of(page));
            if !entry.present() || entry.huge_page() {
                return None;
            }
            if level == TableLevel::One {
                return Some(entry);
            }
            table = entry.frame();
        }
        None
    }

    /// The frame backing `address`, walked from the root like the CPU would.
    #[must_use]
    pub fn walk(&self, address: VirtualAddress) -> Option<PhysicalFrame> {
        self.leaf_entry(VirtualPage::containing(address))
            .map(PageTableEntry::frame)
    }

    /// Physical address of `address` in the active hierarchy.
    #[must_use]
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        self.walk(address)
            .map(|frame| frame.start_address() + address.page_offset())
    }

    /// Whether the translation for the page containing `address` is cached.
    #[must_use]
    pub fn is_cached(&self, address: VirtualAddress) -> bool {
        self.tlb.contains_key(&VirtualPage::containing(address))
    }

    #[must_use]
    pub const fn page_flushes(&self) -> usize {
        self.page_flushes
    }

    #[must_use]
    pub const fn full_flushes(&self) -> usize {
        self.full_flushes
    }

    #[must_use]
    pub const fn no_execute_enabled(&self) -> bool {
        self.no_execute
    }

    #[must_use]
    pub const fn write_protect_enabled(&self) -> bool {
        self.write_protect
    }
}

impl Mmu for SimulatedMmu {
    fn table_ptr(&mut self, address: VirtualAddress) -> *mut PageTable {
        let page = VirtualPage::containing(address);
        let frame = match self.tlb.get(&page) {
            Some(frame) => *frame,
            None => {
                let Some(frame) = self.walk(address) else {
                    panic!("page fault at {address:?}");
                };
                self.tlb.insert(page, frame);
                frame
            }
        };
        self.frame_ptr(frame)
    }

    fn flush_page(&mut self, address: VirtualAddress) {
        self.tlb.remove(&VirtualPage::containing(address));
        self.page_flushes += 1;
    }

    fn flush_all(&mut self) {
        self.tlb.clear();
        self.full_flushes += 1;
    }

    fn root(&self) -> PhysicalFrame {
        self.root
    }

    fn set_root(&mut self, frame: PhysicalFrame) {
        self.root = frame;
        self.tlb.clear();
    }

    fn enable_no_execute(&mut self) {
        self.no_execute = true;
    }

    fn enable_write_protect(&mut self) {
        self.write_protect = true;
    }
}

impl Drop for SimulatedMmu {
    fn drop(&mut self) {
        let layout = Layout::new::<PageTable>();
        for table in self.memory.values() {
            unsafe { dealloc(table.as_ptr().cast(), layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecursiveTable;

    const ROOT: PhysicalFrame = PhysicalFrame::from_number(0x100);

    #[test]
    fn recursive_slot_resolves_to_the_root() {
        let mut mmu = SimulatedMmu::new(ROOT);
        let via_root = mmu.table_ptr(RecursiveTable::ROOT.address());
        let via_child = mmu.table_ptr(RecursiveTable::ROOT.child(TableIndex::RECURSIVE).address());
        assert_eq!(via_root, via_child);
        let entry = unsafe { PageTable::read(via_root, TableIndex::RECURSIVE) };
        assert_eq!(entry.frame(), ROOT);
    }

    #[test]
    #[should_panic(expected = "page fault")]
    fn absent_translation_faults() {
        let mut mmu = SimulatedMmu::new(ROOT);
        mmu.table_ptr(VirtualAddress::new(0x1000));
    }

    #[test]
    fn stale_translations_survive_until_flushed() {
        let mut mmu = SimulatedMmu::new(ROOT);
        let other = PhysicalFrame::from_number(0x200);
        let address = RecursiveTable::ROOT.address();

        mmu.table_ptr(address);
        assert!(mmu.is_cached(address));
        mmu.set_entry(ROOT, TableIndex::RECURSIVE, PageTableEntry::table(other));

        let stale = mmu.table_ptr(address);
        assert_eq!(stale, mmu.frame_ptr(ROOT));

        mmu.flush_page(address);
        assert!(!mmu.is_cached(address));
        assert_eq!(mmu.page_flushes(), 1);
    }

    #[test]
    fn set_root_drops_cached_translations() {
        let mut mmu = SimulatedMmu::new(ROOT);
        let address = RecursiveTable::ROOT.address();
        mmu.table_ptr(address);

        let next = PhysicalFrame::from_number(0x300);
        mmu.set_entry(next, TableIndex::RECURSIVE, PageTableEntry::table(next));
        mmu.set_root(next);

        assert!(!mmu.is_cached(address));
        assert_eq!(mmu.walk(address), Some(next));
    }
}
