//! # Page Table Engine
//!
//! Translation, mapping and unmapping on the hierarchy the recursive slot
//! currently designates. Every table is reached through its
//! [`RecursiveTable`] address; nothing here holds on to a table pointer
//! across calls.

use crate::frames::{FrameSink, FrameSource};
use crate::{Mmu, PageTable, PageTableEntry, PagingError, RecursiveTable, TableIndex, TableLevel};
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
use log::{debug, trace};

/// What [`RecursivePageTable::unmap_page`] does when the page has no mapping.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnmapPolicy {
    /// An absent table or leaf is expected; return quietly.
    IgnoreMissing,
    /// An absent table or leaf is a logic error; halt.
    HaltOnMissing,
}

/// The levels at which a mapping had to create a table.
///
/// Returned by [`RecursivePageTable::map_page_to_frame`] so that
/// [`RecursivePageTable::release_empty_tables`] only unlinks tables the
/// mapping brought in.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CreatedTables(u8);

impl CreatedTables {
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    const fn with(self, level: TableLevel) -> Self {
        Self(self.0 | (1 << level.number()))
    }

    #[must_use]
    pub const fn contains(self, level: TableLevel) -> bool {
        self.0 & (1 << level.number()) != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The active page table hierarchy, reached through slot 511.
pub struct RecursivePageTable<'m, M: Mmu> {
    mmu: &'m mut M,
}

impl<'m, M: Mmu> RecursivePageTable<'m, M> {
    pub const fn new(mmu: &'m mut M) -> Self {
        Self { mmu }
    }

    pub const fn mmu(&mut self) -> &mut M {
        &mut *self.mmu
    }

    fn read(&mut self, table: RecursiveTable, index: TableIndex) -> PageTableEntry {
        let ptr = self.mmu.table_ptr(table.address());
        unsafe { PageTable::read(ptr, index) }
    }

    fn write(&mut self, table: RecursiveTable, index: TableIndex, entry: PageTableEntry) {
        let ptr = self.mmu.table_ptr(table.address());
        unsafe { PageTable::write(ptr, index, entry) };
    }

    /// The table entry `index` of `table` points to, if present.
    fn next_table(
        &mut self,
        table: RecursiveTable,
        index: TableIndex,
        page: VirtualPage,
    ) -> Result<RecursiveTable, PagingError> {
        let entry = self.read(table, index);
        if !entry.present() {
            return Err(PagingError::MissingTable {
                level: table.level().below(),
                page,
            });
        }
        if entry.huge_page() {
            return Err(PagingError::HugePage {
                level: table.level(),
                index,
            });
        }
        Ok(table.child(index))
    }

    /// The child table behind entry `index` of `parent`, created from
    /// `frames` if the entry is absent.
    ///
    /// A new table is zeroed and linked present and writable. A huge-page
    /// entry is fatal.
    pub fn get_or_create_table(
        &mut self,
        parent: RecursiveTable,
        index: TableIndex,
        frames: &mut dyn FrameSource,
    ) -> RecursiveTable {
        self.table_or_create(parent, index, frames).0
    }

    /// [`get_or_create_table`](Self::get_or_create_table), also telling
    /// whether the table was created.
    fn table_or_create(
        &mut self,
        parent: RecursiveTable,
        index: TableIndex,
        frames: &mut dyn FrameSource,
    ) -> (RecursiveTable, bool) {
        let entry = self.read(parent, index);
        if entry.huge_page() {
            PagingError::HugePage {
                level: parent.level(),
                index,
            }
            .fatal();
        }

        let child = parent.child(index);
        if !entry.present() {
            let frame = frames.allocate_frame();
            debug!(
                "creating level {} table in {frame:?} (entry {index} of {parent:?})",
                child.level()
            );
            self.write(parent, index, PageTableEntry::table(frame));
            self.mmu.flush_page(child.address());
            let table = self.mmu.table_ptr(child.address());
            unsafe { PageTable::zero(table) };
        }
        (child, !entry.present())
    }

    /// Map `page` to `frame` with the leaf `flags`, creating missing tables
    /// from `frames`.
    ///
    /// `present` is forced on. Mapping a page whose leaf entry is not zero is
    /// fatal; unmap it first. Returns the levels whose table was created.
    pub fn map_page_to_frame(
        &mut self,
        page: VirtualPage,
        frame: PhysicalFrame,
        flags: PageTableEntry,
        frames: &mut dyn FrameSource,
    ) -> CreatedTables {
        let mut table = RecursiveTable::ROOT;
        let mut created = CreatedTables::none();
        for level in [TableLevel::Four, TableLevel::Three, TableLevel::Two] {
            let (child, new) = self.table_or_create(table, level.index_of(page), frames);
            if new {
                created = created.with(child.level());
            }
            table = child;
        }

        let index = TableLevel::One.index_of(page);
        let existing = self.read(table, index);
        if !existing.is_unused() {
            PagingError::AlreadyMapped {
                page,
                frame: existing.frame(),
            }
            .fatal();
        }

        trace!("mapping {page:?} -> {frame:?}");
        self.write(table, index, PageTableEntry::leaf(frame, flags));
        created
    }

    /// Map the page whose number equals `frame`'s number onto `frame`.
    pub fn identity_map(
        &mut self,
        frame: PhysicalFrame,
        flags: PageTableEntry,
        frames: &mut dyn FrameSource,
    ) -> CreatedTables {
        self.map_page_to_frame(frame.identity_page(), frame, flags, frames)
    }

    /// Remove the mapping of `page` and hand its frame to `sink`.
    ///
    /// An absent intermediate table or leaf either returns quietly or is
    /// fatal, as `policy` says. A huge-page entry on the way is fatal.
    pub fn unmap_page(&mut self, page: VirtualPage, sink: &mut dyn FrameSink, policy: UnmapPolicy) {
        let mut table = RecursiveTable::ROOT;
        for level in [TableLevel::Four, TableLevel::Three, TableLevel::Two] {
            table = match self.next_table(table, level.index_of(page), page) {
                Ok(next) => next,
                Err(err @ PagingError::MissingTable { .. }) => {
                    Self::missing(err, policy);
                    return;
                }
                Err(err) => err.fatal(),
            };
        }

        let index = TableLevel::One.index_of(page);
        let leaf = self.read(table, index);
        if !leaf.present() {
            Self::missing(PagingError::NotMapped { page }, policy);
            return;
        }

        let frame = leaf.frame();
        self.write(table, index, PageTableEntry::new());
        self.mmu.flush_page(page.start_address());
        trace!("unmapped {page:?} (was {frame:?})");
        sink.deallocate_frame(frame);
    }

    fn missing(err: PagingError, policy: UnmapPolicy) {
        match policy {
            UnmapPolicy::IgnoreMissing => debug!("unmap: {err}"),
            UnmapPolicy::HaltOnMissing => err.fatal(),
        }
    }

    /// The level-1 entry mapping `page`, if the whole walk is present.
    ///
    /// Huge-page entries count as not mapped.
    pub fn leaf_entry(&mut self, page: VirtualPage) -> Option<PageTableEntry> {
        let mut table = RecursiveTable::ROOT;
        for level in [TableLevel::Four, TableLevel::Three, TableLevel::Two] {
            table = self.next_table(table, level.index_of(page), page).ok()?;
        }
        let leaf = self.read(table, TableLevel::One.index_of(page));
        (leaf.present() && !leaf.huge_page()).then_some(leaf)
    }

    /// Translate `address` through the active hierarchy.
    ///
    /// Returns `None` if any level is absent. An address in the
    /// non-canonical gap is fatal.
    pub fn get_physical_address(&mut self, address: VirtualAddress) -> Option<PhysicalAddress> {
        if !address.is_canonical() {
            PagingError::NonCanonical(address).fatal();
        }

        let page = VirtualPage::containing(address);
        let leaf = self.leaf_entry(page);
        if leaf.is_none() {
            trace!("{address:?} is not mapped");
        }
        leaf.map(|leaf| leaf.frame().start_address() + address.page_offset())
    }

    /// Unlink the tables `created` names on `page`'s walk once they no longer
    /// hold any entry, bottom-up, handing their frames to `sink`.
    ///
    /// Tables the mapping found already linked are left alone, as is the
    /// level-4 table. Stops at the first table that still has entries, was
    /// not created, or is absent.
    pub fn release_empty_tables(
        &mut self,
        page: VirtualPage,
        created: CreatedTables,
        sink: &mut dyn FrameSink,
    ) {
        let t4 = RecursiveTable::ROOT;
        let Ok(t3) = self.next_table(t4, TableLevel::Four.index_of(page), page) else {
            return;
        };
        let Ok(t2) = self.next_table(t3, TableLevel::Three.index_of(page), page) else {
            return;
        };
        let Ok(t1) = self.next_table(t2, TableLevel::Two.index_of(page), page) else {
            return;
        };

        for (table, parent) in [(t1, t2), (t2, t3), (t3, t4)] {
            if !created.contains(table.level()) {
                return;
            }
            let ptr = self.mmu.table_ptr(table.address());
            if !unsafe { PageTable::is_empty(ptr) } {
                return;
            }

            let index = parent.level().index_of(page);
            let frame = self.read(parent, index).frame();
            self.write(parent, index, PageTableEntry::new());
            self.mmu.flush_page(table.address());
            debug!("released level {} table {frame:?}", table.level());
            sink.deallocate_frame(frame);
        }
    }
}
