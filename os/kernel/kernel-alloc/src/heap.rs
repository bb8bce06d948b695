//! # Kernel Heap
//!
//! A small heap in a fixed virtual window ([`HEAP_START`], [`HEAP_SIZE`]
//! bytes). [`map_heap`] backs the window with fresh frames once the kernel
//! runs on its final page tables; [`KernelHeap::init`] then hands the window
//! to the free list.

use crate::free_list::FreeList;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::null_mut;
use kernel_info::memory::{HEAP_SIZE, HEAP_START};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, VirtualPage};
use kernel_sync::SpinLock;
use kernel_vmem::{FrameSource, Mmu, PageTableEntry, RecursivePageTable};
use log::debug;

/// Map every page of the heap window writable and non-executable.
pub fn map_heap<M: Mmu>(table: &mut RecursivePageTable<'_, M>, frames: &mut dyn FrameSource) {
    let flags = PageTableEntry::new().with_writable(true).with_no_execute(true);
    let first = VirtualPage::containing(VirtualAddress::new(HEAP_START));
    for n in 0..HEAP_SIZE / PAGE_SIZE {
        let frame = frames.allocate_frame();
        table.map_page_to_frame(VirtualPage::from_number(first.number() + n), frame, flags, frames);
    }
    debug!("heap mapped at {:#x} ({} KiB)", HEAP_START, HEAP_SIZE / 1024);
}

/// The kernel's [`GlobalAlloc`].
///
/// Allocations before [`init`](Self::init) and allocations that do not fit
/// return null.
pub struct KernelHeap {
    list: SpinLock<FreeList>,
}

impl KernelHeap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            list: SpinLock::new(FreeList::new()),
        }
    }

    /// Hand `[start, start + size)` to the allocator. Later calls are ignored.
    ///
    /// # Safety
    /// The range must be mapped writable and used by nothing else.
    pub unsafe fn init(&self, start: usize, size: usize) {
        self.list.with_lock(|list| {
            if !list.is_initialized() {
                unsafe { list.init(start, size) };
                debug!("heap ready: {size} bytes at {start:#x}");
            }
        });
    }

    #[must_use]
    pub fn free_bytes(&self) -> usize {
        self.list.with_lock(|list| list.free_bytes())
    }
}

impl Default for KernelHeap {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.list.with_lock(|list| {
            if list.is_initialized() {
                unsafe { list.allocate(layout.size(), layout.align()) }
            } else {
                null_mut()
            }
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.list
            .with_lock(|list| unsafe { list.deallocate(ptr, layout.size()) });
    }
}
