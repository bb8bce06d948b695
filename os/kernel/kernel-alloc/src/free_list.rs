use core::ptr::{self, null_mut};

/// Header stored at the beginning of every **free** block.
///
/// ```text
/// +----------------------+--------------------------------+
/// | ListNode             |  unused                        |
/// +----------------------+--------------------------------+
/// ^ block start                                 block end ^
/// ```
///
/// - `size` is the size of the whole block, header included.
/// - `next` links to the next free block. Free blocks are kept **sorted by
///   address** so neighbors can be merged.
///
/// Allocated blocks carry no header; the caller's layout tells
/// [`FreeList::deallocate`] how large the block is.
#[repr(C, align(16))]
struct ListNode {
    size: usize,
    next: *mut ListNode,
}

/// Granularity of every block; also the minimum alignment handed out.
pub const BLOCK_ALIGN: usize = size_of::<ListNode>();

const _: () = assert!(BLOCK_ALIGN == 16);

#[inline]
const fn align_up(addr: usize, align: usize) -> usize {
    (addr + (align - 1)) & !(align - 1)
}

/// Block size backing an allocation of `size` bytes.
#[inline]
const fn block_size(size: usize) -> usize {
    align_up(if size == 0 { 1 } else { size }, BLOCK_ALIGN)
}

/// A first-fit, split-and-merge free-list allocator.
///
/// # Invariants
/// - Free blocks are non-overlapping, 16-byte aligned, multiples of 16 bytes
///   and lie within the managed range.
/// - The list is in address order and no two free blocks are adjacent.
pub struct FreeList {
    head: *mut ListNode,
    free_bytes: usize,
    initialized: bool,
}

// Safety: the list is only reached through the heap's SpinLock.
unsafe impl Send for FreeList {}

impl FreeList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: null_mut(),
            free_bytes: 0,
            initialized: false,
        }
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bytes currently free, headers of free blocks included.
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    /// Manage `[heap_start, heap_start + heap_size)` as one free block.
    ///
    /// # Safety
    /// - The range must be valid, writable and exclusive to this list.
    /// - Must be called at most once.
    pub unsafe fn init(&mut self, heap_start: usize, heap_size: usize) {
        let start = align_up(heap_start, BLOCK_ALIGN);
        let end = (heap_start + heap_size) & !(BLOCK_ALIGN - 1);
        self.initialized = true;
        if end > start {
            unsafe { self.insert(start, end - start) };
        }
    }

    /// Carve `size` bytes aligned to `align` out of the first block that fits.
    ///
    /// The payload is zeroed. Returns null if no block fits.
    ///
    /// # Safety
    /// The list invariants must hold.
    pub unsafe fn allocate(&mut self, size: usize, align: usize) -> *mut u8 {
        let size = block_size(size);
        let align = align.max(BLOCK_ALIGN);

        let mut prev: *mut ListNode = null_mut();
        let mut current = self.head;
        while !current.is_null() {
            let block_start = current as usize;
            let block_end = block_start + unsafe { (*current).size };
            let alloc_start = align_up(block_start, align);
            let alloc_end = alloc_start.saturating_add(size);

            if alloc_end <= block_end {
                let next = unsafe { (*current).next };
                if prev.is_null() {
                    self.head = next;
                } else {
                    unsafe { (*prev).next = next };
                }
                self.free_bytes -= block_end - block_start;

                if alloc_start > block_start {
                    unsafe { self.insert(block_start, alloc_start - block_start) };
                }
                if block_end > alloc_end {
                    unsafe { self.insert(alloc_end, block_end - alloc_end) };
                }

                let payload = alloc_start as *mut u8;
                unsafe { ptr::write_bytes(payload, 0, size) };
                return payload;
            }

            prev = current;
            current = unsafe { (*current).next };
        }
        null_mut()
    }

    /// Return a block previously handed out by [`allocate`](Self::allocate).
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this list with the same `size`,
    /// and must not be freed twice.
    pub unsafe fn deallocate(&mut self, ptr: *mut u8, size: usize) {
        if ptr.is_null() {
            return;
        }
        unsafe { self.insert(ptr as usize, block_size(size)) };
    }

    /// Insert the free block `[addr, addr + size)` in address order and merge
    /// it with its neighbors.
    unsafe fn insert(&mut self, addr: usize, size: usize) {
        self.free_bytes += size;

        let mut prev: *mut ListNode = null_mut();
        let mut next = self.head;
        while !next.is_null() && (next as usize) < addr {
            prev = next;
            next = unsafe { (*next).next };
        }

        let node = addr as *mut ListNode;
        unsafe { node.write(ListNode { size, next }) };
        if prev.is_null() {
            self.head = node;
        } else {
            unsafe { (*prev).next = node };
        }

        unsafe {
            if !next.is_null() && addr + size == next as usize {
                (*node).size += (*next).size;
                (*node).next = (*next).next;
            }
            if !prev.is_null() && prev as usize + (*prev).size == addr {
                (*prev).size += (*node).size;
                (*prev).next = (*node).next;
            }
        }
    }

    /// Number of free blocks.
    #[cfg(test)]
    fn block_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.head;
        while !current.is_null() {
            count += 1;
            current = unsafe { (*current).next };
        }
        count
    }
}

impl Default for FreeList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAP: usize = 4096;

    struct Arena {
        memory: Vec<u128>,
        list: FreeList,
    }

    impl Arena {
        fn new() -> Self {
            let mut memory = vec![0xa5a5_a5a5_a5a5_a5a5_a5a5_a5a5_a5a5_a5a5u128; HEAP / 16];
            let mut list = FreeList::new();
            unsafe { list.init(memory.as_mut_ptr() as usize, HEAP) };
            Self { memory, list }
        }

        fn base(&self) -> usize {
            self.memory.as_ptr() as usize
        }

        fn alloc(&mut self, size: usize, align: usize) -> *mut u8 {
            unsafe { self.list.allocate(size, align) }
        }

        fn free(&mut self, ptr: *mut u8, size: usize) {
            unsafe { self.list.deallocate(ptr, size) }
        }
    }

    #[test]
    fn starts_with_one_block() {
        let arena = Arena::new();
        assert!(arena.list.is_initialized());
        assert_eq!(arena.list.free_bytes(), HEAP);
        assert_eq!(arena.list.block_count(), 1);
    }

    #[test]
    fn first_fit_from_the_start() {
        let mut arena = Arena::new();
        let a = arena.alloc(24, 8);
        let b = arena.alloc(8, 8);
        assert_eq!(a as usize, arena.base());
        assert_eq!(b as usize, arena.base() + 32);
        assert_eq!(arena.list.free_bytes(), HEAP - 48);
    }

    #[test]
    fn payload_is_zeroed() {
        let mut arena = Arena::new();
        let ptr = arena.alloc(64, 16);
        let bytes = unsafe { core::slice::from_raw_parts(ptr, 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn alignment_is_honored_and_the_gap_stays_free() {
        let mut arena = Arena::new();
        let _ = arena.alloc(16, 16);
        let ptr = arena.alloc(100, 256);
        assert_eq!(ptr as usize % 256, 0);
        assert_eq!(arena.list.free_bytes(), HEAP - 16 - 112);

        let gap = ptr as usize - (arena.base() + 16);
        let expected_blocks = if gap == 0 { 1 } else { 2 };
        assert_eq!(arena.list.block_count(), expected_blocks);
    }

    #[test]
    fn freed_neighbors_merge() {
        let mut arena = Arena::new();
        let a = arena.alloc(64, 16);
        let b = arena.alloc(64, 16);
        let c = arena.alloc(64, 16);
        arena.free(a, 64);
        arena.free(c, 64);
        assert_eq!(arena.list.block_count(), 2);
        arena.free(b, 64);
        assert_eq!(arena.list.block_count(), 1);
        assert_eq!(arena.list.free_bytes(), HEAP);
    }

    #[test]
    fn freed_block_is_reused() {
        let mut arena = Arena::new();
        let a = arena.alloc(128, 16);
        let _b = arena.alloc(16, 16);
        arena.free(a, 128);
        assert_eq!(arena.alloc(100, 16), a);
    }

    #[test]
    fn exhaustion_returns_null() {
        let mut arena = Arena::new();
        assert!(!arena.alloc(HEAP, 16).is_null());
        assert!(arena.alloc(1, 1).is_null());
        assert_eq!(arena.list.free_bytes(), 0);
    }

    #[test]
    fn uninitialized_list_has_nothing() {
        let mut list = FreeList::new();
        assert!(!list.is_initialized());
        assert!(unsafe { list.allocate(8, 8) }.is_null());
    }
}
