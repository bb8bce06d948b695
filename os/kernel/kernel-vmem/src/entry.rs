use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalFrame;

/// A single 64-bit x86-64 page table entry.
///
/// The same layout is used on all four levels. An all-zero entry is absent.
///
/// ### Bit layout
///
/// | Bits   | Name              | Meaning |
/// |--------|-------------------|---------|
/// | 0      | `P`               | Present |
/// | 1      | `RW`              | Writable |
/// | 2      | `US`              | User-mode accessible |
/// | 3      | `PWT`             | Write-through caching |
/// | 4      | `PCD`             | Caching disabled |
/// | 5      | `A`               | Accessed (set by the CPU) |
/// | 6      | `D`               | Dirty (set by the CPU, leaf only) |
/// | 7      | `PS`              | Huge page; never produced by the kernel |
/// | 8      | `G`               | Global |
/// | 9–11   | available         | Ignored by the CPU |
/// | 12–51  | frame index       | Physical frame number |
/// | 52–62  | available         | Ignored by the CPU |
/// | 63     | `NX`              | No-execute (requires `EFER.NXE`) |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalFrame;
/// # use kernel_vmem::PageTableEntry;
/// let flags = PageTableEntry::new().with_writable(true).with_no_execute(true);
/// let entry = PageTableEntry::leaf(PhysicalFrame::from_number(0xb8), flags);
/// assert!(entry.present());
/// assert_eq!(entry.frame().number(), 0xb8);
/// assert_eq!(entry.into_bits(), 0x8000_0000_000b_8003);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    pub present: bool,
    pub writable: bool,
    pub user_accessible: bool,
    pub write_through: bool,
    pub no_cache: bool,
    pub accessed: bool,
    pub dirty: bool,
    pub huge_page: bool,
    pub global: bool,
    #[bits(3)]
    pub available_low: u8,
    #[bits(40)]
    pub frame_index: u64,
    #[bits(11)]
    pub available_high: u16,
    pub no_execute: bool,
}

impl PageTableEntry {
    /// Bits a caller may request for a leaf: the nine low flag bits and `NX`.
    pub const LEAF_FLAG_MASK: u64 = 0x8000_0000_0000_01ff;

    #[inline]
    #[must_use]
    pub const fn is_unused(self) -> bool {
        self.into_bits() == 0
    }

    #[inline]
    #[must_use]
    pub const fn frame(self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.frame_index())
    }

    #[inline]
    #[must_use]
    pub const fn with_frame(self, frame: PhysicalFrame) -> Self {
        self.with_frame_index(frame.number())
    }

    /// The flag bits of this entry, without the frame.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> Self {
        Self::from_bits(self.into_bits() & Self::LEAF_FLAG_MASK)
    }

    /// A level-1 entry mapping `frame` with the requested `flags`.
    ///
    /// `present` is forced on, `huge_page` is forced off and any frame or
    /// available bits in `flags` are ignored.
    #[inline]
    #[must_use]
    pub const fn leaf(frame: PhysicalFrame, flags: Self) -> Self {
        flags
            .flags()
            .with_present(true)
            .with_huge_page(false)
            .with_frame(frame)
    }

    /// A present, writable entry pointing at the next-level table in `frame`.
    #[inline]
    #[must_use]
    pub const fn table(frame: PhysicalFrame) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_frame(frame)
    }
}
