//! # Memory Layout
//!
//! Compile-time layout of the kernel's physical and virtual memory.

/// The level-4 slot that points back at the level-4 table itself.
pub const RECURSIVE_INDEX: u16 = 511;

/// Virtual address at which the active level-4 table is reachable through
/// the recursive slot (all four indices equal to [`RECURSIVE_INDEX`]).
pub const TABLE4_ADDRESS: u64 = 0xffff_ffff_ffff_f000;

/// Scratch page used to reach frames that are not mapped anywhere yet.
///
/// It lies in an otherwise unused level-4 slot (27), away from the identity
/// mapped low memory and from the recursive slot.
pub const TEMP_PAGE_ADDRESS: u64 = 0x0000_0dea_dbee_f000;

/// Highest address of the lower canonical half.
pub const LOWER_HALF_END: u64 = 0x0000_7fff_ffff_ffff;

/// Lowest address of the higher canonical half.
pub const HIGHER_HALF_START: u64 = 0xffff_8000_0000_0000;

/// Physical address of the VGA text buffer.
pub const VGA_BUFFER_START: u64 = 0x000b_8000;

/// Text mode geometry: 80 columns, 25 rows, two bytes per cell.
pub const VGA_BUFFER_SIZE: u64 = 80 * 25 * 2;

/// One past the last byte of the VGA text buffer.
pub const VGA_BUFFER_END: u64 = VGA_BUFFER_START + VGA_BUFFER_SIZE;

/// Where the boot loader places the kernel image (LMA = VMA, identity).
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const PHYS_LOAD: u64 = 0x0010_0000; // 1 MiB

/// Capacity of the frame allocator's used-region table.
pub const MAX_USED_REGIONS: usize = 20;

/// Number of frames held back for bootstrapping scratch mappings.
///
/// One level-3, one level-2 and one level-1 table: everything needed to map
/// the scratch page when its level-4 slot is empty.
pub const TEMP_POOL_FRAMES: usize = 3;

/// Start of the kernel heap window.
pub const HEAP_START: u64 = 0x0000_4444_4444_0000;

/// Size of the kernel heap.
pub const HEAP_SIZE: u64 = 100 * 1024;

/// Size of the boot stack set up by the multiboot entry stub.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

const _: () = {
    assert!(TABLE4_ADDRESS >= HIGHER_HALF_START);
    assert!(TEMP_PAGE_ADDRESS <= LOWER_HALF_END);
    assert!(TEMP_PAGE_ADDRESS.is_multiple_of(4096));
    assert!((TEMP_PAGE_ADDRESS >> 39) & 0x1ff != RECURSIVE_INDEX as u64);
    assert!((TEMP_PAGE_ADDRESS >> 39) & 0x1ff != (HEAP_START >> 39) & 0x1ff);
    assert!(HEAP_START.is_multiple_of(4096));
    assert!(HEAP_SIZE.is_multiple_of(4096));
    assert!(HEAP_START + HEAP_SIZE <= LOWER_HALF_END);
    assert!(PHYS_LOAD.is_multiple_of(4096));
    assert!(VGA_BUFFER_END <= PHYS_LOAD);
    assert!(BOOT_STACK_SIZE.is_multiple_of(16));
};
