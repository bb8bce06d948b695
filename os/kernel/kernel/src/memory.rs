//! # Memory Initialization
//!
//! The boot sequence of the memory core:
//!
//! 1. Collect the regions the frame allocator must avoid: whatever the boot
//!    loader reserved, the VGA buffer, the boot information and the kernel
//!    image.
//! 2. Set up the frame allocator and the temp pool.
//! 3. Collect the regions the kernel keeps: its allocated ELF sections, the
//!    VGA buffer and the boot information.
//! 4. Remap onto a fresh hierarchy, switch to it and turn the old level-4
//!    table into the stack guard page.
//! 5. Map the heap window.

use kernel_alloc::heap::map_heap;
use kernel_alloc::{FrameAllocator, TempFramePool, commit_address_space, remap_kernel};
use kernel_info::boot::BootInfo;
use kernel_info::memory::{MAX_USED_REGIONS, VGA_BUFFER_END, VGA_BUFFER_START};
use kernel_info::region::{MemoryRegion, RegionSet, RegionSetFull};
use kernel_vmem::{Mmu, RecursivePageTable};
use log::{debug, info};

/// Capacity of the remap whitelist.
pub const MAX_KERNEL_REGIONS: usize = 32;

/// The VGA text buffer, kept writable.
pub const VGA_BUFFER: MemoryRegion =
    MemoryRegion::from_range(VGA_BUFFER_START, VGA_BUFFER_END).with_writable(true);

/// Everything paging needs after boot.
pub struct KernelMemory<M> {
    pub mmu: M,
    pub frames: FrameAllocator,
    pub temp: TempFramePool,
}

fn collect_used<const N: usize>(
    boot: &impl BootInfo,
    regions: &mut RegionSet<N>,
) -> Result<(), RegionSetFull> {
    boot.used_memory_regions(regions)?;
    regions.push(VGA_BUFFER)?;
    regions.push(boot.multiboot_memory_region())?;
    regions.push(boot.kernel_memory_region())
}

fn collect_kernel<const N: usize>(
    boot: &impl BootInfo,
    regions: &mut RegionSet<N>,
) -> Result<(), RegionSetFull> {
    boot.allocated_elf_sections(regions)?;
    regions.push(VGA_BUFFER)?;
    regions.push(boot.multiboot_memory_region())
}

/// Regions the frame allocator must never hand out, sorted by start.
pub fn used_regions(boot: &impl BootInfo) -> RegionSet<MAX_USED_REGIONS> {
    let mut regions = RegionSet::new();
    if let Err(err) = collect_used(boot, &mut regions) {
        panic!("used memory regions: {err}");
    }
    regions.sort_by_start();
    regions
}

/// Regions identity-mapped into the kernel's hierarchy, sorted by start.
pub fn kernel_regions(boot: &impl BootInfo) -> RegionSet<MAX_KERNEL_REGIONS> {
    let mut regions = RegionSet::new();
    if let Err(err) = collect_kernel(boot, &mut regions) {
        panic!("kernel memory regions: {err}");
    }
    regions.sort_by_start();
    regions
}

/// Take over paging from the boot stub.
pub fn init_mm<M: Mmu>(mut mmu: M, boot: &impl BootInfo) -> KernelMemory<M> {
    let used = used_regions(boot);
    let mut frames = FrameAllocator::new(boot.system_memory_region(), used.as_slice());
    let mut temp = TempFramePool::new(&mut frames);

    let kernel = kernel_regions(boot);
    debug!("kernel regions: {kernel:?}");

    let old_root = mmu.root();
    let new_root = remap_kernel(&mut mmu, &mut frames, &mut temp, kernel.as_slice());
    commit_address_space(&mut mmu, new_root, old_root, &mut frames);
    info!("MMU initialized!");

    map_heap(&mut RecursivePageTable::new(&mut mmu), &mut frames);

    KernelMemory { mmu, frames, temp }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::{HEAP_SIZE, HEAP_START};
    use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress, VirtualPage};
    use kernel_vmem::sim::SimulatedMmu;

    /// Level-4 table of the boot stub, inside `.bss`.
    const BOOT_ROOT: PhysicalFrame = PhysicalFrame::from_number(0x11d);

    struct FakeBoot {
        reserved: Vec<MemoryRegion>,
        sections: Vec<MemoryRegion>,
    }

    impl FakeBoot {
        fn new() -> Self {
            Self {
                reserved: vec![
                    MemoryRegion::from_range(0x9_fc00, 0x10_0000),
                    MemoryRegion::from_range(0x7fe_0000, 0x800_0000),
                ],
                sections: vec![
                    MemoryRegion::from_range(0x11_0000, 0x12_2000).with_writable(true),
                    MemoryRegion::from_range(0x10_0000, 0x10_3000).with_executable(true),
                    MemoryRegion::from_range(0x10_3000, 0x10_5000),
                    MemoryRegion::from_range(0x10_5000, 0x11_0000).with_writable(true),
                ],
            }
        }
    }

    impl BootInfo for FakeBoot {
        fn system_memory_region(&self) -> MemoryRegion {
            MemoryRegion::from_range(0, 0x7fe_0000)
        }

        fn used_memory_regions<const N: usize>(
            &self,
            regions: &mut RegionSet<N>,
        ) -> Result<(), RegionSetFull> {
            self.reserved.iter().try_for_each(|r| regions.push(*r))
        }

        fn kernel_memory_region(&self) -> MemoryRegion {
            MemoryRegion::from_range(0x10_0000, 0x12_2000)
        }

        fn multiboot_memory_region(&self) -> MemoryRegion {
            MemoryRegion::from_range(0x9000, 0x9400)
        }

        fn allocated_elf_sections<const N: usize>(
            &self,
            regions: &mut RegionSet<N>,
        ) -> Result<(), RegionSetFull> {
            self.sections.iter().try_for_each(|r| regions.push(*r))
        }
    }

    fn starts(regions: &[MemoryRegion]) -> Vec<u64> {
        regions.iter().map(|r| r.start.as_u64()).collect()
    }

    #[test]
    fn used_regions_cover_boot_structures_sorted() {
        let used = used_regions(&FakeBoot::new());
        assert_eq!(
            starts(used.as_slice()),
            [0x9000, 0x9_fc00, 0xb_8000, 0x10_0000, 0x7fe_0000]
        );
    }

    #[test]
    fn kernel_regions_are_sections_vga_and_boot_info_sorted() {
        let kernel = kernel_regions(&FakeBoot::new());
        assert_eq!(
            starts(kernel.as_slice()),
            [0x9000, 0xb_8000, 0x10_0000, 0x10_3000, 0x10_5000, 0x11_0000]
        );
        assert!(kernel.as_slice()[1].writable);
    }

    #[test]
    #[should_panic(expected = "used memory regions")]
    fn too_many_reserved_regions_halt() {
        let mut boot = FakeBoot::new();
        boot.reserved = (0..MAX_USED_REGIONS as u64)
            .map(|n| MemoryRegion::from_range(0x200_0000 + n * 0x1000, 0x200_0800 + n * 0x1000))
            .collect();
        let _ = used_regions(&boot);
    }

    #[test]
    fn init_mm_switches_to_the_kernel_hierarchy() {
        let memory = init_mm(SimulatedMmu::new(BOOT_ROOT), &FakeBoot::new());
        let mut mmu = memory.mmu;

        assert_ne!(mmu.root(), BOOT_ROOT);
        assert!(mmu.no_execute_enabled());
        assert!(mmu.write_protect_enabled());
        assert_eq!(memory.temp.available(), 3);

        let mut table = RecursivePageTable::new(&mut mmu);
        for address in [0x9000, 0xb_8000, 0x10_0000, 0x10_4000, 0x12_1000] {
            assert_eq!(
                table.get_physical_address(VirtualAddress::new(address)),
                Some(PhysicalAddress::new(address)),
            );
        }
        assert_eq!(table.get_physical_address(BOOT_ROOT.identity_page().start_address()), None);
        assert_eq!(table.get_physical_address(VirtualAddress::new(0x12_2000)), None);
    }

    #[test]
    fn init_mm_maps_the_heap() {
        let memory = init_mm(SimulatedMmu::new(BOOT_ROOT), &FakeBoot::new());
        let mut mmu = memory.mmu;
        let mut table = RecursivePageTable::new(&mut mmu);

        let last = VirtualAddress::new(HEAP_START + HEAP_SIZE - 1);
        assert!(table.get_physical_address(VirtualAddress::new(HEAP_START)).is_some());
        assert!(table.get_physical_address(last).is_some());
        let leaf = table.leaf_entry(VirtualPage::containing(last)).unwrap();
        assert!(leaf.writable());
        assert!(leaf.no_execute());
    }

    #[test]
    fn frames_handed_out_avoid_used_regions() {
        let boot = FakeBoot::new();
        let mut memory = init_mm(SimulatedMmu::new(BOOT_ROOT), &boot);
        let used = used_regions(&boot);
        for _ in 0..64 {
            let frame = memory.frames.allocate_frame();
            let (start, end) = (frame.start_address(), frame.end_address());
            assert!(used.iter().all(|r| !r.intersects(start, end)), "{frame:?}");
        }
    }
}
