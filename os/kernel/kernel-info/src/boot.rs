//! # Kernel Boot Information
//!
//! The boot-info collaborator consumed by the memory core. Everything here
//! must be available before the frame allocator is initialized.

use crate::region::{MemoryRegion, RegionSet, RegionSetFull};

/// Memory facts handed over by the boot loader.
pub trait BootInfo {
    /// Extent of physical RAM.
    fn system_memory_region(&self) -> MemoryRegion;

    /// Ranges the firmware or boot loader reserved (ACPI tables, BIOS areas,
    /// faulty RAM), appended to `regions`.
    ///
    /// # Errors
    /// Fails if `regions` runs out of capacity.
    fn used_memory_regions<const N: usize>(
        &self,
        regions: &mut RegionSet<N>,
    ) -> Result<(), RegionSetFull>;

    /// Extent of the loaded kernel image.
    fn kernel_memory_region(&self) -> MemoryRegion;

    /// Footprint of the boot information structure itself.
    fn multiboot_memory_region(&self) -> MemoryRegion;

    /// The kernel image sections that occupy memory at run time, each with
    /// the permissions its section flags ask for, appended to `regions`.
    ///
    /// # Errors
    /// Fails if `regions` runs out of capacity.
    fn allocated_elf_sections<const N: usize>(
        &self,
        regions: &mut RegionSet<N>,
    ) -> Result<(), RegionSetFull>;
}
