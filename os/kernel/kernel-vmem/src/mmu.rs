//! # CPU Paging Collaborator
//!
//! The page table engine and the remap protocol only touch CPU state through
//! [`Mmu`]. [`HardwareMmu`] drives the real registers; the simulated MMU in
//! [`sim`](crate::sim) stands in for host-side tests.

use crate::PageTable;
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};

/// The paging-related CPU operations the memory core needs.
pub trait Mmu {
    /// Pointer through which the table visible at `address` is accessed.
    ///
    /// On hardware this is the address itself; the translation happens on
    /// access.
    fn table_ptr(&mut self, address: VirtualAddress) -> *mut PageTable;

    /// Drop the cached translation for the page containing `address`.
    fn flush_page(&mut self, address: VirtualAddress);

    /// Drop all cached translations.
    fn flush_all(&mut self);

    /// Frame of the active level-4 table.
    fn root(&self) -> PhysicalFrame;

    /// Make the level-4 table in `frame` the active one.
    ///
    /// The table must map the code and stack currently in use and must
    /// point slot 511 at itself.
    fn set_root(&mut self, frame: PhysicalFrame);

    /// Give the `NX` entry bit its meaning (`EFER.NXE`).
    fn enable_no_execute(&mut self);

    /// Make read-only pages binding for ring 0 (`CR0.WP`).
    fn enable_write_protect(&mut self);
}

#[cfg(feature = "asm")]
pub use hardware::HardwareMmu;

#[cfg(feature = "asm")]
mod hardware {
    use super::Mmu;
    use crate::PageTable;
    use kernel_memory_addresses::{PhysicalFrame, VirtualAddress};
    use kernel_registers::cr0::Cr0;
    use kernel_registers::cr3::Cr3;
    use kernel_registers::efer::Efer;
    use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe, tlb};

    /// The running CPU.
    #[derive(Debug)]
    pub struct HardwareMmu {
        _private: (),
    }

    impl HardwareMmu {
        /// # Safety
        /// Must run in ring 0 with 4-level paging active and slot 511 of the
        /// active level-4 table pointing at itself. At most one instance may
        /// exist.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Mmu for HardwareMmu {
        fn table_ptr(&mut self, address: VirtualAddress) -> *mut PageTable {
            address.as_mut_ptr()
        }

        fn flush_page(&mut self, address: VirtualAddress) {
            unsafe { tlb::invalidate_page(address) }
        }

        fn flush_all(&mut self) {
            unsafe { tlb::flush_all() }
        }

        fn root(&self) -> PhysicalFrame {
            unsafe { Cr3::load_unsafe() }.frame()
        }

        fn set_root(&mut self, frame: PhysicalFrame) {
            unsafe { Cr3::from_frame(frame).store_unsafe() }
        }

        fn enable_no_execute(&mut self) {
            unsafe {
                let efer = Efer::load_unsafe();
                efer.with_nxe(true).store_unsafe();
            }
        }

        fn enable_write_protect(&mut self) {
            unsafe {
                let cr0 = Cr0::load_unsafe();
                cr0.with_wp_write_protect(true).store_unsafe();
            }
        }
    }
}
