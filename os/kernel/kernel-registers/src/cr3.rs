use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalFrame};

/// CR3 — page-table root register (PCID disabled).
///
/// Holds the frame of the active level-4 table plus the cache-control flags
/// used when the CPU reads that table.
#[bitfield(u64)]
pub struct Cr3 {
    /// Bits 0–2 — Reserved.
    #[bits(3)]
    pub reserved0: u8,

    /// Bit 3 — PWT: write-through caching for level-4 table accesses.
    pub pwt: bool,

    /// Bit 4 — PCD: caching disabled for level-4 table accesses.
    pub pcd: bool,

    /// Bits 5–11 — Reserved.
    #[bits(7)]
    pub reserved1: u8,

    /// Bits 12–51 — frame number of the level-4 table.
    #[bits(40)]
    pub table4_frame: u64,

    /// Bits 52–63 — Reserved.
    #[bits(12)]
    pub reserved2: u16,
}

impl Cr3 {
    /// A root register value pointing at `frame` with default caching.
    #[must_use]
    pub const fn from_frame(frame: PhysicalFrame) -> Self {
        Self::new().with_table4_frame(frame.number())
    }

    /// The frame of the level-4 table.
    #[must_use]
    pub const fn frame(&self) -> PhysicalFrame {
        PhysicalFrame::from_number(self.table4_frame())
    }

    /// The physical address of the level-4 table.
    #[must_use]
    pub const fn table4_address(&self) -> PhysicalAddress {
        self.frame().start_address()
    }
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_and_keeps_flags_clear() {
        let frame = PhysicalFrame::containing(PhysicalAddress::new(0x0012_3000));
        let cr3 = Cr3::from_frame(frame);
        assert_eq!(cr3.into_bits(), 0x0012_3000);
        assert_eq!(cr3.frame(), frame);
        assert!(!cr3.pwt() && !cr3.pcd());
    }

    #[test]
    fn flags_do_not_leak_into_the_address() {
        let cr3 = Cr3::from_bits(0x0040_0018);
        assert!(cr3.pwt());
        assert!(cr3.pcd());
        assert_eq!(cr3.table4_address().as_u64(), 0x0040_0000);
    }
}
