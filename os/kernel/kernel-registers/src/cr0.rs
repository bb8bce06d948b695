use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// CR0 in 64-bit mode.
///
/// Only the bits relevant to paging are named; the x87 and cache control
/// bits are carried through unchanged by read-modify-write sequences.
#[bitfield(u64)]
pub struct Cr0 {
    /// Bit 0 — Protection Enable (PE).
    pub pe_protection_enable: bool,

    /// Bits 1–15 — x87 control (MP, EM, TS, ET, NE) and reserved bits.
    #[bits(15)]
    pub fpu_and_reserved: u16,

    /// Bit 16 — Write Protect (WP).
    ///
    /// When set, supervisor code faults on writes to read-only pages, so the
    /// writable bit of kernel mappings is enforced.
    pub wp_write_protect: bool,

    /// Bits 17–30 — Alignment mask, caching control and reserved bits.
    #[bits(14)]
    pub misc: u16,

    /// Bit 31 — Paging (PG).
    pub pg_paging: bool,

    /// Bits 32–63 — Reserved.
    #[bits(32)]
    pub reserved_high: u32,
}

impl Cr0 {
    /// Mask of the write-protect bit.
    pub const WRITE_PROTECT: u64 = 1 << 16;
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u64;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_protect_is_bit_16() {
        let cr0 = Cr0::from_bits(0x8000_0011).with_wp_write_protect(true);
        assert_eq!(cr0.into_bits(), 0x8000_0011 | Cr0::WRITE_PROTECT);
        assert!(cr0.pg_paging());
        assert!(cr0.pe_protection_enable());
    }
}
