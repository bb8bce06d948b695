use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// `IA32_EFER` / EFER (MSR `0xC000_0080`).
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// Bit 0 — SCE: `SYSCALL`/`SYSRET` enable.
    pub sce: bool,

    /// Bits 1–7 — Reserved / vendor specific.
    #[bits(7)]
    pub reserved0: u8,

    /// Bit 8 — LME: Long Mode Enable.
    pub lme: bool,

    /// Bit 9 — Reserved.
    pub reserved1: bool,

    /// Bit 10 — LMA: Long Mode Active.
    pub lma: bool,

    /// Bit 11 — NXE: No-Execute Enable.
    ///
    /// Without it, bit 63 of a page table entry is reserved and setting it
    /// raises a page fault on every access through that entry.
    pub nxe: bool,

    /// Bits 12–63 — SVME, LMSLE, FFXSR, TCE and reserved bits.
    #[bits(52)]
    pub reserved2: u64,
}

impl Efer {
    /// MSR index for `IA32_EFER` / `EFER`.
    pub const MSR_EFER: u32 = 0xC000_0080;

    /// Mask of the no-execute enable bit.
    pub const NO_EXECUTE_ENABLE: u64 = 1 << 11;
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        let (lo, hi): (u32, u32);
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") Self::MSR_EFER,
                out("eax") lo,
                out("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits(u64::from(hi) << 32 | u64::from(lo))
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Efer {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn store_unsafe(self) {
        let efer = self.into_bits();
        let lo = efer as u32;
        let hi = (efer >> 32) as u32;
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") Self::MSR_EFER,
                in("eax") lo,
                in("edx") hi,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}
