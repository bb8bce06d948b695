//! Translation lookaside buffer maintenance.

use crate::cr3::Cr3;
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use kernel_memory_addresses::VirtualAddress;

/// Drop the cached translation for the page containing `address`.
///
/// # Safety
/// Requires Ring 0.
#[inline]
pub unsafe fn invalidate_page(address: VirtualAddress) {
    unsafe {
        core::arch::asm!("invlpg [{}]", in(reg) address.as_u64(), options(nostack, preserves_flags));
    }
}

/// Drop all non-global cached translations by reloading CR3 with its
/// current value.
///
/// # Safety
/// Requires Ring 0.
#[inline]
pub unsafe fn flush_all() {
    unsafe {
        let cr3 = Cr3::load_unsafe();
        cr3.store_unsafe();
    }
}
