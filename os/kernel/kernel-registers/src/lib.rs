//! # Typed `X86_64` Registers
//!
//! Bitfield models of the control registers the memory core touches:
//!
//! - [`cr0::Cr0`]: the write-protect bit (`WP`) makes read-only pages binding
//!   for ring 0 as well.
//! - [`cr3::Cr3`]: the physical frame of the active level-4 page table.
//! - [`efer::Efer`]: the no-execute enable bit (`NXE`) that gives the page
//!   table `NX` bit its meaning.
//! - [`tlb`]: single-page (`invlpg`) and full TLB invalidation.
//!
//! Register access is privileged. With the `asm` feature the types implement
//! [`LoadRegisterUnsafe`] and [`StoreRegisterUnsafe`]; without it only the
//! bit layouts are available, which is what host-side tests use.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "efer")]
pub mod efer;

#[cfg(feature = "tlb")]
pub mod tlb;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control register and MSR reads require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Writing a control register changes how every subsequent memory access
    /// is translated; the new value must describe a valid configuration.
    unsafe fn store_unsafe(self);
}
