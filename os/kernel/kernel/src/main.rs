//! # Kernel
//!
//! A multiboot2 kernel for a single x86-64 core. [`boot`] brings the CPU
//! into long mode on a minimal page table hierarchy; the entry point then
//! hands paging to the memory core ([`memory::init_mm`]), exercises the
//! heap and halts.

#![cfg_attr(target_os = "none", no_std, no_main)]
#![cfg_attr(not(target_os = "none"), allow(dead_code))]
#![allow(unsafe_code)]

#[cfg(target_os = "none")]
mod boot;
#[cfg(target_os = "none")]
mod entry;
mod memory;

/// The kernel only runs on bare metal (`x86_64-unknown-none`); host builds
/// exist for the tests.
#[cfg(not(target_os = "none"))]
fn main() {}
