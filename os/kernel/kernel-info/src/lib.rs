//! # Kernel Configuration and Boot Interface
//!
//! Memory layout constants, physical memory regions and the boot-info
//! collaborator that tells the memory core what physical memory exists and
//! which parts of it are already spoken for.
//!
//! ## Modules
//!
//! - [`memory`]: compile-time layout (recursive slot, scratch page, VGA buffer,
//!   kernel load address, heap window, table capacities).
//! - [`region`]: [`MemoryRegion`](region::MemoryRegion) and the fixed-capacity
//!   [`RegionSet`](region::RegionSet).
//! - [`boot`]: the [`BootInfo`](boot::BootInfo) trait.
//! - [`multiboot2`]: a [`BootInfo`](boot::BootInfo) reading the multiboot2
//!   information structure.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA text buffer)        │
//! PHYS_LOAD   ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS, boot stack) │
//!             ├─────────────────────────────────┤
//!             │    Available RAM                │
//!             │  (Managed by frame allocator)   │
//!             └─────────────────────────────────┘
//! ```
//!
//! ## Build Script Integration
//! ```rust
//! use kernel_info::memory::PHYS_LOAD;
//!
//! println!("cargo:rustc-link-arg=--defsym=PHYS_LOAD={:#x}", PHYS_LOAD);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod multiboot2;
pub mod region;
