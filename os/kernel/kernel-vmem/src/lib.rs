//! # Virtual Memory Support
//!
//! The x86-64 page table engine of the kernel: entry and table types, the
//! recursive-slot addressing scheme, and translation, mapping and unmapping
//! on the active hierarchy.
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! A canonical virtual address is split into four 9-bit table indices and a
//! 12-bit offset:
//!
//! ```text
//! | 63‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! | sign  |  L4   |  L3   |  L2   |  L1   | Offset |
//! ```
//!
//! The root register (`CR3`) names the level-4 table; each level's entry
//! names the next table down, and the level-1 entry names the data frame.
//! Bits 48‒63 must repeat bit 47. Addresses between
//! `0x0000_8000_0000_0000` and `0xffff_7fff_ffff_ffff` are never valid.
//!
//! ## Reaching the tables
//!
//! The kernel keeps no pointers to page tables. Slot 511 of the active
//! level-4 table points at that table, which makes every table of the
//! hierarchy visible at an address computed from the path leading to it
//! ([`RecursiveTable`]). Replacing slot 511 therefore swaps the hierarchy
//! all of these addresses reach, without touching `CR3`.
//!
//! ## What you get
//! - [`PageTableEntry`]: the entry bitfield.
//! - [`PageTable`], [`TableIndex`], [`TableLevel`].
//! - [`RecursiveTable`]: table addresses through slot 511.
//! - [`Mmu`]: the CPU operations the engine needs; [`HardwareMmu`] on the
//!   real processor, [`sim::SimulatedMmu`] in tests.
//! - [`FrameSource`] / [`FrameSink`]: where table frames come from and where
//!   vacated frames go.
//! - [`RecursivePageTable`]: the engine.
//!
//! Every structural error is fatal ([`PagingError::fatal`]); only
//! translation reports a missing mapping as a value.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;

mod entry;
mod error;
mod frames;
mod mapper;
mod mmu;
mod recursive;
mod table;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use crate::entry::PageTableEntry;
pub use crate::error::PagingError;
pub use crate::frames::{FrameSink, FrameSource, RetainFrame};
pub use crate::mapper::{CreatedTables, RecursivePageTable, UnmapPolicy};
#[cfg(feature = "asm")]
pub use crate::mmu::HardwareMmu;
pub use crate::mmu::Mmu;
pub use crate::recursive::RecursiveTable;
pub use crate::table::{ENTRY_COUNT, PageTable, TableIndex, TableLevel};

