//! # Kernel Memory Allocation
//!
//! Physical memory management for the boot path and the switch to the
//! kernel's own page tables.
//!
//! ```text
//!   boot info ──► FrameAllocator ──► TempFramePool
//!                      │                  │
//!                      ▼                  ▼
//!                 remap_kernel (new hierarchy, scratch page)
//!                      │
//!                      ▼
//!            commit_address_space ──► map_heap ──► KernelHeap
//! ```
//!
//! - [`FrameAllocator`]: bump allocation of 4 KiB frames, skipping used
//!   regions. Frames are never reclaimed.
//! - [`TempFramePool`]: three frames lent out for the scratch mapping and
//!   returned after each use.
//! - [`remap`]: builds the hierarchy that identity-maps exactly the
//!   kernel's sections and boot structures, then switches to it.
//! - [`heap`]: a first-fit heap behind [`GlobalAlloc`](core::alloc::GlobalAlloc).
//!
//! All failures are fatal and go through [`AllocError::fatal`].

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

mod error;
mod frame_allocator;
mod free_list;
pub mod heap;
pub mod remap;
mod temp_pool;

pub use crate::error::AllocError;
pub use crate::frame_allocator::FrameAllocator;
pub use crate::heap::KernelHeap;
pub use crate::remap::{commit_address_space, remap_kernel};
pub use crate::temp_pool::TempFramePool;
