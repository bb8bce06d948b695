//! # Kernel synchronization primitives
//!
//! The memory core runs on a single core with interrupts off, but its state
//! still lives in `static`s. These two types make that sound:
//!
//! - [`SpinLock`]: exclusive access to a value, released when the guard drops.
//! - [`SyncOnceCell`]: a value written once during boot and shared after.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
