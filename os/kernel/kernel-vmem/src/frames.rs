//! Frame strategies injected into the page table engine.
//!
//! Table creation draws frames from a [`FrameSource`]; unmapping hands the
//! vacated frame to a [`FrameSink`]. The kernel has two concrete strategies
//! for each: the general frame allocator and the temp frame pool.

use kernel_memory_addresses::PhysicalFrame;
use log::trace;

/// Supplies physical frames for new page tables.
///
/// Implementations halt instead of returning when no frame is left.
pub trait FrameSource {
    fn allocate_frame(&mut self) -> PhysicalFrame;
}

/// Takes back frames that are no longer mapped.
pub trait FrameSink {
    fn deallocate_frame(&mut self, frame: PhysicalFrame);
}

/// A sink that leaves the frame with its owner.
///
/// Used when the unmapped page aliased a frame that is still in use
/// elsewhere, such as a level-4 table reached through the scratch page.
#[derive(Debug, Default, Copy, Clone)]
pub struct RetainFrame;

impl FrameSink for RetainFrame {
    fn deallocate_frame(&mut self, frame: PhysicalFrame) {
        trace!("retaining {frame:?}");
    }
}
