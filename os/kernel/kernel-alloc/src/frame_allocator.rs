//! # Physical Frame Allocator
//!
//! A forward-only bump allocator over `[system.start, system.end)` that steps
//! over every region registered as used. Frames are never reclaimed:
//! [`deallocate_frame`](FrameAllocator::deallocate_frame) accepts a frame
//! and forgets it.

use crate::AllocError;
use kernel_info::memory::MAX_USED_REGIONS;
use kernel_info::region::{MemoryRegion, RegionSet};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};
use kernel_vmem::{FrameSink, FrameSource};
use log::{debug, trace};

pub struct FrameAllocator {
    next_free_frame: PhysicalAddress,
    end_of_memory: PhysicalAddress,
    used_regions: RegionSet<MAX_USED_REGIONS>,
}

impl FrameAllocator {
    /// Manage `system_memory`, never handing out a frame that touches one of
    /// `used_regions`.
    ///
    /// The regions are sorted by start address. More than
    /// [`MAX_USED_REGIONS`] regions is fatal.
    #[must_use]
    pub fn new(system_memory: MemoryRegion, used_regions: &[MemoryRegion]) -> Self {
        let Ok(mut used) = RegionSet::from_slice(used_regions) else {
            AllocError::TooManyUsedRegions {
                count: used_regions.len(),
                capacity: MAX_USED_REGIONS,
            }
            .fatal();
        };
        used.sort_by_start();

        debug!("frame allocator: system memory {system_memory:?}, used {used:?}");
        Self {
            next_free_frame: system_memory.start.align_up(),
            end_of_memory: system_memory.end,
            used_regions: used,
        }
    }

    /// Hand out the next free frame.
    ///
    /// The cursor is moved past every used region the candidate frame
    /// touches. Running into the end of memory is fatal.
    pub fn allocate_frame(&mut self) -> PhysicalFrame {
        let mut candidate = self.next_free_frame;
        while let Some(region) = self
            .used_regions
            .iter()
            .find(|region| region.intersects(candidate, candidate + PAGE_SIZE))
        {
            trace!("skipping used region {region:?}");
            candidate = region.end.align_up();
        }

        if candidate.as_u64() + PAGE_SIZE >= self.end_of_memory.as_u64() {
            AllocError::OutOfFrames.fatal();
        }

        self.next_free_frame = candidate + PAGE_SIZE;
        PhysicalFrame::containing(candidate)
    }

    /// Frames are not reclaimed; the frame stays unusable.
    #[allow(clippy::unused_self)]
    pub fn deallocate_frame(&mut self, frame: PhysicalFrame) {
        trace!("dropping {frame:?}");
    }

    #[must_use]
    pub const fn next_free_frame(&self) -> PhysicalAddress {
        self.next_free_frame
    }

    #[must_use]
    pub const fn end_of_memory(&self) -> PhysicalAddress {
        self.end_of_memory
    }

    #[must_use]
    pub fn used_regions(&self) -> &[MemoryRegion] {
        self.used_regions.as_slice()
    }
}

impl FrameSource for FrameAllocator {
    fn allocate_frame(&mut self) -> PhysicalFrame {
        Self::allocate_frame(self)
    }
}

impl FrameSink for FrameAllocator {
    fn deallocate_frame(&mut self, frame: PhysicalFrame) {
        Self::deallocate_frame(self, frame);
    }
}
