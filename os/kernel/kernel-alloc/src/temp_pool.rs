//! # Temporary Frame Pool
//!
//! Three frames reserved up front so the remap step can build a scratch
//! mapping (one level-3, level-2 and level-1 table) without going back to
//! the frame allocator. Frames are borrowed and must come back.

use crate::AllocError;
use kernel_info::memory::TEMP_POOL_FRAMES;
use kernel_memory_addresses::PhysicalFrame;
use kernel_vmem::{FrameSink, FrameSource};
use log::trace;

#[derive(Debug)]
pub struct TempFramePool {
    slots: [Option<PhysicalFrame>; TEMP_POOL_FRAMES],
}

impl TempFramePool {
    /// Fill every slot with a frame from `frames`.
    pub fn new(frames: &mut impl FrameSource) -> Self {
        let slots = core::array::from_fn(|_| Some(frames.allocate_frame()));
        trace!("temp pool: {slots:?}");
        Self { slots }
    }

    /// Borrow the first available frame. An empty pool is fatal.
    pub fn allocate_temp_frame(&mut self) -> PhysicalFrame {
        self.slots
            .iter_mut()
            .find_map(Option::take)
            .unwrap_or_else(|| AllocError::TempPoolExhausted.fatal())
    }

    /// Put `frame` into the first empty slot. A full pool is fatal.
    pub fn deallocate_temp_frame(&mut self, frame: PhysicalFrame) {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) else {
            AllocError::TempPoolUnbalanced.fatal();
        };
        *slot = Some(frame);
    }

    /// Number of frames currently in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl FrameSource for TempFramePool {
    fn allocate_frame(&mut self) -> PhysicalFrame {
        self.allocate_temp_frame()
    }
}

impl FrameSink for TempFramePool {
    fn deallocate_frame(&mut self, frame: PhysicalFrame) {
        self.deallocate_temp_frame(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameAllocator;
    use kernel_info::region::MemoryRegion;

    fn pool() -> TempFramePool {
        let mut frames = FrameAllocator::new(MemoryRegion::from_range(0, 0x10_0000), &[]);
        TempFramePool::new(&mut frames)
    }

    #[test]
    fn pool_starts_full() {
        let pool = pool();
        assert_eq!(pool.available(), TEMP_POOL_FRAMES);
    }

    #[test]
    fn borrows_are_distinct() {
        let mut pool = pool();
        let a = pool.allocate_temp_frame();
        let b = pool.allocate_temp_frame();
        let c = pool.allocate_temp_frame();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    #[should_panic(expected = "no available frames in the temp pool")]
    fn fourth_borrow_halts() {
        let mut pool = pool();
        for _ in 0..=TEMP_POOL_FRAMES {
            pool.allocate_temp_frame();
        }
    }

    #[test]
    fn returned_frame_is_borrowed_again() {
        let mut pool = pool();
        for _ in 0..TEMP_POOL_FRAMES {
            pool.allocate_temp_frame();
        }
        let frame = PhysicalFrame::from_number(0x42);
        pool.deallocate_temp_frame(frame);
        assert_eq!(pool.allocate_temp_frame(), frame);
    }

    #[test]
    #[should_panic(expected = "no borrowed frames in the temp pool")]
    fn returning_to_a_full_pool_halts() {
        let mut pool = pool();
        pool.deallocate_temp_frame(PhysicalFrame::from_number(0x42));
    }
}
