//! # Physical Memory Regions

use core::fmt;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalFrame};

/// A half-open range `[start, end)` of physical memory with access intent.
///
/// Regions describe both memory the frame allocator must stay away from
/// (boot structures, the kernel image, the display buffer) and memory the
/// remap step identity-maps with the given permissions.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct MemoryRegion {
    pub start: PhysicalAddress,
    pub end: PhysicalAddress,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl MemoryRegion {
    /// A readable, non-writable, non-executable region.
    #[must_use]
    pub const fn new(start: PhysicalAddress, end: PhysicalAddress) -> Self {
        Self {
            start,
            end,
            readable: true,
            writable: false,
            executable: false,
        }
    }

    #[must_use]
    pub const fn from_range(start: u64, end: u64) -> Self {
        Self::new(PhysicalAddress::new(start), PhysicalAddress::new(end))
    }

    #[must_use]
    pub const fn with_writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    #[must_use]
    pub const fn with_executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64().saturating_sub(self.start.as_u64())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end.as_u64() <= self.start.as_u64()
    }

    /// Whether any byte of `[start, end)` lies inside this region.
    ///
    /// Covers a range starting inside the region, ending inside it, and
    /// spanning it entirely.
    #[must_use]
    pub const fn intersects(&self, start: PhysicalAddress, end: PhysicalAddress) -> bool {
        !self.is_empty()
            && start.as_u64() < self.end.as_u64()
            && self.start.as_u64() < end.as_u64()
    }

    /// Every frame touched by the region, starting at the frame containing
    /// `start`.
    #[must_use]
    pub const fn frames(&self) -> Frames {
        Frames {
            next: self.start.align_down().as_u64(),
            end: self.end.as_u64(),
        }
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#x}, {:#x}) {}{}{}",
            self.start.as_u64(),
            self.end.as_u64(),
            if self.readable { 'r' } else { '-' },
            if self.writable { 'w' } else { '-' },
            if self.executable { 'x' } else { '-' },
        )
    }
}

/// Iterator over the frames of a [`MemoryRegion`].
#[derive(Clone, Debug)]
pub struct Frames {
    next: u64,
    end: u64,
}

impl Iterator for Frames {
    type Item = PhysicalFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let frame = PhysicalFrame::containing(PhysicalAddress::new(self.next));
        self.next += PAGE_SIZE;
        Some(frame)
    }
}

/// The region table is full.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("too many memory regions (capacity {capacity})")]
pub struct RegionSetFull {
    pub capacity: usize,
}

/// A fixed-capacity list of regions that needs no heap.
#[derive(Clone)]
pub struct RegionSet<const N: usize> {
    regions: [MemoryRegion; N],
    len: usize,
}

impl<const N: usize> RegionSet<N> {
    const EMPTY: MemoryRegion = MemoryRegion::from_range(0, 0);

    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [Self::EMPTY; N],
            len: 0,
        }
    }

    /// Copy `regions` into a new set.
    ///
    /// # Errors
    /// Fails if `regions` holds more than `N` entries.
    pub fn from_slice(regions: &[MemoryRegion]) -> Result<Self, RegionSetFull> {
        let mut set = Self::new();
        for region in regions {
            set.push(*region)?;
        }
        Ok(set)
    }

    /// Append a region.
    ///
    /// # Errors
    /// Fails if the set already holds `N` regions.
    pub const fn push(&mut self, region: MemoryRegion) -> Result<(), RegionSetFull> {
        if self.len == N {
            return Err(RegionSetFull { capacity: N });
        }
        self.regions[self.len] = region;
        self.len += 1;
        Ok(())
    }

    /// Order the regions by start address.
    pub fn sort_by_start(&mut self) {
        self.regions[..self.len].sort_unstable_by_key(|region| region.start);
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn as_slice(&self) -> &[MemoryRegion] {
        &self.regions[..self.len]
    }

    pub fn iter(&self) -> core::slice::Iter<'_, MemoryRegion> {
        self.as_slice().iter()
    }
}

impl<const N: usize> Default for RegionSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for RegionSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, const N: usize> IntoIterator for &'a RegionSet<N> {
    type Item = &'a MemoryRegion;
    type IntoIter = core::slice::Iter<'a, MemoryRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cover_partial_pages_at_both_ends() {
        let region = MemoryRegion::from_range(0xb8000, 0xb8fa0);
        let frames: Vec<_> = region.frames().map(PhysicalFrame::number).collect();
        assert_eq!(frames, [0xb8]);

        let region = MemoryRegion::from_range(0x1800, 0x3001);
        let frames: Vec<_> = region.frames().map(PhysicalFrame::number).collect();
        assert_eq!(frames, [1, 2, 3]);
    }

    #[test]
    fn empty_region_has_no_frames_and_intersects_nothing() {
        let region = MemoryRegion::from_range(0x2000, 0x2000);
        assert!(region.is_empty());
        assert_eq!(region.frames().count(), 0);
        assert!(!region.intersects(PhysicalAddress::new(0), PhysicalAddress::new(0x10_0000)));
    }

    #[test]
    fn intersection_is_half_open() {
        let region = MemoryRegion::from_range(0x1000, 0x3000);
        let hit = |s: u64, e: u64| region.intersects(PhysicalAddress::new(s), PhysicalAddress::new(e));
        assert!(!hit(0x0, 0x1000));
        assert!(hit(0x0800, 0x1800));
        assert!(hit(0x2000, 0x3000));
        assert!(hit(0x0, 0x4000));
        assert!(!hit(0x3000, 0x4000));
    }

    #[test]
    fn set_rejects_overflow_and_sorts() {
        let mut set = RegionSet::<2>::new();
        set.push(MemoryRegion::from_range(0x5000, 0x6000)).unwrap();
        set.push(MemoryRegion::from_range(0x1000, 0x2000)).unwrap();
        assert_eq!(
            set.push(MemoryRegion::from_range(0x9000, 0xa000)),
            Err(RegionSetFull { capacity: 2 })
        );

        set.sort_by_start();
        let starts: Vec<_> = set.iter().map(|r| r.start.as_u64()).collect();
        assert_eq!(starts, [0x1000, 0x5000]);
    }

    #[test]
    fn debug_shows_permissions() {
        let region = MemoryRegion::from_range(0x1000, 0x2000)
            .with_writable(true)
            .with_executable(false);
        assert_eq!(format!("{region:?}"), "[0x1000, 0x2000) rw-");
    }
}
