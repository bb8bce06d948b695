//! # Multiboot2 Boot Information
//!
//! Reads the information structure a multiboot2 loader (e.g. GRUB) leaves in
//! memory and passes to the kernel entry point in `EBX`.
//!
//! ```text
//! info + 0   u32 total_size
//! info + 4   u32 reserved
//! info + 8   tag, tag, ..., end tag (type 0, size 8)
//!
//! tag        u32 type, u32 size, payload; next tag at (size + 7) & !7
//! ```
//!
//! Only the tags the memory core needs are interpreted:
//!
//! | Type | Tag | Used for |
//! |------|-----|----------|
//! | 4 | basic memory info | extent of physical RAM |
//! | 6 | memory map | reserved ranges |
//! | 9 | ELF sections | kernel image extent and per-section permissions |

use crate::boot::BootInfo;
use crate::region::{MemoryRegion, RegionSet, RegionSetFull};
use log::debug;

const TAG_END: u32 = 0;
const TAG_BASIC_MEMINFO: u32 = 4;
const TAG_MEMORY_MAP: u32 = 6;
const TAG_ELF_SECTIONS: u32 = 9;

/// Memory map entry type for usable RAM.
const MEMORY_AVAILABLE: u32 = 1;

/// ELF section header type of the null section.
const SECTION_UNUSED: u32 = 0;

const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;
const SHF_EXECINSTR: u64 = 0x4;

const MEMORY_MAP_ENTRY_SIZE: usize = 24;
const ELF_SECTION_HEADER_SIZE: usize = 64;

/// `mem_upper` counts KiB starting at 1 MiB.
const UPPER_MEMORY_START: u64 = 0x10_0000;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Multiboot2Error {
    #[error("multiboot information address is not initialized")]
    NotInitialized,
    #[error("multiboot information address {0:#x} is not aligned")]
    Unaligned(u64),
    #[error("multiboot information is truncated ({declared} bytes declared, {available} available)")]
    Truncated { declared: usize, available: usize },
    #[error("multiboot information has no tag of type {0}")]
    MissingTag(u32),
}

/// A validated view of the multiboot2 information structure.
#[derive(Copy, Clone)]
pub struct Multiboot2Info<'a> {
    address: u64,
    bytes: &'a [u8],
}

/// One entry of the memory map tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryMapEntry {
    pub base: u64,
    pub length: u64,
    pub kind: u32,
}

impl MemoryMapEntry {
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.kind == MEMORY_AVAILABLE
    }

    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        MemoryRegion::from_range(self.base, self.base.saturating_add(self.length))
    }
}

/// One ELF section header of the kernel image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ElfSection {
    pub kind: u32,
    pub flags: u64,
    pub address: u64,
    pub size: u64,
}

impl ElfSection {
    /// Whether the section occupies memory while the kernel runs.
    #[must_use]
    pub const fn is_allocated(&self) -> bool {
        self.kind != SECTION_UNUSED && self.flags & SHF_ALLOC != 0 && self.size != 0
    }

    /// The section's memory with the permissions its flags ask for.
    #[must_use]
    pub const fn region(&self) -> MemoryRegion {
        MemoryRegion::from_range(self.address, self.address + self.size)
            .with_writable(self.flags & SHF_WRITE != 0)
            .with_executable(self.flags & SHF_EXECINSTR != 0)
    }
}

const fn check_address(address: u64) -> Result<(), Multiboot2Error> {
    if address == 0 {
        return Err(Multiboot2Error::NotInitialized);
    }
    if address & 0x7 != 0 {
        return Err(Multiboot2Error::Unaligned(address));
    }
    Ok(())
}

impl<'a> Multiboot2Info<'a> {
    /// Read the structure the loader placed at `address`.
    ///
    /// # Errors
    /// Fails on a null or misaligned address before touching memory, and on a
    /// structure lacking the basic memory info or ELF sections tags.
    ///
    /// # Safety
    /// A non-null, aligned `address` must point at a multiboot2 information
    /// structure that stays mapped and unmodified for `'a`.
    #[allow(unsafe_code, clippy::cast_possible_truncation)]
    pub unsafe fn from_address(address: u64) -> Result<Self, Multiboot2Error> {
        check_address(address)?;
        let base = address as usize as *const u8;
        let total_size = unsafe { base.cast::<u32>().read() };
        let bytes = unsafe { core::slice::from_raw_parts(base, total_size as usize) };
        Self::from_bytes(bytes, address)
    }

    /// Interpret `bytes` as the structure located at physical `address`.
    ///
    /// # Errors
    /// See [`from_address`](Self::from_address); additionally fails if
    /// `bytes` is shorter than the size the structure declares.
    pub fn from_bytes(bytes: &'a [u8], address: u64) -> Result<Self, Multiboot2Error> {
        check_address(address)?;
        let declared = read_u32(bytes, 0).map_or(8, |size| size as usize);
        if declared < 8 || declared > bytes.len() {
            return Err(Multiboot2Error::Truncated {
                declared,
                available: bytes.len(),
            });
        }

        let info = Self {
            address,
            bytes: &bytes[..declared],
        };
        for required in [TAG_BASIC_MEMINFO, TAG_ELF_SECTIONS] {
            if info.find_tag(required).is_none() {
                return Err(Multiboot2Error::MissingTag(required));
            }
        }

        debug!("multiboot2 information at {address:#x}, {declared} bytes");
        Ok(info)
    }

    #[must_use]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Total size of the structure in bytes.
    #[must_use]
    pub const fn total_size(&self) -> usize {
        self.bytes.len()
    }

    fn tags(&self) -> Tags<'a> {
        Tags {
            bytes: self.bytes,
            offset: 8,
        }
    }

    fn find_tag(&self, kind: u32) -> Option<&'a [u8]> {
        self.tags()
            .find(|(tag_kind, _)| *tag_kind == kind)
            .map(|(_, tag)| tag)
    }

    /// `(mem_lower, mem_upper)` in KiB.
    #[must_use]
    pub fn basic_memory_info(&self) -> Option<(u32, u32)> {
        let tag = self.find_tag(TAG_BASIC_MEMINFO)?;
        Some((read_u32(tag, 8)?, read_u32(tag, 12)?))
    }

    pub fn memory_map(&self) -> impl Iterator<Item = MemoryMapEntry> + 'a {
        let tag = self.find_tag(TAG_MEMORY_MAP).unwrap_or(&[]);
        let entry_size = read_u32(tag, 8).map_or(0, |size| size as usize);
        let end = if entry_size >= MEMORY_MAP_ENTRY_SIZE {
            tag.len()
        } else {
            16
        };
        (16..end)
            .step_by(entry_size.max(MEMORY_MAP_ENTRY_SIZE))
            .map_while(move |offset| {
                Some(MemoryMapEntry {
                    base: read_u64(tag, offset)?,
                    length: read_u64(tag, offset + 8)?,
                    kind: read_u32(tag, offset + 16)?,
                })
            })
    }

    pub fn elf_sections(&self) -> impl Iterator<Item = ElfSection> + 'a {
        let tag = self.find_tag(TAG_ELF_SECTIONS).unwrap_or(&[]);
        let count = read_u32(tag, 8).map_or(0, |n| n as usize);
        let entry_size = read_u32(tag, 12).map_or(0, |size| size as usize);
        let count = if entry_size >= ELF_SECTION_HEADER_SIZE {
            count
        } else {
            0
        };
        (0..count).map_while(move |index| {
            let offset = 20 + index * entry_size;
            Some(ElfSection {
                kind: read_u32(tag, offset + 4)?,
                flags: read_u64(tag, offset + 8)?,
                address: read_u64(tag, offset + 16)?,
                size: read_u64(tag, offset + 32)?,
            })
        })
    }
}

impl BootInfo for Multiboot2Info<'_> {
    fn system_memory_region(&self) -> MemoryRegion {
        let upper_kib = self.basic_memory_info().map_or(0, |(_, upper)| upper);
        MemoryRegion::from_range(0, UPPER_MEMORY_START + u64::from(upper_kib) * 1024)
            .with_writable(true)
    }

    fn used_memory_regions<const N: usize>(
        &self,
        regions: &mut RegionSet<N>,
    ) -> Result<(), RegionSetFull> {
        for entry in self.memory_map().filter(|entry| !entry.is_available()) {
            regions.push(entry.region())?;
        }
        Ok(())
    }

    fn kernel_memory_region(&self) -> MemoryRegion {
        let (start, end) = self
            .elf_sections()
            .filter(ElfSection::is_allocated)
            .fold((u64::MAX, 0), |(start, end), section| {
                (
                    start.min(section.address),
                    end.max(section.address + section.size),
                )
            });
        if start > end {
            return MemoryRegion::from_range(0, 0);
        }
        MemoryRegion::from_range(start, end)
            .with_writable(true)
            .with_executable(true)
    }

    fn multiboot_memory_region(&self) -> MemoryRegion {
        MemoryRegion::from_range(self.address, self.address + self.bytes.len() as u64)
    }

    fn allocated_elf_sections<const N: usize>(
        &self,
        regions: &mut RegionSet<N>,
    ) -> Result<(), RegionSetFull> {
        for section in self.elf_sections().filter(ElfSection::is_allocated) {
            regions.push(section.region())?;
        }
        Ok(())
    }
}

/// Walks the tag list, yielding `(type, tag bytes including header)`.
struct Tags<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Tags<'a> {
    type Item = (u32, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let kind = read_u32(self.bytes, self.offset)?;
        let size = read_u32(self.bytes, self.offset + 4)? as usize;
        if kind == TAG_END || size < 8 {
            return None;
        }
        let tag = self.bytes.get(self.offset..self.offset + size)?;
        self.offset += (size + 7) & !7;
        Some((kind, tag))
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw = bytes.get(offset..offset + 8)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_ADDRESS: u64 = 0x0001_0000;

    /// Assembles a multiboot2 information structure byte by byte.
    struct InfoBuilder {
        bytes: Vec<u8>,
    }

    impl InfoBuilder {
        fn new() -> Self {
            Self { bytes: vec![0; 8] }
        }

        fn tag(mut self, kind: u32, payload: &[u8]) -> Self {
            let size = u32::try_from(8 + payload.len()).unwrap();
            self.bytes.extend_from_slice(&kind.to_le_bytes());
            self.bytes.extend_from_slice(&size.to_le_bytes());
            self.bytes.extend_from_slice(payload);
            while self.bytes.len() % 8 != 0 {
                self.bytes.push(0);
            }
            self
        }

        fn meminfo(self, lower: u32, upper: u32) -> Self {
            let mut payload = Vec::new();
            payload.extend_from_slice(&lower.to_le_bytes());
            payload.extend_from_slice(&upper.to_le_bytes());
            self.tag(TAG_BASIC_MEMINFO, &payload)
        }

        fn mmap(self, entries: &[(u64, u64, u32)]) -> Self {
            self.mmap_with_entry_size(24, entries)
        }

        fn mmap_with_entry_size(self, entry_size: u32, entries: &[(u64, u64, u32)]) -> Self {
            let mut payload = Vec::new();
            payload.extend_from_slice(&entry_size.to_le_bytes());
            payload.extend_from_slice(&0u32.to_le_bytes());
            for (base, len, kind) in entries {
                payload.extend_from_slice(&base.to_le_bytes());
                payload.extend_from_slice(&len.to_le_bytes());
                payload.extend_from_slice(&kind.to_le_bytes());
                payload.extend_from_slice(&0u32.to_le_bytes());
            }
            self.tag(TAG_MEMORY_MAP, &payload)
        }

        /// Sections as `(type, flags, address, size)`.
        fn elf(self, sections: &[(u32, u64, u64, u64)]) -> Self {
            let mut payload = Vec::new();
            let count = u32::try_from(sections.len()).unwrap();
            payload.extend_from_slice(&count.to_le_bytes());
            payload.extend_from_slice(&64u32.to_le_bytes());
            payload.extend_from_slice(&0u32.to_le_bytes());
            for (kind, flags, address, size) in sections {
                let mut header = [0u8; 64];
                header[4..8].copy_from_slice(&kind.to_le_bytes());
                header[8..16].copy_from_slice(&flags.to_le_bytes());
                header[16..24].copy_from_slice(&address.to_le_bytes());
                header[32..40].copy_from_slice(&size.to_le_bytes());
                payload.extend_from_slice(&header);
            }
            self.tag(TAG_ELF_SECTIONS, &payload)
        }

        fn finish(mut self) -> Vec<u8> {
            self.bytes.extend_from_slice(&TAG_END.to_le_bytes());
            self.bytes.extend_from_slice(&8u32.to_le_bytes());
            let total = u32::try_from(self.bytes.len()).unwrap();
            self.bytes[0..4].copy_from_slice(&total.to_le_bytes());
            self.bytes
        }
    }

    fn typical_info() -> Vec<u8> {
        InfoBuilder::new()
            .tag(1, b"kernel\0")
            .meminfo(639, 130_048)
            .mmap(&[
                (0x0, 0x9_fc00, 1),
                (0x9_fc00, 0x400, 2),
                (0xf_0000, 0x1_0000, 2),
                (0x10_0000, 0x7ee_0000, 1),
                (0x7fe_0000, 0x2_0000, 2),
            ])
            .elf(&[
                (0, 0, 0, 0),
                (1, SHF_ALLOC, 0x10_0000, 0x18),
                (1, SHF_ALLOC | SHF_EXECINSTR, 0x10_1000, 0x5432),
                (1, SHF_ALLOC, 0x10_7000, 0x900),
                (8, SHF_ALLOC | SHF_WRITE, 0x10_8000, 0x1_1000),
                (2, 0, 0, 0x2000),
            ])
            .finish()
    }

    #[test]
    fn rejects_null_and_misaligned_addresses() {
        let bytes = typical_info();
        assert!(matches!(
            Multiboot2Info::from_bytes(&bytes, 0),
            Err(Multiboot2Error::NotInitialized)
        ));
        assert!(matches!(
            Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS + 4),
            Err(Multiboot2Error::Unaligned(0x1_0004))
        ));
    }

    #[test]
    fn rejects_truncated_structure() {
        let bytes = typical_info();
        let err = Multiboot2Info::from_bytes(&bytes[..bytes.len() - 8], INFO_ADDRESS);
        assert!(matches!(err, Err(Multiboot2Error::Truncated { .. })));
    }

    #[test]
    fn requires_meminfo_and_elf_tags() {
        let bytes = InfoBuilder::new().mmap(&[(0, 0x1000, 1)]).finish();
        assert!(matches!(
            Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS),
            Err(Multiboot2Error::MissingTag(TAG_BASIC_MEMINFO))
        ));

        let bytes = InfoBuilder::new().meminfo(639, 1024).finish();
        assert!(matches!(
            Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS),
            Err(Multiboot2Error::MissingTag(TAG_ELF_SECTIONS))
        ));
    }

    #[test]
    fn system_memory_spans_upper_memory() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        assert_eq!(info.basic_memory_info(), Some((639, 130_048)));

        let system = info.system_memory_region();
        assert_eq!(system.start.as_u64(), 0);
        assert_eq!(system.end.as_u64(), 0x10_0000 + 130_048 * 1024);
    }

    #[test]
    fn used_regions_are_the_unavailable_map_entries() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        assert_eq!(info.memory_map().count(), 5);

        let mut used = RegionSet::<8>::new();
        info.used_memory_regions(&mut used).unwrap();
        let ranges: Vec<_> = used
            .iter()
            .map(|r| (r.start.as_u64(), r.end.as_u64()))
            .collect();
        assert_eq!(
            ranges,
            [
                (0x9_fc00, 0xa_0000),
                (0xf_0000, 0x10_0000),
                (0x7fe_0000, 0x800_0000)
            ]
        );
    }

    #[test]
    fn used_regions_report_overflow() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        let mut used = RegionSet::<2>::new();
        assert_eq!(
            info.used_memory_regions(&mut used),
            Err(RegionSetFull { capacity: 2 })
        );
    }

    #[test]
    fn allocated_sections_carry_their_permissions() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        assert_eq!(info.elf_sections().count(), 6);

        let mut sections = RegionSet::<8>::new();
        info.allocated_elf_sections(&mut sections).unwrap();
        let summary: Vec<_> = sections
            .iter()
            .map(|r| (r.start.as_u64(), r.writable, r.executable))
            .collect();
        assert_eq!(
            summary,
            [
                (0x10_0000, false, false),
                (0x10_1000, false, true),
                (0x10_7000, false, false),
                (0x10_8000, true, false),
            ]
        );
    }

    #[test]
    fn kernel_region_spans_allocated_sections() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        let kernel = info.kernel_memory_region();
        assert_eq!(kernel.start.as_u64(), 0x10_0000);
        assert_eq!(kernel.end.as_u64(), 0x11_9000);
    }

    #[test]
    fn multiboot_region_covers_the_whole_structure() {
        let bytes = typical_info();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();
        let region = info.multiboot_memory_region();
        assert_eq!(region.start.as_u64(), INFO_ADDRESS);
        assert_eq!(region.len(), bytes.len() as u64);
        assert_eq!(info.total_size(), bytes.len());
    }

    #[test]
    fn memory_map_with_short_entries_is_ignored() {
        let bytes = InfoBuilder::new()
            .meminfo(639, 130_048)
            .mmap_with_entry_size(16, &[(0x9_fc00, 0x400, 2), (0xf_0000, 0x1_0000, 2)])
            .elf(&[(1, SHF_ALLOC, 0x10_0000, 0x18)])
            .finish();
        let info = Multiboot2Info::from_bytes(&bytes, INFO_ADDRESS).unwrap();

        assert_eq!(info.memory_map().count(), 0);
        let mut used = RegionSet::<4>::new();
        info.used_memory_regions(&mut used).unwrap();
        assert!(used.as_slice().is_empty());
    }

    #[test]
    #[allow(unsafe_code)]
    fn reads_from_a_raw_address() {
        let bytes = typical_info();
        let mut aligned = vec![0u64; bytes.len().div_ceil(8)];
        let base = aligned.as_mut_ptr().cast::<u8>();
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), base, bytes.len()) };

        let info = unsafe { Multiboot2Info::from_address(base as u64) }.unwrap();
        assert_eq!(info.total_size(), bytes.len());
        assert_eq!(info.basic_memory_info(), Some((639, 130_048)));
    }
}
