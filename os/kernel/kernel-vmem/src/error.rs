use crate::table::{TableIndex, TableLevel};
use kernel_memory_addresses::{PhysicalFrame, VirtualAddress, VirtualPage};

/// Page table conditions the kernel cannot continue from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PagingError {
    #[error("page {page} is already in use (points to {frame})")]
    AlreadyMapped {
        page: VirtualPage,
        frame: PhysicalFrame,
    },
    #[error("huge pages not supported (level {level} entry {index} is a huge page)")]
    HugePage { level: TableLevel, index: TableIndex },
    #[error("page table {level} is empty (page {page})")]
    MissingTable { level: TableLevel, page: VirtualPage },
    #[error("page {page} is not mapped")]
    NotMapped { page: VirtualPage },
    #[error("virtual address not in allowed memory ({0})")]
    NonCanonical(VirtualAddress),
}

impl PagingError {
    /// Halt with this error as the diagnostic.
    #[track_caller]
    pub fn fatal(self) -> ! {
        panic!("{self}")
    }
}
