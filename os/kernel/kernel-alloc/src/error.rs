/// Allocation conditions the kernel cannot continue from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("no free frames")]
    OutOfFrames,
    #[error("too many used memory regions ({count}, capacity {capacity})")]
    TooManyUsedRegions { count: usize, capacity: usize },
    #[error("no available frames in the temp pool")]
    TempPoolExhausted,
    #[error("no borrowed frames in the temp pool")]
    TempPoolUnbalanced,
}

impl AllocError {
    /// Halt with this error as the diagnostic.
    #[track_caller]
    pub fn fatal(self) -> ! {
        panic!("{self}")
    }
}
