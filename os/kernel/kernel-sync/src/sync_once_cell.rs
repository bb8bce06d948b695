use core::{
    cell::UnsafeCell,
    fmt,
    hint::spin_loop,
    mem::MaybeUninit,
    sync::atomic::{AtomicU8, Ordering},
};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;

/// A cell written at most once and read freely afterwards.
///
/// ```rust
/// # use kernel_sync::SyncOnceCell;
/// static LEVEL: SyncOnceCell<u8> = SyncOnceCell::new();
/// assert!(LEVEL.set(3).is_ok());
/// assert_eq!(LEVEL.set(4), Err(4));
/// assert_eq!(LEVEL.get(), Some(&3));
/// ```
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The value, if it has been written.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY is only stored after the value is written.
            Some(unsafe { self.get_unchecked() })
        } else {
            None
        }
    }

    unsafe fn get_unchecked(&self) -> &T {
        unsafe { (*self.value.get()).assume_init_ref() }
    }

    fn claim(&self) -> bool {
        self.state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn publish(&self, value: T) -> &T {
        unsafe { (*self.value.get()).write(value) };
        self.state.store(READY, Ordering::Release);
        unsafe { self.get_unchecked() }
    }

    /// Store `value` unless the cell was already claimed, in which case
    /// `value` is handed back.
    ///
    /// # Errors
    /// Returns `value` if the cell is already written or being written.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self.claim() {
            unsafe { self.publish(value) };
            Ok(())
        } else {
            Err(value)
        }
    }

    /// The value, running `init` first if nobody has written it yet.
    ///
    /// A caller that loses the race waits for the winner to finish.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }
        if self.claim() {
            return unsafe { self.publish(init()) };
        }
        while self.state.load(Ordering::Acquire) != READY {
            spin_loop();
        }
        unsafe { self.get_unchecked() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SyncOnceCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("SyncOnceCell").field(value).finish(),
            None => f.write_str("SyncOnceCell(<empty>)"),
        }
    }
}

// Safety: written by one thread, then shared read-only.
unsafe impl<T: Send + Sync> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}
