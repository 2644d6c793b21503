//! A single-slot, lock-free reference cell.
//!
//! The slot owns one strong `Arc<T>` reference, stored as a raw pointer in an
//! `AtomicPtr<T>`. Reads pin the current thread with `crossbeam-epoch` before
//! bumping the strong count, and a successful swap defers releasing the
//! displaced reference until every pinned reader has moved on. Both operations
//! are a single atomic instruction plus bookkeeping; neither blocks nor takes a
//! lock. Pinning may occasionally run a batch of deferred releases, which
//! drops displaced values (and runs their `Drop` code) on the calling thread,
//! so an individual call is bounded but not constant time.
//!
//! Comparison is by identity (`Arc::as_ptr`), never by content. Because the
//! caller's `expected` is a live `Arc`, its allocation cannot be recycled while
//! the comparison runs, so identity CAS here does not suffer from ABA.

use core::{
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    sync::atomic::{AtomicPtr, Ordering},
};
use std::sync::Arc;

use crossbeam_epoch as epoch;

/// An atomically readable, atomically swappable `Arc<T>` slot.
///
/// ```rust
/// use std::sync::Arc;
/// use slotcell::AtomicCell;
///
/// let cell = AtomicCell::new("A");
/// let seen = cell.get();
/// assert_eq!(*seen, "A");
///
/// assert!(cell.compare_and_swap(&seen, Arc::new("B")));
/// assert_eq!(*cell.get(), "B");
///
/// // `seen` is no longer current.
/// assert!(!cell.compare_and_swap(&seen, Arc::new("C")));
/// assert_eq!(*cell.get(), "B");
/// ```
pub struct AtomicCell<T> {
    slot: AtomicPtr<T>,
    // Auto traits follow `Arc<T>`: the cell hands out clones of it.
    _owns: PhantomData<Arc<T>>,
}

/// The outcome of a failed [`AtomicCell::compare_exchange`].
pub struct CompareExchangeError<T> {
    /// The value the failed exchange actually found in the slot.
    pub current: Arc<T>,
    /// The replacement that was not installed, handed back to the caller.
    pub replacement: Arc<T>,
}

impl<T> AtomicCell<T> {
    /// Creates a cell holding `initial`.
    #[inline]
    pub fn new(initial: T) -> Self {
        Self::from_arc(Arc::new(initial))
    }

    #[inline]
    fn from_arc(initial: Arc<T>) -> Self {
        Self {
            slot: AtomicPtr::new(Arc::into_raw(initial).cast_mut()),
            _owns: PhantomData,
        }
    }

    /// Returns the value currently stored in the slot.
    #[inline]
    pub fn get(&self) -> Arc<T> {
        let _guard = epoch::pin();
        let ptr = self.slot.load(Ordering::Acquire);
        // SAFETY: `ptr` came from `Arc::into_raw` and the cell still held a
        // strong reference to it when it was loaded. Releasing that reference
        // is deferred past our pin, so the count is non-zero here.
        unsafe { clone_raw(ptr) }
    }

    /// Consumes the cell, returning the value it held.
    pub fn into_inner(self) -> Arc<T> {
        let this = ManuallyDrop::new(self);
        let ptr = this.slot.load(Ordering::Relaxed);
        // SAFETY: the cell's reference is transferred to the caller and the
        // cell is never dropped.
        unsafe { Arc::from_raw(ptr) }
    }
}

impl<T: Send + Sync + 'static> AtomicCell<T> {
    /// Installs `replacement` if the slot currently holds `expected`.
    ///
    /// Returns `true` on success. On failure the slot is left untouched and
    /// `replacement` is dropped. Equality is allocation identity.
    ///
    /// Swapping requires `T: 'static` because a displaced value may be released
    /// later, by whichever thread next collects garbage. A cell of borrowed
    /// values (say `AtomicCell<&'a Listener>` inside `thread::scope`) can be
    /// built and read, but never swapped; store an owned or `Arc`ed value
    /// instead.
    #[inline]
    pub fn compare_and_swap(&self, expected: &Arc<T>, replacement: Arc<T>) -> bool {
        self.compare_exchange(expected, replacement).is_ok()
    }

    /// Installs `replacement` if the slot currently holds `expected`.
    ///
    /// This is one CAS attempt, like [`compare_and_swap`](Self::compare_and_swap).
    /// On failure the error carries the value the attempt witnessed and the
    /// unused replacement, which is what a retry loop needs for its next try.
    /// The same `T: 'static` requirement as `compare_and_swap` applies.
    ///
    /// # Errors
    /// Returns [`CompareExchangeError`] when the slot no longer holds
    /// `expected`. The slot is left untouched.
    pub fn compare_exchange(
        &self,
        expected: &Arc<T>,
        replacement: Arc<T>,
    ) -> Result<(), CompareExchangeError<T>> {
        let guard = epoch::pin();
        let current = Arc::as_ptr(expected).cast_mut();
        let new = Arc::into_raw(replacement).cast_mut();

        match self
            .slot
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(displaced) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(displaced = ?displaced, installed = ?new, "atomic cell swapped");

                // SAFETY: the slot's reference to `displaced` is now ours to
                // release. Readers pinned before the swap may still be about
                // to clone it, so the release waits for them. `T` is
                // `Send + Sync + 'static`, so any thread may run it later.
                unsafe {
                    guard.defer_unchecked(move || drop(Arc::from_raw(displaced)));
                }
                Ok(())
            }
            Err(witnessed) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(expected = ?current, witnessed = ?witnessed, "atomic cell swap lost");

                // SAFETY: `new` was never published. `witnessed` was in the
                // slot while we are pinned, see `get`.
                let (replacement, current) =
                    unsafe { (Arc::from_raw(new), clone_raw(witnessed)) };
                Err(CompareExchangeError {
                    current,
                    replacement,
                })
            }
        }
    }
}

/// Clones the `Arc` behind a pointer obtained from `Arc::into_raw`.
///
/// # Safety
/// `ptr` must come from `Arc::into_raw` and its strong count must be non-zero
/// for the duration of the call.
#[inline]
unsafe fn clone_raw<T>(ptr: *const T) -> Arc<T> {
    Arc::increment_strong_count(ptr);
    Arc::from_raw(ptr)
}

impl<T> Drop for AtomicCell<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` excludes readers; the slot's reference is
        // released exactly once.
        unsafe { drop(Arc::from_raw(*self.slot.get_mut())) }
    }
}

impl<T> From<T> for AtomicCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Arc<T>> for AtomicCell<T> {
    fn from(value: Arc<T>) -> Self {
        Self::from_arc(value)
    }
}

impl<T: Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicCell")
            .field("value", &self.get())
            .finish()
    }
}

impl<T> fmt::Debug for CompareExchangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareExchangeError")
            .field("current", &Arc::as_ptr(&self.current))
            .field("replacement", &Arc::as_ptr(&self.replacement))
            .finish()
    }
}

impl<T> fmt::Display for CompareExchangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("atomic cell no longer holds the expected value")
    }
}

impl<T> std::error::Error for CompareExchangeError<T> {}
