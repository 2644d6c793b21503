//! # `slotcell` - Lock-Free Reference Cell
//!
//! A single-slot container holding one shared value that any number of threads
//! can read and atomically replace without locks. It is the building block for
//! lock-free structures such as append-only listener chains or
//! compare-and-swap driven state transitions, which callers layer on top.
//!
//! ## Guarantees
//!
//! - **Atomic reads**: [`AtomicCell::get`] always returns a value that was
//!   installed by the constructor or by some successful swap. No torn or
//!   half-published value is ever observable.
//! - **Linearizable swaps**: [`AtomicCell::compare_and_swap`] is a single
//!   hardware CAS. Of several threads racing with the same `expected`, exactly
//!   one succeeds. Successful swaps on one cell form a total order.
//! - **Identity comparison**: `expected` matches only the very allocation that
//!   is stored, never a different value with equal contents.
//! - **Non-blocking**: neither operation sleeps, waits, spins or takes a
//!   lock. Each call is bounded, but not constant time: pinning the epoch may
//!   run a batch of deferred releases, dropping displaced values on the
//!   calling thread.
//!
//! ## Memory Reclamation
//!
//! Values are stored as `Arc<T>`. A displaced value is released through
//! `crossbeam-epoch`, so a reader that loaded it just before a swap can still
//! take its own reference safely. Readers keep what they read for as long as
//! they hold the returned `Arc`.
//!
//! ## Example
//!
//! A caller-side retry loop, the usual way to drive the cell:
//!
//! ```rust
//! use std::sync::Arc;
//! use slotcell::AtomicCell;
//!
//! let cell = AtomicCell::new(Vec::<&str>::new());
//!
//! let mut seen = cell.get();
//! loop {
//!     let mut next = (*seen).clone();
//!     next.push("listener");
//!     match cell.compare_exchange(&seen, Arc::new(next)) {
//!         Ok(()) => break,
//!         Err(lost) => seen = lost.current,
//!     }
//! }
//!
//! assert_eq!(*cell.get(), ["listener"]);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;

pub use concurrency::atomic::{AtomicCell, CompareExchangeError};

// Compile-time assertions for memory layout and thread-safety claims.
const _: () = {
    use core::mem;

    // The slot is exactly one pointer wide.
    assert!(mem::size_of::<AtomicCell<u64>>() == mem::size_of::<usize>());
    assert!(mem::size_of::<AtomicCell<[u8; 4096]>>() == mem::size_of::<usize>());
};

const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AtomicCell<String>>();
};
