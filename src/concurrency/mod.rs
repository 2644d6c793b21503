//! Concurrency primitives.
//!
//! Nothing in this module blocks or takes a lock. Higher-level lock-free
//! structures (listener chains, CAS-driven state machines) are built on top of
//! these by the caller.

pub mod atomic;

pub use atomic::{AtomicCell, CompareExchangeError};
