//! Lock-free atomic primitives.
//!
//! Important:
//! - Every operation here is a single hardware atomic plus bookkeeping. Retry
//!   loops, backoff and fairness are the caller's business.
//! - Values published through these types are shared by reference across
//!   threads, so they must be treated as immutable once installed.

/// Atomically swappable `Arc<T>` slot.
pub mod cell;

pub use cell::{AtomicCell, CompareExchangeError};
