//! Process-wide identifier allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{R2Error, Result};

/// The largest identifier that will ever be issued.
pub const ID_MAX: u64 = i64::MAX.unsigned_abs();

/// A pool of monotonically increasing 64-bit identifiers.
///
/// Renderables, lights and shaders each draw an identifier from a shared
/// pool. Allocation is a compare-and-swap on an atomic counter, so a pool
/// may be shared between threads by reference.
#[derive(Debug, Default)]
pub struct IdPool {
    next: AtomicU64,
}

impl IdPool {
    /// Creates a pool whose first identifier is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a pool whose first identifier is `next`.
    #[must_use]
    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// Returns a fresh identifier.
    ///
    /// Fails with [`R2Error::IdPoolExhausted`] once [`ID_MAX`] has been
    /// issued. The counter is not advanced on failure.
    pub fn fresh_id(&self) -> Result<u64> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current > ID_MAX {
                    None
                } else {
                    Some(current + 1)
                }
            })
            .map_err(|_| {
                log::error!("identifier pool exhausted");
                R2Error::IdPoolExhausted
            })
    }

    /// Returns the identifier the next call to [`IdPool::fresh_id`] would issue.
    #[must_use]
    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }
}
