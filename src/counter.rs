//! Lock-free bounded counter.
//!
//! This module provides [`BoundedCounter`], an atomically managed `u64` with a
//! mutable ceiling. It is the building block of [`ValMux`](crate::ValMux):
//! nothing in here ever blocks, all mutation is a compare-and-swap retry loop.
//!
//! # Algorithm
//!
//! ```text
//!        try_add(delta)
//!              │
//!     delta > max? ──yes──► MaxExceeded
//!              │
//!   ┌──► load current
//!   │          │
//!   │  current + delta overflows? ──yes──► Overflow
//!   │          │
//!   │  current + delta > max? ──yes──► CapacityExceeded
//!   │          │
//!   │  CAS(current → current + delta)
//!   │          │
//!   └─ lost ───┤
//!              └─ won ──► Ok
//! ```
//!
//! A lost race is never reported as a capacity failure, the whole check is
//! simply repeated against the fresh value.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::error::{Result, ValMuxError};

/// A non-negative atomic counter that never exceeds its ceiling.
///
/// `current` lives on its own cache line so that contended increments do not
/// bounce the line holding `max`, which is read on every attempt.
///
/// # Invariants
///
/// - Every successful [`try_add`](Self::try_add) satisfies `current + delta <= max`.
/// - [`sub`](Self::sub) clamps at zero, `current` never wraps.
///
/// Lowering `max` below the current occupancy is allowed; the counter then
/// simply refuses further additions until enough has been released.
///
/// # Examples
///
/// ```rust
/// use valmux::BoundedCounter;
///
/// let counter = BoundedCounter::new(2);
/// counter.try_add(2).unwrap();
/// assert!(counter.try_add(1).is_err());
///
/// counter.sub(5);
/// assert_eq!(counter.current(), 0);
/// ```
pub struct BoundedCounter {
    current: CachePadded<AtomicU64>,
    max: AtomicU64,
}

impl BoundedCounter {
    /// Creates an empty counter with the given capacity.
    pub const fn new(max: u64) -> Self {
        BoundedCounter {
            current: CachePadded::new(AtomicU64::new(0)),
            max: AtomicU64::new(max),
        }
    }

    /// Attempts to add `delta` without exceeding the capacity.
    ///
    /// Fails with [`ValMuxError::MaxExceeded`] before looking at the
    /// occupancy if `delta` alone is larger than `max`.
    #[inline]
    pub fn try_add(&self, delta: u64) -> Result<()> {
        let max = self.max();
        if delta > max {
            return Err(ValMuxError::MaxExceeded {
                requested: delta,
                max,
            });
        }

        let mut current = self.current.load(Ordering::Acquire);
        loop {
            let next = Self::checked_next(current, delta, self.max())?;
            match self.current.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Single conditional swap from an already observed `current`.
    ///
    /// Returns `false` if another thread changed the value in between, the
    /// caller is expected to re-check and retry.
    #[inline]
    pub(crate) fn compare_and_add(&self, current: u64, next: u64) -> bool {
        self.current
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Computes `current + delta` and validates it against `max`.
    #[inline]
    pub(crate) fn checked_next(current: u64, delta: u64, max: u64) -> Result<u64> {
        let next = current.checked_add(delta).ok_or(ValMuxError::Overflow {
            current,
            requested: delta,
        })?;
        if next > max {
            return Err(ValMuxError::CapacityExceeded {
                current,
                requested: delta,
                max,
            });
        }
        Ok(next)
    }

    /// Subtracts `delta`, clamping at zero.
    ///
    /// Always succeeds. Subtracting from an empty counter is a no-op.
    #[inline]
    pub fn sub(&self, delta: u64) {
        // fetch_update only fails when the closure returns None, which it never does.
        let _ = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(delta))
            });
    }

    /// Sets the occupancy back to zero.
    #[inline]
    pub fn reset(&self) {
        self.current.store(0, Ordering::Release);
    }

    /// Point-in-time occupancy.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Point-in-time capacity.
    #[inline]
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Acquire)
    }

    /// Changes the capacity. Only subsequent additions are affected.
    #[inline]
    pub fn set_max(&self, max: u64) {
        self.max.store(max, Ordering::Release);
    }
}

impl Debug for BoundedCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}/{}}}", self.current(), self.max())
    }
}

impl Default for BoundedCounter {
    /// Creates a counter with [`DEFAULT_MAX`](crate::config::DEFAULT_MAX) capacity.
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new() {
        let counter = BoundedCounter::new(3);
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.max(), 3);
    }

    #[test]
    fn test_try_add_up_to_max() {
        let counter = BoundedCounter::new(3);
        counter.try_add(1).unwrap();
        counter.try_add(2).unwrap();
        assert_eq!(counter.current(), 3);

        let err = counter.try_add(1).unwrap_err();
        assert_eq!(
            err,
            ValMuxError::CapacityExceeded {
                current: 3,
                requested: 1,
                max: 3
            }
        );
        assert_eq!(counter.current(), 3);
    }

    #[test]
    fn test_max_exceeded_ignores_occupancy() {
        let counter = BoundedCounter::new(2);
        let err = counter.try_add(3).unwrap_err();
        assert_eq!(err, ValMuxError::MaxExceeded { requested: 3, max: 2 });
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_overflow() {
        let counter = BoundedCounter::new(u64::MAX);
        counter.try_add(u64::MAX).unwrap();
        let err = counter.try_add(1).unwrap_err();
        assert!(err.is_overflow());
        assert_eq!(counter.current(), u64::MAX);
    }

    #[test]
    fn test_sub_clamps_at_zero() {
        let counter = BoundedCounter::new(5);
        counter.try_add(2).unwrap();
        counter.sub(5);
        assert_eq!(counter.current(), 0);

        counter.sub(1);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_reset_then_fill() {
        let counter = BoundedCounter::new(4);
        counter.try_add(3).unwrap();
        counter.reset();
        assert_eq!(counter.current(), 0);
        counter.try_add(4).unwrap();
        assert_eq!(counter.current(), 4);
    }

    #[test]
    fn test_set_max() {
        let counter = BoundedCounter::new(1);
        counter.try_add(1).unwrap();
        assert!(counter.try_add(1).unwrap_err().is_capacity_exceeded());

        counter.set_max(2);
        counter.try_add(1).unwrap();
        assert_eq!(counter.current(), 2);

        // Shrinking below the occupancy refuses new additions but keeps the count.
        counter.set_max(1);
        assert!(counter.try_add(1).unwrap_err().is_capacity_exceeded());
        assert_eq!(counter.current(), 2);
        counter.sub(1);
        assert!(counter.try_add(1).unwrap_err().is_capacity_exceeded());
        counter.sub(1);
        counter.try_add(1).unwrap();
    }

    #[test]
    fn test_checked_next() {
        assert_eq!(BoundedCounter::checked_next(1, 1, 2), Ok(2));
        assert!(BoundedCounter::checked_next(2, 1, 2)
            .unwrap_err()
            .is_capacity_exceeded());
        assert!(BoundedCounter::checked_next(u64::MAX, 1, u64::MAX)
            .unwrap_err()
            .is_overflow());
    }

    #[test]
    fn test_debug() {
        let counter = BoundedCounter::new(4);
        counter.try_add(1).unwrap();
        assert_eq!(format!("{:?}", counter), "{1/4}");
    }

    #[test]
    fn test_default() {
        let counter = BoundedCounter::default();
        assert_eq!(counter.max(), 1);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_multiple_threads_never_exceed_max() {
        const MAX: u64 = 8;

        let counter = Arc::new(BoundedCounter::new(MAX));
        let mut handles = vec![];

        for _ in 0..8 {
            let counter_clone = Arc::clone(&counter);
            let handle = thread::spawn(move || {
                let mut acquired = 0u64;
                for _ in 0..10_000 {
                    if counter_clone.try_add(1).is_ok() {
                        acquired += 1;
                        assert!(counter_clone.current() <= MAX);
                        counter_clone.sub(1);
                    }
                }
                acquired
            });
            handles.push(handle);
        }

        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert!(total > 0);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_multiple_threads_fill_exactly() {
        let counter = Arc::new(BoundedCounter::new(100));
        let mut handles = vec![];

        for _ in 0..4 {
            let counter_clone = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                (0..100).filter(|_| counter_clone.try_add(1).is_ok()).count()
            }));
        }

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(granted, 100);
        assert_eq!(counter.current(), 100);
    }
}
