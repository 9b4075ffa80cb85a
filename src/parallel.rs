//! Parallel

#![allow(dead_code)]

use crate::common::*;
use crate::geometry::Point2i;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Implement atomic floating point value using `AtomicU32`.
pub struct AtomicFloat {
    /// Bit representation of floating point value.
    bits: AtomicU32,
}

impl AtomicFloat {
    /// Create a new `AtomicFloat`.
    ///
    /// * `v` - The value.
    pub fn new(v: Float) -> Self {
        Self {
            bits: AtomicU32::new(float_to_bits(v)),
        }
    }

    /// Returns the current value.
    pub fn load(&self) -> Float {
        bits_to_float(self.bits.load(Ordering::Relaxed))
    }

    /// Replaces the current value.
    ///
    /// * `v` - The new value.
    pub fn store(&self, v: Float) {
        self.bits.store(float_to_bits(v), Ordering::Relaxed);
    }

    /// Add a floating point value.
    ///
    /// * `v` - The value to add.
    pub fn add(&self, v: Float) {
        let mut old_bits: u32 = self.bits.load(Ordering::Relaxed);
        loop {
            let new_bits = float_to_bits(bits_to_float(old_bits) + v);
            let result = self.bits.compare_exchange_weak(
                old_bits,
                new_bits,
                Ordering::SeqCst,
                Ordering::Relaxed,
            );
            match result {
                Ok(_) => break,
                Err(x) => {
                    old_bits = x;
                }
            }
        }
    }
}

impl Default for AtomicFloat {
    /// Returns the "default value" for `AtomicFloat`.
    fn default() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }
}

/// Runs a per-pixel function over a worklist with one worker per rayon
/// thread. A shared counter hands out list indices; each worker re-checks the
/// termination predicate between fetches and bails out early when it fires.
/// Every pixel in the list is visited at most once, and the call returns only
/// after all workers have finished, so effects of this batch are visible to
/// everything that runs afterwards.
///
/// * `ij_list`   - The pixels to process.
/// * `check_end` - Termination predicate polled between pixels.
/// * `func`      - The per-pixel function.
pub(crate) fn parallel_pixels_in_list<C, F>(ij_list: &[Point2i], check_end: C, func: F)
where
    C: Fn() -> bool + Sync,
    F: Fn(&Point2i) + Sync,
{
    let nthreads = rayon::current_num_threads();
    let next_idx = AtomicUsize::new(0);

    rayon::scope(|scope| {
        for _ in 0..nthreads {
            scope.spawn(|_| {
                while !check_end() {
                    let idx = next_idx.fetch_add(1, Ordering::Relaxed);
                    if idx >= ij_list.len() {
                        break;
                    }
                    func(&ij_list[idx]);
                }
            });
        }
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn atomic_float_add() {
        let f = AtomicFloat::new(1.5);
        f.add(2.25);
        assert_eq!(f.load(), 3.75);
        f.store(-1.0);
        assert_eq!(f.load(), -1.0);
    }

    #[test]
    fn every_pixel_visited_once() {
        let list: Vec<Point2i> = (0..257).map(|i| Point2i::new(i, 0)).collect();
        let visits: Vec<AtomicU32> = (0..list.len()).map(|_| AtomicU32::new(0)).collect();
        parallel_pixels_in_list(
            &list,
            || false,
            |ij| {
                visits[ij.x as usize].fetch_add(1, Ordering::Relaxed);
            },
        );
        assert!(visits.iter().all(|v| v.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn stop_predicate_aborts_dispatch() {
        let list: Vec<Point2i> = (0..10_000).map(|i| Point2i::new(i, 0)).collect();
        let fired = AtomicBool::new(false);
        let visited = AtomicU32::new(0);
        parallel_pixels_in_list(
            &list,
            || fired.load(Ordering::Relaxed),
            |_| {
                visited.fetch_add(1, Ordering::Relaxed);
                fired.store(true, Ordering::Relaxed);
            },
        );
        // Each worker processes at most one pixel after the flag fires.
        assert!(visited.load(Ordering::Relaxed) <= rayon::current_num_threads() as u32 + 1);
    }

    #[test]
    fn empty_list_is_a_no_op() {
        parallel_pixels_in_list(&[], || false, |_| panic!("no pixels to visit"));
    }
}
