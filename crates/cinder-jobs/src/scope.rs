//! Scoped forks over borrowed data.
//!
//! [`JobScheduler::fork`] requires `'static` callbacks, but the particle
//! pipeline parallelizes over buffers it only borrows for the length of a
//! phase. [`JobScheduler::scope`] bridges the two: every fork submitted
//! through the scope is joined before the scope returns, so callbacks may
//! borrow from the enclosing frame.

#![allow(unsafe_code)]

use std::marker::PhantomData;

use crate::scheduler::{JobArgs, JobCounter, JobScheduler};

impl JobScheduler {
    /// Runs `f` with a [`Scope`] that joins all submitted forks before
    /// returning (including on unwind).
    pub fn scope<'env, F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Scope<'_, 'env>) -> R,
    {
        let scope = Scope {
            scheduler: self,
            counter: JobCounter::new(),
            _env: PhantomData,
        };
        // The join happens in Scope's Drop so a panic in `f` still waits
        // for in-flight jobs before the borrowed data is released.
        f(&scope)
    }
}

/// Fork submission handle tied to a stack frame.
pub struct Scope<'scope, 'env: 'scope> {
    scheduler: &'scope JobScheduler,
    counter: JobCounter,
    _env: PhantomData<&'env mut &'env ()>,
}

impl<'env> Scope<'_, 'env> {
    /// Data-parallel fork over `[0, job_count)`; see
    /// [`JobScheduler::fork`] for the splitting contract.
    pub fn fork<F>(&self, job_count: u32, group_size: u32, scratch_size: usize, func: F)
    where
        F: Fn(&mut JobArgs<'_>) + Send + Sync + 'env,
    {
        let func: Box<dyn Fn(&mut JobArgs<'_>) + Send + Sync + 'env> = Box::new(func);
        // Safety: the scope's Drop waits on `counter` before any `'env`
        // borrow can end, so extending the callback lifetime to 'static
        // never lets a job outlive the data it captured.
        let func: Box<dyn Fn(&mut JobArgs<'_>) + Send + Sync + 'static> =
            unsafe { std::mem::transmute(func) };
        self.scheduler
            .fork(&self.counter, job_count, group_size, scratch_size, move |args| func(args));
    }
}

impl Drop for Scope<'_, '_> {
    fn drop(&mut self) {
        self.scheduler.wait(&self.counter);
    }
}

/// A mutable slice shareable across jobs that touch disjoint indices.
///
/// The pipeline's fork callbacks each own one particle index, so handing
/// every job `&mut` access through a shared reference is sound as long as
/// no two jobs use the same index. That contract is the caller's to keep.
pub struct DisjointSlice<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// Safety: jobs access disjoint elements only (per `get_mut`'s contract).
unsafe impl<T: Send> Send for DisjointSlice<'_, T> {}
unsafe impl<T: Send> Sync for DisjointSlice<'_, T> {}

impl<'a, T> DisjointSlice<'a, T> {
    /// Wraps a mutable slice.
    pub fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// Length of the underlying slice.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the slice is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a mutable reference to element `index`.
    ///
    /// # Safety
    ///
    /// No other job may access `index` while the returned borrow lives,
    /// and `index` must be in bounds.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.ptr.add(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_borrows_stack_data() {
        let scheduler = JobScheduler::new(2);
        let mut values = vec![0u32; 500];
        {
            let shared = DisjointSlice::new(&mut values);
            scheduler.scope(|s| {
                s.fork(500, 32, 0, move |args| {
                    // Safety: each job index is visited exactly once.
                    unsafe { *shared.get_mut(args.job_index as usize) = args.job_index + 1 };
                });
            });
        }
        for (i, v) in values.iter().enumerate() {
            assert_eq!(*v, i as u32 + 1);
        }
    }

    #[test]
    fn test_scope_joins_on_exit() {
        let scheduler = JobScheduler::new(2);
        let mut total = 0u64;
        {
            let slot = DisjointSlice::new(std::slice::from_mut(&mut total));
            scheduler.scope(|s| {
                s.fork(1, 1, 0, move |_| {
                    // Safety: single job, single slot.
                    unsafe { *slot.get_mut(0) = 99 };
                });
            });
        }
        // If the scope returned before the job ran this would read 0.
        assert_eq!(total, 99);
    }

    #[test]
    fn test_nested_scopes() {
        let scheduler = JobScheduler::new(2);
        let mut outer = vec![0u32; 64];
        {
            let shared = DisjointSlice::new(&mut outer);
            scheduler.scope(|s| {
                s.fork(64, 16, 0, move |args| {
                    unsafe { *shared.get_mut(args.job_index as usize) = 1 };
                });
            });
        }
        assert!(outer.iter().all(|&v| v == 1));
    }
}
