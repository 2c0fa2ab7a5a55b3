//! The interpreter's global execution lock.
//!
//! Only one thread may drive the interpreter at a time. The lock is reentrant
//! for its owner, so nested runtime calls made from the worker (redirecting
//! output, installing the hook, executing the chunk) simply deepen the
//! recursion count. A thread that has to block while it owns the lock, such as
//! the trace hook waiting on a debugger pause, calls [`ExecutionLock::suspend`]
//! first: ownership is handed back in full and restored when the returned
//! guard is dropped.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Reentrant single-owner lock guarding all interpreter access.
#[derive(Debug, Default)]
pub struct ExecutionLock {
    ownership: Mutex<Ownership>,
    released: Condvar,
}

/// Held ownership of the [`ExecutionLock`]; releases one level on drop.
#[must_use = "the execution lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a ExecutionLock,
}

/// Ownership handed back by [`ExecutionLock::suspend`]; reacquired on drop.
#[must_use = "ownership is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendGuard<'a> {
    lock: &'a ExecutionLock,
    depth: usize,
}

impl ExecutionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the calling thread owns the lock.
    pub fn acquire(&self) -> LockGuard<'_> {
        self.enter(1);
        LockGuard { lock: self }
    }

    /// Release every level of ownership the calling thread holds.
    ///
    /// Does nothing (and restores nothing) when the caller is not the owner.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        let me = thread::current().id();
        let mut ownership = self.ownership();
        let depth = if ownership.owner == Some(me) {
            let depth = ownership.depth;
            ownership.owner = None;
            ownership.depth = 0;
            depth
        } else {
            0
        };
        drop(ownership);
        if depth > 0 {
            self.released.notify_all();
        }
        SuspendGuard { lock: self, depth }
    }

    /// Whether the calling thread currently owns the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.ownership().owner == Some(thread::current().id())
    }

    /// Whether any thread currently owns the lock.
    pub fn is_locked(&self) -> bool {
        self.ownership().owner.is_some()
    }

    fn enter(&self, levels: usize) {
        let me = thread::current().id();
        let mut ownership = self.ownership();
        loop {
            match ownership.owner {
                None => {
                    ownership.owner = Some(me);
                    ownership.depth = levels;
                    return;
                }
                Some(owner) if owner == me => {
                    ownership.depth += levels;
                    return;
                }
                Some(_) => {
                    ownership = self
                        .released
                        .wait(ownership)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn exit(&self) {
        let mut ownership = self.ownership();
        debug_assert_eq!(ownership.owner, Some(thread::current().id()));
        ownership.depth = ownership.depth.saturating_sub(1);
        if ownership.depth == 0 {
            ownership.owner = None;
            drop(ownership);
            self.released.notify_all();
        }
    }

    fn ownership(&self) -> MutexGuard<'_, Ownership> {
        self.ownership.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}

impl SuspendGuard<'_> {
    /// Recursion depth that will be restored on drop.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        if self.depth > 0 {
            self.lock.enter(self.depth);
        }
    }
}
