//! Phase 2 synchronization primitives: a dependency-completion tracker and a
//! bounded-parallelism semaphore, both built on `Condvar` since `std` has no
//! semaphore — the teacher's own `Condvar`-based task-completion idiom is
//! reused directly here, generalized from `TypeId` to [`ToolName`].
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};

use crate::logging::ToolOutcome;
use crate::registry::ToolName;

/// Tracks which tools have finished and with what outcome, letting a worker
/// block until every dependency of its tool has completed.
#[derive(Debug)]
pub struct CompletionTracker {
    completed: Mutex<HashMap<ToolName, ToolOutcome>>,
    condvar: Condvar,
}

impl CompletionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            completed: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
        }
    }

    /// Block until every name in `deps` has been marked complete, then
    /// return their outcomes in the same order.
    #[must_use]
    pub fn wait_for_deps(&self, deps: &[ToolName]) -> Vec<ToolOutcome> {
        if deps.is_empty() {
            return Vec::new();
        }
        let guard = self
            .completed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let guard = self
            .condvar
            .wait_while(guard, |completed| {
                !deps.iter().all(|d| completed.contains_key(d))
            })
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        deps.iter()
            .filter_map(|d| guard.get(d).copied())
            .collect()
    }

    /// Mark `name` complete with `outcome` and wake any worker waiting on it.
    pub fn mark_complete(&self, name: ToolName, outcome: ToolOutcome) {
        let mut guard = self
            .completed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(name, outcome);
        drop(guard);
        self.condvar.notify_all();
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A counting semaphore bounding how many tool processes run at once, built
/// from `Mutex`+`Condvar` in the same style as the completion tracker above.
#[derive(Debug)]
pub struct Semaphore {
    available: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    /// Create a semaphore with `permits` available slots.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits),
            condvar: Condvar::new(),
        }
    }

    /// Block until a slot is free, then take it for the lifetime of the
    /// returned guard.
    #[must_use]
    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        let guard = self
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut guard = self
            .condvar
            .wait_while(guard, |available| *available == 0)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard -= 1;
        SemaphoreGuard { semaphore: self }
    }
}

/// A held semaphore slot, released automatically on drop.
#[derive(Debug)]
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        let mut guard = self
            .semaphore
            .available
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard += 1;
        drop(guard);
        self.semaphore.condvar.notify_one();
    }
}
