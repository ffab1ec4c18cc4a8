use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::compiler::CompileError;

/// Outcome published into a pending handle: the compiled unit, or the
/// failure that prevented it.
pub type CompileOutcome<S> = Result<Arc<S>, CompileError>;

#[derive(Debug)]
struct CompileCell<S> {
    slot: Mutex<Option<CompileOutcome<S>>>,
    ready: Condvar,
}

/// Shareable placeholder for a compiled unit not yet produced.
///
/// Single producer, any number of consumers: the worker that compiled the
/// unit publishes exactly once, and every holder observes the same outcome
/// each time it resolves the handle. Clones share one cell, so handles stay
/// resolvable even after their cache entry has been evicted.
#[derive(Debug)]
pub struct CompileHandle<S> {
    cell: Arc<CompileCell<S>>,
}

impl<S> Clone for CompileHandle<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<S> Default for CompileHandle<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CompileHandle<S> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(CompileCell {
                slot: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Publishes the outcome and wakes every waiter. Publishing twice is a
    /// defect in the scheduler, not a caller-visible condition.
    pub fn complete(&self, outcome: CompileOutcome<S>) {
        let mut slot = self.cell.slot.lock();
        debug_assert!(slot.is_none(), "compile outcome published twice");
        if slot.is_none() {
            *slot = Some(outcome);
            self.cell.ready.notify_all();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.slot.lock().is_some()
    }

    /// Non-blocking resolve. `None` while the compile is still in flight.
    pub fn try_get(&self) -> Option<CompileOutcome<S>> {
        self.cell.slot.lock().clone()
    }

    /// Blocks until the producer publishes. No timeout: compiles run to
    /// completion or failure.
    pub fn wait(&self) -> CompileOutcome<S> {
        let mut slot = self.cell.slot.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.cell.ready.wait(&mut slot);
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}
