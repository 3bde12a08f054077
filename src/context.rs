//! An explicit handle for tracking the memory held by mesh buffers.
//!
//! Mesh buffers dominate the memory footprint of a clustering measurement,
//! so drivers like to report how much is allocated at any moment. Rather
//! than a process-global counter, the tracker is an explicit object passed
//! to every [`MeshField`](crate::MeshField) constructor; cloning it yields
//! another handle onto the same counter. Fields release their share when
//! dropped.
//!
//! The handle is deliberately not `Send`: the whole crate assumes a single
//! logical thread per computation unit, with any parallelism at the process
//! level (each process holding its own tracker).

use std::cell::Cell;
use std::rc::Rc;

/// A cloneable handle onto a shared byte counter.
#[derive(Clone, Debug, Default)]
pub struct MemoryTracker {
    bytes: Rc<Cell<usize>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// the number of tracked bytes currently allocated
    pub fn bytes_in_use(&self) -> usize {
        self.bytes.get()
    }

    pub(crate) fn acquire(&self, nbytes: usize) {
        self.bytes.set(self.bytes.get() + nbytes);
    }

    pub(crate) fn release(&self, nbytes: usize) {
        // saturating so a stale handle can never wrap the counter
        self.bytes.set(self.bytes.get().saturating_sub(nbytes));
    }
}
