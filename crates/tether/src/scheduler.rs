//! Finalizer registry: deferred release of handles whose owners were dropped.
//!
//! Every owning [`HandleObject`](crate::HandleObject) registers one
//! [`FinalizerEntry`] at construction and keeps the returned token. Explicit
//! disposal unregisters the entry before releasing, so the finalizer can
//! never release a second time. Dropping a live owner schedules the entry:
//! depending on [`FinalizationMode`] it is fired on the spot or queued for
//! the next [`collect`](FinalizationScheduler::collect) pass.
//!
//! Finalizers are best-effort. Release failures inside a finalizer are
//! logged and counted, never propagated. Once [`shutdown`] has been
//! signalled no finalizer reaches the release backend at all: the foreign
//! heap is going away with the process and may already be torn down.
//!
//! [`shutdown`]: FinalizationScheduler::shutdown

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;

use indexmap::IndexSet;
use tether_abi::ReleaseBackend;
use tether_core::{Handle, ReleaseError};

use crate::config::{FinalizationMode, SchedulerConfig};
use crate::table::SlotTable;

pub use crate::table::FinalizerToken;

/// A release function: the one correct way to free a given object type.
pub type ReleaseFn = fn(&dyn ReleaseBackend, Handle) -> Result<(), ReleaseError>;

/// Release through the generic typed-object free. The default.
pub fn release_object(backend: &dyn ReleaseBackend, handle: Handle) -> Result<(), ReleaseError> {
    backend.free_obj(handle)
}

/// Release through the raw allocator free, for byte buffers and strings.
pub fn release_raw(backend: &dyn ReleaseBackend, handle: Handle) -> Result<(), ReleaseError> {
    backend.free_raw(handle)
}

/// What a finalizer releases and how.
#[derive(Clone, Copy, Debug)]
pub struct FinalizerEntry {
    /// Handle to release.
    pub handle: Handle,
    /// Release function to call.
    pub release: ReleaseFn,
    /// Class of the owning object, for diagnostics.
    pub class: &'static str,
}

impl FinalizerEntry {
    /// Entry released through [`release_object`].
    pub fn new(class: &'static str, handle: Handle) -> Self {
        Self {
            handle,
            release: release_object,
            class,
        }
    }

    /// Replace the release function.
    pub fn with_release(mut self, release: ReleaseFn) -> Self {
        self.release = release;
        self
    }
}

/// Scheduler counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinalizerStats {
    /// Entries ever registered.
    pub registered: u64,
    /// Entries removed by explicit disposal.
    pub unregistered: u64,
    /// Finalizers that released successfully.
    pub released: u64,
    /// Finalizers skipped because shutdown was signalled.
    pub suppressed: u64,
    /// Finalizers skipped because an aliased handle was already released in
    /// the same collection pass.
    pub coalesced: u64,
    /// Finalizers whose release failed.
    pub failed: u64,
    /// Entries queued for the next collection pass.
    pub pending: usize,
    /// Entries registered and not yet unregistered or scheduled.
    pub live: usize,
}

/// Registers, unregisters and fires finalizers for one runtime.
pub struct FinalizationScheduler {
    config: SchedulerConfig,
    table: RefCell<SlotTable<FinalizerEntry>>,
    pending: RefCell<VecDeque<FinalizerEntry>>,
    shut_down: Cell<bool>,
    counters: Cell<FinalizerStats>,
}

impl FinalizationScheduler {
    /// Create an empty scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        let table = SlotTable::with_capacity(config.initial_capacity);
        Self {
            config,
            table: RefCell::new(table),
            pending: RefCell::new(VecDeque::new()),
            shut_down: Cell::new(false),
            counters: Cell::new(FinalizerStats::default()),
        }
    }

    /// The scheduler's configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn bump(&self, f: impl FnOnce(&mut FinalizerStats)) {
        let mut c = self.counters.get();
        f(&mut c);
        self.counters.set(c);
    }

    /// Register a finalizer. The caller keeps the token.
    pub fn register(&self, entry: FinalizerEntry) -> FinalizerToken {
        tracing::trace!(handle = %entry.handle, class = entry.class, "finalizer registered");
        self.bump(|c| c.registered += 1);
        self.table.borrow_mut().insert(entry)
    }

    /// Remove a finalizer without firing it.
    ///
    /// A token that was already removed or scheduled yields `None`.
    pub fn unregister(&self, token: FinalizerToken) -> Option<FinalizerEntry> {
        let entry = self.table.borrow_mut().remove(token)?;
        self.bump(|c| c.unregistered += 1);
        Some(entry)
    }

    /// Whether `token` still names a registered finalizer.
    pub fn is_registered(&self, token: FinalizerToken) -> bool {
        self.table.borrow().get(token).is_some()
    }

    /// The owner of `token` became unreachable.
    ///
    /// Fires or queues the finalizer according to the configured mode.
    /// Stale tokens are ignored.
    pub fn schedule(&self, backend: &dyn ReleaseBackend, token: FinalizerToken) {
        let Some(entry) = self.table.borrow_mut().remove(token) else {
            return;
        };
        match self.config.mode {
            FinalizationMode::OnDrop => {
                self.fire(backend, entry);
            }
            FinalizationMode::Deferred => {
                if self.shut_down.get() {
                    self.suppress(&entry);
                    return;
                }
                let len = {
                    let mut pending = self.pending.borrow_mut();
                    pending.push_back(entry);
                    pending.len()
                };
                tracing::trace!(handle = %entry.handle, pending = len, "finalizer deferred");
                if self.config.should_collect(len) {
                    self.collect(backend);
                }
            }
        }
    }

    /// Run every queued finalizer.
    ///
    /// Within one pass a handle is released at most once: later entries
    /// aliasing an already-seen handle are coalesced. Returns the number of
    /// successful releases.
    pub fn collect(&self, backend: &dyn ReleaseBackend) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        if batch.is_empty() {
            return 0;
        }
        let mut seen = IndexSet::with_capacity(batch.len());
        let mut released = 0;
        for entry in batch {
            if !seen.insert(entry.handle) {
                tracing::warn!(
                    handle = %entry.handle,
                    class = entry.class,
                    "aliased handle already released in this pass"
                );
                self.bump(|c| c.coalesced += 1);
                continue;
            }
            if self.fire(backend, entry) {
                released += 1;
            }
        }
        tracing::debug!(handles = seen.len(), released, "collection pass");
        released
    }

    fn suppress(&self, entry: &FinalizerEntry) {
        tracing::trace!(handle = %entry.handle, class = entry.class, "finalizer suppressed");
        self.bump(|c| c.suppressed += 1);
    }

    /// Invoke one finalizer. Never propagates a failure.
    fn fire(&self, backend: &dyn ReleaseBackend, entry: FinalizerEntry) -> bool {
        if self.shut_down.get() {
            self.suppress(&entry);
            return false;
        }
        match (entry.release)(backend, entry.handle) {
            Ok(()) => {
                tracing::trace!(handle = %entry.handle, class = entry.class, "finalizer released");
                self.bump(|c| c.released += 1);
                true
            }
            Err(error) => {
                tracing::warn!(
                    handle = %entry.handle,
                    class = entry.class,
                    %error,
                    "finalizer release failed"
                );
                self.bump(|c| c.failed += 1);
                false
            }
        }
    }

    /// Signal process shutdown.
    ///
    /// Queued finalizers are dropped unfired and every later finalizer is
    /// suppressed. Explicit disposal keeps working. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.replace(true) {
            return;
        }
        let dropped = std::mem::take(&mut *self.pending.borrow_mut());
        for entry in &dropped {
            self.suppress(entry);
        }
        tracing::debug!(
            dropped = dropped.len(),
            live = self.table.borrow().len(),
            "finalization shut down"
        );
    }

    /// Whether [`shutdown`](Self::shutdown) has been signalled.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    /// A guard that signals shutdown when dropped.
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard { scheduler: self }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> FinalizerStats {
        let mut stats = self.counters.get();
        stats.pending = self.pending.borrow().len();
        stats.live = self.table.borrow().len();
        stats
    }
}

impl fmt::Debug for FinalizationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizationScheduler")
            .field("mode", &self.config.mode)
            .field("shut_down", &self.shut_down.get())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Signals shutdown on its scheduler when dropped.
#[must_use = "shutdown is signalled when the guard is dropped"]
pub struct ShutdownGuard<'a> {
    scheduler: &'a FinalizationScheduler,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}
