//! One foreign library, as seen from the host.
//!
//! A [`ForeignRuntime`] bundles the boundary (release backend plus record
//! decoder) with the finalizer scheduler. It is chosen once at startup from
//! a [`RuntimeConfig`] and shared by every object created against that
//! library; clones are reference-counted.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tether_abi::{ForeignAbi, ReleaseBackend, WasmAbi};
use tether_core::{
    tag, AbiKind, DecodeError, ForeignCallError, Handle, HandleError, RecordShape, ResultRecord,
    SizeFields, Tagged,
};

use crate::config::{Abi, RuntimeConfig};
use crate::scheduler::{FinalizationScheduler, FinalizerStats};

struct Inner {
    abi: Box<dyn ForeignAbi>,
    scheduler: FinalizationScheduler,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last reference gone: no object can still be pending on a later
        // pass, so flush whatever is queued unless shutdown was signalled.
        if !self.scheduler.is_shut_down() {
            self.scheduler.collect(self.abi.as_ref());
        }
    }
}

/// Shared handle to a foreign library's boundary and finalizer scheduler.
#[derive(Clone)]
pub struct ForeignRuntime {
    inner: Rc<Inner>,
}

/// A successful result record, payload tagged for adoption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckedRecord {
    /// The payload, ready for [`HandleObject::adopt`](crate::HandleObject::adopt).
    pub handle: Tagged,
    /// The record's size fields.
    pub sizes: SizeFields,
}

impl CheckedRecord {
    /// First size field (`value_size` on the `Value` shape).
    pub fn value_size(&self) -> usize {
        self.sizes.first().copied().unwrap_or(0)
    }
}

impl ForeignRuntime {
    /// Start a runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        let abi: Box<dyn ForeignAbi> = match config.abi {
            Abi::Native(native) => Box::new(native),
            Abi::Wasm { module, model } => Box::new(WasmAbi::new(module, model)),
            Abi::Custom(abi) => abi,
        };
        tracing::debug!(
            abi = %abi.abi(),
            mode = ?config.scheduler.mode,
            "foreign runtime started"
        );
        Self {
            inner: Rc::new(Inner {
                abi,
                scheduler: FinalizationScheduler::new(config.scheduler),
            }),
        }
    }

    /// Which ABI this runtime speaks.
    pub fn abi_kind(&self) -> AbiKind {
        self.inner.abi.abi()
    }

    /// The boundary implementation.
    pub fn abi(&self) -> &dyn ForeignAbi {
        self.inner.abi.as_ref()
    }

    /// The release half of the boundary.
    pub fn backend(&self) -> &dyn ReleaseBackend {
        self.inner.abi.as_ref()
    }

    /// The finalizer scheduler.
    pub fn scheduler(&self) -> &FinalizationScheduler {
        &self.inner.scheduler
    }

    /// Whether two values share one runtime.
    pub fn ptr_eq(&self, other: &ForeignRuntime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Decode a result record envelope. The envelope is not freed.
    pub fn decode(&self, envelope: Handle, shape: RecordShape) -> Result<ResultRecord, DecodeError> {
        self.inner.abi.decode(envelope, shape)
    }

    /// Turn a decoded record into a usable, tagged handle.
    ///
    /// A failure record yields a [`ForeignCallError`] naming `op`, the
    /// status code and its message; its payload is never exposed.
    pub fn assert_success(
        &self,
        record: &ResultRecord,
        op: &str,
    ) -> Result<Tagged, ForeignCallError> {
        match record.handle() {
            Some(handle) if record.is_success() => Ok(tag(handle)),
            _ => Err(ForeignCallError {
                op: op.to_owned(),
                status: record.status(),
            }),
        }
    }

    /// Decode, free the envelope, then assert success.
    ///
    /// The envelope is freed whatever the status, before any error
    /// surfaces. The payload of a failure record is never released.
    pub fn check(
        &self,
        envelope: Handle,
        shape: RecordShape,
        op: &str,
    ) -> Result<CheckedRecord, HandleError> {
        let decoded = self.decode(envelope, shape);
        if !envelope.is_null() {
            if let Err(error) = self.inner.abi.free_envelope(envelope) {
                tracing::warn!(%envelope, op, %error, "failed to free result record");
            }
        }
        let record = decoded?;
        let handle = self.assert_success(&record, op)?;
        Ok(CheckedRecord {
            handle,
            sizes: SmallVec::from_slice(record.sizes()),
        })
    }

    /// Copy a foreign string and release its buffer through the raw
    /// allocator.
    ///
    /// A null pointer reads as the empty string and frees nothing.
    pub fn take_string(&self, ptr: Handle) -> Result<String, HandleError> {
        if ptr.is_null() {
            return Ok(String::new());
        }
        let read = self.inner.abi.read_string(ptr);
        self.inner
            .abi
            .free_raw(ptr)
            .map_err(|source| HandleError::Release {
                class: "String",
                source,
            })?;
        Ok(read?)
    }

    /// Run a collection pass over deferred finalizers.
    pub fn collect(&self) -> usize {
        self.inner.scheduler.collect(self.backend())
    }

    /// Signal process shutdown: no finalizer releases from now on.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
    }

    /// Finalizer counters.
    pub fn stats(&self) -> FinalizerStats {
        self.inner.scheduler.stats()
    }
}

impl fmt::Debug for ForeignRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignRuntime")
            .field("abi", &self.abi_kind())
            .field("scheduler", &self.inner.scheduler)
            .finish()
    }
}
