//! Tether: exactly-once lifecycle management for foreign handles.
//!
//! A host program holds handles to objects allocated by a foreign memory
//! space, either an in-process native library or a WebAssembly module's
//! linear memory. Tether guarantees each allocation is released exactly
//! once, whether the host disposes it explicitly, lets it go out of scope,
//! or is shutting down.
//!
//! This is the top-level crate. It adds the lifecycle layer
//! ([`HandleObject`], [`FinalizationScheduler`], [`ForeignRuntime`],
//! [`ForeignObject`]) on top of the sub-crates and re-exports them.
//!
//! # Quick start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tether::prelude::*;
//!
//! #[derive(Default)]
//! struct Module {
//!     memory: Vec<u8>,
//!     freed: RefCell<Vec<u32>>,
//! }
//!
//! impl WasmModule for Module {
//!     fn memory_len(&self) -> usize { self.memory.len() }
//!     fn read_memory(&self, offset: usize, buf: &mut [u8]) -> bool {
//!         match self.memory.get(offset..offset + buf.len()) {
//!             Some(src) => { buf.copy_from_slice(src); true }
//!             None => false,
//!         }
//!     }
//!     fn free_obj(&self, ptr: u32) -> Result<(), String> {
//!         self.freed.borrow_mut().push(ptr);
//!         Ok(())
//!     }
//!     fn free(&self, _: u32) -> Result<(), String> { Ok(()) }
//! }
//!
//! let module = Rc::new(Module::default());
//! let runtime = ForeignRuntime::new(RuntimeConfig::wasm(Rc::clone(&module), MemoryModel::WASM32));
//!
//! let mut obj = HandleObject::adopt(&runtime, "Scalar", tag(Handle::Wasm(0x100))).unwrap();
//! obj.dispose().unwrap();
//! obj.dispose().unwrap();
//! assert_eq!(*module.freed.borrow(), vec![0x100]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tether-core` | Handles, tags, status codes, result records, errors |
//! | [`abi`] | `tether-abi` | Native and WASM release backends and decoders |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Handles, tags, status codes, result records and errors (`tether-core`).
pub use tether_core as types;

/// Release backends and result-record decoders (`tether-abi`).
pub use tether_abi as abi;

pub mod config;
pub mod foreign;
pub mod object;
pub mod runtime;
pub mod scheduler;
mod table;

pub use config::{Abi, FinalizationMode, RuntimeConfig, SchedulerConfig};
pub use foreign::{pad_hex, ForeignObject, NOT_IMPLEMENTED};
pub use object::{ComponentView, HandleObject, Ownership};
pub use runtime::{CheckedRecord, ForeignRuntime};
pub use scheduler::{
    release_object, release_raw, FinalizationScheduler, FinalizerEntry, FinalizerStats,
    FinalizerToken, ReleaseFn, ShutdownGuard,
};

/// Convenient re-exports for the common case.
///
/// ```rust
/// use tether::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{FinalizationMode, RuntimeConfig, SchedulerConfig};
    pub use crate::foreign::ForeignObject;
    pub use crate::object::{HandleObject, Ownership};
    pub use crate::runtime::ForeignRuntime;
    pub use tether_abi::{ReleaseBackend, ResultDecoder, WasmModule};
    pub use tether_core::{
        is_tagged, tag, untag, CtorArg, Handle, HandleError, MemoryModel, RecordShape, Status,
        Tagged,
    };
}
