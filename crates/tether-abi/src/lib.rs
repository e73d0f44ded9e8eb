//! Release backends and result-record decoders for the two foreign ABIs.
//!
//! Both ABIs sit behind the same pair of traits, [`ReleaseBackend`] and
//! [`ResultDecoder`], combined as [`ForeignAbi`]. Domain code never names a
//! concrete backend: the runtime picks one at startup.
//!
//! This crate is the only one in the workspace that may contain `unsafe`
//! code, confined to [`native`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod backend;
pub mod decode;
pub mod native;
pub mod wasm;

pub use backend::{ForeignAbi, ReleaseBackend};
pub use decode::ResultDecoder;
pub use native::{NativeAbi, NativeRetVal, NativeSymbols, NativeTxRetVal};
pub use wasm::{decode_record, WasmAbi, WasmModule};
