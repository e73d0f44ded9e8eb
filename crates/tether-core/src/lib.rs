//! Core types for the Tether foreign-handle lifecycle core.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the ABI backends and the lifecycle layer:
//! handles, the adopt/convert tag, foreign status codes, decoded result
//! records with their computed memory layout, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod handle;
pub mod record;
pub mod status;
pub mod tag;

pub use error::{DecodeError, ForeignCallError, HandleError, ReleaseError};
pub use handle::{AbiKind, Handle};
pub use record::{align_up, MemoryModel, RecordLayout, RecordShape, ResultRecord, SizeFields};
pub use status::Status;
pub use tag::{is_tagged, tag, untag, CtorArg, Tagged};
