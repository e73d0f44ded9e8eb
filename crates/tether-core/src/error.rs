//! Error types for the Tether lifecycle core.
//!
//! Organised by boundary: decoding result records, releasing handles,
//! failed foreign calls, and the handle-object lifecycle that wraps all
//! three.

use std::error::Error;
use std::fmt;

use crate::handle::{AbiKind, Handle};
use crate::record::RecordShape;
use crate::status::Status;

/// Errors from decoding a result record envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The foreign call returned a null envelope.
    NullRecord,
    /// A field read falls outside linear memory.
    OutOfBounds {
        /// Offset of the first byte read.
        offset: usize,
        /// Number of bytes requested.
        len: usize,
        /// Current linear memory size in bytes.
        memory_len: usize,
    },
    /// The envelope handle belongs to the other ABI.
    AbiMismatch {
        /// ABI of the decoder.
        expected: AbiKind,
        /// ABI of the envelope.
        found: AbiKind,
    },
    /// Status reported success but the payload pointer is null.
    NullPayload {
        /// Shape being decoded.
        shape: RecordShape,
    },
    /// A decoded record carried the wrong number of size fields.
    SizeFieldCount {
        /// Shape being decoded.
        shape: RecordShape,
        /// Number of size fields supplied.
        found: usize,
    },
    /// A pointer-sized field does not fit the host's address width.
    FieldOverflow {
        /// Offset of the field.
        offset: usize,
    },
    /// A foreign string was not valid UTF-8.
    InvalidString {
        /// Address of the string.
        offset: u64,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullRecord => write!(f, "null result record"),
            Self::OutOfBounds {
                offset,
                len,
                memory_len,
            } => write!(
                f,
                "record read of {len} bytes at offset {offset} exceeds linear memory of {memory_len} bytes"
            ),
            Self::AbiMismatch { expected, found } => {
                write!(f, "{found} record passed to {expected} decoder")
            }
            Self::NullPayload { shape } => {
                write!(f, "{shape:?} record reports success with a null payload")
            }
            Self::SizeFieldCount { shape, found } => write!(
                f,
                "{shape:?} record expects {} size fields, got {found}",
                shape.size_fields()
            ),
            Self::FieldOverflow { offset } => {
                write!(f, "field at offset {offset} overflows the host address width")
            }
            Self::InvalidString { offset } => {
                write!(f, "foreign string at {offset:#x} is not valid UTF-8")
            }
        }
    }
}

impl Error for DecodeError {}

/// Errors from a release backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseError {
    /// The handle belongs to the other ABI.
    AbiMismatch {
        /// ABI of the backend.
        expected: AbiKind,
        /// The offending handle.
        handle: Handle,
    },
    /// A WASM export trapped while releasing.
    Trap {
        /// Export that trapped.
        export: &'static str,
        /// Trap description from the engine.
        reason: String,
    },
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbiMismatch { expected, handle } => {
                write!(f, "handle {handle} passed to {expected} release backend")
            }
            Self::Trap { export, reason } => write!(f, "export '{export}' trapped: {reason}"),
        }
    }
}

impl Error for ReleaseError {}

/// A foreign call reported a non-success status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignCallError {
    /// Name of the foreign operation.
    pub op: String,
    /// Decoded status.
    pub status: Status,
}

impl fmt::Display for ForeignCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: error code {}: {}",
            self.op,
            self.status.code(),
            self.status.message()
        )
    }
}

impl Error for ForeignCallError {}

/// Errors from the handle-object lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// A null handle was passed to a constructor.
    Construction {
        /// Class being constructed.
        class: &'static str,
    },
    /// The object was already disposed.
    UseAfterDispose {
        /// Class of the object.
        class: &'static str,
    },
    /// Ownership of the handle was transferred to another object.
    UseAfterMove {
        /// Class of the object.
        class: &'static str,
    },
    /// An operation needed the declared byte size, but none was set.
    SizeUnknown {
        /// Class of the object.
        class: &'static str,
    },
    /// Explicit release of a live handle failed.
    Release {
        /// Class of the object.
        class: &'static str,
        /// The backend failure.
        source: ReleaseError,
    },
    /// A result record could not be decoded.
    Decode(DecodeError),
    /// The foreign call reported failure.
    ForeignCall(ForeignCallError),
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction { class } => {
                write!(f, "null handle passed to {class} constructor")
            }
            Self::UseAfterDispose { class } => write!(f, "{class} used after dispose"),
            Self::UseAfterMove { class } => {
                write!(f, "{class} used after its handle was transferred")
            }
            Self::SizeUnknown { class } => write!(f, "{class} has no declared size"),
            Self::Release { class, source } => {
                write!(f, "releasing {class} failed: {source}")
            }
            Self::Decode(e) => write!(f, "decode failed: {e}"),
            Self::ForeignCall(e) => write!(f, "{e}"),
        }
    }
}

impl Error for HandleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Release { source, .. } => Some(source),
            Self::Decode(e) => Some(e),
            Self::ForeignCall(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DecodeError> for HandleError {
    fn from(e: DecodeError) -> Self {
        HandleError::Decode(e)
    }
}

impl From<ForeignCallError> for HandleError {
    fn from(e: ForeignCallError) -> Self {
        HandleError::ForeignCall(e)
    }
}
