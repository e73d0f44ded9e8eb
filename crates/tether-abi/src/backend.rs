//! The release half of a foreign ABI.

use tether_core::{AbiKind, Handle, ReleaseError};

use crate::decode::ResultDecoder;

/// ABI-specific calls to the foreign free functions.
///
/// Every method treats a null handle of either ABI as a no-op: disposal
/// paths routinely pass through optional or already-cleared fields.
pub trait ReleaseBackend {
    /// Which ABI this backend speaks.
    fn abi(&self) -> AbiKind;

    /// Release a typed foreign object.
    fn free_obj(&self, handle: Handle) -> Result<(), ReleaseError>;

    /// Release a raw buffer from the foreign allocator (strings, byte
    /// buffers). Passing a typed object here, or a raw buffer to
    /// [`free_obj`](Self::free_obj), is undefined behavior on the foreign side.
    fn free_raw(&self, ptr: Handle) -> Result<(), ReleaseError>;

    /// Release a result record envelope after it has been decoded.
    fn free_envelope(&self, record: Handle) -> Result<(), ReleaseError> {
        self.free_raw(record)
    }
}

/// A complete foreign boundary: decoder plus release backend.
pub trait ForeignAbi: ReleaseBackend + ResultDecoder {}

impl<T: ReleaseBackend + ResultDecoder + ?Sized> ForeignAbi for T {}

/// Reject handles of the other ABI.
pub(crate) fn check_abi(expected: AbiKind, handle: Handle) -> Result<(), ReleaseError> {
    if handle.abi() == expected {
        Ok(())
    } else {
        Err(ReleaseError::AbiMismatch { expected, handle })
    }
}
