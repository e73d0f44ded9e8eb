//! Opaque handles naming foreign allocations.
//!
//! A [`Handle`] is never dereferenced by the host. It only travels back
//! across the boundary: as an argument to a foreign operation or to a
//! release function. Both representations use 0 as the null sentinel.

use std::fmt;

/// Which foreign boundary a handle (or backend) belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AbiKind {
    /// In-process native library, handles are object addresses.
    Native,
    /// WebAssembly module, handles are offsets into linear memory.
    Wasm,
}

impl fmt::Display for AbiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Wasm => write!(f, "wasm"),
        }
    }
}

/// Opaque value naming one foreign allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    /// Address of a native object. Provenance is exposed on the way in
    /// and recovered on the way out, so the address round-trips to a
    /// usable pointer for the foreign side.
    Native(usize),
    /// Byte offset into WASM linear memory.
    Wasm(u32),
}

impl Handle {
    /// The null native handle.
    pub const NULL_NATIVE: Handle = Handle::Native(0);

    /// The null WASM handle.
    pub const NULL_WASM: Handle = Handle::Wasm(0);

    /// Wrap a pointer returned by a native foreign call.
    pub fn from_native_ptr<T>(ptr: *mut T) -> Self {
        Handle::Native(ptr.expose_provenance())
    }

    /// Recover the native pointer, or `None` for a WASM handle.
    pub fn as_native_ptr<T>(self) -> Option<*mut T> {
        match self {
            Handle::Native(addr) => Some(std::ptr::with_exposed_provenance_mut(addr)),
            Handle::Wasm(_) => None,
        }
    }

    /// The linear-memory offset, or `None` for a native handle.
    pub fn as_wasm_offset(self) -> Option<u32> {
        match self {
            Handle::Wasm(offset) => Some(offset),
            Handle::Native(_) => None,
        }
    }

    /// The null handle of the given ABI.
    pub fn null(abi: AbiKind) -> Self {
        match abi {
            AbiKind::Native => Self::NULL_NATIVE,
            AbiKind::Wasm => Self::NULL_WASM,
        }
    }

    /// Whether this is the null sentinel.
    pub fn is_null(self) -> bool {
        self.address() == 0
    }

    /// The ABI this handle belongs to.
    pub fn abi(self) -> AbiKind {
        match self {
            Handle::Native(_) => AbiKind::Native,
            Handle::Wasm(_) => AbiKind::Wasm,
        }
    }

    /// Numeric address, widened to `u64` for logging and comparison.
    pub fn address(self) -> u64 {
        match self {
            Handle::Native(addr) => addr as u64,
            Handle::Wasm(offset) => u64::from(offset),
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.abi(), self.address())
    }
}
