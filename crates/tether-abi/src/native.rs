//! Native-object ABI: the foreign library is linked into the process.
//!
//! Handles are object addresses. Result records are `repr(C)` structs that
//! the library heap-allocates and the caller frees with the library's own
//! free-object entry point.

use std::ffi::{c_char, c_void, CStr};

use smallvec::smallvec;
use tether_core::{
    AbiKind, DecodeError, Handle, RecordShape, ReleaseError, ResultRecord, Status,
};

use crate::backend::{check_abi, ReleaseBackend};
use crate::decode::ResultDecoder;

/// Signature of the library's free entry points.
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// Free entry points resolved from the native library.
#[derive(Clone, Copy, Debug)]
pub struct NativeSymbols {
    /// Generic typed-object free (`free_obj`).
    pub free_obj: FreeFn,
    /// Raw allocator free (`free`), for strings and byte buffers.
    pub free: FreeFn,
}

/// `{status, value, value_size}` as laid out by the native library.
#[repr(C)]
#[derive(Debug)]
pub struct NativeRetVal {
    /// Status byte; 0 on success.
    pub result: u8,
    /// Payload object.
    pub value: *mut c_void,
    /// Serialized size of the payload in bytes.
    pub value_size: usize,
}

/// `{status, ctx, in_amount_err_index, out_amount_err_index}` as laid out
/// by the native library.
#[repr(C)]
#[derive(Debug)]
pub struct NativeTxRetVal {
    /// Status byte; 0 on success.
    pub result: u8,
    /// Payload transaction object.
    pub ctx: *mut c_void,
    /// Index of the offending input on an input amount error.
    pub in_amount_err_index: usize,
    /// Index of the offending output on an output amount error.
    pub out_amount_err_index: usize,
}

/// Decode an already-read value record: identity plus status check.
pub fn decode_value_record(rv: &NativeRetVal) -> Result<ResultRecord, DecodeError> {
    let status = Status(rv.result);
    if !status.is_success() {
        return ResultRecord::failure(RecordShape::Value, status);
    }
    ResultRecord::success(
        RecordShape::Value,
        Handle::from_native_ptr(rv.value),
        smallvec![rv.value_size],
    )
}

/// Decode an already-read transaction record: identity plus status check.
pub fn decode_tx_record(rv: &NativeTxRetVal) -> Result<ResultRecord, DecodeError> {
    let status = Status(rv.result);
    if !status.is_success() {
        return ResultRecord::failure(RecordShape::Tx, status);
    }
    ResultRecord::success(
        RecordShape::Tx,
        Handle::from_native_ptr(rv.ctx),
        smallvec![rv.in_amount_err_index, rv.out_amount_err_index],
    )
}

/// Release backend and decoder for an in-process native library.
#[derive(Debug)]
pub struct NativeAbi {
    symbols: NativeSymbols,
}

impl NativeAbi {
    /// Bind to a native library.
    ///
    /// # Safety
    ///
    /// `symbols` must be the library's free entry points. Every non-null
    /// native handle later passed to this backend must be one the library
    /// returned and that has not been released yet, and every envelope
    /// passed to [`ResultDecoder::decode`] must point at a record of the
    /// shape named in the call.
    #[allow(unsafe_code)]
    pub unsafe fn new(symbols: NativeSymbols) -> Self {
        Self { symbols }
    }

    #[allow(unsafe_code)]
    fn call(&self, f: FreeFn, handle: Handle) -> Result<(), ReleaseError> {
        if handle.is_null() {
            return Ok(());
        }
        check_abi(AbiKind::Native, handle)?;
        if let Some(ptr) = handle.as_native_ptr::<c_void>() {
            tracing::trace!(%handle, "native free");
            // SAFETY: the handle is a live library allocation per the
            // contract of `NativeAbi::new`; ownership discipline upstream
            // guarantees it reaches a free entry point at most once.
            unsafe { f(ptr) };
        }
        Ok(())
    }
}

impl ReleaseBackend for NativeAbi {
    fn abi(&self) -> AbiKind {
        AbiKind::Native
    }

    fn free_obj(&self, handle: Handle) -> Result<(), ReleaseError> {
        self.call(self.symbols.free_obj, handle)
    }

    fn free_raw(&self, ptr: Handle) -> Result<(), ReleaseError> {
        self.call(self.symbols.free, ptr)
    }

    /// The native library allocates envelopes as objects.
    fn free_envelope(&self, record: Handle) -> Result<(), ReleaseError> {
        self.free_obj(record)
    }
}

impl ResultDecoder for NativeAbi {
    #[allow(unsafe_code)]
    fn decode(&self, envelope: Handle, shape: RecordShape) -> Result<ResultRecord, DecodeError> {
        if envelope.abi() != AbiKind::Native {
            return Err(DecodeError::AbiMismatch {
                expected: AbiKind::Native,
                found: envelope.abi(),
            });
        }
        if envelope.is_null() {
            return Err(DecodeError::NullRecord);
        }
        match shape {
            RecordShape::Value => {
                let ptr = envelope
                    .as_native_ptr::<NativeRetVal>()
                    .ok_or(DecodeError::NullRecord)?;
                // SAFETY: non-null and points at a value record per the
                // contract of `NativeAbi::new`.
                let rv = unsafe { &*ptr };
                decode_value_record(rv)
            }
            RecordShape::Tx => {
                let ptr = envelope
                    .as_native_ptr::<NativeTxRetVal>()
                    .ok_or(DecodeError::NullRecord)?;
                // SAFETY: non-null and points at a transaction record per
                // the contract of `NativeAbi::new`.
                let rv = unsafe { &*ptr };
                decode_tx_record(rv)
            }
        }
    }

    #[allow(unsafe_code)]
    fn read_string(&self, ptr: Handle) -> Result<String, DecodeError> {
        let raw = ptr
            .as_native_ptr::<c_char>()
            .ok_or(DecodeError::AbiMismatch {
                expected: AbiKind::Native,
                found: ptr.abi(),
            })?;
        if raw.is_null() {
            return Err(DecodeError::NullRecord);
        }
        // SAFETY: non-null, NUL-terminated string returned by the library
        // per the contract of `NativeAbi::new`.
        let s = unsafe { CStr::from_ptr(raw) };
        s.to_str()
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidString {
                offset: ptr.address(),
            })
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static FREED_OBJ: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
        static FREED_RAW: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn record_free_obj(p: *mut c_void) {
        FREED_OBJ.with(|v| v.borrow_mut().push(p as usize));
    }

    unsafe extern "C" fn record_free(p: *mut c_void) {
        FREED_RAW.with(|v| v.borrow_mut().push(p as usize));
    }

    fn abi() -> NativeAbi {
        FREED_OBJ.with(|v| v.borrow_mut().clear());
        FREED_RAW.with(|v| v.borrow_mut().clear());
        // SAFETY: the recording functions never dereference their argument.
        unsafe {
            NativeAbi::new(NativeSymbols {
                free_obj: record_free_obj,
                free: record_free,
            })
        }
    }

    fn freed_obj() -> Vec<usize> {
        FREED_OBJ.with(|v| v.borrow().clone())
    }

    fn freed_raw() -> Vec<usize> {
        FREED_RAW.with(|v| v.borrow().clone())
    }

    #[test]
    fn decode_success_value_record() {
        let abi = abi();
        let mut payload = 0u64;
        let mut rv = NativeRetVal {
            result: 0,
            value: (&raw mut payload).cast(),
            value_size: 32,
        };
        let rec = abi
            .decode(Handle::from_native_ptr(&raw mut rv), RecordShape::Value)
            .unwrap();
        assert!(rec.is_success());
        assert_eq!(
            rec.handle(),
            Some(Handle::from_native_ptr(&raw mut payload))
        );
        assert_eq!(rec.value_size(), 32);
    }

    #[test]
    fn decode_failure_ignores_payload() {
        let abi = abi();
        let mut rv = NativeRetVal {
            result: 12,
            value: std::ptr::without_provenance_mut(0xdead),
            value_size: 99,
        };
        let rec = abi
            .decode(Handle::from_native_ptr(&raw mut rv), RecordShape::Value)
            .unwrap();
        assert_eq!(rec.status(), Status::VALUE_OUTSIDE_RANGE);
        assert_eq!(rec.handle(), None);
        assert!(rec.sizes().is_empty());
    }

    #[test]
    fn decode_tx_record_reads_both_indices() {
        let abi = abi();
        let mut ctx = 0u8;
        let mut rv = NativeTxRetVal {
            result: 0,
            ctx: (&raw mut ctx).cast(),
            in_amount_err_index: 3,
            out_amount_err_index: 5,
        };
        let rec = abi
            .decode(Handle::from_native_ptr(&raw mut rv), RecordShape::Tx)
            .unwrap();
        assert_eq!(rec.sizes(), &[3, 5]);
    }

    #[test]
    fn decode_rejects_null_and_foreign_envelopes() {
        let abi = abi();
        assert_eq!(
            abi.decode(Handle::NULL_NATIVE, RecordShape::Value),
            Err(DecodeError::NullRecord)
        );
        assert_eq!(
            abi.decode(Handle::Wasm(8), RecordShape::Value),
            Err(DecodeError::AbiMismatch {
                expected: AbiKind::Native,
                found: AbiKind::Wasm
            })
        );
    }

    #[test]
    fn success_with_null_payload_is_rejected() {
        let rv = NativeRetVal {
            result: 0,
            value: std::ptr::null_mut(),
            value_size: 0,
        };
        assert_eq!(
            decode_value_record(&rv),
            Err(DecodeError::NullPayload {
                shape: RecordShape::Value
            })
        );
    }

    #[test]
    fn free_functions_route_to_distinct_symbols() {
        let abi = abi();
        abi.free_obj(Handle::Native(0x100)).unwrap();
        abi.free_raw(Handle::Native(0x200)).unwrap();
        abi.free_envelope(Handle::Native(0x300)).unwrap();
        assert_eq!(freed_obj(), vec![0x100, 0x300]);
        assert_eq!(freed_raw(), vec![0x200]);
    }

    #[test]
    fn null_handle_is_a_no_op() {
        let abi = abi();
        abi.free_obj(Handle::NULL_NATIVE).unwrap();
        abi.free_raw(Handle::NULL_NATIVE).unwrap();
        abi.free_obj(Handle::NULL_WASM).unwrap();
        abi.free_envelope(Handle::NULL_WASM).unwrap();
        assert!(freed_obj().is_empty());
        assert!(freed_raw().is_empty());
    }

    #[test]
    fn wasm_handle_is_rejected() {
        let abi = abi();
        assert!(matches!(
            abi.free_obj(Handle::Wasm(0x100)),
            Err(ReleaseError::AbiMismatch { .. })
        ));
        assert!(freed_obj().is_empty());
    }

    #[test]
    fn read_string_copies_c_string() {
        let abi = abi();
        let mut bytes = *b"0a1b\0";
        let s = abi
            .read_string(Handle::from_native_ptr(bytes.as_mut_ptr()))
            .unwrap();
        assert_eq!(s, "0a1b");
    }
}
