//! Native ABI against records laid out exactly as the C library lays them
//! out, with free entry points that record instead of freeing.

use std::cell::RefCell;
use std::ffi::c_void;
use std::mem::offset_of;

use tether_abi::{NativeAbi, NativeRetVal, NativeSymbols, NativeTxRetVal};
use tether_abi::{ReleaseBackend, ResultDecoder};
use tether_core::{Handle, MemoryModel, RecordLayout, RecordShape, Status};

thread_local! {
    static FREED: RefCell<Vec<(&'static str, usize)>> = const { RefCell::new(Vec::new()) };
}

unsafe extern "C" fn free_obj(p: *mut c_void) {
    FREED.with(|v| v.borrow_mut().push(("free_obj", p as usize)));
}

unsafe extern "C" fn free(p: *mut c_void) {
    FREED.with(|v| v.borrow_mut().push(("free", p as usize)));
}

fn abi() -> NativeAbi {
    FREED.with(|v| v.borrow_mut().clear());
    // SAFETY: the recording functions never dereference their argument.
    unsafe { NativeAbi::new(NativeSymbols { free_obj, free }) }
}

fn freed() -> Vec<(&'static str, usize)> {
    FREED.with(|v| v.borrow().clone())
}

#[test]
fn repr_c_layout_matches_computed_layout() {
    let value = RecordLayout::new(RecordShape::Value, MemoryModel::NATIVE);
    assert_eq!(offset_of!(NativeRetVal, result), value.status_offset());
    assert_eq!(offset_of!(NativeRetVal, value), value.handle_offset());
    assert_eq!(offset_of!(NativeRetVal, value_size), value.size_offsets()[0]);
    assert_eq!(std::mem::size_of::<NativeRetVal>(), value.total_len());

    let tx = RecordLayout::new(RecordShape::Tx, MemoryModel::NATIVE);
    assert_eq!(offset_of!(NativeTxRetVal, ctx), tx.handle_offset());
    assert_eq!(
        offset_of!(NativeTxRetVal, in_amount_err_index),
        tx.size_offsets()[0]
    );
    assert_eq!(
        offset_of!(NativeTxRetVal, out_amount_err_index),
        tx.size_offsets()[1]
    );
    assert_eq!(std::mem::size_of::<NativeTxRetVal>(), tx.total_len());
}

#[test]
fn decode_then_free_envelope_and_payload() {
    let abi = abi();
    let mut payload = [0u8; 32];
    let mut rv = Box::new(NativeRetVal {
        result: 0,
        value: payload.as_mut_ptr().cast(),
        value_size: payload.len(),
    });
    let envelope = Handle::from_native_ptr(&raw mut *rv);

    let rec = abi.decode(envelope, RecordShape::Value).unwrap();
    let obj = rec.handle().unwrap();
    assert_eq!(rec.value_size(), 32);

    abi.free_envelope(envelope).unwrap();
    abi.free_obj(obj).unwrap();
    assert_eq!(
        freed(),
        vec![
            ("free_obj", envelope.address() as usize),
            ("free_obj", payload.as_ptr() as usize),
        ]
    );
}

#[test]
fn failure_record_never_exposes_payload() {
    let abi = abi();
    let mut rv = NativeRetVal {
        result: Status::MEMO_TOO_LONG.code(),
        value: std::ptr::without_provenance_mut(0x5000),
        value_size: 0,
    };
    let rec = abi
        .decode(Handle::from_native_ptr(&raw mut rv), RecordShape::Value)
        .unwrap();
    assert_eq!(rec.status().message(), "Memo too long");
    assert_eq!(rec.handle(), None);
    assert!(freed().is_empty());
}

#[test]
fn raw_strings_go_to_raw_free() {
    let abi = abi();
    let mut text = *b"deadbeef\0";
    let ptr = Handle::from_native_ptr(text.as_mut_ptr());
    assert_eq!(abi.read_string(ptr).unwrap(), "deadbeef");
    abi.free_raw(ptr).unwrap();
    assert_eq!(freed(), vec![("free", text.as_ptr() as usize)]);
}
