//! End-to-end lifecycle scenarios against a fake WebAssembly module.

use tether::prelude::*;
use tether::types::{AbiKind, ResultRecord};
use tether::CheckedRecord;
use tether_test_utils::{wasm_runtime, CountingBackend, Freed, RecordBuilder};

#[test]
fn construct_then_dispose_twice_releases_once() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let envelope = module.write_record(
        &RecordBuilder::value(MemoryModel::WASM32)
            .payload(0x100)
            .sizes(&[32]),
    );
    let checked = rt
        .check(Handle::Wasm(envelope), RecordShape::Value, "Generate scalar")
        .unwrap();
    let mut a = HandleObject::adopt(&rt, "Scalar", checked.handle).unwrap();

    a.dispose().unwrap();
    a.dispose().unwrap();
    drop(a);

    assert_eq!(module.release_count(0x100), 1);
    assert_eq!(module.freed_obj(), vec![0x100]);
    assert_eq!(module.freed_raw(), vec![envelope]);
}

#[test]
fn failure_record_reports_status_and_never_releases_payload() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let envelope = module.failure_record(Status::VALUE_OUTSIDE_RANGE);

    let record = rt.decode(Handle::Wasm(envelope), RecordShape::Value).unwrap();
    assert_eq!(record.handle(), None);
    let err = rt.assert_success(&record, "Deserialize scalar").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("12"), "{msg}");
    assert!(msg.contains("Value outside the valid range"), "{msg}");

    let err = rt
        .check(Handle::Wasm(envelope), RecordShape::Value, "Deserialize scalar")
        .unwrap_err();
    assert!(matches!(err, HandleError::ForeignCall(_)));
    assert_eq!(module.release_count(0x5000), 0);
    assert!(module.freed_obj().is_empty());
    assert_eq!(module.freed_raw(), vec![envelope]);
}

#[test]
fn transfer_leaves_release_to_destination() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let mut b = HandleObject::adopt(&rt, "Point", tag(Handle::Wasm(0x200))).unwrap();
    let mut c = b.transfer().unwrap();

    b.dispose().unwrap();
    assert_eq!(module.release_count(0x200), 0);

    c.dispose().unwrap();
    drop((b, c));
    assert_eq!(module.release_count(0x200), 1);
}

#[test]
fn tx_record_exposes_both_indices() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let envelope = module.write_record(
        &RecordBuilder::tx(MemoryModel::WASM32)
            .payload(0x900)
            .sizes(&[2, 7]),
    );
    let CheckedRecord { handle, sizes } = rt
        .check(Handle::Wasm(envelope), RecordShape::Tx, "Build tx")
        .unwrap();
    assert_eq!(handle.handle(), Handle::Wasm(0x900));
    assert_eq!(sizes.as_slice(), &[2, 7]);
}

#[test]
fn input_amount_error_names_the_operation() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let envelope = module.write_record(
        &RecordBuilder::tx(MemoryModel::WASM32)
            .status(Status::IN_AMOUNT_ERROR.code())
            .payload(0x900),
    );
    let err = rt
        .check(Handle::Wasm(envelope), RecordShape::Tx, "Build tx")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Build tx failed: error code 14: Input amount error"
    );
    assert!(module.freed_obj().is_empty());
}

#[test]
fn unknown_status_code_is_reported() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let envelope = module.write_record(&RecordBuilder::value(MemoryModel::WASM32).status(99));
    let err = rt
        .check(Handle::Wasm(envelope), RecordShape::Value, "op")
        .unwrap_err();
    assert!(err.to_string().contains("Unknown error (code: 99)"));
}

#[test]
fn plain_constructor_argument_passes_through() {
    let arg: CtorArg<u64> = CtorArg::Plain(42);
    assert!(!is_tagged(&arg));
    assert_eq!(untag(arg), Err(42));

    let arg: CtorArg<u64> = tag(Handle::Wasm(0x100)).into();
    assert!(is_tagged(&arg));
    assert_eq!(untag(arg), Ok(Handle::Wasm(0x100)));
}

#[test]
fn native_runtime_double_releases_once() {
    let backend = CountingBackend::new(AbiKind::Native);
    let rt = backend.runtime(SchedulerConfig::default());
    let payload = Handle::Native(0x1000);
    let record = ResultRecord::success(RecordShape::Value, payload, [8].into_iter().collect())
        .unwrap();
    backend.add_record(Handle::Native(0x40), record);

    let checked = rt
        .check(Handle::Native(0x40), RecordShape::Value, "Generate scalar")
        .unwrap();
    let mut obj = HandleObject::adopt(&rt, "Scalar", checked.handle).unwrap();
    obj.dispose().unwrap();
    obj.dispose().unwrap();

    assert_eq!(
        backend.freed(),
        vec![Freed::Raw(Handle::Native(0x40)), Freed::Obj(payload)]
    );
}

#[test]
fn native_finalizer_failure_is_counted_not_raised() {
    let backend = CountingBackend::new(AbiKind::Native);
    let rt = backend.runtime(SchedulerConfig::default());
    backend.fail_on(Handle::Native(0x1000));

    drop(HandleObject::adopt(&rt, "Scalar", tag(Handle::Native(0x1000))).unwrap());
    drop(HandleObject::adopt(&rt, "Scalar", tag(Handle::Native(0x2000))).unwrap());

    assert_eq!(backend.freed(), vec![Freed::Obj(Handle::Native(0x2000))]);
    let stats = rt.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.released, 1);
}

#[test]
fn native_string_is_copied_then_freed_raw() {
    let backend = CountingBackend::new(AbiKind::Native);
    let rt = backend.runtime(SchedulerConfig::default());
    backend.add_string(Handle::Native(0x3000), "cafe");

    assert_eq!(rt.take_string(Handle::Native(0x3000)).unwrap(), "cafe");
    assert_eq!(rt.take_string(Handle::NULL_NATIVE).unwrap(), "");
    assert_eq!(backend.freed(), vec![Freed::Raw(Handle::Native(0x3000))]);
}
