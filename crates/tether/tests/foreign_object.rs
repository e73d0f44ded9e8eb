//! Domain types built on `ForeignObject`.

use tether::prelude::*;
use tether::NOT_IMPLEMENTED;
use tether_test_utils::fixtures::{Opaque, RawBuffer, Scalar};
use tether_test_utils::wasm_runtime;

#[test]
fn deserialize_records_size_and_round_trips() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let scalar = Scalar::from_hex(&rt, &module, "0a1b2c").unwrap();
    assert_eq!(scalar.size(), 3);
    assert_eq!(scalar.serialize().unwrap(), "0a1b2c");
    assert_eq!(scalar.display().to_string(), "Scalar(0a1b2c)");
    assert_eq!(module.freed_raw().len(), 1);
}

#[test]
fn odd_length_hex_is_padded_before_the_foreign_call() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let scalar = Scalar::from_hex(&rt, &module, "abc").unwrap();
    assert_eq!(scalar.serialize().unwrap(), "0abc");
    assert_eq!(scalar.size(), 2);
}

#[test]
fn failed_deserialize_surfaces_status() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let err = Scalar::from_hex(&rt, &module, "zz").unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("Deserialize Scalar failed"), "{msg}");
    assert!(msg.contains("11"), "{msg}");
    assert!(msg.contains("Unknown encoding"), "{msg}");
    assert!(module.freed_obj().is_empty());
    assert_eq!(module.freed_raw().len(), 1);
    assert_eq!(rt.stats().registered, 0);
}

#[test]
fn unoverridden_serialize_returns_sentinel() {
    let (rt, _module) = wasm_runtime(SchedulerConfig::default());
    let opaque = Opaque::from_handle(&rt, tag(Handle::Wasm(0x100))).unwrap();
    assert_eq!(opaque.serialize().unwrap(), NOT_IMPLEMENTED);
    assert_eq!(opaque.display().to_string(), "Opaque(NOT IMPLEMENTED)");
    assert_eq!(opaque.size(), 0);
}

#[test]
fn serialize_with_frees_the_string_buffer() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let scalar = Scalar::from_hex(&rt, &module, "beef").unwrap();
    let mut produced = 0;
    let hex = scalar
        .serialize_with(|h| {
            produced = module.serialize(h.as_wasm_offset().unwrap_or(0));
            Handle::Wasm(produced)
        })
        .unwrap();
    assert_eq!(hex, "beef");
    assert!(module.freed_raw().contains(&produced));
}

#[test]
fn disposed_object_displays_the_error() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let mut scalar = Scalar::from_hex(&rt, &module, "01").unwrap();
    scalar.dispose().unwrap();
    assert_eq!(
        scalar.value(),
        Err(HandleError::UseAfterDispose { class: "Scalar" })
    );
    assert_eq!(
        scalar.display().to_string(),
        "Scalar(<Scalar used after dispose>)"
    );
}

#[test]
fn custom_release_type_uses_raw_free() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let buf = RawBuffer::from_handle_and_size(&rt, tag(Handle::Wasm(0x700)), 64).unwrap();
    assert_eq!(buf.size(), 64);
    drop(buf);
    assert!(module.freed_obj().is_empty());
    assert_eq!(module.freed_raw(), vec![0x700]);
}

#[test]
fn component_view_borrows_from_parent() {
    let (rt, module) = wasm_runtime(SchedulerConfig::default());
    let mut parent = Scalar::from_hex(&rt, &module, "0102").unwrap();
    let part = module.alloc_object("03");
    {
        let view = parent
            .object()
            .component("Part", tag(Handle::Wasm(part)))
            .unwrap();
        assert_eq!(view.ownership(), Ownership::Borrowed);
        assert_eq!(view.class(), "Part");
    }
    parent.dispose().unwrap();
    assert_eq!(module.release_count(part), 0);
    assert_eq!(module.freed_obj().len(), 1);
}
