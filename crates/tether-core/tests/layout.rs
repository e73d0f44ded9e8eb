//! Record layout properties across memory models.

use proptest::prelude::*;
use tether_core::{align_up, MemoryModel, RecordLayout, RecordShape};

fn model() -> impl Strategy<Value = MemoryModel> {
    prop_oneof![Just(MemoryModel::WASM32), Just(MemoryModel::WASM64)]
}

fn shape() -> impl Strategy<Value = RecordShape> {
    prop_oneof![Just(RecordShape::Value), Just(RecordShape::Tx)]
}

proptest! {
    #[test]
    fn payload_follows_status_at_pointer_alignment(model in model(), shape in shape()) {
        let layout = RecordLayout::new(shape, model);
        let width = model.pointer_size();
        prop_assert_eq!(layout.status_offset(), 0);
        prop_assert_eq!(layout.handle_offset(), align_up(1, width));
        prop_assert_eq!(layout.handle_offset() % width, 0);
    }

    #[test]
    fn size_fields_are_contiguous(model in model(), shape in shape()) {
        let layout = RecordLayout::new(shape, model);
        let width = layout.field_width();
        prop_assert_eq!(layout.size_offsets().len(), shape.size_fields());
        let mut expected = layout.handle_offset() + width;
        for &off in layout.size_offsets() {
            prop_assert_eq!(off, expected);
            expected += width;
        }
        prop_assert_eq!(layout.total_len(), expected);
        prop_assert_eq!(layout.total_len() % width, 0);
    }

    #[test]
    fn align_up_is_smallest_multiple(offset in 0usize..4096, exp in 0u32..6) {
        let align = 1usize << exp;
        let up = align_up(offset, align);
        prop_assert!(up >= offset);
        prop_assert_eq!(up % align, 0);
        prop_assert!(up - offset < align);
    }
}

#[test]
fn native_model_matches_host_pointer_width() {
    let layout = RecordLayout::new(RecordShape::Value, MemoryModel::NATIVE);
    assert_eq!(layout.field_width(), std::mem::size_of::<usize>());
    assert_eq!(layout.total_len(), 3 * std::mem::size_of::<usize>());
}
