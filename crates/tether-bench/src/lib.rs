//! Benchmark profiles for the Tether lifecycle core.
//!
//! - [`record_image`]: a linear memory image packed with result records
//! - [`RECORD_COUNT`]: records per image in the decode benches

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tether_core::{MemoryModel, RecordShape, Status};
use tether_test_utils::RecordBuilder;

/// Records per image.
pub const RECORD_COUNT: usize = 1024;

/// Build a memory image holding `count` records of `shape`.
///
/// Every eighth record carries a failure status so decoding exercises the
/// short-circuit path. Returns the image and each record's offset.
pub fn record_image(shape: RecordShape, model: MemoryModel, count: usize) -> (Vec<u8>, Vec<u32>) {
    let mut image = vec![0u8; 16];
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        let status = if i % 8 == 7 {
            Status::VALUE_OUTSIDE_RANGE.code()
        } else {
            Status::SUCCESS.code()
        };
        let bytes = RecordBuilder::new(shape, model)
            .status(status)
            .payload(0x1_0000 + (i as u64) * 64)
            .sizes(&[32, i as u64])
            .build();
        offsets.push(image.len() as u32);
        image.extend_from_slice(&bytes);
    }
    (image, offsets)
}
