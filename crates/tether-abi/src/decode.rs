//! The decoding half of a foreign ABI.

use tether_core::{DecodeError, Handle, RecordShape, ResultRecord};

/// Parses result record envelopes and foreign strings.
pub trait ResultDecoder {
    /// Decode the record behind `envelope`.
    ///
    /// The status byte is read first. A failure status short-circuits:
    /// neither the payload pointer nor the size fields are read. The
    /// envelope itself is not released here.
    fn decode(&self, envelope: Handle, shape: RecordShape) -> Result<ResultRecord, DecodeError>;

    /// Read a NUL-terminated UTF-8 string produced by the foreign side.
    ///
    /// The buffer is not released here; it belongs to the raw allocator.
    fn read_string(&self, ptr: Handle) -> Result<String, DecodeError>;
}
