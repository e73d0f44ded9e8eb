//! Result records and their computed memory layout.
//!
//! A fallible foreign call returns an envelope laid out as a C struct:
//!
//! ```text
//! offset 0                      status: u8
//! align_up(1, ptr)              payload: pointer
//! + ptr                         size field 0: size_t
//! (+ ptr)                       size field 1: size_t   (Tx shape only)
//! ```
//!
//! Offsets are always derived from the [`MemoryModel`]. A wrong offset does
//! not crash: it silently yields a plausible garbage pointer, so nothing in
//! this module hard-codes one.

use smallvec::SmallVec;

use crate::error::DecodeError;
use crate::handle::Handle;
use crate::status::Status;

/// Decoded size fields. At most two for every known record shape.
pub type SizeFields = SmallVec<[usize; 2]>;

/// Offset of the status byte in every record.
pub const STATUS_OFFSET: usize = 0;

/// Width of the status field in bytes.
pub const STATUS_WIDTH: usize = 1;

/// Round `offset` up to the next multiple of `align`.
///
/// `align` must be a power of two.
pub const fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}

/// Pointer width of the foreign address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryModel {
    pointer_size: usize,
}

impl MemoryModel {
    /// 32-bit WebAssembly memory (the default).
    pub const WASM32: MemoryModel = MemoryModel { pointer_size: 4 };

    /// 64-bit WebAssembly memory (memory64).
    pub const WASM64: MemoryModel = MemoryModel { pointer_size: 8 };

    /// The host's own pointer width, used by native records.
    pub const NATIVE: MemoryModel = MemoryModel {
        pointer_size: std::mem::size_of::<usize>(),
    };

    /// Pointer (and `size_t`) width in bytes.
    pub const fn pointer_size(self) -> usize {
        self.pointer_size
    }
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::WASM32
    }
}

/// Which record struct a foreign call returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordShape {
    /// `{status, value, value_size}`: object constructors and deserializers.
    Value,
    /// `{status, ctx, in_amount_err_index, out_amount_err_index}`:
    /// transaction builders.
    Tx,
}

impl RecordShape {
    /// Number of size fields trailing the payload pointer.
    pub const fn size_fields(self) -> usize {
        match self {
            Self::Value => 1,
            Self::Tx => 2,
        }
    }
}

/// Byte offsets of every field in a record, computed for one memory model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordLayout {
    handle_offset: usize,
    size_offsets: SmallVec<[usize; 2]>,
    field_width: usize,
    total_len: usize,
}

impl RecordLayout {
    /// Compute the layout of `shape` under `model`.
    pub fn new(shape: RecordShape, model: MemoryModel) -> Self {
        let width = model.pointer_size();
        let handle_offset = align_up(STATUS_OFFSET + STATUS_WIDTH, width);
        let mut next = handle_offset + width;
        let mut size_offsets = SmallVec::new();
        for _ in 0..shape.size_fields() {
            size_offsets.push(next);
            next += width;
        }
        Self {
            handle_offset,
            size_offsets,
            field_width: width,
            total_len: align_up(next, width),
        }
    }

    /// Offset of the status byte.
    pub fn status_offset(&self) -> usize {
        STATUS_OFFSET
    }

    /// Offset of the payload pointer.
    pub fn handle_offset(&self) -> usize {
        self.handle_offset
    }

    /// Offsets of the size fields, in declaration order.
    pub fn size_offsets(&self) -> &[usize] {
        &self.size_offsets
    }

    /// Width of the pointer and size fields.
    pub fn field_width(&self) -> usize {
        self.field_width
    }

    /// Total struct size including trailing padding.
    pub fn total_len(&self) -> usize {
        self.total_len
    }
}

/// A decoded result record.
///
/// Invariant: `status` is success iff `handle` is `Some` non-null handle.
/// Failure records never carry the payload or the size fields: they are
/// not read past the status byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRecord {
    shape: RecordShape,
    status: Status,
    handle: Option<Handle>,
    sizes: SizeFields,
}

impl ResultRecord {
    /// Build a success record.
    ///
    /// Fails with [`DecodeError::NullPayload`] if the foreign side reported
    /// success with a null payload.
    pub fn success(
        shape: RecordShape,
        payload: Handle,
        sizes: SizeFields,
    ) -> Result<Self, DecodeError> {
        if payload.is_null() {
            return Err(DecodeError::NullPayload { shape });
        }
        if sizes.len() != shape.size_fields() {
            return Err(DecodeError::SizeFieldCount {
                shape,
                found: sizes.len(),
            });
        }
        Ok(Self {
            shape,
            status: Status::SUCCESS,
            handle: Some(payload),
            sizes,
        })
    }

    /// Build a failure record. Nothing beyond the status is kept.
    pub fn failure(shape: RecordShape, status: Status) -> Result<Self, DecodeError> {
        if status.is_success() {
            return Err(DecodeError::NullPayload { shape });
        }
        Ok(Self {
            shape,
            status,
            handle: None,
            sizes: SizeFields::new(),
        })
    }

    /// Record shape this was decoded as.
    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    /// Reported status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Payload handle; `None` for failure records.
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Size fields; empty for failure records.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// First size field (`value_size` on the `Value` shape), 0 if absent.
    pub fn value_size(&self) -> usize {
        self.sizes.first().copied().unwrap_or(0)
    }
}
