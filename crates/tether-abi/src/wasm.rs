//! WASM linear-memory ABI: the foreign library is a WebAssembly module.
//!
//! Handles are byte offsets into the module's linear memory. A fallible
//! call returns the offset of a result record that the host decodes field by
//! field using a [`RecordLayout`] computed for the module's [`MemoryModel`].
//! All fields are little-endian.

use std::rc::Rc;

use tether_core::{
    AbiKind, DecodeError, Handle, MemoryModel, RecordLayout, RecordShape, ReleaseError,
    ResultRecord, SizeFields, Status,
};

use crate::backend::{check_abi, ReleaseBackend};
use crate::decode::ResultDecoder;

/// Embedder-facing view of an instantiated WebAssembly module.
///
/// Implementations wrap whatever engine hosts the module. Methods take
/// `&self`; embedders that need mutable store access use interior
/// mutability, matching the single-threaded execution model.
pub trait WasmModule {
    /// Current linear memory size in bytes.
    fn memory_len(&self) -> usize;

    /// Copy `buf.len()` bytes starting at `offset` out of linear memory.
    ///
    /// Returns `false`, leaving `buf` unspecified, if the range is out of
    /// bounds.
    fn read_memory(&self, offset: usize, buf: &mut [u8]) -> bool;

    /// Call the module's `free_obj` export.
    fn free_obj(&self, ptr: u32) -> Result<(), String>;

    /// Call the module's raw allocator `free` export.
    fn free(&self, ptr: u32) -> Result<(), String>;
}

impl<M: WasmModule + ?Sized> WasmModule for Box<M> {
    fn memory_len(&self) -> usize {
        (**self).memory_len()
    }

    fn read_memory(&self, offset: usize, buf: &mut [u8]) -> bool {
        (**self).read_memory(offset, buf)
    }

    fn free_obj(&self, ptr: u32) -> Result<(), String> {
        (**self).free_obj(ptr)
    }

    fn free(&self, ptr: u32) -> Result<(), String> {
        (**self).free(ptr)
    }
}

impl<M: WasmModule + ?Sized> WasmModule for Rc<M> {
    fn memory_len(&self) -> usize {
        (**self).memory_len()
    }

    fn read_memory(&self, offset: usize, buf: &mut [u8]) -> bool {
        (**self).read_memory(offset, buf)
    }

    fn free_obj(&self, ptr: u32) -> Result<(), String> {
        (**self).free_obj(ptr)
    }

    fn free(&self, ptr: u32) -> Result<(), String> {
        (**self).free(ptr)
    }
}

fn out_of_bounds(offset: usize, len: usize, memory_len: usize) -> DecodeError {
    DecodeError::OutOfBounds {
        offset,
        len,
        memory_len,
    }
}

fn slice_at(memory: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(len)
        .and_then(|end| memory.get(offset..end))
        .ok_or_else(|| out_of_bounds(offset, len, memory.len()))
}

/// Read one pointer-sized little-endian field.
fn read_field(memory: &[u8], offset: usize, width: usize) -> Result<u64, DecodeError> {
    let bytes = slice_at(memory, offset, width)?;
    match width {
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            Ok(u64::from(u32::from_le_bytes(buf)))
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            Ok(u64::from_le_bytes(buf))
        }
        _ => Err(DecodeError::FieldOverflow { offset }),
    }
}

fn decode_fields(
    memory: &[u8],
    base: usize,
    shape: RecordShape,
    layout: &RecordLayout,
) -> Result<ResultRecord, DecodeError> {
    let at = |field: usize| {
        base.checked_add(field)
            .ok_or_else(|| out_of_bounds(base, field, memory.len()))
    };

    let status = Status(slice_at(memory, at(layout.status_offset())?, 1)?[0]);
    if !status.is_success() {
        return ResultRecord::failure(shape, status);
    }

    let handle_at = at(layout.handle_offset())?;
    let payload = read_field(memory, handle_at, layout.field_width())?;
    let payload =
        u32::try_from(payload).map_err(|_| DecodeError::FieldOverflow { offset: handle_at })?;

    let mut sizes = SizeFields::new();
    for &field in layout.size_offsets() {
        let size_at = at(field)?;
        let raw = read_field(memory, size_at, layout.field_width())?;
        let size =
            usize::try_from(raw).map_err(|_| DecodeError::FieldOverflow { offset: size_at })?;
        sizes.push(size);
    }

    ResultRecord::success(shape, Handle::Wasm(payload), sizes)
}

/// Decode the record at `envelope` directly from a linear memory image.
///
/// Reads the status byte at the record's offset 0. Only on success are the
/// payload pointer (at `align_up(1, pointer_size)`) and the size fields
/// (immediately after) read.
pub fn decode_record(
    memory: &[u8],
    envelope: u32,
    shape: RecordShape,
    model: MemoryModel,
) -> Result<ResultRecord, DecodeError> {
    if envelope == 0 {
        return Err(DecodeError::NullRecord);
    }
    let layout = RecordLayout::new(shape, model);
    decode_fields(memory, envelope as usize, shape, &layout)
}

/// Release backend and decoder for a WebAssembly module.
#[derive(Debug)]
pub struct WasmAbi<M> {
    module: M,
    model: MemoryModel,
}

impl<M: WasmModule> WasmAbi<M> {
    /// Bind to an instantiated module using the given memory model.
    pub fn new(module: M, model: MemoryModel) -> Self {
        Self { module, model }
    }

    /// The wrapped module.
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Memory model used to compute record layouts.
    pub fn model(&self) -> MemoryModel {
        self.model
    }

    fn offset_of(handle: Handle) -> Result<u32, DecodeError> {
        handle.as_wasm_offset().ok_or(DecodeError::AbiMismatch {
            expected: AbiKind::Wasm,
            found: handle.abi(),
        })
    }
}

impl<M: WasmModule> ReleaseBackend for WasmAbi<M> {
    fn abi(&self) -> AbiKind {
        AbiKind::Wasm
    }

    fn free_obj(&self, handle: Handle) -> Result<(), ReleaseError> {
        if handle.is_null() {
            return Ok(());
        }
        check_abi(AbiKind::Wasm, handle)?;
        match handle.as_wasm_offset() {
            Some(0) | None => Ok(()),
            Some(ptr) => {
                tracing::trace!(%handle, "wasm free_obj");
                self.module.free_obj(ptr).map_err(|reason| ReleaseError::Trap {
                    export: "free_obj",
                    reason,
                })
            }
        }
    }

    fn free_raw(&self, ptr: Handle) -> Result<(), ReleaseError> {
        if ptr.is_null() {
            return Ok(());
        }
        check_abi(AbiKind::Wasm, ptr)?;
        match ptr.as_wasm_offset() {
            Some(0) | None => Ok(()),
            Some(offset) => {
                tracing::trace!(handle = %ptr, "wasm free");
                self.module.free(offset).map_err(|reason| ReleaseError::Trap {
                    export: "free",
                    reason,
                })
            }
        }
    }
}

impl<M: WasmModule> ResultDecoder for WasmAbi<M> {
    fn decode(&self, envelope: Handle, shape: RecordShape) -> Result<ResultRecord, DecodeError> {
        let offset = Self::offset_of(envelope)?;
        if offset == 0 {
            return Err(DecodeError::NullRecord);
        }
        let layout = RecordLayout::new(shape, self.model);
        let base = offset as usize;
        let mut status = [0u8; 1];
        if !self.module.read_memory(base + layout.status_offset(), &mut status) {
            return Err(out_of_bounds(base, 1, self.module.memory_len()));
        }
        if !Status(status[0]).is_success() {
            return ResultRecord::failure(shape, Status(status[0]));
        }
        let mut image = vec![0u8; layout.total_len()];
        if !self.module.read_memory(base, &mut image) {
            return Err(out_of_bounds(
                offset as usize,
                image.len(),
                self.module.memory_len(),
            ));
        }
        decode_fields(&image, 0, shape, &layout)
    }

    fn read_string(&self, ptr: Handle) -> Result<String, DecodeError> {
        let start = Self::offset_of(ptr)? as usize;
        if start == 0 {
            return Err(DecodeError::NullRecord);
        }
        let memory_len = self.module.memory_len();
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let at = start + bytes.len();
            if !self.module.read_memory(at, &mut byte) {
                return Err(out_of_bounds(start, bytes.len() + 1, memory_len));
            }
            if byte[0] == 0 {
                break;
            }
            bytes.push(byte[0]);
        }
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidString {
            offset: ptr.address(),
        })
    }
}
