//! Test doubles and fixtures for Tether development.
//!
//! - [`FakeWasmModule`]: a linear memory with a bump allocator and recorded
//!   `free_obj` / `free` calls, plus a toy hex (de)serializer.
//! - [`RecordBuilder`]: hand-built result record bytes for any shape and
//!   memory model.
//! - [`CountingBackend`]: an ABI-agnostic boundary serving canned records and
//!   counting releases, with failure injection.
//! - [`fixtures`]: domain types implementing [`tether::ForeignObject`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tether::{ForeignRuntime, RuntimeConfig, SchedulerConfig};
use tether_abi::{ReleaseBackend, ResultDecoder, WasmModule};
use tether_core::{
    AbiKind, DecodeError, Handle, MemoryModel, RecordLayout, RecordShape, ReleaseError,
    ResultRecord, Status,
};

/// Builds the raw bytes of a result record.
#[derive(Clone, Debug)]
pub struct RecordBuilder {
    shape: RecordShape,
    model: MemoryModel,
    status: u8,
    payload: u64,
    sizes: Vec<u64>,
}

impl RecordBuilder {
    pub fn new(shape: RecordShape, model: MemoryModel) -> Self {
        Self {
            shape,
            model,
            status: 0,
            payload: 0,
            sizes: vec![0; shape.size_fields()],
        }
    }

    pub fn value(model: MemoryModel) -> Self {
        Self::new(RecordShape::Value, model)
    }

    pub fn tx(model: MemoryModel) -> Self {
        Self::new(RecordShape::Tx, model)
    }

    pub fn status(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    pub fn payload(mut self, payload: u64) -> Self {
        self.payload = payload;
        self
    }

    /// Size fields in declaration order. Extra values are ignored.
    pub fn sizes(mut self, sizes: &[u64]) -> Self {
        for (slot, v) in self.sizes.iter_mut().zip(sizes) {
            *slot = *v;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = RecordLayout::new(self.shape, self.model);
        let width = layout.field_width();
        let mut buf = vec![0u8; layout.total_len()];
        buf[layout.status_offset()] = self.status;
        write_le(&mut buf, layout.handle_offset(), width, self.payload);
        for (&off, &v) in layout.size_offsets().iter().zip(&self.sizes) {
            write_le(&mut buf, off, width, v);
        }
        buf
    }
}

fn write_le(buf: &mut [u8], at: usize, width: usize, v: u64) {
    let bytes = v.to_le_bytes();
    buf[at..at + width].copy_from_slice(&bytes[..width]);
}

/// In-memory stand-in for an instantiated WebAssembly module.
///
/// Objects created by the toy (de)serializer are stored as their own
/// NUL-terminated hex text, so [`ResultDecoder::read_string`] on an object
/// handle yields its serialization.
pub struct FakeWasmModule {
    model: MemoryModel,
    memory: RefCell<Vec<u8>>,
    next: Cell<usize>,
    freed_obj: RefCell<Vec<u32>>,
    freed_raw: RefCell<Vec<u32>>,
    traps: RefCell<HashSet<u32>>,
}

impl FakeWasmModule {
    /// Initial linear memory size.
    pub const DEFAULT_MEMORY: usize = 64 * 1024;

    /// First address handed out; everything below stays zero so that no
    /// allocation is ever the null offset.
    pub const HEAP_BASE: usize = 16;

    pub fn new(model: MemoryModel) -> Self {
        Self {
            model,
            memory: RefCell::new(vec![0; Self::DEFAULT_MEMORY]),
            next: Cell::new(Self::HEAP_BASE),
            freed_obj: RefCell::new(Vec::new()),
            freed_raw: RefCell::new(Vec::new()),
            traps: RefCell::new(HashSet::new()),
        }
    }

    pub fn wasm32() -> Rc<Self> {
        Rc::new(Self::new(MemoryModel::WASM32))
    }

    pub fn model(&self) -> MemoryModel {
        self.model
    }

    /// Copy `bytes` into fresh memory, 8-byte aligned.
    pub fn alloc(&self, bytes: &[u8]) -> u32 {
        let at = self.next.get();
        let end = at + bytes.len();
        let mut memory = self.memory.borrow_mut();
        if end > memory.len() {
            memory.resize(end.next_power_of_two(), 0);
        }
        memory[at..end].copy_from_slice(bytes);
        self.next.set((end + 7) & !7);
        at as u32
    }

    pub fn alloc_string(&self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.alloc(&bytes)
    }

    /// A foreign object whose contents are `hex`.
    pub fn alloc_object(&self, hex: &str) -> u32 {
        self.alloc_string(hex)
    }

    pub fn write_record(&self, record: &RecordBuilder) -> u32 {
        self.alloc(&record.build())
    }

    /// Success record of the `Value` shape for a fresh object.
    pub fn value_record(&self, hex: &str) -> u32 {
        let obj = self.alloc_object(hex);
        let size = (hex.len() / 2) as u64;
        self.write_record(
            &RecordBuilder::value(self.model)
                .payload(u64::from(obj))
                .sizes(&[size]),
        )
    }

    /// Failure record of the `Value` shape. The payload field is filled
    /// with a plausible-looking pointer that must never be released.
    pub fn failure_record(&self, status: Status) -> u32 {
        self.write_record(
            &RecordBuilder::value(self.model)
                .status(status.code())
                .payload(0x5000)
                .sizes(&[99]),
        )
    }

    /// Toy deserializer export: hex in, result record envelope out.
    ///
    /// Fails with status 11 on non-hex input and 12 on an empty payload.
    pub fn deserialize(&self, hex: &str) -> u32 {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return self.failure_record(Status::UNKNOWN_ENCODING);
        }
        if hex.is_empty() {
            return self.failure_record(Status::VALUE_OUTSIDE_RANGE);
        }
        self.value_record(hex)
    }

    /// Toy serializer export: copies an object's hex into a raw buffer that
    /// the caller must release with `free`.
    pub fn serialize(&self, obj: u32) -> u32 {
        let text = self.read_c_string(obj);
        self.alloc_string(&text)
    }

    pub fn read_c_string(&self, at: u32) -> String {
        let memory = self.memory.borrow();
        let start = at as usize;
        let end = memory[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(memory.len(), |n| start + n);
        String::from_utf8_lossy(&memory[start..end]).into_owned()
    }

    /// Make the next `free_obj(ptr)` trap.
    pub fn trap_on(&self, ptr: u32) {
        self.traps.borrow_mut().insert(ptr);
    }

    pub fn freed_obj(&self) -> Vec<u32> {
        self.freed_obj.borrow().clone()
    }

    pub fn freed_raw(&self) -> Vec<u32> {
        self.freed_raw.borrow().clone()
    }

    /// How many times `free_obj(ptr)` reached the module.
    pub fn release_count(&self, ptr: u32) -> usize {
        self.freed_obj.borrow().iter().filter(|&&p| p == ptr).count()
    }

    /// Total `free_obj` and `free` calls.
    pub fn total_frees(&self) -> usize {
        self.freed_obj.borrow().len() + self.freed_raw.borrow().len()
    }
}

impl WasmModule for FakeWasmModule {
    fn memory_len(&self) -> usize {
        self.memory.borrow().len()
    }

    fn read_memory(&self, offset: usize, buf: &mut [u8]) -> bool {
        let memory = self.memory.borrow();
        match offset
            .checked_add(buf.len())
            .and_then(|end| memory.get(offset..end))
        {
            Some(src) => {
                buf.copy_from_slice(src);
                true
            }
            None => false,
        }
    }

    fn free_obj(&self, ptr: u32) -> Result<(), String> {
        if self.traps.borrow_mut().remove(&ptr) {
            return Err(format!("unreachable executed in free_obj({ptr:#x})"));
        }
        self.freed_obj.borrow_mut().push(ptr);
        Ok(())
    }

    fn free(&self, ptr: u32) -> Result<(), String> {
        self.freed_raw.borrow_mut().push(ptr);
        Ok(())
    }
}

/// A runtime over a shared [`FakeWasmModule`].
pub fn wasm_runtime(scheduler: SchedulerConfig) -> (ForeignRuntime, Rc<FakeWasmModule>) {
    let module = FakeWasmModule::wasm32();
    let config =
        RuntimeConfig::wasm(Rc::clone(&module), module.model()).with_scheduler(scheduler);
    (ForeignRuntime::new(config), module)
}

/// One recorded release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freed {
    Obj(Handle),
    Raw(Handle),
}

#[derive(Default)]
struct CountingState {
    records: RefCell<HashMap<Handle, ResultRecord>>,
    strings: RefCell<HashMap<Handle, String>>,
    freed: RefCell<Vec<Freed>>,
    fail_on: RefCell<HashSet<Handle>>,
}

/// ABI-agnostic boundary double. Clones share state.
#[derive(Clone)]
pub struct CountingBackend {
    abi: AbiKind,
    state: Rc<CountingState>,
}

impl CountingBackend {
    pub fn new(abi: AbiKind) -> Self {
        Self {
            abi,
            state: Rc::default(),
        }
    }

    /// Serve `record` when `envelope` is decoded.
    pub fn add_record(&self, envelope: Handle, record: ResultRecord) {
        self.state.records.borrow_mut().insert(envelope, record);
    }

    /// Serve `text` when `ptr` is read as a string.
    pub fn add_string(&self, ptr: Handle, text: &str) {
        self.state.strings.borrow_mut().insert(ptr, text.to_owned());
    }

    /// Make every release of `handle` fail.
    pub fn fail_on(&self, handle: Handle) {
        self.state.fail_on.borrow_mut().insert(handle);
    }

    pub fn clear_freed(&self) {
        self.state.freed.borrow_mut().clear();
    }

    pub fn freed(&self) -> Vec<Freed> {
        self.state.freed.borrow().clone()
    }

    /// How many times `handle` was passed to `free_obj`.
    pub fn release_count(&self, handle: Handle) -> usize {
        self.state
            .freed
            .borrow()
            .iter()
            .filter(|f| **f == Freed::Obj(handle))
            .count()
    }

    fn record(&self, freed: Freed, handle: Handle) -> Result<(), ReleaseError> {
        if handle.is_null() {
            return Ok(());
        }
        if handle.abi() != self.abi {
            return Err(ReleaseError::AbiMismatch {
                expected: self.abi,
                handle,
            });
        }
        if self.state.fail_on.borrow().contains(&handle) {
            let export = match freed {
                Freed::Obj(_) => "free_obj",
                Freed::Raw(_) => "free",
            };
            return Err(ReleaseError::Trap {
                export,
                reason: "injected failure".into(),
            });
        }
        self.state.freed.borrow_mut().push(freed);
        Ok(())
    }

    /// A runtime over a clone of this backend.
    pub fn runtime(&self, scheduler: SchedulerConfig) -> ForeignRuntime {
        ForeignRuntime::new(RuntimeConfig::custom(self.clone()).with_scheduler(scheduler))
    }
}

impl ReleaseBackend for CountingBackend {
    fn abi(&self) -> AbiKind {
        self.abi
    }

    fn free_obj(&self, handle: Handle) -> Result<(), ReleaseError> {
        self.record(Freed::Obj(handle), handle)
    }

    fn free_raw(&self, ptr: Handle) -> Result<(), ReleaseError> {
        self.record(Freed::Raw(ptr), ptr)
    }
}

impl ResultDecoder for CountingBackend {
    fn decode(&self, envelope: Handle, _shape: RecordShape) -> Result<ResultRecord, DecodeError> {
        if envelope.is_null() {
            return Err(DecodeError::NullRecord);
        }
        self.state
            .records
            .borrow()
            .get(&envelope)
            .cloned()
            .ok_or(DecodeError::NullRecord)
    }

    fn read_string(&self, ptr: Handle) -> Result<String, DecodeError> {
        self.state
            .strings
            .borrow()
            .get(&ptr)
            .cloned()
            .ok_or(DecodeError::InvalidString {
                offset: ptr.address(),
            })
    }
}
