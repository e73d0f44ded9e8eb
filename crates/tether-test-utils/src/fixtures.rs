//! Reusable domain-type fixtures.
//!
//! - [`Scalar`]: serializes by reading its own hex out of the fake module.
//! - [`Opaque`]: keeps the default `NOT IMPLEMENTED` serialization.
//! - [`RawBuffer`]: released through the raw allocator `free`.

use tether::{release_raw, ForeignObject, ForeignRuntime, HandleObject, ReleaseFn};
use tether_core::HandleError;

use crate::FakeWasmModule;

#[derive(Debug)]
pub struct Scalar(HandleObject);

impl Scalar {
    /// Deserialize through [`FakeWasmModule::deserialize`].
    pub fn from_hex(
        runtime: &ForeignRuntime,
        module: &FakeWasmModule,
        hex: &str,
    ) -> Result<Self, HandleError> {
        Self::deserialize_with(runtime, hex, |padded| {
            tether_core::Handle::Wasm(module.deserialize(padded))
        })
    }
}

impl ForeignObject for Scalar {
    const CLASS: &'static str = "Scalar";

    fn from_object(object: HandleObject) -> Self {
        Scalar(object)
    }

    fn object(&self) -> &HandleObject {
        &self.0
    }

    fn object_mut(&mut self) -> &mut HandleObject {
        &mut self.0
    }

    fn serialize(&self) -> Result<String, HandleError> {
        let handle = self.value()?;
        Ok(self.0.runtime().abi().read_string(handle)?)
    }
}

#[derive(Debug)]
pub struct Opaque(HandleObject);

impl ForeignObject for Opaque {
    const CLASS: &'static str = "Opaque";

    fn from_object(object: HandleObject) -> Self {
        Opaque(object)
    }

    fn object(&self) -> &HandleObject {
        &self.0
    }

    fn object_mut(&mut self) -> &mut HandleObject {
        &mut self.0
    }
}

#[derive(Debug)]
pub struct RawBuffer(HandleObject);

impl ForeignObject for RawBuffer {
    const CLASS: &'static str = "RawBuffer";
    const RELEASE: ReleaseFn = release_raw;

    fn from_object(object: HandleObject) -> Self {
        RawBuffer(object)
    }

    fn object(&self) -> &HandleObject {
        &self.0
    }

    fn object_mut(&mut self) -> &mut HandleObject {
        &mut self.0
    }
}
