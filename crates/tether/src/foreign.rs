//! The contract domain types (Scalar, Point, TxIn, ...) inherit.
//!
//! A domain type is a newtype around a [`HandleObject`] that implements
//! [`ForeignObject`]. The trait supplies the shared factories (adopt a
//! handle, adopt with a known size, deserialize from hex) and the
//! serialization and display defaults; the domain type overrides
//! [`serialize`](ForeignObject::serialize) when the foreign library can
//! render it.

use std::borrow::Cow;
use std::fmt;

use tether_core::{Handle, HandleError, RecordShape, Tagged};

use crate::object::HandleObject;
use crate::runtime::ForeignRuntime;
use crate::scheduler::{release_object, ReleaseFn};

/// What [`ForeignObject::serialize`] returns for types that do not
/// override it.
pub const NOT_IMPLEMENTED: &str = "NOT IMPLEMENTED";

/// Left-pad odd-length hex with one `'0'` so it decodes to whole bytes.
pub fn pad_hex(hex: &str) -> Cow<'_, str> {
    if hex.len() % 2 == 1 {
        Cow::Owned(format!("0{hex}"))
    } else {
        Cow::Borrowed(hex)
    }
}

/// A domain type wrapping one foreign object.
pub trait ForeignObject: Sized {
    /// Class name used in errors and display strings.
    const CLASS: &'static str;

    /// The one correct release function for this type.
    const RELEASE: ReleaseFn = release_object;

    /// Wrap an adopted object.
    fn from_object(object: HandleObject) -> Self;

    /// The wrapped object.
    fn object(&self) -> &HandleObject;

    /// The wrapped object, mutably.
    fn object_mut(&mut self) -> &mut HandleObject;

    /// Adopt a tagged handle.
    fn from_handle(runtime: &ForeignRuntime, tagged: Tagged) -> Result<Self, HandleError> {
        HandleObject::adopt_with_release(runtime, Self::CLASS, tagged, Self::RELEASE)
            .map(Self::from_object)
    }

    /// Adopt a tagged handle whose serialized size is known.
    fn from_handle_and_size(
        runtime: &ForeignRuntime,
        tagged: Tagged,
        size: usize,
    ) -> Result<Self, HandleError> {
        HandleObject::adopt_with_release(runtime, Self::CLASS, tagged, Self::RELEASE)
            .map(|object| Self::from_object(object.with_size(size)))
    }

    /// Rebuild an object from its hex serialization.
    ///
    /// `deserializer` performs the foreign call on the (padded) hex and
    /// returns the result record envelope. The record's `value_size` becomes
    /// the object's declared size.
    fn deserialize_with<F>(
        runtime: &ForeignRuntime,
        hex: &str,
        deserializer: F,
    ) -> Result<Self, HandleError>
    where
        F: FnOnce(&str) -> Handle,
    {
        let padded = pad_hex(hex);
        let envelope = deserializer(&padded[..]);
        let op = format!("Deserialize {}", Self::CLASS);
        let checked = runtime.check(envelope, RecordShape::Value, &op)?;
        let size = checked.value_size();
        Self::from_handle_and_size(runtime, checked.handle, size)
    }

    /// Hex serialization. Types that cannot serialize keep the default
    /// [`NOT_IMPLEMENTED`] sentinel.
    fn serialize(&self) -> Result<String, HandleError> {
        Ok(NOT_IMPLEMENTED.to_owned())
    }

    /// Run a foreign serializer that returns a raw string buffer, copy the
    /// string out and free the buffer.
    fn serialize_with<F>(&self, serializer: F) -> Result<String, HandleError>
    where
        F: FnOnce(Handle) -> Handle,
    {
        let handle = self.value()?;
        let ptr = serializer(handle);
        self.object().runtime().take_string(ptr)
    }

    /// `Class(<serialized>)`, for `Display` impls and logging.
    fn display(&self) -> Display<'_, Self> {
        Display(self)
    }

    /// The handle.
    fn value(&self) -> Result<Handle, HandleError> {
        self.object().value()
    }

    /// Declared byte size, 0 when unknown.
    fn size(&self) -> usize {
        self.object().size()
    }

    /// Release now. Idempotent.
    fn dispose(&mut self) -> Result<(), HandleError> {
        self.object_mut().dispose()
    }
}

/// Helper returned by [`ForeignObject::display`].
pub struct Display<'a, T>(&'a T);

impl<T: ForeignObject> fmt::Display for Display<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.serialize() {
            Ok(s) => write!(f, "{}({s})", T::CLASS),
            Err(e) => write!(f, "{}(<{e}>)", T::CLASS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_hex_is_left_padded() {
        assert_eq!(pad_hex("abc"), "0abc");
        assert_eq!(pad_hex("abcd"), "abcd");
        assert_eq!(pad_hex(""), "");
        assert!(matches!(pad_hex("ab"), Cow::Borrowed(_)));
    }
}
