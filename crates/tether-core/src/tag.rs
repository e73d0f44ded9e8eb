//! Adopt-vs-convert tagging for constructor arguments.
//!
//! On the WASM boundary a pointer, a small integer constructor argument and
//! a flag are all plain numbers. A constructor that accepts "a number" cannot
//! tell "adopt this allocation" from "build a new object out of this value".
//! The tag makes that choice explicit in the type: every boundary that
//! produces a [`Handle`] wraps it in [`Tagged`], every boundary that consumes
//! one strips the tag.

use crate::handle::Handle;

/// A handle marked for adoption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct Tagged(Handle);

impl Tagged {
    /// The tagged handle.
    pub fn handle(self) -> Handle {
        self.0
    }
}

/// Constructor argument: either a handle to adopt or a plain value to convert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CtorArg<V> {
    /// Adopt an existing foreign allocation.
    Tagged(Tagged),
    /// Convert this value into a new foreign object.
    Plain(V),
}

impl<V> CtorArg<V> {
    /// Whether this argument carries a handle to adopt.
    pub fn is_tagged(&self) -> bool {
        matches!(self, CtorArg::Tagged(_))
    }

    /// Strip the tag.
    ///
    /// Returns the handle for a tagged argument and hands a plain value back
    /// unchanged in `Err`, the same pass-through shape as `Rc::try_unwrap`.
    pub fn untag(self) -> Result<Handle, V> {
        match self {
            CtorArg::Tagged(t) => Ok(t.handle()),
            CtorArg::Plain(v) => Err(v),
        }
    }
}

impl<V> From<Tagged> for CtorArg<V> {
    fn from(t: Tagged) -> Self {
        CtorArg::Tagged(t)
    }
}

/// Mark a handle for adoption.
pub fn tag(handle: Handle) -> Tagged {
    Tagged(handle)
}

/// Whether `arg` carries a handle to adopt.
pub fn is_tagged<V>(arg: &CtorArg<V>) -> bool {
    arg.is_tagged()
}

/// Strip the tag; plain values pass through in `Err`.
pub fn untag<V>(arg: CtorArg<V>) -> Result<Handle, V> {
    arg.untag()
}
