//! The owning wrapper every foreign object type builds on.
//!
//! A [`HandleObject`] owns exactly one [`Handle`]. Its lifecycle is a small
//! state machine:
//!
//! ```text
//! Live --dispose()--> Disposed
//!   \--transfer()--> Moved      (the destination is a new Live object)
//! ```
//!
//! An owning object registers one finalizer at construction. `dispose()`
//! unregisters it and releases synchronously; dropping a still-live object
//! hands the finalizer to the scheduler instead. Either way the handle
//! reaches the release backend at most once.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use tether_core::{Handle, HandleError, Tagged};

use crate::runtime::ForeignRuntime;
use crate::scheduler::{release_object, FinalizerEntry, FinalizerToken, ReleaseFn};

/// Whether an object is responsible for releasing its handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Releases its handle on dispose or finalization.
    Owning,
    /// A view into memory owned by another object. Never releases.
    Borrowed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Live,
    Disposed,
    Moved,
}

/// Owner of one foreign handle.
pub struct HandleObject {
    runtime: ForeignRuntime,
    class: &'static str,
    handle: Handle,
    size: usize,
    ownership: Ownership,
    release: ReleaseFn,
    state: State,
    token: Option<FinalizerToken>,
}

impl HandleObject {
    /// Adopt a tagged handle, releasing it with `free_obj`.
    pub fn adopt(
        runtime: &ForeignRuntime,
        class: &'static str,
        tagged: Tagged,
    ) -> Result<Self, HandleError> {
        Self::adopt_with_release(runtime, class, tagged, release_object)
    }

    /// Adopt a tagged handle with a type-specific release function.
    ///
    /// Fails with [`HandleError::Construction`] on a null handle or a handle
    /// of the other ABI. On success exactly one finalizer is registered.
    pub fn adopt_with_release(
        runtime: &ForeignRuntime,
        class: &'static str,
        tagged: Tagged,
        release: ReleaseFn,
    ) -> Result<Self, HandleError> {
        let handle = tagged.handle();
        if handle.is_null() || handle.abi() != runtime.abi_kind() {
            return Err(HandleError::Construction { class });
        }
        let entry = FinalizerEntry::new(class, handle).with_release(release);
        let token = runtime.scheduler().register(entry);
        Ok(Self {
            runtime: runtime.clone(),
            class,
            handle,
            size: 0,
            ownership: Ownership::Owning,
            release,
            state: State::Live,
            token: Some(token),
        })
    }

    /// Set the declared byte size. Used by factories that know it.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Class name used in errors and display strings.
    pub fn class(&self) -> &'static str {
        self.class
    }

    /// Runtime this object belongs to.
    pub fn runtime(&self) -> &ForeignRuntime {
        &self.runtime
    }

    /// Owning or borrowed.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Whether the handle is still usable.
    pub fn is_live(&self) -> bool {
        self.state == State::Live
    }

    /// The handle, for passing back across the boundary.
    pub fn value(&self) -> Result<Handle, HandleError> {
        match self.state {
            State::Live => Ok(self.handle),
            State::Disposed => Err(HandleError::UseAfterDispose { class: self.class }),
            State::Moved => Err(HandleError::UseAfterMove { class: self.class }),
        }
    }

    /// Declared byte size, 0 when unknown.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Declared byte size, or [`HandleError::SizeUnknown`] if no factory
    /// set one.
    pub fn require_size(&self) -> Result<usize, HandleError> {
        self.value()?;
        match self.size {
            0 => Err(HandleError::SizeUnknown { class: self.class }),
            n => Ok(n),
        }
    }

    /// Release the handle now. Idempotent.
    ///
    /// The object is marked disposed before the release call, so a failed
    /// release is reported once and never retried. Borrowed views and
    /// moved-from objects release nothing.
    pub fn dispose(&mut self) -> Result<(), HandleError> {
        if self.state != State::Live {
            return Ok(());
        }
        self.state = State::Disposed;
        if let Some(token) = self.token.take() {
            self.runtime.scheduler().unregister(token);
        }
        if self.ownership == Ownership::Borrowed {
            return Ok(());
        }
        tracing::trace!(handle = %self.handle, class = self.class, "dispose");
        (self.release)(self.runtime.backend(), self.handle).map_err(|source| {
            HandleError::Release {
                class: self.class,
                source,
            }
        })
    }

    /// Move ownership of the handle into a new object.
    ///
    /// `self` is left moved-from: `value()` fails and `dispose()` is a
    /// no-op. The pending finalizer now belongs to the returned object.
    pub fn transfer(&mut self) -> Result<HandleObject, HandleError> {
        self.value()?;
        self.state = State::Moved;
        Ok(HandleObject {
            runtime: self.runtime.clone(),
            class: self.class,
            handle: self.handle,
            size: self.size,
            ownership: self.ownership,
            release: self.release,
            state: State::Live,
            token: self.token.take(),
        })
    }

    /// A non-owning view of a component living inside this object.
    ///
    /// The view never releases its handle and cannot outlive `self`.
    pub fn component(
        &self,
        class: &'static str,
        tagged: Tagged,
    ) -> Result<ComponentView<'_>, HandleError> {
        self.value()?;
        let handle = tagged.handle();
        if handle.is_null() || handle.abi() != self.runtime.abi_kind() {
            return Err(HandleError::Construction { class });
        }
        Ok(ComponentView {
            object: HandleObject {
                runtime: self.runtime.clone(),
                class,
                handle,
                size: 0,
                ownership: Ownership::Borrowed,
                release: self.release,
                state: State::Live,
                token: None,
            },
            _parent: PhantomData,
        })
    }
}

impl Drop for HandleObject {
    fn drop(&mut self) {
        if self.state != State::Live {
            return;
        }
        if let Some(token) = self.token.take() {
            self.runtime
                .scheduler()
                .schedule(self.runtime.backend(), token);
        }
    }
}

impl fmt::Debug for HandleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleObject")
            .field("class", &self.class)
            .field("handle", &self.handle)
            .field("size", &self.size)
            .field("ownership", &self.ownership)
            .field("state", &self.state)
            .finish()
    }
}

/// A borrowed component of a larger object.
pub struct ComponentView<'parent> {
    object: HandleObject,
    _parent: PhantomData<&'parent HandleObject>,
}

impl ComponentView<'_> {
    /// The view as a plain (borrowed) object.
    pub fn as_object(&self) -> &HandleObject {
        &self.object
    }
}

impl Deref for ComponentView<'_> {
    type Target = HandleObject;

    fn deref(&self) -> &HandleObject {
        &self.object
    }
}

impl fmt::Debug for ComponentView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentView").field(&self.object).finish()
    }
}
