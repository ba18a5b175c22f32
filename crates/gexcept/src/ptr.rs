use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::Throwable;

/// Result alias for operations that fail with an exception.
pub type ExResult<T> = Result<T, ExceptionPtr>;

/// Owning, value-semantics holder for at most one exception of any kind.
///
/// Copies are deep: cloning an `ExceptionPtr` clones the held exception
/// through [`Throwable::clone_box`], so the copy keeps its concrete kind
/// and the two pointers never share an allocation.
///
/// An empty pointer is a valid state (`Default`).
#[derive(Default)]
pub struct ExceptionPtr {
    inner: Option<Box<dyn Throwable>>,
}

impl ExceptionPtr {
    /// An empty pointer.
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Hold a copy of `e`.
    pub fn from_exception(e: &dyn Throwable) -> Self {
        Self {
            inner: Some(e.clone_box()),
        }
    }

    /// Take ownership of an already boxed exception (no copy).
    pub fn from_box(e: Box<dyn Throwable>) -> Self {
        Self { inner: Some(e) }
    }

    /// Replace the held exception with a copy of `e`.
    ///
    /// The copy is made before anything is released, so the pointer holds
    /// either the old or the new exception, never neither.
    pub fn assign(&mut self, e: &dyn Throwable) {
        let mut tmp = Self::from_exception(e);
        self.swap(&mut tmp);
    }

    /// Exchange contents. No allocation.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.inner, &mut other.inner);
    }

    #[inline]
    pub fn get(&self) -> Option<&dyn Throwable> {
        self.inner.as_deref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Move the exception out, leaving the pointer empty.
    pub fn take(&mut self) -> Option<Box<dyn Throwable>> {
        self.inner.take()
    }

    pub fn into_inner(self) -> Option<Box<dyn Throwable>> {
        self.inner
    }

    /// The held exception as kind `T`, if it is one.
    pub fn downcast_ref<T: Throwable>(&self) -> Option<&T> {
        self.get().and_then(|e| e.downcast_ref::<T>())
    }

    /// Raise the held exception as its own kind. Returns normally when empty.
    pub fn rethrow(&self) {
        if let Some(e) = self.get() {
            e.raise();
        }
    }
}

impl Clone for ExceptionPtr {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    // Copy-then-swap: `self` is untouched until the copy exists.
    fn clone_from(&mut self, source: &Self) {
        let mut tmp = source.clone();
        self.swap(&mut tmp);
    }
}

impl<T: Throwable> From<T> for ExceptionPtr {
    fn from(e: T) -> Self {
        Self {
            inner: Some(Box::new(e)),
        }
    }
}

impl From<Box<dyn Throwable>> for ExceptionPtr {
    fn from(e: Box<dyn Throwable>) -> Self {
        Self::from_box(e)
    }
}

/// Equal when both are empty, or both hold the same kind with the same
/// description.
impl PartialEq for ExceptionPtr {
    fn eq(&self, other: &Self) -> bool {
        match (self.get(), other.get()) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.as_any().type_id() == b.as_any().type_id() && a.what() == b.what()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ExceptionPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(e) => f.debug_tuple("ExceptionPtr").field(&e).finish(),
            None => f.write_str("ExceptionPtr(<empty>)"),
        }
    }
}

impl fmt::Display for ExceptionPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(e) => f.write_str(e.what()),
            None => f.write_str("<empty>"),
        }
    }
}

/// Exchange the contents of two pointers.
pub fn swap(a: &mut ExceptionPtr, b: &mut ExceptionPtr) {
    a.swap(b);
}

/// Run `f`, returning any exception it raises as `Err`.
///
/// Only unwinds started by [`Throwable::raise`] are caught; any other
/// panic continues unwinding unchanged. State that `f` left half-updated
/// is the caller's concern, as with `catch_unwind(AssertUnwindSafe(..))`.
pub fn catch_exception<F, R>(f: F) -> ExResult<R>
where
    F: FnOnce() -> R,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Ok(v),
        Err(payload) => match payload.downcast::<ExceptionPtr>() {
            Ok(ptr) => Err(*ptr),
            Err(other) => panic::resume_unwind(other),
        },
    }
}
