//! Lightweight handle type for shared ownership.
//!
//! [Handle<T>] owns a strong reference to an object using [alloc::sync::Arc]. Devices, drivers,
//! power domains and buses are all passed around as handles: the creating context keeps one,
//! and the bus keeps another for as long as the object is registered.
//!
//! Identity is pointer identity: use [Handle::ptr_eq], never name comparison, when the exact
//! registered object matters.
use alloc::sync::Arc;
use core::ops::Deref;

#[derive(Debug)]
/// Strong owning handle backed by [Arc<T>].
///
/// The inner value is reference-counted; cloning the handle increments the count.
/// Trait objects are wrapped with [Handle::from_arc].
pub struct Handle<T: ?Sized> {
    inner: Arc<T>,
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Handle<T> {
    /// Wrap an existing [Arc], typically an unsized one such as `Arc<dyn Driver>`.
    pub fn from_arc(inner: Arc<T>) -> Self {
        Self { inner }
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }
}
