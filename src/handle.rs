use std::ops::{Deref, DerefMut};

/// A collaborator that is either owned by its user or borrowed from the caller.
///
/// Algorithms create default output and exception handlers when none are
/// supplied. Those are `Owned` and dropped with the algorithm; handlers
/// passed in by the caller are `Borrowed` and outlive it.
pub enum Handle<'a, T: ?Sized> {
    /// Created and dropped by the holder.
    Owned(Box<T>),
    /// Supplied by the caller.
    Borrowed(&'a mut T),
}

impl<'a, T: ?Sized> Handle<'a, T> {
    /// Whether the holder created this collaborator.
    pub fn is_owned(&self) -> bool {
        matches!(self, Handle::Owned(_))
    }
}

impl<T: ?Sized> Deref for Handle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Handle::Owned(b) => b,
            Handle::Borrowed(r) => r,
        }
    }
}

impl<T: ?Sized> DerefMut for Handle<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Handle::Owned(b) => b,
            Handle::Borrowed(r) => r,
        }
    }
}

impl<'a, T: ?Sized> From<&'a mut T> for Handle<'a, T> {
    fn from(r: &'a mut T) -> Self {
        Handle::Borrowed(r)
    }
}

impl<T: ?Sized> From<Box<T>> for Handle<'_, T> {
    fn from(b: Box<T>) -> Self {
        Handle::Owned(b)
    }
}
