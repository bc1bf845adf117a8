use core::fmt;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use static_assertions::const_assert;

/// Sole owner of a heap-allocated `T`.
///
/// An `ExclusiveBox` is either holding an allocation or empty. It cannot be
/// cloned; ownership only ever moves, either by a plain Rust move or by
/// [`take`](Self::take), which leaves the source observably empty. Dropping
/// a holding box frees the allocation exactly once; dropping an empty box
/// does nothing.
pub struct ExclusiveBox<T> {
    ptr: Option<NonNull<T>>,
}

// The null niche keeps the box one word wide.
const_assert!(mem::size_of::<ExclusiveBox<u8>>() == mem::size_of::<usize>());

// Sole ownership makes sending the box equivalent to sending the value.
unsafe impl<T: Send> Send for ExclusiveBox<T> {}
unsafe impl<T: Sync> Sync for ExclusiveBox<T> {}

impl<T> ExclusiveBox<T> {
    /// Allocates `value` on the heap and takes sole ownership of it.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            ptr: Some(Box::leak(Box::new(value)).into()),
        }
    }

    /// A box holding nothing.
    #[inline]
    pub const fn empty() -> Self {
        Self { ptr: None }
    }

    /// Adopts an allocation produced by [`Box::into_raw`]. A null `ptr`
    /// yields an empty box.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live `Box` allocation of `T` that no
    /// other owner will free.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            ptr: NonNull::new(ptr),
        }
    }

    /// Relinquishes ownership and returns the raw allocation, null if empty.
    /// Pass the result back to [`from_raw`](Self::from_raw) to avoid a leak.
    #[inline]
    pub fn into_raw(mut self) -> *mut T {
        match self.ptr.take() {
            Some(p) => p.as_ptr(),
            None => ptr::null_mut(),
        }
    }

    /// Moves the held allocation out, leaving `self` empty.
    ///
    /// Safe on an empty box; both ends are then empty. Assigning the result
    /// over a holding box frees that box's old value first, through the
    /// normal drop glue, so `b = b.take()` cannot double-free.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
        }
    }

    /// Borrows the held value without transferring ownership.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Mutably borrows the held value.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
    }

    /// Moves the value back out of the box, freeing the allocation.
    #[inline]
    pub fn into_inner(mut self) -> Option<T> {
        self.ptr
            .take()
            .map(|p| unsafe { *Box::from_raw(p.as_ptr()) })
    }

    /// True if the box currently holds nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }
}

impl<T> Deref for ExclusiveBox<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty ExclusiveBox")
    }
}

impl<T> DerefMut for ExclusiveBox<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("dereferenced an empty ExclusiveBox")
    }
}

impl<T> Drop for ExclusiveBox<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            unsafe { drop(Box::from_raw(p.as_ptr())) };
        }
    }
}

impl<T> Default for ExclusiveBox<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for ExclusiveBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("ExclusiveBox").field(v).finish(),
            None => f.write_str("ExclusiveBox(<empty>)"),
        }
    }
}
