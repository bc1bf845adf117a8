use core::cell::Cell;
use core::fmt;
use core::mem;
use core::ops::Deref;
use core::ptr::NonNull;

use static_assertions::const_assert;

/// One alias group: the value and its reference counter, each a separate
/// heap allocation. The pair is copied freely between aliases; the counter
/// arbitrates which alias frees both.
struct Group<T> {
    value: NonNull<T>,
    count: NonNull<Cell<usize>>,
}

impl<T> Clone for Group<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Group<T> {}

/// Shared owner of a heap-allocated `T`.
///
/// Cloning a `SharedBox` creates another alias of the same allocation and
/// increments the shared counter cell; dropping an alias decrements it, and
/// the alias that brings the count to zero frees the value and the counter,
/// each exactly once. [`take`](Self::take) moves an alias without touching
/// the count. An empty box aliases nothing and has no counter cell.
///
/// The counter is a plain `Cell<usize>`, so the box is neither `Send` nor
/// `Sync`; all aliases of a group live on one thread.
pub struct SharedBox<T> {
    link: Option<Group<T>>,
}

const_assert!(mem::size_of::<SharedBox<u8>>() == 2 * mem::size_of::<usize>());

impl<T> SharedBox<T> {
    /// Allocates `value` with a fresh counter cell set to 1.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            link: Some(Group {
                value: Box::leak(Box::new(value)).into(),
                count: Box::leak(Box::new(Cell::new(1))).into(),
            }),
        }
    }

    /// A box aliasing nothing, with no counter cell.
    #[inline]
    pub const fn empty() -> Self {
        Self { link: None }
    }

    /// Adopts an allocation produced by [`Box::into_raw`], minting a fresh
    /// counter cell at 1 for it. A null `ptr` yields an empty box.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live `Box` allocation of `T` that no
    /// other owner will free.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            link: NonNull::new(ptr).map(|value| Group {
                value,
                count: Box::leak(Box::new(Cell::new(1))).into(),
            }),
        }
    }

    /// Moves the aliasing out, leaving `self` empty. The counter is not
    /// touched; the destination inherits this box's share of it. Safe on an
    /// empty box, and `b = b.take()` is a harmless no-op.
    #[inline]
    pub fn take(&mut self) -> Self {
        Self {
            link: self.link.take(),
        }
    }

    /// Number of live aliases of the held value, 0 for an empty box.
    #[inline]
    pub fn use_count(&self) -> usize {
        match &self.link {
            Some(g) => unsafe { g.count.as_ref() }.get(),
            None => 0,
        }
    }

    /// Borrows the held value; `None` when empty.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.link.as_ref().map(|g| unsafe { &*g.value.as_ptr() })
    }

    /// True if the box currently aliases nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.link.is_none()
    }

    /// True if both boxes alias the same allocation. Two empty boxes do not
    /// count as aliasing.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.link, &other.link) {
            (Some(a), Some(b)) => a.value == b.value,
            _ => false,
        }
    }

    /// Detaches from the current group: decrement the counter, and free the
    /// value and the counter cell iff this was the last alias. Aliases that
    /// remain keep both allocations intact.
    fn release(&mut self) {
        if let Some(g) = self.link.take() {
            let remaining = {
                let count = unsafe { g.count.as_ref() };
                count.set(count.get() - 1);
                count.get()
            };
            if remaining == 0 {
                unsafe {
                    drop(Box::from_raw(g.value.as_ptr()));
                    drop(Box::from_raw(g.count.as_ptr()));
                }
            }
        }
    }
}

impl<T> Clone for SharedBox<T> {
    /// Creates another alias of the same allocation, incrementing the
    /// counter. Cloning an empty box yields an empty box.
    #[inline]
    fn clone(&self) -> Self {
        if let Some(g) = &self.link {
            let count = unsafe { g.count.as_ref() };
            count.set(count.get() + 1);
        }
        Self { link: self.link }
    }

    /// Re-points `self` at `source`'s allocation, releasing the old one.
    /// When both sides already alias the same group this is a no-op, never a
    /// release-then-reacquire.
    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) {
            return;
        }
        self.release();
        *self = source.clone();
    }
}

impl<T> Deref for SharedBox<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty SharedBox")
    }
}

impl<T> Drop for SharedBox<T> {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Default for SharedBox<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f
                .debug_struct("SharedBox")
                .field("value", v)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("SharedBox(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rand::prelude::*;

    use super::SharedBox;
    use crate::track::Tracked;

    #[test]
    fn fresh_box_counts_one() {
        let a = SharedBox::new(42);
        assert!(!a.is_empty());
        assert_eq!(a.use_count(), 1);
        assert_eq!(*a, 42);
    }

    #[test]
    fn clone_aliases_and_counts() {
        let a = SharedBox::new(42);
        let b = a.clone();
        assert_eq!(a.use_count(), 2);
        assert_eq!(b.use_count(), 2);
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn last_release_frees_once() {
        let drops = Cell::new(0);
        let a = SharedBox::new(Tracked::new(&drops, 0));
        let b = a.clone();
        let c = b.clone();
        assert_eq!(c.use_count(), 3);
        drop(a);
        assert_eq!(drops.get(), 0);
        assert_eq!(b.use_count(), 2);
        drop(b);
        assert_eq!(drops.get(), 0);
        assert_eq!(c.use_count(), 1);
        drop(c);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn take_inherits_count() {
        let drops = Cell::new(0);
        let a = SharedBox::new(Tracked::new(&drops, 0));
        let b = a.clone();
        let mut c = b.clone();
        let d = c.take();
        assert!(c.is_empty());
        assert_eq!(c.use_count(), 0);
        assert_eq!(d.use_count(), 3);
        drop(c);
        drop(d);
        drop(b);
        assert_eq!(drops.get(), 0);
        drop(a);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn clone_from_same_group_is_noop() {
        let drops = Cell::new(0);
        let mut a = SharedBox::new(Tracked::new(&drops, 0));
        let alias = a.clone();
        a.clone_from(&alias);
        assert_eq!(a.use_count(), 2);
        assert_eq!(alias.use_count(), 2);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn self_move_is_noop() {
        let drops = Cell::new(0);
        let mut a = SharedBox::new(Tracked::new(&drops, 9));
        a = a.take();
        assert_eq!(a.use_count(), 1);
        assert_eq!(a.id, 9);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn clone_from_releases_old_group() {
        let drops = Cell::new(0);
        let mut a = SharedBox::new(Tracked::new(&drops, 1));
        let b = SharedBox::new(Tracked::new(&drops, 2));
        a.clone_from(&b);
        // `a` was the last alias of its old group.
        assert_eq!(drops.get(), 1);
        assert_eq!(a.use_count(), 2);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id, 2);
    }

    #[test]
    fn empty_boxes() {
        let a = SharedBox::<i32>::empty();
        assert_eq!(a.use_count(), 0);
        assert!(a.get().is_none());
        let b = a.clone();
        assert!(b.is_empty());
        assert!(!a.ptr_eq(&b));
        assert!(SharedBox::<i32>::default().is_empty());
    }

    #[test]
    fn take_from_empty_is_safe() {
        let mut a = SharedBox::<i32>::empty();
        let b = a.take();
        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[test]
    #[should_panic(expected = "empty SharedBox")]
    fn deref_empty_panics() {
        let b = SharedBox::<i32>::empty();
        let _ = *b;
    }

    #[test]
    fn counts_agree_across_aliases() {
        let mut aliases = vec![SharedBox::new(0u8)];
        for i in 1..8 {
            let alias = aliases[i - 1].clone();
            aliases.push(alias);
            for boxed in &aliases {
                assert_eq!(boxed.use_count(), i + 1);
            }
        }
    }

    #[test]
    fn smoke_random_alias_churn() {
        let drops = Cell::new(0);
        let mut rng = rand::thread_rng();
        let mut aliases = vec![SharedBox::new(Tracked::new(&drops, 0))];
        for _ in 0..1000 {
            if aliases.is_empty() {
                break;
            }
            let i = rng.gen_range(0..aliases.len());
            if rng.gen_bool(0.5) {
                let alias = aliases[i].clone();
                aliases.push(alias);
            } else {
                aliases.swap_remove(i);
            }
            for boxed in &aliases {
                assert_eq!(boxed.use_count(), aliases.len());
            }
        }
        let already_freed = aliases.is_empty();
        assert_eq!(drops.get(), if already_freed { 1 } else { 0 });
        drop(aliases);
        assert_eq!(drops.get(), 1);
    }
}
