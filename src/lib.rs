//! Heap ownership primitives with hand-rolled lifetime accounting.
//!
//! [`ExclusiveBox`] owns its allocation alone: ownership only ever moves,
//! and the allocation is freed exactly once. [`SharedBox`] shares its
//! allocation through a heap-allocated counter cell; the alias that brings
//! the count to zero frees both the value and the counter. The counter is a
//! plain `Cell<usize>` with no synchronization, so a `SharedBox` and all of
//! its aliases stay on one thread.

mod exclusive;
mod shared;

pub use exclusive::ExclusiveBox;
pub use shared::SharedBox;

#[cfg(test)]
pub(crate) mod track {
    use std::cell::Cell;

    /// Test payload whose drop is counted through a borrowed cell.
    pub struct Tracked<'c> {
        drops: &'c Cell<usize>,
        pub id: u32,
    }

    impl<'c> Tracked<'c> {
        pub fn new(drops: &'c Cell<usize>, id: u32) -> Self {
            Self { drops, id }
        }
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }
}
