//! Lock-free slot holding at most one owning reference

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// A slot that holds zero or one `T`, mutated only through atomic
/// exchange / compare-and-swap.
///
/// Readers get a clone of the occupant, so `T` is expected to be a cheap
/// handle such as an `Arc` or a cancellation token.
pub struct AtomicSlot<T> {
    inner: ArcSwapOption<T>,
}

impl<T: Clone> AtomicSlot<T> {
    /// Create an empty slot
    pub fn empty() -> Self {
        Self {
            inner: ArcSwapOption::empty(),
        }
    }

    /// Create a slot holding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwapOption::from_pointee(value),
        }
    }

    /// Clone the current occupant
    pub fn load(&self) -> Option<T> {
        self.inner.load().as_deref().cloned()
    }

    /// Whether the slot is currently empty
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_none()
    }

    /// Take the occupant out, leaving the slot empty.
    ///
    /// Only one of any number of concurrent callers gets `Some`.
    pub fn take(&self) -> Option<T> {
        self.inner.swap(None).map(Arc::unwrap_or_clone)
    }

    /// Put `value` in the slot, whatever it held before
    pub fn store(&self, value: T) {
        self.inner.store(Some(Arc::new(value)));
    }

    /// Install `value` if the slot is empty.
    ///
    /// On failure `value` is dropped and the current occupant is returned.
    pub fn install(&self, value: T) -> Result<(), T> {
        let previous = self
            .inner
            .compare_and_swap(&None::<Arc<T>>, Some(Arc::new(value)));

        match previous.as_deref() {
            None => Ok(()),
            Some(current) => Err(current.clone()),
        }
    }

    /// Clear the slot, but only if `is_current` accepts its occupant.
    ///
    /// Returns whether this call emptied the slot. A slot that was refilled
    /// with a different value in the meantime is left alone.
    pub fn clear_if(&self, is_current: impl FnOnce(&T) -> bool) -> bool {
        let current = self.inner.load_full();
        let Some(value) = current.as_ref() else {
            return false;
        };

        if !is_current(value) {
            return false;
        }

        // compares by pointer, so a refill with an equal value is still kept
        let previous = self.inner.compare_and_swap(&current, None);
        (*previous)
            .as_ref()
            .is_some_and(|previous| Arc::ptr_eq(previous, value))
    }
}

impl<T: Clone> Default for AtomicSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for AtomicSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicSlot").field(&self.load()).finish()
    }
}
