//! Purpose: Ordered callback registry with stable handles.
//! Exports: `ListenerRegistry`, `ListenerHandle`.
//! Role: Backs the before/after execution hooks of the query facade.
//! Invariants: Handles are slot indices; they only grow and are never reused.
//! Invariants: Removal empties a slot in place; surviving handles never shift.
//! Invariants: `invoke_all` snapshots live callbacks, then calls them without the lock held.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn index(self) -> u64 {
        self.0
    }
}

pub struct ListenerRegistry<F: ?Sized> {
    slots: Mutex<Vec<Option<Arc<F>>>>,
}

impl<F: ?Sized> ListenerRegistry<F> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, callback: Arc<F>) -> ListenerHandle {
        let mut slots = self.lock();
        slots.push(Some(callback));
        ListenerHandle((slots.len() - 1) as u64)
    }

    /// Unknown or already-removed handles are ignored.
    pub fn remove(&self, handle: ListenerHandle) {
        let mut slots = self.lock();
        if let Ok(index) = usize::try_from(handle.0) {
            if let Some(slot) = slots.get_mut(index) {
                *slot = None;
            }
        }
    }

    pub fn contains(&self, handle: ListenerHandle) -> bool {
        let slots = self.lock();
        usize::try_from(handle.0)
            .ok()
            .and_then(|index| slots.get(index))
            .is_some_and(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.lock().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.lock().iter().flatten().cloned().collect()
    }

    /// Calls every live callback in registration order.
    pub fn invoke_all(&self, mut call: impl FnMut(&F)) {
        for callback in self.snapshot() {
            call(&callback);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Option<Arc<F>>>> {
        self.slots
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl<F: ?Sized> Default for ListenerRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for ListenerRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("live", &self.len())
            .finish()
    }
}
