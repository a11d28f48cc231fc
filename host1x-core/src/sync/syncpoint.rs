use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Mutex,
};

/// Why a waiter callback was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterSignal {
    /// The threshold was already reached when the callback was registered,
    /// the callback ran inline and nothing was stored.
    AlreadySatisfied,
    /// An increment brought the syncpoint to this value, which is at or
    /// above the waiter threshold.
    Reached(u32),
}

pub type SyncpointCallback = Box<dyn FnOnce(WaiterSignal) + Send>;

/// Identifies one registered waiter, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncpointWaiterHandle {
    syncpoint_id: u32,
    key: u64,
    threshold: u32,
}

impl SyncpointWaiterHandle {
    pub fn syncpoint_id(&self) -> u32 {
        self.syncpoint_id
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

struct Waiter {
    handle: SyncpointWaiterHandle,
    callback: SyncpointCallback,
}

/// A single hardware counter with its list of waiters.
pub struct Syncpoint {
    id: u32,
    value: AtomicU32,
    next_waiter_key: AtomicU64,
    // the only lock in here, never held while a callback runs
    waiters: Mutex<Vec<Waiter>>,
}

impl Syncpoint {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            value: AtomicU32::new(0),
            next_waiter_key: AtomicU64::new(0),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn value(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Adds one to the counter and returns the new value.
    ///
    /// Every waiter whose threshold is now reached is removed, and then its
    /// callback is called after the waiter lock is released, in registration
    /// order.
    pub fn increment(&self) -> u32 {
        let new_value = self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        log::trace!("syncpoint {}: incremented to {}", self.id, new_value);

        let expired = {
            let mut waiters = self.lock_waiters();
            if waiters.is_empty() {
                return new_value;
            }

            let (expired, remaining): (Vec<_>, Vec<_>) = waiters
                .drain(..)
                .partition(|w| w.handle.threshold <= new_value);
            *waiters = remaining;
            expired
        };

        for waiter in expired {
            (waiter.callback)(WaiterSignal::Reached(new_value));
        }

        new_value
    }

    /// Registers `callback` to run once the counter reaches `threshold`.
    ///
    /// If the threshold is already reached, the callback is called before this
    /// returns with [`WaiterSignal::AlreadySatisfied`] and `None` is returned.
    pub fn register_callback<F>(&self, threshold: u32, callback: F) -> Option<SyncpointWaiterHandle>
    where
        F: FnOnce(WaiterSignal) + Send + 'static,
    {
        {
            let mut waiters = self.lock_waiters();

            // checked under the lock, so an `increment` can't slip between the
            // check and the push and miss this waiter
            if self.value() < threshold {
                let handle = SyncpointWaiterHandle {
                    syncpoint_id: self.id,
                    key: self.next_waiter_key.fetch_add(1, Ordering::Relaxed),
                    threshold,
                };
                waiters.push(Waiter {
                    handle,
                    callback: Box::new(callback),
                });
                return Some(handle);
            }
        }

        // the value never goes down, so it stays satisfied after unlocking
        callback(WaiterSignal::AlreadySatisfied);
        None
    }

    /// Removes the waiter if it is still registered, and returns whether it
    /// was. A waiter that already fired, or was already removed, is left
    /// alone and `false` is returned.
    ///
    /// # Panics
    ///
    /// If `handle` was returned by another syncpoint.
    pub fn unregister_callback(&self, handle: SyncpointWaiterHandle) -> bool {
        assert_eq!(
            handle.syncpoint_id, self.id,
            "waiter handle of syncpoint {} used on syncpoint {}",
            handle.syncpoint_id, self.id
        );

        let mut waiters = self.lock_waiters();
        match waiters.iter().position(|w| w.handle == handle) {
            Some(index) => {
                // `remove` keeps the order of the rest
                let waiter = waiters.remove(index);
                drop(waiters);
                drop(waiter);
                true
            }
            None => false,
        }
    }

    fn lock_waiters(&self) -> std::sync::MutexGuard<'_, Vec<Waiter>> {
        // callbacks never run under this lock, so a poisoned lock still holds
        // a consistent list
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
