mod incr;
mod syncpoint;

use std::time::{Duration, Instant};

use crossbeam::channel;

pub use incr::{SyncptIncrCoordinator, SyncptIncrManager, SyncptIncrToken};
pub use syncpoint::{Syncpoint, SyncpointCallback, SyncpointWaiterHandle, WaiterSignal};

/// Number of syncpoints in the hardware bank.
pub const MAX_HARDWARE_SYNCPOINTS: u32 = 192;

#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Size of the syncpoint bank, valid ids are `0..syncpoint_count`.
    pub syncpoint_count: u32,
    /// How long a wait with no timeout actually blocks before giving up.
    pub infinite_wait_fallback: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            syncpoint_count: MAX_HARDWARE_SYNCPOINTS,
            infinite_wait_fallback: Duration::from_secs(1),
        }
    }
}

/// Owns the syncpoint bank, and adds blocking waits on top of it.
///
/// Every method taking an `id` panics if it is outside the bank.
pub struct SynchronizationManager {
    syncpoints: Box<[Syncpoint]>,
    config: SyncConfig,
}

impl SynchronizationManager {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let syncpoints = (0..config.syncpoint_count).map(Syncpoint::new).collect();

        Self { syncpoints, config }
    }

    pub fn syncpoint_count(&self) -> u32 {
        self.config.syncpoint_count
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn increment(&self, id: u32) -> u32 {
        self.syncpoint(id).increment()
    }

    pub fn value(&self, id: u32) -> u32 {
        self.syncpoint(id).value()
    }

    /// Registers `callback` to run once syncpoint `id` reaches `threshold`.
    ///
    /// The callback runs on the incrementing thread. Increments requested by
    /// the classes go through [`SyncptIncrManager`], which applies them with
    /// its pending list locked, so a callback that blocks holds back every
    /// class' increments until it returns. It must not request increments
    /// itself either.
    ///
    /// Returns `None` if the threshold is already reached, in which case the
    /// callback already ran with [`WaiterSignal::AlreadySatisfied`].
    pub fn register_callback<F>(
        &self,
        id: u32,
        threshold: u32,
        callback: F,
    ) -> Option<SyncpointWaiterHandle>
    where
        F: FnOnce(WaiterSignal) + Send + 'static,
    {
        self.syncpoint(id).register_callback(threshold, callback)
    }

    /// Returns whether the waiter was still registered.
    ///
    /// # Panics
    ///
    /// If `handle` belongs to a syncpoint other than `id`.
    pub fn unregister_callback(&self, id: u32, handle: SyncpointWaiterHandle) -> bool {
        self.syncpoint(id).unregister_callback(handle)
    }

    /// Blocks until syncpoint `id` reaches `threshold`.
    ///
    /// Returns `true` if the wait timed out, `false` if the threshold was
    /// reached. `None` as `timeout` does not block forever, it waits for
    /// [`SyncConfig::infinite_wait_fallback`] and then gives up like any
    /// other timeout.
    ///
    /// Must not be called while holding a lock that whoever increments this
    /// syncpoint needs.
    pub fn wait(&self, id: u32, threshold: u32, timeout: Option<Duration>) -> bool {
        let syncpoint = self.syncpoint(id);

        let (signal_sender, signal_receiver) = channel::bounded(1);
        let handle = syncpoint.register_callback(threshold, move |_| {
            // the waiter may have timed out and gone already
            let _ = signal_sender.try_send(());
        });

        let Some(handle) = handle else {
            // already reached, the callback ran inline
            return false;
        };

        // TODO: block without a bound once channels are scheduled, so a
        //       stalled fence stops resuming execution early
        let timeout = timeout.unwrap_or(self.config.infinite_wait_fallback);

        let start = Instant::now();
        if signal_receiver.recv_timeout(timeout).is_ok() {
            return false;
        }

        log::error!(
            "Wait on syncpoint {} for threshold {} took more than {}ms (current value {}), resuming execution...",
            id,
            threshold,
            start.elapsed().as_millis(),
            syncpoint.value()
        );
        // it may fire between the timeout and here, in which case this does nothing
        syncpoint.unregister_callback(handle);

        true
    }

    fn syncpoint(&self, id: u32) -> &Syncpoint {
        assert!(
            id < self.config.syncpoint_count,
            "syncpoint id {} out of range (bank has {})",
            id,
            self.config.syncpoint_count
        );
        &self.syncpoints[id as usize]
    }
}

impl Default for SynchronizationManager {
    fn default() -> Self {
        Self::new()
    }
}
