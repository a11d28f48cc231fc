use std::sync::{Arc, Mutex, MutexGuard};

use super::SynchronizationManager;
use crate::device::ClassId;

/// Handle to a reserved increment, returned by
/// [`SyncptIncrCoordinator::reserve_deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncptIncrToken(u32);

/// Performs syncpoint increments on behalf of the class shims.
pub trait SyncptIncrCoordinator: Send + Sync {
    /// Increment `syncpt_id` on behalf of `class_id` as soon as possible.
    fn increment(&self, class_id: ClassId, syncpt_id: u32);

    /// Reserve an increment of `syncpt_id` that only happens once the
    /// returned token is passed to [`signal_done`](Self::signal_done).
    ///
    /// Called from the decoder thread, in decode order.
    fn reserve_deferred(&self, class_id: ClassId, syncpt_id: u32) -> SyncptIncrToken;

    fn signal_done(&self, token: SyncptIncrToken);

    /// Number of syncpoints that can be incremented, ids at or above this
    /// are rejected by the shims before reaching the coordinator.
    fn syncpoint_count(&self) -> u32;
}

#[derive(Debug)]
struct PendingIncr {
    token: Option<SyncptIncrToken>,
    class_id: ClassId,
    syncpt_id: u32,
    done: bool,
}

struct IncrState {
    pending: Vec<PendingIncr>,
    next_token: u32,
}

/// Applies increments strictly in the order they were requested.
///
/// Immediate and deferred increments share one list: an entry is only
/// applied once it and every entry before it are done, so an immediate
/// increment requested while a deferred one is still outstanding becomes
/// visible right after it.
///
/// Increments are applied with the list locked, which keeps their order
/// across threads. Syncpoint callbacks therefore must not call back into the
/// coordinator.
pub struct SyncptIncrManager {
    sync_manager: Arc<SynchronizationManager>,
    state: Mutex<IncrState>,
}

impl SyncptIncrManager {
    pub fn new(sync_manager: Arc<SynchronizationManager>) -> Self {
        Self {
            sync_manager,
            state: Mutex::new(IncrState {
                pending: Vec::new(),
                next_token: 0,
            }),
        }
    }

    /// Number of reserved increments not applied yet.
    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Class and syncpoint of every pending increment, oldest first.
    #[cfg(test)]
    fn pending_requests(&self) -> Vec<(ClassId, u32)> {
        self.lock_state()
            .pending
            .iter()
            .map(|incr| (incr.class_id, incr.syncpt_id))
            .collect()
    }

    fn lock_state(&self) -> MutexGuard<'_, IncrState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn increment_all_done(&self, state: &mut IncrState) {
        let done_count = state.pending.iter().take_while(|incr| incr.done).count();

        for incr in state.pending.drain(..done_count) {
            log::trace!(
                "applying syncpoint {} increment from {}",
                incr.syncpt_id,
                incr.class_id
            );
            self.sync_manager.increment(incr.syncpt_id);
        }
    }
}

impl SyncptIncrCoordinator for SyncptIncrManager {
    fn increment(&self, class_id: ClassId, syncpt_id: u32) {
        let mut state = self.lock_state();
        state.pending.push(PendingIncr {
            token: None,
            class_id,
            syncpt_id,
            done: true,
        });
        self.increment_all_done(&mut state);
    }

    fn reserve_deferred(&self, class_id: ClassId, syncpt_id: u32) -> SyncptIncrToken {
        let mut state = self.lock_state();
        let token = SyncptIncrToken(state.next_token);
        state.next_token = state.next_token.wrapping_add(1);

        state.pending.push(PendingIncr {
            token: Some(token),
            class_id,
            syncpt_id,
            done: false,
        });

        token
    }

    fn signal_done(&self, token: SyncptIncrToken) {
        let mut state = self.lock_state();

        let found = state
            .pending
            .iter_mut()
            .find(|incr| incr.token == Some(token))
            .map(|incr| incr.done = true)
            .is_some();

        if found {
            self.increment_all_done(&mut state);
        } else {
            log::warn!("signal_done for unknown syncpoint increment {:?}", token);
        }
    }

    fn syncpoint_count(&self) -> u32 {
        self.sync_manager.syncpoint_count()
    }
}
