//! Registers of class 0, byte offsets.

use std::sync::Arc;

use crate::device::{Device, DeviceState};
use crate::sync::SynchronizationManager;

pub const LOAD_SYNCPT_PAYLOAD_32: u32 = 0x138;
pub const WAIT_SYNCPT_32: u32 = 0x140;

const HOST1X_CLASS_REGISTERS_SIZE: u32 = 0x164;

#[derive(Clone, Copy)]
enum Host1xHook {
    WaitSyncpt32,
}

/// Registers of the command processor itself (class 0).
///
/// Writes here are executed on the processor thread without any queueing,
/// so a wait stalls decoding of everything after it.
pub(crate) struct Host1xClass {
    sync_manager: Arc<SynchronizationManager>,
    state: DeviceState<Host1xHook>,
}

impl Host1xClass {
    pub(crate) fn new(sync_manager: Arc<SynchronizationManager>) -> Self {
        Self {
            sync_manager,
            state: DeviceState::new(
                "host1x",
                HOST1X_CLASS_REGISTERS_SIZE,
                [(WAIT_SYNCPT_32, Host1xHook::WaitSyncpt32)],
            ),
        }
    }

    fn wait_syncpt_32(&mut self, data: u32) {
        let syncpt_id = data & 0xFF;
        let threshold = self.state.read(LOAD_SYNCPT_PAYLOAD_32);

        if syncpt_id >= self.sync_manager.syncpoint_count() {
            log::error!("Wait on unsupported syncpoint {}, ignoring", syncpt_id);
            return;
        }

        log::debug!("waiting on syncpoint {} for threshold {}", syncpt_id, threshold);
        self.sync_manager.wait(syncpt_id, threshold, None);
    }
}

impl Device for Host1xClass {
    fn read(&mut self, offset: u32) -> u32 {
        self.state.read(offset)
    }

    fn write(&mut self, offset: u32, data: u32) {
        if let Some(Host1xHook::WaitSyncpt32) = self.state.write(offset, data) {
            self.wait_syncpt_32(data);
        }
    }
}
