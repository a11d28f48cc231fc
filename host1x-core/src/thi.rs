//! Host interface (THI) in front of every engine class.
//!
//! The command processor writes into the THI register file on its own thread.
//! Method calls and "done" syncpoint increments are queued on a worker owned
//! by the THI, which is the only thread that ever touches the wrapped device.
//!
//! The register offsets below are byte offsets into the THI block of any
//! class other than [`ClassId::HOST1X`].

use std::sync::Arc;

use crate::device::{ClassId, ContextId, Device, DeviceState, DEFAULT_CONTEXT};
use crate::sync::{SyncptIncrCoordinator, SyncptIncrToken};
use crate::work_queue::WorkQueue;

pub const INCR_SYNCPT: u32 = 0x00;
pub const INCR_SYNCPT_ERR: u32 = 0x08;
pub const CTXSW_INCR_SYNCPT: u32 = 0x0C;
pub const CTXSW: u32 = 0x20;
pub const CONT_SYNCPT_EOF: u32 = 0x28;
pub const METHOD0: u32 = 0x40;
pub const METHOD1: u32 = 0x44;
pub const INT_STATUS: u32 = 0x78;
pub const INT_MASK: u32 = 0x7C;

/// Covers every offset a command header can address (12 bit method
/// offset), so plain writes anywhere in it read back.
const THI_REGISTERS_SIZE: u32 = 0x1000 * 4;

/// `cond` field of an `INCR_SYNCPT` write.
const SYNCPT_COND_IMMEDIATE: u32 = 0;

#[derive(Clone, Copy)]
enum ThiHook {
    IncrSyncpt,
    Method1,
}

enum ThiAction {
    MethodCall {
        context_id: ContextId,
        method: u32,
        data: u32,
    },
    SyncptIncr {
        context_id: ContextId,
        token: SyncptIncrToken,
    },
    CreateContext(ContextId),
    DestroyContext(ContextId),
}

impl ThiAction {
    /// Context the device must be bound to before running this action.
    fn bound_context_id(&self) -> Option<ContextId> {
        match self {
            ThiAction::MethodCall { context_id, .. } | ThiAction::SyncptIncr { context_id, .. } => {
                Some(*context_id)
            }
            ThiAction::CreateContext(_) | ThiAction::DestroyContext(_) => None,
        }
    }
}

pub(crate) struct ThiDevice {
    class_id: ClassId,
    state: DeviceState<ThiHook>,
    syncpt_incr: Arc<dyn SyncptIncrCoordinator>,
    current_context_id: ContextId,
    command_queue: WorkQueue<ThiAction>,
}

impl ThiDevice {
    pub(crate) fn new(
        class_id: ClassId,
        mut device: Box<dyn Device>,
        syncpt_incr: Arc<dyn SyncptIncrCoordinator>,
    ) -> Self {
        let worker_syncpt_incr = syncpt_incr.clone();
        let mut previous_context_id = Some(DEFAULT_CONTEXT);

        let process = move |action: ThiAction| {
            if let Some(context_id) = action.bound_context_id() {
                if Some(context_id) != previous_context_id {
                    previous_context_id = Some(context_id);
                    device.bind_context(context_id);
                }
            }

            match action {
                ThiAction::MethodCall { method, data, .. } => {
                    log::trace!("{}: method {:#x} = {:08X}", class_id, method, data);
                    device.write(method, data);
                }
                ThiAction::SyncptIncr { token, .. } => {
                    worker_syncpt_incr.signal_done(token);
                }
                ThiAction::CreateContext(context_id) => {
                    device.create_context(context_id);
                }
                ThiAction::DestroyContext(context_id) => {
                    device.destroy_context(context_id);
                    if previous_context_id == Some(context_id) {
                        previous_context_id = None;
                    }
                }
            }
        };
        let command_queue = WorkQueue::new(format!("Host1x.{}Processor", class_id), process);

        Self {
            class_id,
            state: DeviceState::new(
                "thi",
                THI_REGISTERS_SIZE,
                [(INCR_SYNCPT, ThiHook::IncrSyncpt), (METHOD1, ThiHook::Method1)],
            ),
            syncpt_incr,
            current_context_id: DEFAULT_CONTEXT,
            command_queue,
        }
    }

    fn incr_syncpt(&mut self, data: u32) {
        let syncpt_id = data & 0xFF;
        let cond = (data >> 8) & 0xFF;

        if syncpt_id >= self.syncpt_incr.syncpoint_count() {
            log::error!(
                "{}: increment of unsupported syncpoint {}, ignoring",
                self.class_id,
                syncpt_id
            );
            return;
        }

        if cond == SYNCPT_COND_IMMEDIATE {
            self.syncpt_incr.increment(self.class_id, syncpt_id);
        } else {
            // reserved here, on the decoder thread, so increments keep decode order
            let token = self.syncpt_incr.reserve_deferred(self.class_id, syncpt_id);
            self.command_queue.add(ThiAction::SyncptIncr {
                context_id: self.current_context_id,
                token,
            });
        }
    }

    fn method1(&mut self, data: u32) {
        // METHOD0 holds the method index, the device takes byte offsets
        let method = self.state.read(METHOD0).wrapping_mul(4);
        self.command_queue.add(ThiAction::MethodCall {
            context_id: self.current_context_id,
            method,
            data,
        });
    }
}

impl Device for ThiDevice {
    fn read(&mut self, offset: u32) -> u32 {
        self.state.read(offset)
    }

    fn write(&mut self, offset: u32, data: u32) {
        match self.state.write(offset, data) {
            Some(ThiHook::IncrSyncpt) => self.incr_syncpt(data),
            Some(ThiHook::Method1) => self.method1(data),
            None => {}
        }
    }

    fn bind_context(&mut self, context_id: ContextId) {
        // the wrapped device is bound on the worker, once it gets there
        self.current_context_id = context_id;
    }

    fn create_context(&mut self, context_id: ContextId) {
        self.command_queue.add(ThiAction::CreateContext(context_id));
    }

    fn destroy_context(&mut self, context_id: ContextId) {
        self.command_queue.add(ThiAction::DestroyContext(context_id));
    }
}

impl Drop for ThiDevice {
    fn drop(&mut self) {
        log::debug!("{}: draining {}", self.class_id, self.command_queue.name());
        self.command_queue.dispose();
    }
}
