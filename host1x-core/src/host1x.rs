pub mod class;
pub mod command;
mod devices;

use std::collections::HashSet;
use std::sync::Arc;

use crate::device::{ClassId, ContextId, Device, DEFAULT_CONTEXT};
use crate::sync::{SyncptIncrCoordinator, SyncptIncrManager, SynchronizationManager};
use crate::work_queue::WorkQueue;

use class::Host1xClass;
use command::{offset_field, OpCode};
use devices::Devices;

enum Host1xCommand {
    RegisterDevice {
        class_id: ClassId,
        device: Box<dyn Device>,
    },
    Submit {
        words: Vec<u32>,
        context_id: ContextId,
    },
    CreateContext(ContextId),
    DestroyContext(ContextId),
}

/// The Host1x command processor.
///
/// Command buffers are decoded on a dedicated thread, in the order they were
/// submitted. Writes to a class go through that class' THI, which runs the
/// actual device work on another thread per class.
pub struct Host1xDevice {
    command_queue: WorkQueue<Host1xCommand>,
    registered: HashSet<ClassId>,
    contexts: HashSet<ContextId>,
    next_context_id: ContextId,
}

impl Host1xDevice {
    pub fn new(sync_manager: Arc<SynchronizationManager>) -> Self {
        let syncpt_incr = Arc::new(SyncptIncrManager::new(sync_manager.clone()));
        Self::with_coordinator(sync_manager, syncpt_incr)
    }

    /// Like [`new`](Self::new), but with the given coordinator performing the
    /// syncpoint increments requested by the classes.
    pub fn with_coordinator(
        sync_manager: Arc<SynchronizationManager>,
        syncpt_incr: Arc<dyn SyncptIncrCoordinator>,
    ) -> Self {
        let mut devices = Devices::new(syncpt_incr);
        devices.register(ClassId::HOST1X, Box::new(Host1xClass::new(sync_manager)));

        let mut processor = Host1xProcessor::new(devices);
        let command_queue = WorkQueue::new("Host1x.Processor", move |command: Host1xCommand| {
            processor.process(command)
        });

        Self {
            command_queue,
            registered: HashSet::from([ClassId::HOST1X]),
            contexts: HashSet::new(),
            next_context_id: DEFAULT_CONTEXT + 1,
        }
    }

    /// Makes `device` reachable by `SetClass` commands for `class_id`.
    ///
    /// Must happen before submitting anything that uses the class.
    ///
    /// # Panics
    ///
    /// If `class_id` is already registered; [`ClassId::HOST1X`] always is.
    pub fn register_device(&mut self, class_id: ClassId, device: impl Device + 'static) {
        assert!(
            self.registered.insert(class_id),
            "device class {} registered twice",
            class_id
        );

        self.command_queue.add(Host1xCommand::RegisterDevice {
            class_id,
            device: Box::new(device),
        });
    }

    /// Opens a new channel context and returns its id, never
    /// [`DEFAULT_CONTEXT`] and never one handed out before.
    ///
    /// Every registered device, and every device registered while the
    /// context is open, gets [`Device::create_context`] before any write
    /// submitted under it.
    pub fn create_context(&mut self) -> ContextId {
        let context_id = self.next_context_id;
        self.next_context_id += 1;
        self.contexts.insert(context_id);

        self.command_queue.add(Host1xCommand::CreateContext(context_id));
        context_id
    }

    /// Closes a context opened by [`create_context`](Self::create_context).
    ///
    /// Devices get [`Device::destroy_context`] after everything submitted
    /// before this call has reached them.
    ///
    /// # Panics
    ///
    /// If `context_id` is not an open context.
    pub fn destroy_context(&mut self, context_id: ContextId) {
        assert!(
            self.contexts.remove(&context_id),
            "context {} is not open",
            context_id
        );

        self.command_queue.add(Host1xCommand::DestroyContext(context_id));
    }

    /// Queues a copy of `words` for processing in the default context.
    pub fn submit(&self, words: &[u32]) {
        self.submit_with_context(words, DEFAULT_CONTEXT);
    }

    pub fn submit_with_context(&self, words: &[u32], context_id: ContextId) {
        self.command_queue.add(Host1xCommand::Submit {
            words: words.to_vec(),
            context_id,
        });
    }

    /// Processes everything submitted so far, then stops the processor and
    /// every class worker.
    ///
    /// # Panics
    ///
    /// If called twice.
    pub fn dispose(&mut self) {
        self.command_queue.dispose();
    }
}

/// Decode state, lives on the processor thread.
struct Host1xProcessor {
    devices: Devices,
    current_class: Option<ClassId>,
    // `None` once the bound context is destroyed
    previous_context_id: Option<ContextId>,
    open_contexts: Vec<ContextId>,

    mask: u32,
    count: u32,
    offset: u32,
    incrementing: bool,
}

impl Host1xProcessor {
    fn new(devices: Devices) -> Self {
        Self {
            devices,
            current_class: None,
            previous_context_id: Some(DEFAULT_CONTEXT),
            open_contexts: Vec::new(),
            mask: 0,
            count: 0,
            offset: 0,
            incrementing: false,
        }
    }

    fn process(&mut self, command: Host1xCommand) {
        match command {
            Host1xCommand::RegisterDevice { class_id, device } => {
                self.devices.register(class_id, device);
                if let Some(device) = self.devices.get(class_id) {
                    for &context_id in &self.open_contexts {
                        device.create_context(context_id);
                    }
                }
            }
            Host1xCommand::Submit { words, context_id } => {
                if Some(context_id) != self.previous_context_id {
                    self.previous_context_id = Some(context_id);
                    self.devices.bind_context(context_id);
                }

                for word in words {
                    self.step(word);
                }
            }
            Host1xCommand::CreateContext(context_id) => {
                log::debug!("creating context {}", context_id);
                self.open_contexts.push(context_id);
                self.devices.create_context(context_id);
            }
            Host1xCommand::DestroyContext(context_id) => {
                log::debug!("destroying context {}", context_id);
                self.open_contexts.retain(|&open| open != context_id);
                self.devices.destroy_context(context_id);
                if self.previous_context_id == Some(context_id) {
                    self.previous_context_id = None;
                }
            }
        }
    }

    /// Handles one word. The mask/count state is kept between buffers, so a
    /// header and its data can be split across submissions.
    fn step(&mut self, word: u32) {
        log::trace!("host1x word {:08X}", word);

        if self.mask != 0 {
            let lowest_bit = self.mask.trailing_zeros();
            self.mask &= !(1 << lowest_bit);
            self.device_write(self.offset + lowest_bit, word);
            return;
        }

        if self.count != 0 {
            self.count -= 1;
            self.device_write(self.offset, word);
            if self.incrementing {
                self.offset += 1;
            }
            return;
        }

        let Some(opcode) = OpCode::from_word(word) else {
            log::error!("Unknown opcode {:X} in word {:08X}", word >> 28, word);
            return;
        };

        match opcode {
            OpCode::SetClass => {
                self.mask = word & 0x3F;
                self.offset = offset_field(word);

                let class_id = ClassId::from(word >> 6);
                if self.devices.contains(class_id) {
                    self.current_class = Some(class_id);
                } else {
                    log::warn!("Unsupported device class {}, dropping its writes", class_id);
                    self.current_class = None;
                }
            }
            OpCode::Incr | OpCode::NonIncr => {
                self.count = word & 0xFFFF;
                self.offset = offset_field(word);
                self.incrementing = opcode == OpCode::Incr;
            }
            OpCode::Mask => {
                self.mask = word & 0xFFFF;
                self.offset = offset_field(word);
            }
            OpCode::Imm => {
                let data = word & 0xFFF;
                self.offset = offset_field(word);
                self.device_write(self.offset, data);
            }
            _ => {
                log::error!("Unsupported opcode {:?}", opcode);
            }
        }
    }

    fn device_write(&mut self, offset: u32, data: u32) {
        let Some(class_id) = self.current_class else {
            log::trace!("no class selected, dropping write {:#x} = {:08X}", offset, data);
            return;
        };

        if let Some(device) = self.devices.get(class_id) {
            device.write(offset * 4, data);
        }
    }
}

impl Drop for Host1xProcessor {
    fn drop(&mut self) {
        // runs on the processor thread once its queue is drained
        self.devices.dispose();
    }
}
