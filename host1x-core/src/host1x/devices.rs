use std::collections::HashMap;
use std::sync::Arc;

use crate::device::{ClassId, ContextId, Device};
use crate::sync::SyncptIncrCoordinator;
use crate::thi::ThiDevice;

/// Registered device classes, keyed by class id.
///
/// Every class except [`ClassId::HOST1X`] is stored behind its own
/// [`ThiDevice`], so all of them look the same to the processor.
pub(crate) struct Devices {
    devices: HashMap<ClassId, Box<dyn Device>>,
    syncpt_incr: Arc<dyn SyncptIncrCoordinator>,
}

impl Devices {
    pub(crate) fn new(syncpt_incr: Arc<dyn SyncptIncrCoordinator>) -> Self {
        Self {
            devices: HashMap::new(),
            syncpt_incr,
        }
    }

    pub(crate) fn register(&mut self, class_id: ClassId, device: Box<dyn Device>) {
        let device: Box<dyn Device> = if class_id == ClassId::HOST1X {
            device
        } else {
            Box::new(ThiDevice::new(class_id, device, self.syncpt_incr.clone()))
        };

        log::debug!("registered device class {}", class_id);
        if self.devices.insert(class_id, device).is_some() {
            panic!("device class {} registered twice", class_id);
        }
    }

    pub(crate) fn get(&mut self, class_id: ClassId) -> Option<&mut (dyn Device + 'static)> {
        self.devices.get_mut(&class_id).map(|device| device.as_mut())
    }

    /// Stores `device` as is, without a THI in front.
    #[cfg(test)]
    pub(crate) fn insert_raw(&mut self, class_id: ClassId, device: Box<dyn Device>) {
        self.devices.insert(class_id, device);
    }

    pub(crate) fn contains(&self, class_id: ClassId) -> bool {
        self.devices.contains_key(&class_id)
    }

    pub(crate) fn bind_context(&mut self, context_id: ContextId) {
        for device in self.devices.values_mut() {
            device.bind_context(context_id);
        }
    }

    pub(crate) fn create_context(&mut self, context_id: ContextId) {
        for device in self.devices.values_mut() {
            device.create_context(context_id);
        }
    }

    pub(crate) fn destroy_context(&mut self, context_id: ContextId) {
        for device in self.devices.values_mut() {
            device.destroy_context(context_id);
        }
    }

    /// Drops every device, which drains and joins the THI workers.
    pub(crate) fn dispose(&mut self) {
        for (class_id, device) in self.devices.drain() {
            log::debug!("disposing device class {}", class_id);
            drop(device);
        }
    }
}
