#![cfg_attr(docsrs, feature(doc_cfg))]

//! Emulation of the Host1x command processor.
//!
//! [`Host1xDevice`] decodes streams of 32 bit command words into register
//! writes against registered device classes, and [`SynchronizationManager`]
//! holds the syncpoints those classes use to signal each other.
//!
//! ```no_run
//! use std::sync::Arc;
//! use host1x_core::{command, thi, ClassId, Device, Host1xDevice, SynchronizationManager};
//!
//! struct Decoder;
//!
//! impl Device for Decoder {
//!     fn read(&mut self, _offset: u32) -> u32 {
//!         0
//!     }
//!
//!     fn write(&mut self, offset: u32, data: u32) {
//!         println!("method {:#x} = {:08X}", offset, data);
//!     }
//! }
//!
//! let sync_manager = Arc::new(SynchronizationManager::new());
//! let mut host1x = Host1xDevice::new(sync_manager.clone());
//! host1x.register_device(ClassId::NVDEC, Decoder);
//!
//! host1x.submit(&[
//!     command::set_class(ClassId::NVDEC, thi::METHOD0 / 4, 0b11),
//!     0x100, // method index
//!     0x1,   // method data
//!     command::imm(thi::INCR_SYNCPT / 4, (1 << 8) | 5),
//! ]);
//!
//! sync_manager.wait(5, 1, None);
//! host1x.dispose();
//! ```

pub mod device;
pub mod host1x;
pub mod sync;
pub mod thi;
mod work_queue;


pub use device::{ClassId, ContextId, Device, DeviceState, DEFAULT_CONTEXT};
pub use host1x::{class, command, Host1xDevice};
pub use sync::{
    SyncConfig, SynchronizationManager, SyncpointWaiterHandle, SyncptIncrCoordinator,
    SyncptIncrManager, SyncptIncrToken, WaiterSignal, MAX_HARDWARE_SYNCPOINTS,
};
