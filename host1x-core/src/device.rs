mod state;

use core::fmt;

pub use state::DeviceState;

/// Identifies the channel context a command buffer was submitted under.
pub type ContextId = u64;

/// Context used by [`Host1xDevice::submit`](crate::Host1xDevice::submit).
pub const DEFAULT_CONTEXT: ContextId = 0;

/// A register-mapped device class, as seen by the command processor.
///
/// `offset` is a byte offset into the class register block. The processor
/// calls these from its own worker threads, never concurrently for the same
/// device.
pub trait Device: Send {
    fn read(&mut self, offset: u32) -> u32;

    fn write(&mut self, offset: u32, data: u32);

    /// Called before writes belonging to a different channel context than the
    /// previous ones.
    fn bind_context(&mut self, _context_id: ContextId) {}

    /// A channel context was opened, writes for it may follow.
    fn create_context(&mut self, _context_id: ContextId) {}

    /// The channel context is closed, nothing more is written for it and
    /// any state kept for it can be freed.
    fn destroy_context(&mut self, _context_id: ContextId) {}
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn read(&mut self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: u32, data: u32) {
        (**self).write(offset, data)
    }

    fn bind_context(&mut self, context_id: ContextId) {
        (**self).bind_context(context_id)
    }

    fn create_context(&mut self, context_id: ContextId) {
        (**self).create_context(context_id)
    }

    fn destroy_context(&mut self, context_id: ContextId) {
        (**self).destroy_context(context_id)
    }
}

/// Class id as encoded in the 10 bit field of a `SetClass` command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u16);

impl ClassId {
    /// The command processor itself, always registered.
    pub const HOST1X: ClassId = ClassId(0x00);
    pub const VII2C: ClassId = ClassId(0x0C);
    pub const MPE: ClassId = ClassId(0x20);
    pub const VI: ClassId = ClassId(0x30);
    pub const ISP: ClassId = ClassId(0x32);
    pub const ISPB: ClassId = ClassId(0x34);
    pub const VIC: ClassId = ClassId(0x5D);
    pub const GR3D: ClassId = ClassId(0x60);
    pub const GPU: ClassId = ClassId(0x61);
    pub const NVJPG: ClassId = ClassId(0xC0);
    pub const TSEC: ClassId = ClassId(0xE0);
    pub const TSECB: ClassId = ClassId(0xE1);
    pub const NVDEC: ClassId = ClassId(0xF0);

    pub const MASK: u16 = 0x3FF;

    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::HOST1X => "Host1x",
            Self::VII2C => "Vii2c",
            Self::MPE => "Mpe",
            Self::VI => "Vi",
            Self::ISP => "Isp",
            Self::ISPB => "Ispb",
            Self::VIC => "Vic",
            Self::GR3D => "Gr3d",
            Self::GPU => "Gpu",
            Self::NVJPG => "Nvjpg",
            Self::TSEC => "Tsec",
            Self::TSECB => "Tsecb",
            Self::NVDEC => "Nvdec",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for ClassId {
    fn from(value: u32) -> Self {
        Self((value & Self::MASK as u32) as u16)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "Class{:03X}", self.0),
        }
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({:#05x}, {})", self.0, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_id_from_field() {
        assert_eq!(ClassId::from(0xF0), ClassId::NVDEC);
        // only the low 10 bits are a class
        assert_eq!(ClassId::from(0x4F0), ClassId(0xF0));
        assert_eq!(ClassId::from(0x3FF), ClassId(0x3FF));
    }

    #[test]
    fn class_id_display() {
        assert_eq!(ClassId::VIC.to_string(), "Vic");
        assert_eq!(ClassId::HOST1X.to_string(), "Host1x");
        assert_eq!(ClassId(0x5).to_string(), "Class005");
    }
}
