//! Host1x command stream words.
//!
//! Every header has its opcode in bits 31:28. The layouts of the headers the
//! processor executes:
//!
//! | Opcode   | 27:16  | 15:0                                   |
//! |----------|--------|----------------------------------------|
//! | SetClass | offset | class id in 15:6, mask in 5:0          |
//! | Incr     | offset | count                                  |
//! | NonIncr  | offset | count                                  |
//! | Mask     | offset | mask                                   |
//! | Imm      | offset | immediate data in 11:0                 |
//!
//! Offsets are in 32 bit registers.

use byteorder::{ByteOrder, LittleEndian};

use crate::device::ClassId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    SetClass = 0x0,
    Incr = 0x1,
    NonIncr = 0x2,
    Mask = 0x3,
    Imm = 0x4,
    Restart = 0x5,
    Gather = 0x6,
    SetStrmId = 0x7,
    SetAppId = 0x8,
    SetPyld = 0x9,
    IncrW = 0xA,
    NonIncrW = 0xB,
    GatherW = 0xC,
    RestartW = 0xD,
    Extend = 0xE,
}

impl OpCode {
    /// Opcode of a header word, `None` for the unassigned `0xF`.
    pub fn from_word(word: u32) -> Option<Self> {
        let opcode = match word >> 28 {
            0x0 => Self::SetClass,
            0x1 => Self::Incr,
            0x2 => Self::NonIncr,
            0x3 => Self::Mask,
            0x4 => Self::Imm,
            0x5 => Self::Restart,
            0x6 => Self::Gather,
            0x7 => Self::SetStrmId,
            0x8 => Self::SetAppId,
            0x9 => Self::SetPyld,
            0xA => Self::IncrW,
            0xB => Self::NonIncrW,
            0xC => Self::GatherW,
            0xD => Self::RestartW,
            0xE => Self::Extend,
            _ => return None,
        };
        Some(opcode)
    }
}

#[inline]
pub(super) fn offset_field(word: u32) -> u32 {
    (word >> 16) & 0xFFF
}

fn header(opcode: OpCode, offset: u32, low: u32) -> u32 {
    debug_assert!(offset <= 0xFFF, "offset {:#x} does not fit a header", offset);
    ((opcode as u32) << 28) | ((offset & 0xFFF) << 16) | (low & 0xFFFF)
}

pub fn set_class(class_id: ClassId, offset: u32, mask: u32) -> u32 {
    header(
        OpCode::SetClass,
        offset,
        ((class_id.0 as u32 & ClassId::MASK as u32) << 6) | (mask & 0x3F),
    )
}

pub fn incr(offset: u32, count: u32) -> u32 {
    header(OpCode::Incr, offset, count)
}

pub fn non_incr(offset: u32, count: u32) -> u32 {
    header(OpCode::NonIncr, offset, count)
}

pub fn mask(offset: u32, mask: u32) -> u32 {
    header(OpCode::Mask, offset, mask)
}

pub fn imm(offset: u32, data: u32) -> u32 {
    header(OpCode::Imm, offset, data & 0xFFF)
}

/// Splits a little endian byte buffer into command words, trailing bytes
/// that don't fill a word are ignored.
pub fn words_from_le_bytes(bytes: &[u8]) -> Vec<u32> {
    let len = bytes.len() / 4;
    if bytes.len() % 4 != 0 {
        log::warn!(
            "command buffer of {} bytes is not word aligned, dropping {} bytes",
            bytes.len(),
            bytes.len() % 4
        );
    }

    let mut words = vec![0; len];
    LittleEndian::read_u32_into(&bytes[..len * 4], &mut words);
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bit_layout() {
        assert_eq!(set_class(ClassId(0x5), 0x10, 0), 0x0010_0140);
        assert_eq!(set_class(ClassId::NVDEC, 0, 0x3F), 0x0000_3C3F);
        assert_eq!(incr(0x4, 3), 0x1004_0003);
        assert_eq!(non_incr(0xFFF, 0xFFFF), 0x2FFF_FFFF);
        assert_eq!(mask(0x8, 0b101), 0x3008_0005);
        assert_eq!(imm(0x20, 0x7), 0x4020_0007);
        // immediate data is only 12 bits
        assert_eq!(imm(0x20, 0xF123), 0x4020_0123);
    }

    #[test]
    fn opcode_from_word() {
        assert_eq!(OpCode::from_word(0x0000_0000), Some(OpCode::SetClass));
        assert_eq!(OpCode::from_word(0x4FFF_FFFF), Some(OpCode::Imm));
        assert_eq!(OpCode::from_word(0xE000_0000), Some(OpCode::Extend));
        assert_eq!(OpCode::from_word(0xF000_0000), None);
    }

    #[test]
    fn words_from_bytes() {
        let bytes = [0x07, 0x00, 0x20, 0x40, 0x01, 0x02, 0x03, 0x04, 0xAA];
        assert_eq!(words_from_le_bytes(&bytes), vec![0x4020_0007, 0x0403_0201]);
        assert!(words_from_le_bytes(&[]).is_empty());
    }
}
