use crate::err::ProtocolError;

/// Size of one request frame on either link.
pub const FRAME_SIZE: usize = 18;

/// StatusReply bytes. Any nonzero byte reads back as success.
pub const STATUS_OK: u8 = 1;
pub const STATUS_FAIL: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Nop,
    Hello,
    Read,
    Write,
    Irq,
    /// A tag this side does not know; handed to the caller as-is.
    Unknown(u8),
}

impl Operation {
    pub const fn tag(self) -> u8 {
        match self {
            Operation::Nop => 0,
            Operation::Hello => 1,
            Operation::Read => 2,
            Operation::Write => 3,
            Operation::Irq => 4,
            Operation::Unknown(tag) => tag,
        }
    }

    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Operation::Nop,
            1 => Operation::Hello,
            2 => Operation::Read,
            3 => Operation::Write,
            4 => Operation::Irq,
            other => Operation::Unknown(other),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Nop => write!(f, "NOP"),
            Operation::Hello => write!(f, "HELLO"),
            Operation::Read => write!(f, "READ"),
            Operation::Write => write!(f, "WRITE"),
            Operation::Irq => write!(f, "IRQ"),
            Operation::Unknown(tag) => write!(f, "UNKNOWN({tag:#04x})"),
        }
    }
}

/// Width of a single access in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AccessWidth {
    Byte = 1,
    Half = 2,
    Word = 4,
    Double = 8,
}

impl AccessWidth {
    pub const ALL: [AccessWidth; 4] = [
        AccessWidth::Byte,
        AccessWidth::Half,
        AccessWidth::Word,
        AccessWidth::Double,
    ];

    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Truncate `value` to the low `self.bytes()` bytes.
    pub const fn mask(self, value: u64) -> u64 {
        match self {
            AccessWidth::Double => value,
            _ => value & ((1u64 << (self.bytes() * 8)) - 1),
        }
    }
}

impl TryFrom<u8> for AccessWidth {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(AccessWidth::Byte),
            2 => Ok(AccessWidth::Half),
            4 => Ok(AccessWidth::Word),
            8 => Ok(AccessWidth::Double),
            other => Err(ProtocolError::InvalidWidth(other)),
        }
    }
}

impl TryFrom<usize> for AccessWidth {
    type Error = ProtocolError;

    fn try_from(raw: usize) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .map_err(|_| ProtocolError::InvalidWidth(u8::MAX))
            .and_then(<AccessWidth as TryFrom<u8>>::try_from)
    }
}

impl From<AccessWidth> for usize {
    fn from(width: AccessWidth) -> Self {
        width.bytes()
    }
}

/// One request frame.
///
/// Layout, little-endian, no padding:
/// ```text
/// [op:1][size:1][address:8][value:8]
/// ```
/// `size` is kept raw so a peer's garbage survives decoding; use [`ControlMessage::width`]
/// where the width matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub op: Operation,
    pub size: u8,
    pub address: u64,
    pub value: u64,
}

impl ControlMessage {
    pub fn nop() -> Self {
        Self::bare(Operation::Nop)
    }

    pub fn hello() -> Self {
        Self::bare(Operation::Hello)
    }

    pub fn irq() -> Self {
        Self::bare(Operation::Irq)
    }

    pub fn read(address: u64, width: AccessWidth) -> Self {
        Self {
            op: Operation::Read,
            size: width as u8,
            address,
            value: 0,
        }
    }

    pub fn write(address: u64, width: AccessWidth, value: u64) -> Self {
        Self {
            op: Operation::Write,
            size: width as u8,
            address,
            value,
        }
    }

    fn bare(op: Operation) -> Self {
        Self {
            op,
            size: 0,
            address: 0,
            value: 0,
        }
    }

    pub fn width(&self) -> Result<AccessWidth, ProtocolError> {
        AccessWidth::try_from(self.size)
    }

    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = self.op.tag();
        frame[1] = self.size;
        frame[2..10].copy_from_slice(&self.address.to_le_bytes());
        frame[10..18].copy_from_slice(&self.value.to_le_bytes());
        frame
    }

    pub fn decode(frame: &[u8; FRAME_SIZE]) -> Self {
        let mut address = [0u8; 8];
        let mut value = [0u8; 8];
        address.copy_from_slice(&frame[2..10]);
        value.copy_from_slice(&frame[10..18]);
        Self {
            op: Operation::from_tag(frame[0]),
            size: frame[1],
            address: u64::from_le_bytes(address),
            value: u64::from_le_bytes(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let msg = ControlMessage::write(0x1122334455667788, AccessWidth::Word, 0xdeadbeef);
        let frame = msg.encode();

        assert_eq!(frame[0], 3);
        assert_eq!(frame[1], 4);
        assert_eq!(&frame[2..10], &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
        assert_eq!(&frame[10..18], &[0xef, 0xbe, 0xad, 0xde, 0, 0, 0, 0]);
        assert_eq!(ControlMessage::decode(&frame), msg);
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let mut frame = ControlMessage::nop().encode();
        frame[0] = 0x7f;
        frame[1] = 3;

        let msg = ControlMessage::decode(&frame);
        assert_eq!(msg.op, Operation::Unknown(0x7f));
        assert_eq!(msg.width(), Err(ProtocolError::InvalidWidth(3)));
        assert_eq!(msg.encode(), frame);
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(AccessWidth::Byte.mask(0x1234), 0x34);
        assert_eq!(AccessWidth::Half.mask(0x12345678), 0x5678);
        assert_eq!(AccessWidth::Word.mask(0x1_2345_6789), 0x2345_6789);
        assert_eq!(AccessWidth::Double.mask(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_width_conversion() {
        assert_eq!(AccessWidth::try_from(8usize), Ok(AccessWidth::Double));
        assert!(AccessWidth::try_from(0u8).is_err());
        assert!(AccessWidth::try_from(16usize).is_err());
        assert!(AccessWidth::try_from(300usize).is_err());
    }
}
