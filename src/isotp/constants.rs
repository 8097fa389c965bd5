/// ISO-TP protocol control information, upper nibble of the first data byte.
#[derive(Debug, PartialEq, Copy, Clone)]
#[repr(u8)]
pub enum FrameType {
    Single = 0x00,
    First = 0x10,
    Consecutive = 0x20,
    FlowControl = 0x30,
    Unknown = 0xff,
}

pub static FRAME_TYPE_MASK: u8 = 0xf0;

impl From<u8> for FrameType {
    fn from(val: u8) -> FrameType {
        match val {
            0x00 => FrameType::Single,
            0x10 => FrameType::First,
            0x20 => FrameType::Consecutive,
            0x30 => FrameType::FlowControl,
            _ => FrameType::Unknown,
        }
    }
}

/// Flow status carried in the low nibble of a flow control frame.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum FlowStatus {
    ContinueToSend = 0x0,
    Wait = 0x1,
    Overflow = 0x2,
}

/// Largest message the 12 bit First Frame length can describe.
pub const ISO_TP_MAX_DL: usize = 4095;

/// Largest message buffered by this implementation. Buffers are fixed size, so this is well below [`ISO_TP_MAX_DL`].
pub const MAX_MESSAGE_SIZE: usize = 255;

/// Payload bytes in a Single Frame with normal addressing.
pub const MAX_SF_DL: usize = 7;
/// Payload bytes carried by a First Frame.
pub const FF_DL: usize = 6;
/// Payload bytes carried by a Consecutive Frame.
pub const CF_DL: usize = 7;
