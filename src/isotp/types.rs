use std::time::Duration;

use crate::isotp::constants::{FlowStatus, FrameType, FRAME_TYPE_MASK};
use crate::isotp::error::Error;

/// Transport settings for one exchange.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsoTpConfig {
    /// Padding byte (0x00, or more efficient 0xAA). `None` sends frames at their minimal length.
    pub padding: Option<u8>,
    /// Block size advertised in flow control frames we send (0 = no further flow control)
    pub block_size: u8,
    /// STmin advertised in flow control frames we send, raw encoding
    pub separation_time_min: u8,
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            padding: Some(0xaa),
            block_size: 0,
            separation_time_min: 0,
        }
    }
}

/// Contents of a flow control frame received from the other side.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FlowControlConfig {
    pub status: FlowStatus,
    pub block_size: u8,
    pub separation_time_min: Duration,
}

impl TryFrom<&[u8]> for FlowControlConfig {
    type Error = Error;
    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < 3 {
            return Err(Error::MalformedFrame);
        }

        if FrameType::from(data[0] & FRAME_TYPE_MASK) != FrameType::FlowControl {
            return Err(Error::FlowControl);
        }

        let status = match data[0] & 0xf {
            0x0 => FlowStatus::ContinueToSend,
            0x1 => FlowStatus::Wait,
            0x2 => FlowStatus::Overflow,
            _ => return Err(Error::MalformedFrame),
        };

        let block_size = data[1];

        let separation_time_min = data[2] as u64;
        let separation_time_min = match separation_time_min {
            0x0..=0x7f => Duration::from_millis(separation_time_min),
            0xf1..=0xf9 => Duration::from_micros((separation_time_min - 0xf0) * 100),
            _ => return Err(Error::MalformedFrame),
        };

        Ok(Self {
            status,
            block_size,
            separation_time_min,
        })
    }
}
