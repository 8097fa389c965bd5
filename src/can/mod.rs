//! Classic CAN frame type used by the transport layer.

use std::fmt;

/// Maximum number of data bytes in a classic CAN frame.
pub const CAN_MAX_DLEN: usize = 8;

/// Highest valid 11-bit (standard) arbitration id.
pub const MAX_STANDARD_ID: u32 = 0x7ff;

/// A classic CAN frame with an 11-bit arbitration id. Data is stored inline so frames can be built without allocating.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Arbitration ID
    pub id: u32,
    data: [u8; CAN_MAX_DLEN],
    len: usize,
}

impl Frame {
    pub fn new(id: u32, data: &[u8]) -> Result<Frame, crate::error::Error> {
        if data.len() > CAN_MAX_DLEN || id > MAX_STANDARD_ID {
            return Err(crate::error::Error::MalformedFrame);
        }

        let mut buf = [0u8; CAN_MAX_DLEN];
        buf[..data.len()].copy_from_slice(data);

        Ok(Frame {
            id,
            data: buf,
            len: data.len(),
        })
    }

    /// Frame Data
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &format_args!("0x{:03x}", self.id))
            .field("data", &hex::encode(self.data()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_new() {
        let frame = Frame::new(0x7e0, &[0x02, 0x01, 0x0c]).unwrap();
        assert_eq!(frame.id, 0x7e0);
        assert_eq!(frame.data(), &[0x02, 0x01, 0x0c]);
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn frame_rejects_invalid() {
        assert_eq!(
            Frame::new(0x800, &[0x00]),
            Err(crate::error::Error::MalformedFrame)
        );
        assert_eq!(
            Frame::new(0x7df, &[0u8; 9]),
            Err(crate::error::Error::MalformedFrame)
        );
    }
}
