//! Request and response types exchanged with an ECU.
use std::fmt;

use crate::bitfield::{self, get_bit_field, set_bit_field};
use crate::can::MAX_STANDARD_ID;
use crate::isotp::{MAX_MESSAGE_SIZE, MAX_SF_DL};
use crate::uds::constants::*;
use crate::uds::error::{Error, NegativeResponseCode};

/// Largest positive response payload, the message minus the echoed mode.
pub const MAX_RESPONSE_PAYLOAD_LENGTH: usize = MAX_MESSAGE_SIZE - 1;

/// A diagnostic request. Validated on construction and immutable afterwards.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DiagnosticRequest {
    arbitration_id: u32,
    mode: u8,
    pid: Option<u16>,
    payload: [u8; MAX_MESSAGE_SIZE],
    payload_length: usize,
}

impl DiagnosticRequest {
    /// Build a request. The PID width follows from the mode, see [`ServiceIdentifier::pid_length`].
    ///
    /// Fails with [`Error::InvalidRequestSize`] if mode, PID and payload don't fit in one transport message,
    /// or for functional requests, in one Single Frame.
    pub fn new(
        arbitration_id: u32,
        mode: u8,
        pid: Option<u16>,
        payload: Option<&[u8]>,
    ) -> Result<Self, Error> {
        if arbitration_id > MAX_STANDARD_ID {
            return Err(Error::InvalidArbitrationId(arbitration_id));
        }

        let functional = arbitration_id == OBD2_FUNCTIONAL_BROADCAST_ID;
        if !functional && arbitration_id + PHYSICAL_RESPONSE_OFFSET > MAX_STANDARD_ID {
            return Err(Error::InvalidArbitrationId(arbitration_id));
        }

        match pid {
            None if ServiceIdentifier::requires_pid(mode) => return Err(Error::MissingPid(mode)),
            Some(_) if ServiceIdentifier::forbids_pid(mode) => {
                return Err(Error::UnexpectedPid(mode))
            }
            Some(pid) if ServiceIdentifier::pid_length(mode) == 1 && pid > 0xff => {
                return Err(Error::InvalidPid(pid))
            }
            _ => {}
        }

        let payload = payload.unwrap_or_default();
        let pid_length = pid.map_or(0, |_| ServiceIdentifier::pid_length(mode));
        let size = 1 + pid_length + payload.len();

        if size > MAX_MESSAGE_SIZE || (functional && size > MAX_SF_DL) {
            return Err(Error::InvalidRequestSize(size));
        }

        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        buf[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            arbitration_id,
            mode,
            pid,
            payload: buf,
            payload_length: payload.len(),
        })
    }

    /// Reconstruct a request from transport bytes, the way an ECU would read it.
    pub fn parse(arbitration_id: u32, data: &[u8]) -> Result<Self, Error> {
        let Ok(mode) = get_bit_field(data, 0, 8) else {
            return Err(Error::InvalidRequestSize(data.len()));
        };
        let mode = mode as u8;

        if !ServiceIdentifier::requires_pid(mode) {
            return Self::new(arbitration_id, mode, None, Some(&data[1..]));
        }

        let pid_length = ServiceIdentifier::pid_length(mode);
        let Ok(pid) = get_bit_field(data, 8, pid_length * 8) else {
            return Err(Error::MissingPid(mode));
        };

        Self::new(arbitration_id, mode, Some(pid as u16), Some(&data[1 + pid_length..]))
    }

    pub fn arbitration_id(&self) -> u32 {
        self.arbitration_id
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    pub fn pid(&self) -> Option<u16> {
        self.pid
    }

    pub fn has_pid(&self) -> bool {
        self.pid.is_some()
    }

    /// Width of the PID in bytes, 0 without a PID.
    pub fn pid_length(&self) -> usize {
        self.pid.map_or(0, |_| ServiceIdentifier::pid_length(self.mode))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_length]
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    /// Sent to the functional broadcast id rather than one ECU.
    pub fn is_functional(&self) -> bool {
        self.arbitration_id == OBD2_FUNCTIONAL_BROADCAST_ID
    }

    /// Whether a frame on `arbitration_id` can be part of the response to this request.
    pub fn accepts_response_from(&self, arbitration_id: u32) -> bool {
        if self.is_functional() {
            let end = OBD2_FUNCTIONAL_RESPONSE_START + OBD2_FUNCTIONAL_RESPONSE_COUNT;
            (OBD2_FUNCTIONAL_RESPONSE_START..end).contains(&arbitration_id)
        } else {
            arbitration_id == self.arbitration_id + PHYSICAL_RESPONSE_OFFSET
        }
    }

    /// Size of the serialized request in bytes.
    pub fn encoded_length(&self) -> usize {
        1 + self.pid_length() + self.payload_length
    }

    /// Serialize mode, PID and payload into `buf`, returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, bitfield::Error> {
        let size = self.encoded_length();
        if buf.len() < size {
            return Err(bitfield::Error::OutOfRange {
                offset: 0,
                bit_count: size * 8,
                available: buf.len() * 8,
            });
        }

        set_bit_field(buf, self.mode as u64, 0, 8)?;

        let pid_length = self.pid_length();
        if let Some(pid) = self.pid {
            set_bit_field(buf, pid as u64, 8, pid_length * 8)?;
        }

        buf[1 + pid_length..size].copy_from_slice(self.payload());
        Ok(size)
    }
}

impl fmt::Debug for DiagnosticRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticRequest")
            .field("arbitration_id", &format_args!("0x{:03x}", self.arbitration_id))
            .field("mode", &format_args!("0x{:02x}", self.mode))
            .field("pid", &self.pid)
            .field("payload", &hex::encode(self.payload()))
            .finish()
    }
}

impl fmt::Display for DiagnosticRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arb_id: 0x{:03x}, mode: 0x{:02x}", self.arbitration_id, self.mode)?;
        if let Some(pid) = self.pid {
            write!(f, ", pid: 0x{:x}", pid)?;
        }
        if self.payload_length > 0 {
            write!(f, ", payload: 0x{}", hex::encode(self.payload()))?;
        }
        Ok(())
    }
}

/// The response accumulated by a [`crate::uds::DiagnosticRequestHandle`]. Readable at any time, final once `completed` is set.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DiagnosticResponse {
    /// Id the response arrived on
    pub arbitration_id: u32,
    /// Reassembly finished and the response was classified
    pub completed: bool,
    /// Positive response
    pub success: bool,
    /// Echoed mode: request mode + 0x40 when positive, 0x7f when negative
    pub mode: u8,
    pub pid: Option<u16>,
    /// Set for negative responses only
    pub negative_response_code: Option<NegativeResponseCode>,
    /// Why the exchange failed, unset on success
    pub error: Option<Error>,
    payload: [u8; MAX_RESPONSE_PAYLOAD_LENGTH],
    payload_length: usize,
}

impl Default for DiagnosticResponse {
    fn default() -> Self {
        Self {
            arbitration_id: 0,
            completed: false,
            success: false,
            mode: 0,
            pid: None,
            negative_response_code: None,
            error: None,
            payload: [0u8; MAX_RESPONSE_PAYLOAD_LENGTH],
            payload_length: 0,
        }
    }
}

impl DiagnosticResponse {
    /// A completed positive response. Mostly useful for feeding the decoders directly.
    pub fn positive(arbitration_id: u32, mode: u8, pid: Option<u16>, payload: &[u8]) -> Self {
        let mut response = Self {
            arbitration_id,
            completed: true,
            success: true,
            mode,
            pid,
            ..Default::default()
        };
        response.set_payload(payload);
        response
    }

    /// Data following the echoed mode and PID, empty unless the response is positive.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_length]
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length
    }

    pub fn is_negative(&self) -> bool {
        self.negative_response_code.is_some()
    }

    /// Copies at most [`MAX_RESPONSE_PAYLOAD_LENGTH`] bytes.
    pub(crate) fn set_payload(&mut self, payload: &[u8]) {
        let len = std::cmp::min(payload.len(), MAX_RESPONSE_PAYLOAD_LENGTH);
        self.payload[..len].copy_from_slice(&payload[..len]);
        self.payload_length = len;
    }
}

impl fmt::Debug for DiagnosticResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticResponse")
            .field("arbitration_id", &format_args!("0x{:03x}", self.arbitration_id))
            .field("completed", &self.completed)
            .field("success", &self.success)
            .field("mode", &format_args!("0x{:02x}", self.mode))
            .field("pid", &self.pid)
            .field("negative_response_code", &self.negative_response_code)
            .field("error", &self.error)
            .field("payload", &hex::encode(self.payload()))
            .finish()
    }
}

impl fmt::Display for DiagnosticResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arb_id: 0x{:03x}, mode: 0x{:02x}", self.arbitration_id, self.mode)?;
        if let Some(pid) = self.pid {
            write!(f, ", pid: 0x{:x}", pid)?;
        }

        match (self.negative_response_code, self.error) {
            (Some(code), _) => write!(f, ", nrc: 0x{:02x} ({:?})", u8::from(code), code),
            (None, Some(e)) => write!(f, ", error: {}", e),
            (None, None) if self.payload_length > 0 => {
                write!(f, ", payload: 0x{}", hex::encode(self.payload()))
            }
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_standard_pid_request() {
        let request = DiagnosticRequest::new(0x7df, 0x01, Some(0x0c), None).unwrap();
        assert_eq!(request.pid_length(), 1);

        let mut buf = [0u8; 8];
        assert_eq!(request.encode(&mut buf), Ok(2));
        assert_eq!(&buf[..2], &[0x01, 0x0c]);
    }

    #[test]
    fn build_enhanced_pid_request() {
        let request = DiagnosticRequest::new(0x7e0, 0x22, Some(0xf190), None).unwrap();
        assert_eq!(request.pid_length(), 2);

        let mut buf = [0u8; 8];
        assert_eq!(request.encode(&mut buf), Ok(3));
        assert_eq!(&buf[..3], &[0x22, 0xf1, 0x90]);
    }

    #[test]
    fn pid_rules_follow_mode() {
        assert_eq!(DiagnosticRequest::new(0x7df, 0x01, None, None), Err(Error::MissingPid(0x01)));
        assert_eq!(
            DiagnosticRequest::new(0x7df, 0x03, Some(0x01), None),
            Err(Error::UnexpectedPid(0x03))
        );
        assert_eq!(
            DiagnosticRequest::new(0x7df, 0x01, Some(0x100), None),
            Err(Error::InvalidPid(0x100))
        );
        assert!(DiagnosticRequest::new(0x7df, 0x04, None, None).is_ok());
        assert!(DiagnosticRequest::new(0x7e0, 0x3e, None, Some(&[0x00])).is_ok());
    }

    #[test]
    fn request_size_limits() {
        let payload = [0u8; MAX_MESSAGE_SIZE];
        let too_long = &payload[..MAX_MESSAGE_SIZE - 2];
        assert_eq!(
            DiagnosticRequest::new(0x7e0, 0x22, Some(0xf190), Some(too_long)),
            Err(Error::InvalidRequestSize(MAX_MESSAGE_SIZE + 1))
        );
        let longest = &payload[..MAX_MESSAGE_SIZE - 3];
        assert!(DiagnosticRequest::new(0x7e0, 0x22, Some(0xf190), Some(longest)).is_ok());

        // Functional requests have to fit in a Single Frame
        assert_eq!(
            DiagnosticRequest::new(0x7df, 0x01, Some(0x0c), Some(&payload[..6])),
            Err(Error::InvalidRequestSize(8))
        );
    }

    #[test]
    fn arbitration_id_limits() {
        assert_eq!(
            DiagnosticRequest::new(0x800, 0x3e, None, None),
            Err(Error::InvalidArbitrationId(0x800))
        );
        assert_eq!(
            DiagnosticRequest::new(0x7fa, 0x3e, None, None),
            Err(Error::InvalidArbitrationId(0x7fa))
        );
    }

    #[test]
    fn response_id_filtering() {
        let functional = DiagnosticRequest::new(0x7df, 0x01, Some(0x0c), None).unwrap();
        assert!(functional.accepts_response_from(0x7e8));
        assert!(functional.accepts_response_from(0x7ef));
        assert!(!functional.accepts_response_from(0x7f0));
        assert!(!functional.accepts_response_from(0x7e7));

        let physical = DiagnosticRequest::new(0x7e0, 0x01, Some(0x0c), None).unwrap();
        assert!(physical.accepts_response_from(0x7e8));
        assert!(!physical.accepts_response_from(0x7e9));
    }

    #[test]
    fn encode_parse_round_trip() {
        let request =
            DiagnosticRequest::new(0x7e0, 0x22, Some(0xf40c), Some(&[0x01, 0x02])).unwrap();

        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let len = request.encode(&mut buf).unwrap();
        assert_eq!(DiagnosticRequest::parse(0x7e0, &buf[..len]), Ok(request));
    }

    #[test]
    fn encode_into_short_buffer() {
        let request = DiagnosticRequest::new(0x7e0, 0x22, Some(0xf190), None).unwrap();
        let mut buf = [0u8; 2];
        assert!(request.encode(&mut buf).is_err());
    }

    #[test]
    fn display() {
        let request = DiagnosticRequest::new(0x7df, 0x01, Some(0x0c), None).unwrap();
        assert_eq!(request.to_string(), "arb_id: 0x7df, mode: 0x01, pid: 0xc");

        let response = DiagnosticResponse::positive(0x7e8, 0x41, Some(0x0c), &[0x1a, 0xf8]);
        assert_eq!(response.to_string(), "arb_id: 0x7e8, mode: 0x41, pid: 0xc, payload: 0x1af8");
    }
}
