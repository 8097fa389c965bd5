//! OBD-II parameter and trouble code layer on top of [`crate::uds`].
//!
//! Requests are sent with the usual [`DiagnosticRequestHandle`], the helpers here only build them and decode the
//! completed response. Decoding borrows the response and never changes the handle it came from.
//!
//! ## Example
//! ```rust
//! use automotive_diag::obd2::{decode, request_pid, PhysicalValue, PidRequestType, Unit};
//! use automotive_diag::shims::init_shims;
//! use automotive_diag::uds::OBD2_FUNCTIONAL_BROADCAST_ID;
//!
//! fn send_can(_id: u32, _data: &[u8]) -> bool { true }
//!
//! let shims = init_shims(None, send_can, None);
//! let mut handle = request_pid(&shims, PidRequestType::Standard, OBD2_FUNCTIONAL_BROADCAST_ID, 0x0c).unwrap();
//!
//! let response = handle.receive_frame(&shims, 0x7e8, &[0x04, 0x41, 0x0c, 0x1a, 0xf8]);
//! assert_eq!(
//!     decode(&response, 0x0c).unwrap(),
//!     PhysicalValue::Numeric { value: 1726.0, unit: Unit::Rpm }
//! );
//! ```

mod dtc;
mod error;
mod pid;

pub use dtc::*;
pub use error::Error;
pub use pid::{entries, lookup, Formula, PhysicalValue, PidEntry, Unit};

use crate::bitfield::get_bit_field;
use crate::shims::Shims;
use crate::uds::{
    self, DiagnosticRequest, DiagnosticRequestHandle, DiagnosticResponse, ServiceIdentifier,
    POSITIVE_RESPONSE,
};

/// Selects the service a PID is read with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PidRequestType {
    /// Mode 0x01, 1 byte PID
    Standard,
    /// Mode 0x22, 2 byte data identifier
    Enhanced,
}

impl PidRequestType {
    pub fn mode(&self) -> u8 {
        match self {
            PidRequestType::Standard => ServiceIdentifier::ShowCurrentData as u8,
            PidRequestType::Enhanced => ServiceIdentifier::ReadDataByIdentifier as u8,
        }
    }
}

/// Build the request reading `pid` without sending it.
pub fn pid_request(
    kind: PidRequestType,
    arbitration_id: u32,
    pid: u16,
) -> Result<DiagnosticRequest, uds::Error> {
    DiagnosticRequest::new(arbitration_id, kind.mode(), Some(pid), None)
}

/// Build and send a request for one PID. Feed the returned handle with [`DiagnosticRequestHandle::receive_frame`].
pub fn request_pid<S: Shims + ?Sized>(
    shims: &S,
    kind: PidRequestType,
    arbitration_id: u32,
    pid: u16,
) -> crate::Result<DiagnosticRequestHandle> {
    let mut handle = DiagnosticRequestHandle::new(pid_request(kind, arbitration_id, pid)?);
    handle.send(shims);
    Ok(handle)
}

/// Decode the value of `pid` from a completed positive response.
pub fn decode(response: &DiagnosticResponse, pid: u16) -> Result<PhysicalValue, Error> {
    if !(response.completed && response.success) {
        return Err(Error::NotPositive);
    }

    let mode = response.mode.wrapping_sub(POSITIVE_RESPONSE);
    let entry = lookup(mode, pid).ok_or(Error::UnknownPid { mode, pid })?;
    entry.apply(response.payload())
}

/// The payload of a positive response as a big-endian integer, for PIDs without a registry entry.
pub fn payload_to_integer(response: &DiagnosticResponse) -> Result<u32, Error> {
    if !(response.completed && response.success) {
        return Err(Error::NotPositive);
    }

    match response.payload_length() {
        len @ 1..=4 => get_bit_field(response.payload(), 0, len * 8)
            .map(|value| value as u32)
            .map_err(|_| Error::PayloadLengthMismatch {
                expected: len,
                received: response.payload_length(),
            }),
        len => Err(Error::PayloadLengthMismatch {
            expected: std::mem::size_of::<u32>(),
            received: len,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_modes() {
        let standard = pid_request(PidRequestType::Standard, 0x7df, 0x0c).unwrap();
        assert_eq!(standard.mode(), 0x01);
        assert_eq!(standard.pid(), Some(0x0c));

        let enhanced = pid_request(PidRequestType::Enhanced, 0x7e0, 0xf40c).unwrap();
        assert_eq!(enhanced.mode(), 0x22);
        assert_eq!(enhanced.pid_length(), 2);

        assert_eq!(
            pid_request(PidRequestType::Standard, 0x7df, 0xf40c),
            Err(uds::Error::InvalidPid(0xf40c))
        );
    }

    #[test]
    fn decode_standard() {
        let response = DiagnosticResponse::positive(0x7e8, 0x41, Some(0x05), &[0x7b]);
        assert_eq!(
            decode(&response, 0x05),
            Ok(PhysicalValue::Numeric {
                value: 83.0,
                unit: Unit::Celsius
            })
        );
    }

    #[test]
    fn decode_enhanced() {
        let response = DiagnosticResponse::positive(0x7e8, 0x62, Some(0xf40d), &[0x32]);
        assert_eq!(
            decode(&response, 0xf40d),
            Ok(PhysicalValue::Numeric {
                value: 50.0,
                unit: Unit::KilometersPerHour
            })
        );
    }

    #[test]
    fn decode_errors() {
        let response = DiagnosticResponse::positive(0x7e8, 0x41, Some(0xff), &[0x01]);
        assert_eq!(decode(&response, 0xff), Err(Error::UnknownPid { mode: 0x01, pid: 0xff }));

        let response = DiagnosticResponse::positive(0x7e8, 0x41, Some(0x0c), &[0x1a]);
        assert_eq!(
            decode(&response, 0x0c),
            Err(Error::PayloadLengthMismatch {
                expected: 2,
                received: 1
            })
        );

        assert_eq!(decode(&DiagnosticResponse::default(), 0x0c), Err(Error::NotPositive));
    }

    #[test]
    fn integer_payload() {
        let response = DiagnosticResponse::positive(0x7e8, 0x62, Some(0x1234), &[0x01, 0x02, 0x03]);
        assert_eq!(payload_to_integer(&response), Ok(0x010203));

        let response = DiagnosticResponse::positive(0x7e8, 0x62, Some(0x1234), &[0u8; 5]);
        assert_eq!(
            payload_to_integer(&response),
            Err(Error::PayloadLengthMismatch {
                expected: 4,
                received: 5
            })
        );
    }
}
