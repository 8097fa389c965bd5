//! Diagnostic Trouble Codes as defined in SAE J2012 / ISO 15031-6.
use std::fmt;
use std::iter::FusedIterator;
use std::slice::ChunksExact;

use strum_macros::{EnumIter, FromRepr};

use crate::bitfield::get_bit_field;
use crate::obd2::Error;
use crate::shims::Shims;
use crate::uds::{DiagnosticRequest, DiagnosticRequestHandle, DiagnosticResponse, ServiceIdentifier};

/// Bytes per encoded DTC.
pub const DTC_LENGTH: usize = 2;

/// System a trouble code belongs to, the top two bits of the first byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DtcCategory {
    Powertrain = 0b00,
    Chassis = 0b01,
    Body = 0b10,
    Network = 0b11,
}

impl DtcCategory {
    /// Letter prefix of the printed code.
    pub fn letter(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }
}

/// A single decoded trouble code. Prints as e.g. `P0123`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DtcRecord {
    pub category: DtcCategory,
    /// Remaining 14 bits, printed as 4 hex digits
    pub code: u16,
}

impl DtcRecord {
    /// Decode the first two bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let malformed = Error::MalformedDtcPayload(bytes.len());
        let category = get_bit_field(bytes, 0, 2).map_err(|_| malformed)?;
        let code = get_bit_field(bytes, 2, 14).map_err(|_| malformed)?;

        Ok(Self {
            category: DtcCategory::from_repr(category as u8).ok_or(malformed)?,
            code: code as u16,
        })
    }
}

impl fmt::Display for DtcRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04X}", self.category.letter(), self.code)
    }
}

/// Which part of the fault memory to read.
#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumIter)]
#[repr(u8)]
pub enum DtcReport {
    Stored = ServiceIdentifier::ShowStoredDtcs as u8,
    Pending = ServiceIdentifier::ShowPendingDtcs as u8,
    Permanent = ServiceIdentifier::ShowPermanentDtcs as u8,
}

/// Trouble codes carried by a response payload. Borrows the payload, every call to [`Dtcs::iter`] starts over.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Dtcs<'a> {
    data: &'a [u8],
}

impl<'a> Dtcs<'a> {
    pub fn iter(&self) -> DtcIter<'a> {
        DtcIter {
            chunks: self.data.chunks_exact(DTC_LENGTH),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() / DTC_LENGTH
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> IntoIterator for Dtcs<'a> {
    type Item = DtcRecord;
    type IntoIter = DtcIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &Dtcs<'a> {
    type Item = DtcRecord;
    type IntoIter = DtcIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Decodes one [`DtcRecord`] per byte pair, in payload order.
#[derive(Debug, Clone)]
pub struct DtcIter<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for DtcIter<'_> {
    type Item = DtcRecord;

    fn next(&mut self) -> Option<Self::Item> {
        // Every category is representable in 2 bits and chunks are exactly 2 bytes, decoding can't fail
        self.chunks.next().and_then(|pair| DtcRecord::from_bytes(pair).ok())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for DtcIter<'_> {}
impl FusedIterator for DtcIter<'_> {}

fn positive_payload(response: &DiagnosticResponse) -> Result<&[u8], Error> {
    if response.completed && response.success {
        Ok(response.payload())
    } else {
        Err(Error::NotPositive)
    }
}

/// Split a DTC report payload into trouble codes. The payload must be a nonzero number of byte pairs.
pub fn decode_dtcs(response: &DiagnosticResponse) -> Result<Dtcs<'_>, Error> {
    let data = positive_payload(response)?;

    match data.len() {
        len if len == 0 || len % DTC_LENGTH != 0 => Err(Error::MalformedDtcPayload(len)),
        _ => Ok(Dtcs { data }),
    }
}

/// A successful clear carries no data. The handle already fails a clear answered with data, this checks a
/// response obtained some other way.
pub fn verify_clear(response: &DiagnosticResponse) -> Result<(), Error> {
    match positive_payload(response)?.len() {
        0 => Ok(()),
        len => Err(Error::UnexpectedClearPayload(len)),
    }
}

fn send_request<S: Shims + ?Sized>(
    shims: &S,
    arbitration_id: u32,
    mode: u8,
) -> crate::Result<DiagnosticRequestHandle> {
    let request = DiagnosticRequest::new(arbitration_id, mode, None, None)?;
    let mut handle = DiagnosticRequestHandle::new(request);
    handle.send(shims);
    Ok(handle)
}

/// Read stored trouble codes (mode 0x03).
pub fn request_dtcs<S: Shims + ?Sized>(
    shims: &S,
    arbitration_id: u32,
) -> crate::Result<DiagnosticRequestHandle> {
    request_dtc_report(shims, arbitration_id, DtcReport::Stored)
}

pub fn request_dtc_report<S: Shims + ?Sized>(
    shims: &S,
    arbitration_id: u32,
    report: DtcReport,
) -> crate::Result<DiagnosticRequestHandle> {
    send_request(shims, arbitration_id, report as u8)
}

/// Clear trouble codes and stored freeze frames (mode 0x04). A positive answer carrying data completes the handle
/// with `success = false`.
pub fn clear_dtcs<S: Shims + ?Sized>(
    shims: &S,
    arbitration_id: u32,
) -> crate::Result<DiagnosticRequestHandle> {
    send_request(shims, arbitration_id, ServiceIdentifier::ClearDtcs as u8)
}
