use std::fmt;

/// Reason an ECU rejected a request, third byte of a negative response.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum NegativeResponseCode {
    GeneralReject = 0x10,
    ServiceNotSupported = 0x11,
    SubFunctionNotSupported = 0x12,
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    ResponseTooLong = 0x14,
    BusyRepeatRequest = 0x21,
    ConditionsNotCorrect = 0x22,
    RequestSequenceError = 0x24,
    NoResponseFromSubnetComponent = 0x25,
    FailurePreventsExecutionOfRequestedAction = 0x26,
    RequestOutOfRange = 0x31,
    SecurityAccessDenied = 0x33,
    InvalidKey = 0x35,
    ExeedNumberOfAttempts = 0x36,
    RequiredTimeDelayNotExpired = 0x37,
    UploadDownloadNotAccepted = 0x70,
    TransferDataSuspended = 0x71,
    GeneralProgrammingFailure = 0x72,
    WrongBlockSequenceCounter = 0x73,
    /// Not a failure. The ECU needs more time and will follow up with the real response.
    RequestCorrectlyReceivedResponsePending = 0x78,
    SubFunctionNotSupportedInActiveSession = 0x7e,
    ServiceNotSupportedInActiveSession = 0x7f,

    NonStandard(u8),
}

impl From<u8> for NegativeResponseCode {
    fn from(val: u8) -> NegativeResponseCode {
        match val {
            0x10 => NegativeResponseCode::GeneralReject,
            0x11 => NegativeResponseCode::ServiceNotSupported,
            0x12 => NegativeResponseCode::SubFunctionNotSupported,
            0x13 => NegativeResponseCode::IncorrectMessageLengthOrInvalidFormat,
            0x14 => NegativeResponseCode::ResponseTooLong,
            0x21 => NegativeResponseCode::BusyRepeatRequest,
            0x22 => NegativeResponseCode::ConditionsNotCorrect,
            0x24 => NegativeResponseCode::RequestSequenceError,
            0x25 => NegativeResponseCode::NoResponseFromSubnetComponent,
            0x26 => NegativeResponseCode::FailurePreventsExecutionOfRequestedAction,
            0x31 => NegativeResponseCode::RequestOutOfRange,
            0x33 => NegativeResponseCode::SecurityAccessDenied,
            0x35 => NegativeResponseCode::InvalidKey,
            0x36 => NegativeResponseCode::ExeedNumberOfAttempts,
            0x37 => NegativeResponseCode::RequiredTimeDelayNotExpired,
            0x70 => NegativeResponseCode::UploadDownloadNotAccepted,
            0x71 => NegativeResponseCode::TransferDataSuspended,
            0x72 => NegativeResponseCode::GeneralProgrammingFailure,
            0x73 => NegativeResponseCode::WrongBlockSequenceCounter,
            0x78 => NegativeResponseCode::RequestCorrectlyReceivedResponsePending,
            0x7e => NegativeResponseCode::SubFunctionNotSupportedInActiveSession,
            0x7f => NegativeResponseCode::ServiceNotSupportedInActiveSession,
            _ => NegativeResponseCode::NonStandard(val),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(val: NegativeResponseCode) -> u8 {
        match val {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::IncorrectMessageLengthOrInvalidFormat => 0x13,
            NegativeResponseCode::ResponseTooLong => 0x14,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestSequenceError => 0x24,
            NegativeResponseCode::NoResponseFromSubnetComponent => 0x25,
            NegativeResponseCode::FailurePreventsExecutionOfRequestedAction => 0x26,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::SecurityAccessDenied => 0x33,
            NegativeResponseCode::InvalidKey => 0x35,
            NegativeResponseCode::ExeedNumberOfAttempts => 0x36,
            NegativeResponseCode::RequiredTimeDelayNotExpired => 0x37,
            NegativeResponseCode::UploadDownloadNotAccepted => 0x70,
            NegativeResponseCode::TransferDataSuspended => 0x71,
            NegativeResponseCode::GeneralProgrammingFailure => 0x72,
            NegativeResponseCode::WrongBlockSequenceCounter => 0x73,
            NegativeResponseCode::RequestCorrectlyReceivedResponsePending => 0x78,
            NegativeResponseCode::SubFunctionNotSupportedInActiveSession => 0x7e,
            NegativeResponseCode::ServiceNotSupportedInActiveSession => 0x7f,
            NegativeResponseCode::NonStandard(val) => val,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// Serialized request does not fit the transport
    InvalidRequestSize(usize),
    InvalidArbitrationId(u32),
    /// Mode addresses a single parameter but no PID was given
    MissingPid(u8),
    /// DTC mode was given a PID
    UnexpectedPid(u8),
    /// PID does not fit the width the mode allows
    InvalidPid(u16),
    /// The send shim reported the bus as unavailable
    SendFailure,
    NegativeResponse(NegativeResponseCode),
    /// Echoed mode does not belong to the request
    ProtocolMismatch { expected: u8, received: u8 },
    /// Echoed PID does not belong to the request
    InvalidDataIdentifier(u16),
    InvalidResponseLength,
    /// Positive answer carries data the service never returns
    UnexpectedPayload(usize),
    Transport(crate::isotp::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidRequestSize(size) => write!(fmt, "Invalid Request Size: {}", size),
            Error::InvalidArbitrationId(id) => write!(fmt, "Invalid Arbitration ID: 0x{:x}", id),
            Error::MissingPid(mode) => write!(fmt, "Mode 0x{:02x} requires a PID", mode),
            Error::UnexpectedPid(mode) => write!(fmt, "Mode 0x{:02x} does not take a PID", mode),
            Error::InvalidPid(pid) => write!(fmt, "Invalid PID: 0x{:x}", pid),
            Error::SendFailure => write!(fmt, "Send Failure"),
            Error::NegativeResponse(e) => write!(fmt, "Negative Response: {:?}", e),
            Error::ProtocolMismatch { expected, received } => {
                write!(
                    fmt,
                    "Protocol Mismatch: expected mode 0x{:02x}, received 0x{:02x}",
                    expected, received
                )
            }
            Error::InvalidDataIdentifier(id) => {
                write!(fmt, "Invalid Response Data Identifer: 0x{:x}", id)
            }
            Error::InvalidResponseLength => write!(fmt, "Invalid Response Length"),
            Error::UnexpectedPayload(len) => {
                write!(fmt, "Unexpected Response Payload of {} bytes", len)
            }
            Error::Transport(e) => write!(fmt, "Transport: {}", e),
        }
    }
}
impl std::error::Error for Error {}
