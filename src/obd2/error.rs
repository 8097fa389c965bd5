//! Error types for decoding OBD-II and UDS payloads.

use thiserror::Error;

/// Decode errors. These never change the state of the handle the response came from.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("Unknown PID 0x{pid:x} for mode 0x{mode:02x}")]
    UnknownPid { mode: u8, pid: u16 },
    #[error("Payload Length Mismatch: expected {expected}, received {received}")]
    PayloadLengthMismatch { expected: usize, received: usize },
    #[error("Malformed DTC Payload of {0} bytes")]
    MalformedDtcPayload(usize),
    #[error("Clear DTCs response carries {0} unexpected bytes")]
    UnexpectedClearPayload(usize),
    #[error("Response is not a completed positive response")]
    NotPositive,
}
