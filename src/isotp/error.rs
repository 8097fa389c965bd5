//! Error types for the ISO-TP protocol.

use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("Data Too Large")]
    DataTooLarge,
    #[error("Flow Control")]
    FlowControl,
    #[error("Receiver Overflow")]
    Overflow,
    #[error("Out Of Order")]
    OutOfOrder,
    #[error("Unknown Frame Type")]
    UnknownFrameType,
    #[error("Unexpected Frame")]
    UnexpectedFrame,
    #[error("Malformed Frame")]
    MalformedFrame,
    #[error("Send Failed")]
    SendFailed,
}
