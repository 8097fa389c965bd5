//! Contains the main error type for the library.
use thiserror::Error;

/// The main error type for the library. Each module has it's own error type that is contained by this error.
#[derive(Error, Debug, Copy, Clone, PartialEq)]
pub enum Error {
    #[error("Malformed Frame")]
    MalformedFrame,
    #[error(transparent)]
    BitFieldError(crate::bitfield::Error),
    #[error(transparent)]
    IsoTPError(crate::isotp::Error),
    #[error(transparent)]
    UDSError(crate::uds::Error),
    #[error(transparent)]
    OBD2Error(crate::obd2::Error),
}

impl From<crate::bitfield::Error> for Error {
    fn from(e: crate::bitfield::Error) -> Error {
        Error::BitFieldError(e)
    }
}

impl From<crate::isotp::Error> for Error {
    fn from(e: crate::isotp::Error) -> Error {
        Error::IsoTPError(e)
    }
}

impl From<crate::uds::Error> for Error {
    fn from(e: crate::uds::Error) -> Error {
        Error::UDSError(e)
    }
}

impl From<crate::obd2::Error> for Error {
    fn from(e: crate::obd2::Error) -> Error {
        Error::OBD2Error(e)
    }
}
