//! Constants for the UDS and OBD-II request/response protocol.
use strum_macros::{EnumIter, FromRepr};

/// Added to the request mode to form the positive response mode
pub const POSITIVE_RESPONSE: u8 = 0x40;
/// Mode of every negative response, followed by the rejected mode and the NRC
pub const NEGATIVE_RESPONSE: u8 = 0x7f;

/// Functional (broadcast) request id every emissions related ECU listens on
pub const OBD2_FUNCTIONAL_BROADCAST_ID: u32 = 0x7df;
/// First physical response id answering a functional request
pub const OBD2_FUNCTIONAL_RESPONSE_START: u32 = 0x7e8;
/// Number of physical response ids answering a functional request (0x7e8 - 0x7ef)
pub const OBD2_FUNCTIONAL_RESPONSE_COUNT: u32 = 8;
/// A physically addressed ECU answers on its request id plus this offset
pub const PHYSICAL_RESPONSE_OFFSET: u32 = 0x8;

/// Service Identifiers (SIDs) as defined in ISO 14229, plus the OBD-II modes from SAE J1979
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromRepr)]
#[repr(u8)]
pub enum ServiceIdentifier {
    // OBD-II
    ShowCurrentData = 0x01,
    ShowFreezeFrameData = 0x02,
    ShowStoredDtcs = 0x03,
    ClearDtcs = 0x04,
    TestResultsOxygenSensors = 0x05,
    TestResultsOtherMonitoring = 0x06,
    ShowPendingDtcs = 0x07,
    ControlOnBoardSystem = 0x08,
    RequestVehicleInformation = 0x09,
    ShowPermanentDtcs = 0x0a,

    // Diagnostic and Communication Management
    DiagnosticSessionControl = 0x10,
    EcuReset = 0x11,
    SecurityAccess = 0x27,
    TesterPresent = 0x3e,

    // Data Transmission
    ReadDataByIdentifier = 0x22,
    WriteDataByIdentifier = 0x2e,

    // Stored Data Transmission
    ClearDiagnosticInformation = 0x14,
    ReadDTCInformation = 0x19,

    NegativeResponse = 0x7f,
}

impl ServiceIdentifier {
    /// Modes addressing a single parameter, the request is meaningless without a PID.
    pub fn requires_pid(mode: u8) -> bool {
        matches!(
            Self::from_repr(mode),
            Some(
                Self::ShowCurrentData
                    | Self::ShowFreezeFrameData
                    | Self::TestResultsOxygenSensors
                    | Self::TestResultsOtherMonitoring
                    | Self::ControlOnBoardSystem
                    | Self::RequestVehicleInformation
                    | Self::ReadDataByIdentifier
                    | Self::WriteDataByIdentifier
            )
        )
    }

    /// DTC modes operate on the whole fault memory and never carry a PID.
    pub fn forbids_pid(mode: u8) -> bool {
        matches!(
            Self::from_repr(mode),
            Some(
                Self::ShowStoredDtcs
                    | Self::ClearDtcs
                    | Self::ShowPendingDtcs
                    | Self::ShowPermanentDtcs
            )
        )
    }

    /// OBD-II modes (up to 0x0a) use 1 byte PIDs, UDS services use 2 byte data identifiers.
    pub fn pid_length(mode: u8) -> usize {
        if mode <= Self::ShowPermanentDtcs as u8 {
            1
        } else {
            2
        }
    }
}

/// Standard Data Identifiers (DIDs) as defined in ISO 14229
#[derive(Debug, PartialEq, Eq, Copy, Clone, EnumIter, FromRepr)]
#[repr(u16)]
pub enum DataIdentifier {
    BootSoftwareIdentification = 0xf180,
    ApplicationSoftwareIdentification = 0xf181,
    ActiveDiagnosticSession = 0xf186,
    VehicleManufacturerSparePartNumber = 0xf187,
    EcuSerialNumber = 0xf18c,
    Vin = 0xf190,
    SystemSupplierEcuHardwareNumber = 0xf192,
    SystemSupplierEcuSoftwareNumber = 0xf194,
}
