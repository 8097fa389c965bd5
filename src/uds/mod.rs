//! Unified Diagnostic Services (UDS) request/response core, implements the client side of ISO 14229 and SAE J1979 over ISO-TP.
//!
//! A [`DiagnosticRequestHandle`] tracks one exchange. It is advanced by discrete calls from the caller's poll loop:
//! [`DiagnosticRequestHandle::send`] once, then [`DiagnosticRequestHandle::receive_frame`] for every frame read
//! from the bus until the returned response is `completed`.
//!
//! ## Example
//! ```rust
//! use automotive_diag::shims::init_shims;
//! use automotive_diag::uds::{DiagnosticRequest, DiagnosticRequestHandle};
//!
//! fn send_can(_id: u32, _data: &[u8]) -> bool { true }
//!
//! let shims = init_shims(None, send_can, None);
//! let request = DiagnosticRequest::new(0x7e0, 0x22, Some(0xf190), None).unwrap();
//! let mut handle = DiagnosticRequestHandle::new(request);
//! handle.send(&shims);
//!
//! // Frames as they are read from the bus
//! let response = handle.receive_frame(&shims, 0x7e8, &[0x06, 0x62, 0xf1, 0x90, 0x57, 0x30, 0x4c]);
//! assert!(response.completed && response.success);
//! assert_eq!(response.payload(), b"W0L");
//! ```

mod constants;
mod error;
mod types;

use crate::bitfield::get_bit_field;
use crate::isotp::{
    FrameType, IsoTpConfig, IsoTpReceiver, IsoTpSender, RecvStatus, SendStatus, FRAME_TYPE_MASK,
    MAX_MESSAGE_SIZE,
};
use crate::shims::Shims;
pub use constants::*;
pub use error::{Error, NegativeResponseCode};
pub use types::*;

use tracing::trace;

/// Called once with the final response when a handle completes.
pub type ResponseCallback = fn(&DiagnosticResponse);

/// Where an exchange is. `Complete` is terminal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExchangeState {
    /// Built, nothing sent yet
    Idle,
    /// First Frame sent, waiting for flow control to send the rest of a multi-frame request
    Sending,
    AwaitingResponse,
    /// Part of a multi-frame response has arrived
    Reassembling,
    Complete,
}

/// How a fully reassembled message relates to the request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Classification {
    /// Payload starts at the given offset
    Positive { payload_start: usize },
    Pending,
    Negative(NegativeResponseCode),
    Mismatch(Error),
}

fn classify(request: &DiagnosticRequest, message: &[u8]) -> Classification {
    let Ok(sid) = get_bit_field(message, 0, 8) else {
        return Classification::Mismatch(Error::InvalidResponseLength);
    };
    let sid = sid as u8;

    if sid == NEGATIVE_RESPONSE {
        if message.len() < 3 {
            return Classification::Mismatch(Error::InvalidResponseLength);
        }

        if message[1] != request.mode() {
            return Classification::Mismatch(Error::ProtocolMismatch {
                expected: request.mode(),
                received: message[1],
            });
        }

        return match NegativeResponseCode::from(message[2]) {
            NegativeResponseCode::RequestCorrectlyReceivedResponsePending => {
                Classification::Pending
            }
            code => Classification::Negative(code),
        };
    }

    let expected = request.mode().wrapping_add(POSITIVE_RESPONSE);
    if sid != expected {
        return Classification::Mismatch(Error::ProtocolMismatch { expected, received: sid });
    }

    let pid_length = request.pid_length();
    if let Some(pid) = request.pid() {
        let Ok(echoed) = get_bit_field(message, 8, pid_length * 8) else {
            return Classification::Mismatch(Error::InvalidResponseLength);
        };

        if echoed as u16 != pid {
            return Classification::Mismatch(Error::InvalidDataIdentifier(echoed as u16));
        }
    }

    let payload_start = 1 + pid_length;
    if request.mode() == ServiceIdentifier::ClearDtcs as u8 && message.len() > payload_start {
        return Classification::Mismatch(Error::UnexpectedPayload(message.len() - payload_start));
    }

    Classification::Positive { payload_start }
}

/// Correlates one request with its response. Owns the request, the transport state and the response being built.
#[derive(Debug, Clone)]
pub struct DiagnosticRequestHandle {
    request: DiagnosticRequest,
    config: IsoTpConfig,
    state: ExchangeState,
    response: DiagnosticResponse,
    callback: Option<ResponseCallback>,
    message: [u8; MAX_MESSAGE_SIZE],
    message_length: usize,
    sender: IsoTpSender,
    receiver: IsoTpReceiver,
    responder: Option<u32>,
}

impl DiagnosticRequestHandle {
    pub fn new(request: DiagnosticRequest) -> Self {
        Self {
            request,
            config: IsoTpConfig::default(),
            state: ExchangeState::Idle,
            response: DiagnosticResponse::default(),
            callback: None,
            message: [0u8; MAX_MESSAGE_SIZE],
            message_length: 0,
            sender: IsoTpSender::new(request.arbitration_id()),
            receiver: IsoTpReceiver::default(),
            responder: None,
        }
    }

    pub fn with_callback(mut self, callback: ResponseCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_config(mut self, config: IsoTpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn request(&self) -> &DiagnosticRequest {
        &self.request
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn completed(&self) -> bool {
        self.state == ExchangeState::Complete
    }

    pub fn success(&self) -> bool {
        self.completed() && self.response.success
    }

    pub fn response(&self) -> &DiagnosticResponse {
        &self.response
    }

    fn complete<S: Shims + ?Sized>(&mut self, shims: &S) {
        self.state = ExchangeState::Complete;
        self.response.completed = true;
        shims.log(format_args!("Completed exchange {}: {}", self.request, self.response));

        if let Some(callback) = self.callback {
            callback(&self.response);
        }
    }

    fn fail<S: Shims + ?Sized>(&mut self, shims: &S, error: Error) {
        self.response.success = false;
        self.response.error = Some(error);
        self.complete(shims);
    }

    fn fail_transport<S: Shims + ?Sized>(&mut self, shims: &S, error: crate::isotp::Error) {
        match error {
            crate::isotp::Error::SendFailed => self.fail(shims, Error::SendFailure),
            e => self.fail(shims, Error::Transport(e)),
        }
    }

    /// Serialize the request and put it on the bus. A request that doesn't fit a Single Frame leaves the handle
    /// `Sending` until flow control arrives through [`DiagnosticRequestHandle::receive_frame`]. If the send shim
    /// fails the handle completes immediately with `success = false`.
    pub fn send<S: Shims + ?Sized>(&mut self, shims: &S) -> ExchangeState {
        if self.state != ExchangeState::Idle {
            shims.log(format_args!("Request {} was already sent", self.request));
            return self.state;
        }

        self.message_length = match self.request.encode(&mut self.message) {
            Ok(len) => len,
            Err(_) => {
                self.fail(shims, Error::InvalidRequestSize(self.request.encoded_length()));
                return self.state;
            }
        };

        let message = &self.message[..self.message_length];
        match self.sender.send(shims, &self.config, message) {
            Ok(SendStatus::Complete) => {
                shims.log(format_args!("Sent request {}", self.request));
                self.state = ExchangeState::AwaitingResponse;
            }
            Ok(SendStatus::AwaitingFlowControl) => self.state = ExchangeState::Sending,
            Err(e) => self.fail_transport(shims, e),
        }

        self.state
    }

    fn accepts(&self, arbitration_id: u32) -> bool {
        match self.responder {
            Some(responder) => arbitration_id == responder,
            None => self.request.accepts_response_from(arbitration_id),
        }
    }

    fn continue_send<S: Shims + ?Sized>(&mut self, shims: &S, data: &[u8]) {
        let message = &self.message[..self.message_length];
        match self.sender.on_flow_control(shims, &self.config, message, data) {
            Ok(SendStatus::Complete) => {
                shims.log(format_args!("Sent request {}", self.request));
                self.state = ExchangeState::AwaitingResponse;
            }
            Ok(SendStatus::AwaitingFlowControl) => {}
            Err(e) => self.fail_transport(shims, e),
        }
    }

    fn on_message<S: Shims + ?Sized>(&mut self, shims: &S, arbitration_id: u32) {
        self.responder = None;

        match classify(&self.request, self.receiver.message()) {
            Classification::Positive { payload_start } => {
                self.response.arbitration_id = arbitration_id;
                self.response.mode = self.request.mode().wrapping_add(POSITIVE_RESPONSE);
                self.response.pid = self.request.pid();
                self.response.set_payload(&self.receiver.message()[payload_start..]);
                self.response.success = true;
                self.complete(shims);
            }
            Classification::Pending => {
                shims.log(format_args!("Received Response Pending from 0x{:03x}", arbitration_id));
                self.response.arbitration_id = arbitration_id;
                self.receiver.reset();
                self.state = ExchangeState::AwaitingResponse;
            }
            Classification::Negative(code) => {
                shims.log(format_args!(
                    "Received Negative Response {:?} from 0x{:03x}",
                    code, arbitration_id
                ));
                self.response.arbitration_id = arbitration_id;
                self.response.mode = NEGATIVE_RESPONSE;
                self.response.pid = self.request.pid();
                self.response.negative_response_code = Some(code);
                self.fail(shims, Error::NegativeResponse(code));
            }
            Classification::Mismatch(e) => {
                shims.log(format_args!(
                    "Response from 0x{:03x} does not match request: {}",
                    arbitration_id, e
                ));
                self.response.arbitration_id = arbitration_id;
                self.fail(shims, e);
            }
        }
    }

    /// Offer one frame read from the bus. Frames from ids that can't answer this request are ignored, as is
    /// everything once the handle is complete. Returns the response as it stands after the frame.
    pub fn receive_frame<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        arbitration_id: u32,
        data: &[u8],
    ) -> DiagnosticResponse {
        if matches!(self.state, ExchangeState::Idle | ExchangeState::Complete) || data.is_empty() {
            return self.response;
        }

        if !self.accepts(arbitration_id) {
            trace!("Ignoring frame from 0x{:03x} for request {}", arbitration_id, self.request);
            return self.response;
        }

        if self.state == ExchangeState::Sending {
            if FrameType::from(data[0] & FRAME_TYPE_MASK) == FrameType::FlowControl {
                self.continue_send(shims, data);
                return self.response;
            }

            // The ECU answered before the request was fully sent, usually to reject it
            shims.log(format_args!(
                "Response from 0x{:03x} while sending, aborting send",
                arbitration_id
            ));
            self.state = ExchangeState::AwaitingResponse;
        }

        // Flow control goes to the physical request id of the responding ECU
        let fc_id = arbitration_id - PHYSICAL_RESPONSE_OFFSET;
        match self.receiver.on_frame(shims, &self.config, fc_id, data) {
            Ok(RecvStatus::Incomplete) => {
                self.state = ExchangeState::Reassembling;
                self.responder = Some(arbitration_id);
            }
            Ok(RecvStatus::Complete) => self.on_message(shims, arbitration_id),
            Err(crate::isotp::Error::UnexpectedFrame) => {
                trace!("Ignoring stray frame from 0x{:03x}: {}", arbitration_id, hex::encode(data));
            }
            Err(e) => {
                self.response.arbitration_id = arbitration_id;
                self.fail_transport(shims, e);
            }
        }

        self.response
    }
}
