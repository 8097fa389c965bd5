#![allow(dead_code)]
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use automotive_diag::can::Frame;
use automotive_diag::shims::Shims;
use automotive_diag::uds::{
    DataIdentifier, DiagnosticRequest, DiagnosticRequestHandle, DiagnosticResponse,
    NegativeResponseCode, ServiceIdentifier, NEGATIVE_RESPONSE, OBD2_FUNCTIONAL_BROADCAST_ID,
    PHYSICAL_RESPONSE_OFFSET, POSITIVE_RESPONSE,
};

pub const VIN: &[u8; 17] = b"1GNEK13ZX3R298984";

/// Upper bound on bus round trips before a test gives up on an exchange.
const MAX_ROUNDS: usize = 32;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Records every frame the tester puts on the bus.
#[derive(Default)]
pub struct Bus {
    sent: RefCell<Vec<Frame>>,
    offline: Cell<bool>,
}

impl Bus {
    pub fn new() -> Self {
        init_logging();
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.sent.borrow().clone()
    }

    pub fn take(&self) -> Vec<Frame> {
        self.sent.borrow_mut().drain(..).collect()
    }
}

impl Shims for Bus {
    fn send_frame(&self, arbitration_id: u32, data: &[u8]) -> bool {
        if self.offline.get() {
            return false;
        }

        let frame = Frame::new(arbitration_id, data).expect("tester sent a malformed frame");
        self.sent.borrow_mut().push(frame);
        true
    }
}

/// Split a message into the frames an ECU would send, without padding.
pub fn segment(message: &[u8]) -> Vec<Vec<u8>> {
    if message.len() <= 7 {
        let mut frame = vec![message.len() as u8];
        frame.extend_from_slice(message);
        return vec![frame];
    }

    let mut frames = vec![];
    let mut first = vec![0x10 | (message.len() >> 8) as u8, (message.len() & 0xff) as u8];
    first.extend_from_slice(&message[..6]);
    frames.push(first);

    for (i, chunk) in message[6..].chunks(7).enumerate() {
        let mut frame = vec![0x20 | ((i + 1) & 0xf) as u8];
        frame.extend_from_slice(chunk);
        frames.push(frame);
    }

    frames
}

/// The message a well behaved ECU answers `request` with.
pub fn ecu_response(request: &DiagnosticRequest) -> Vec<u8> {
    use ServiceIdentifier::*;

    let service = ServiceIdentifier::from_repr(request.mode());
    let data: Option<Vec<u8>> = match (service, request.pid()) {
        (Some(ShowCurrentData), Some(0x00)) => Some(vec![0xbe, 0x1f, 0xa8, 0x13]),
        (Some(ShowCurrentData), Some(0x05)) => Some(vec![0x7b]),
        (Some(ShowCurrentData), Some(0x0c)) => Some(vec![0x1a, 0xf8]),
        (Some(ShowCurrentData), Some(0x0d)) => Some(vec![0x32]),
        (Some(ShowStoredDtcs), None) => Some(vec![0x01, 0x23, 0x84, 0x56]),
        (Some(ShowPendingDtcs), None) => Some(vec![0x00]),
        (Some(ClearDtcs), None) => Some(vec![]),
        (Some(RequestVehicleInformation), Some(0x02)) => Some([&[0x01u8][..], &VIN[..]].concat()),
        (Some(ReadDataByIdentifier), Some(0xf40c)) => Some(vec![0x1a, 0xf8]),
        (Some(ReadDataByIdentifier), Some(did)) => match DataIdentifier::from_repr(did) {
            Some(DataIdentifier::Vin) => Some(VIN.to_vec()),
            Some(DataIdentifier::ActiveDiagnosticSession) => Some(vec![0x01]),
            _ => None,
        },
        (Some(WriteDataByIdentifier), Some(_)) => Some(vec![]),
        (Some(TesterPresent), None) => Some(request.payload().to_vec()),
        _ => None,
    };

    let Some(data) = data else {
        return vec![
            NEGATIVE_RESPONSE,
            request.mode(),
            NegativeResponseCode::RequestOutOfRange.into(),
        ];
    };

    let mut message = vec![request.mode() + POSITIVE_RESPONSE];
    if let Some(pid) = request.pid() {
        message.extend_from_slice(&pid.to_be_bytes()[2 - request.pid_length()..]);
    }
    message.extend_from_slice(&data);
    message
}

/// An ECU on the other end of the bus. Speaks ISO-TP and answers requests with [`ecu_response`].
pub struct VirtualEcu {
    pub request_id: u32,
    pub response_id: u32,
    /// Block size advertised in the flow control this ECU sends
    pub block_size: u8,
    /// Number of Response Pending messages sent ahead of every response
    pub response_pending: usize,
    request: Vec<u8>,
    request_length: usize,
    block_received: u8,
    pending: VecDeque<Vec<u8>>,
    /// Every request this ECU answered, as parsed from the bus
    pub received: Vec<DiagnosticRequest>,
}

impl VirtualEcu {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            response_id: request_id + PHYSICAL_RESPONSE_OFFSET,
            block_size: 0,
            response_pending: 0,
            request: vec![],
            request_length: 0,
            block_received: 0,
            pending: VecDeque::new(),
            received: vec![],
        }
    }

    fn flow_control(&self) -> Vec<u8> {
        vec![0x30, self.block_size, 0x00]
    }

    fn respond(&mut self, message: &[u8]) -> Vec<Vec<u8>> {
        let request = DiagnosticRequest::parse(self.request_id, message)
            .expect("tester sent a malformed request");
        self.received.push(request);

        let mut frames = vec![];
        for _ in 0..self.response_pending {
            frames.extend(segment(&[
                NEGATIVE_RESPONSE,
                request.mode(),
                NegativeResponseCode::RequestCorrectlyReceivedResponsePending.into(),
            ]));
        }

        let mut segments: VecDeque<Vec<u8>> = segment(&ecu_response(&request)).into();
        frames.extend(segments.pop_front());
        self.pending = segments;
        frames
    }

    /// Handle one frame seen on the bus, returns the frames this ECU sends in reply.
    pub fn on_frame(&mut self, id: u32, data: &[u8]) -> Vec<(u32, Vec<u8>)> {
        let functional = id == OBD2_FUNCTIONAL_BROADCAST_ID;
        if (id != self.request_id && !functional) || data.is_empty() {
            return vec![];
        }

        let replies = match data[0] >> 4 {
            0x0 => {
                let len = (data[0] & 0xf) as usize;
                self.respond(&data[1..len + 1])
            }
            0x1 if !functional => {
                self.request_length = ((data[0] as usize & 0xf) << 8) | data[1] as usize;
                self.request = data[2..].to_vec();
                self.block_received = 0;
                vec![self.flow_control()]
            }
            0x2 if !functional => {
                let remaining = self.request_length - self.request.len();
                let end = std::cmp::min(remaining + 1, data.len());
                self.request.extend_from_slice(&data[1..end]);
                self.block_received += 1;

                if self.request.len() >= self.request_length {
                    let message = std::mem::take(&mut self.request);
                    self.respond(&message)
                } else if self.block_size != 0 && self.block_received == self.block_size {
                    self.block_received = 0;
                    vec![self.flow_control()]
                } else {
                    vec![]
                }
            }
            0x3 if !functional => {
                let block_size = data[1] as usize;
                let count = match block_size {
                    0 => self.pending.len(),
                    n => std::cmp::min(n, self.pending.len()),
                };
                self.pending.drain(..count).collect()
            }
            _ => vec![],
        };

        replies.into_iter().map(|frame| (self.response_id, frame)).collect()
    }
}

/// Shuttle frames between the tester and the ECUs until the bus goes quiet.
pub fn run(
    bus: &Bus,
    handle: &mut DiagnosticRequestHandle,
    ecus: &mut [VirtualEcu],
) -> DiagnosticResponse {
    for _ in 0..MAX_ROUNDS {
        let frames = bus.take();
        if frames.is_empty() {
            break;
        }

        for frame in frames {
            for ecu in ecus.iter_mut() {
                for (id, data) in ecu.on_frame(frame.id, frame.data()) {
                    handle.receive_frame(bus, id, &data);
                }
            }
        }
    }

    *handle.response()
}
