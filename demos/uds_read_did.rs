//! Reads the standard identification DIDs from a simulated ECU, including a multi-frame VIN.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use automotive_diag::shims::init_shims;
use automotive_diag::uds::{
    DataIdentifier, DiagnosticRequest, DiagnosticRequestHandle, DiagnosticResponse,
};
use strum::IntoEnumIterator;
use tracing::{info, warn};

const ECU_REQUEST_ID: u32 = 0x7e0;
const ECU_RESPONSE_ID: u32 = 0x7e8;
const TIMEOUT: Duration = Duration::from_millis(100);
const VIN: &[u8] = b"1GNEK13ZX3R298984";

/// Frames from the ECU waiting to be read by the tester.
static RX_QUEUE: Mutex<VecDeque<(u32, Vec<u8>)>> = Mutex::new(VecDeque::new());
/// Consecutive Frames the ECU sends once the tester's flow control arrives.
static ECU_PENDING: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

fn ecu_reply(did: u16) -> Vec<u8> {
    let data: &[u8] = match DataIdentifier::from_repr(did) {
        Some(DataIdentifier::Vin) => VIN,
        Some(DataIdentifier::ActiveDiagnosticSession) => &[0x01],
        Some(DataIdentifier::EcuSerialNumber) => b"SN0042",
        _ => return vec![0x7f, 0x22, 0x31],
    };

    let mut message = vec![0x62];
    message.extend_from_slice(&did.to_be_bytes());
    message.extend_from_slice(data);
    message
}

/// Stands in for the bus driver. The simulated ECU speaks just enough ISO-TP to send long responses.
fn send_can(id: u32, data: &[u8]) -> bool {
    if id != ECU_REQUEST_ID || data.is_empty() {
        return true;
    }

    let (Ok(mut rx), Ok(mut pending)) = (RX_QUEUE.lock(), ECU_PENDING.lock()) else {
        return false;
    };

    match data[0] >> 4 {
        // Single Frame request
        0x0 => {
            let len = (data[0] & 0xf) as usize;
            let Ok(request) = DiagnosticRequest::parse(ECU_REQUEST_ID, &data[1..len + 1]) else {
                return true;
            };

            let message = ecu_reply(request.pid().unwrap_or_default());
            if message.len() <= 7 {
                let mut frame = vec![message.len() as u8];
                frame.extend(message);
                rx.push_back((ECU_RESPONSE_ID, frame));
                return true;
            }

            let mut first = vec![0x10 | (message.len() >> 8) as u8, message.len() as u8];
            first.extend_from_slice(&message[..6]);
            rx.push_back((ECU_RESPONSE_ID, first));

            *pending = message[6..]
                .chunks(7)
                .enumerate()
                .map(|(i, chunk)| [&[0x20 | ((i + 1) & 0xf) as u8][..], chunk].concat())
                .collect();
        }
        // Flow control from the tester
        0x3 => {
            for frame in pending.drain(..) {
                rx.push_back((ECU_RESPONSE_ID, frame));
            }
        }
        _ => {}
    }

    true
}

fn recv_can() -> Option<(u32, Vec<u8>)> {
    RX_QUEUE.lock().ok()?.pop_front()
}

fn on_response(response: &DiagnosticResponse) {
    info!("Exchange finished: {}", response);
}

fn main() -> automotive_diag::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let shims = init_shims(None, send_can, None);

    for did in DataIdentifier::iter() {
        let request = DiagnosticRequest::new(ECU_REQUEST_ID, 0x22, Some(did as u16), None)?;
        let mut handle = DiagnosticRequestHandle::new(request).with_callback(on_response);
        handle.send(&shims);

        let deadline = Instant::now() + TIMEOUT;
        while !handle.completed() && Instant::now() < deadline {
            if let Some((id, data)) = recv_can() {
                handle.receive_frame(&shims, id, &data);
            }
        }

        let response = handle.response();
        if !handle.completed() {
            warn!("{:?}: timeout", did);
        } else if let Some(code) = response.negative_response_code {
            warn!("{:?}: {:?}", did, code);
        } else if response.success {
            info!("{:?}: {}", did, String::from_utf8_lossy(response.payload()));
        }
    }

    Ok(())
}
