//! Polls a few OBD-II PIDs and the stored trouble codes from a simulated engine ECU.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use automotive_diag::obd2::{
    decode, decode_dtcs, lookup, request_dtcs, request_pid, PidRequestType,
};
use automotive_diag::shims::{init_shims, ShimBundle};
use automotive_diag::uds::{
    DiagnosticRequest, DiagnosticRequestHandle, OBD2_FUNCTIONAL_BROADCAST_ID,
};
use tracing::{info, warn};

static RX_QUEUE: Mutex<VecDeque<(u32, Vec<u8>)>> = Mutex::new(VecDeque::new());

const ECU_REQUEST_ID: u32 = 0x7e0;
const ECU_RESPONSE_ID: u32 = 0x7e8;
const TIMEOUT: Duration = Duration::from_millis(100);

/// Stands in for the bus driver. Every request is answered by an engine ECU with a Single Frame.
fn send_can(id: u32, data: &[u8]) -> bool {
    if (id != OBD2_FUNCTIONAL_BROADCAST_ID && id != ECU_REQUEST_ID) || data.is_empty() {
        return true;
    }

    let len = (data[0] & 0xf) as usize;
    let Ok(request) = DiagnosticRequest::parse(ECU_REQUEST_ID, &data[1..len + 1]) else {
        return true;
    };

    let reply = match (request.mode(), request.pid()) {
        (0x01, Some(0x05)) => vec![0x41, 0x05, 0x7b],
        (0x01, Some(0x0c)) => vec![0x41, 0x0c, 0x1a, 0xf8],
        (0x01, Some(0x0d)) => vec![0x41, 0x0d, 0x32],
        (0x01, Some(0x42)) => vec![0x41, 0x42, 0x37, 0x3c],
        (0x03, None) => vec![0x43, 0x01, 0x23, 0x84, 0x56],
        (mode, _) => vec![0x7f, mode, 0x12],
    };

    let mut frame = vec![reply.len() as u8];
    frame.extend(reply);

    match RX_QUEUE.lock() {
        Ok(mut queue) => {
            queue.push_back((ECU_RESPONSE_ID, frame));
            true
        }
        Err(_) => false,
    }
}

fn recv_can() -> Option<(u32, Vec<u8>)> {
    RX_QUEUE.lock().ok()?.pop_front()
}

fn poll(shims: &ShimBundle, handle: &mut DiagnosticRequestHandle) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while !handle.completed() && Instant::now() < deadline {
        if let Some((id, data)) = recv_can() {
            handle.receive_frame(shims, id, &data);
        }
    }
    handle.completed()
}

fn main() -> automotive_diag::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let shims = init_shims(None, send_can, None);

    for pid in [0x05, 0x0c, 0x0d, 0x42, 0x51] {
        let mut handle =
            request_pid(&shims, PidRequestType::Standard, OBD2_FUNCTIONAL_BROADCAST_ID, pid)?;
        if !poll(&shims, &mut handle) {
            warn!("No response for PID 0x{:02x}", pid);
            continue;
        }

        let name = lookup(0x01, pid).map_or("Unknown", |entry| entry.name);
        match decode(handle.response(), pid) {
            Ok(value) => info!("{}: {}", name, value),
            Err(e) => warn!("{}: {}", name, e),
        }
    }

    let mut handle = request_dtcs(&shims, ECU_REQUEST_ID)?;
    if poll(&shims, &mut handle) {
        for dtc in decode_dtcs(handle.response())? {
            info!("DTC: {}", dtc);
        }
    }

    Ok(())
}
