//! ISO Transport Protocol (ISO-TP) implementation, implements ISO 15765-2
//!
//! Nothing in here blocks or owns a bus. [`IsoTpSender`] segments a message and hands each frame
//! to [`Shims::send_frame`]; flow control coming back from the ECU is fed in with
//! [`IsoTpSender::on_flow_control`]. [`IsoTpReceiver`] reassembles a message from frames the caller
//! passes in, and answers First Frames with flow control through the same shims.
//!
//! ## Example:
//! ```rust
//! use automotive_diag::isotp::{IsoTpConfig, IsoTpReceiver, RecvStatus};
//! use automotive_diag::shims::init_shims;
//!
//! fn send_can(_id: u32, _data: &[u8]) -> bool { true }
//!
//! let shims = init_shims(None, send_can, None);
//! let mut receiver = IsoTpReceiver::default();
//! let status = receiver
//!     .on_frame(&shims, &IsoTpConfig::default(), 0x7e0, &[0x03, 0x41, 0x0d, 0x32])
//!     .unwrap();
//!
//! assert_eq!(status, RecvStatus::Complete);
//! assert_eq!(receiver.message(), &[0x41, 0x0d, 0x32]);
//! ```

mod constants;
mod error;
mod types;

pub use constants::*;
pub use error::Error;
pub use types::*;

use crate::can::{Frame, CAN_MAX_DLEN};
use crate::shims::Shims;

use tracing::{debug, warn};

fn transmit<S: Shims + ?Sized>(
    shims: &S,
    config: &IsoTpConfig,
    id: u32,
    mut buf: [u8; CAN_MAX_DLEN],
    used: usize,
) -> Result<(), Error> {
    let len = match config.padding {
        Some(padding) => {
            buf[used..].fill(padding);
            CAN_MAX_DLEN
        }
        None => used,
    };

    let frame = Frame::new(id, &buf[..len]).map_err(|_| Error::MalformedFrame)?;
    if shims.send_frame(frame.id, frame.data()) {
        Ok(())
    } else {
        Err(Error::SendFailed)
    }
}

fn send_flow_control<S: Shims + ?Sized>(
    shims: &S,
    config: &IsoTpConfig,
    id: u32,
    status: FlowStatus,
) -> Result<(), Error> {
    let mut buf = [0u8; CAN_MAX_DLEN];
    buf[0] = FrameType::FlowControl as u8 | status as u8;
    buf[1] = config.block_size;
    buf[2] = config.separation_time_min;

    debug!("TX FC, status: {:?} data {}", status, hex::encode(&buf[..3]));
    transmit(shims, config, id, buf, 3)
}

/// Progress of an outgoing message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SendStatus {
    /// Every frame of the message has been handed to the bus.
    Complete,
    /// Waiting for the receiver to send flow control before the next block.
    AwaitingFlowControl,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
enum TxState {
    #[default]
    Idle,
    AwaitingFlowControl,
    Complete,
}

/// Segments one outgoing message. The message bytes stay owned by the caller and are passed to every call.
#[derive(Debug, Copy, Clone, Default)]
pub struct IsoTpSender {
    tx_id: u32,
    state: TxState,
    offset: usize,
    idx: u8,
}

impl IsoTpSender {
    pub fn new(tx_id: u32) -> Self {
        Self {
            tx_id,
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == TxState::Complete
    }

    pub fn is_awaiting_flow_control(&self) -> bool {
        self.state == TxState::AwaitingFlowControl
    }

    fn send_single_frame<S: Shims + ?Sized>(
        &self,
        shims: &S,
        config: &IsoTpConfig,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut buf = [0u8; CAN_MAX_DLEN];
        buf[0] = FrameType::Single as u8 | data.len() as u8;
        buf[1..data.len() + 1].copy_from_slice(data);

        debug!("TX SF, length: {} data {}", data.len(), hex::encode(data));
        transmit(shims, config, self.tx_id, buf, data.len() + 1)
    }

    fn send_first_frame<S: Shims + ?Sized>(
        &self,
        shims: &S,
        config: &IsoTpConfig,
        data: &[u8],
    ) -> Result<(), Error> {
        let mut buf = [0u8; CAN_MAX_DLEN];
        buf[0] = FrameType::First as u8 | ((data.len() >> 8) & 0xf) as u8;
        buf[1] = (data.len() & 0xff) as u8;
        buf[2..].copy_from_slice(&data[..FF_DL]);

        debug!("TX FF, length: {} data {}", data.len(), hex::encode(&buf));
        transmit(shims, config, self.tx_id, buf, CAN_MAX_DLEN)
    }

    fn send_consecutive_frame<S: Shims + ?Sized>(
        &self,
        shims: &S,
        config: &IsoTpConfig,
        chunk: &[u8],
    ) -> Result<(), Error> {
        let mut buf = [0u8; CAN_MAX_DLEN];
        buf[0] = FrameType::Consecutive as u8 | self.idx;
        buf[1..chunk.len() + 1].copy_from_slice(chunk);

        debug!("TX CF, idx: {} data {}", self.idx, hex::encode(chunk));
        transmit(shims, config, self.tx_id, buf, chunk.len() + 1)
    }

    /// Start sending `data`. Messages of up to 7 bytes go out as a Single Frame and complete immediately,
    /// longer ones send a First Frame and wait for flow control.
    pub fn send<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        config: &IsoTpConfig,
        data: &[u8],
    ) -> Result<SendStatus, Error> {
        if self.state != TxState::Idle {
            return Err(Error::UnexpectedFrame);
        }

        if data.is_empty() {
            return Err(Error::MalformedFrame);
        }

        if data.len() <= MAX_SF_DL {
            self.send_single_frame(shims, config, data)?;
            self.state = TxState::Complete;
            Ok(SendStatus::Complete)
        } else if data.len() <= ISO_TP_MAX_DL {
            self.send_first_frame(shims, config, data)?;
            self.offset = FF_DL;
            self.idx = 1;
            self.state = TxState::AwaitingFlowControl;
            Ok(SendStatus::AwaitingFlowControl)
        } else {
            Err(Error::DataTooLarge)
        }
    }

    /// Handle a flow control frame for the message started with [`IsoTpSender::send`]. Sends the next block of
    /// Consecutive Frames. STmin is reported in the logs but not enforced, pacing is up to the send shim.
    pub fn on_flow_control<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        config: &IsoTpConfig,
        data: &[u8],
        frame: &[u8],
    ) -> Result<SendStatus, Error> {
        if self.state != TxState::AwaitingFlowControl {
            return Err(Error::UnexpectedFrame);
        }

        let flow_control = FlowControlConfig::try_from(frame)?;
        debug!("RX FC, data {} {:?}", hex::encode(frame), flow_control);

        match flow_control.status {
            FlowStatus::Wait => return Ok(SendStatus::AwaitingFlowControl),
            FlowStatus::Overflow => return Err(Error::Overflow),
            FlowStatus::ContinueToSend => {}
        }

        let mut sent: u8 = 0;
        while self.offset < data.len() {
            let end = std::cmp::min(self.offset + CF_DL, data.len());
            self.send_consecutive_frame(shims, config, &data[self.offset..end])?;

            self.offset = end;
            self.idx = (self.idx + 1) & 0xf;
            sent = sent.wrapping_add(1);

            let block_done = flow_control.block_size != 0 && sent == flow_control.block_size;
            if block_done && self.offset < data.len() {
                return Ok(SendStatus::AwaitingFlowControl);
            }
        }

        self.state = TxState::Complete;
        Ok(SendStatus::Complete)
    }
}

/// Progress of an incoming message.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecvStatus {
    /// More Consecutive Frames are needed.
    Incomplete,
    /// The message is available from [`IsoTpReceiver::message`].
    Complete,
}

/// Reassembles one incoming message into a fixed size buffer.
#[derive(Debug, Clone)]
pub struct IsoTpReceiver {
    buf: [u8; MAX_MESSAGE_SIZE],
    len: usize,
    written: usize,
    idx: u8,
    block_remaining: u8,
    receiving: bool,
}

impl Default for IsoTpReceiver {
    fn default() -> Self {
        Self {
            buf: [0u8; MAX_MESSAGE_SIZE],
            len: 0,
            written: 0,
            idx: 1,
            block_remaining: 0,
            receiving: false,
        }
    }
}

impl IsoTpReceiver {
    /// True between a First Frame and the last Consecutive Frame.
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// The last completed message.
    pub fn message(&self) -> &[u8] {
        &self.buf[..self.written]
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.written = 0;
        self.idx = 1;
        self.block_remaining = 0;
        self.receiving = false;
    }

    fn recv_single_frame(&mut self, frame: &[u8]) -> Result<RecvStatus, Error> {
        let len = (frame[0] & 0xf) as usize;
        if len == 0 || len > MAX_SF_DL || len + 1 > frame.len() {
            return Err(Error::MalformedFrame);
        }

        if self.receiving {
            warn!("Single Frame interrupts multi-frame reception, restarting");
        }

        debug!("RX SF, length: {} data {}", len, hex::encode(frame));

        self.reset();
        self.buf[..len].copy_from_slice(&frame[1..len + 1]);
        self.len = len;
        self.written = len;
        Ok(RecvStatus::Complete)
    }

    fn recv_first_frame<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        config: &IsoTpConfig,
        fc_id: u32,
        frame: &[u8],
    ) -> Result<RecvStatus, Error> {
        if frame.len() < CAN_MAX_DLEN {
            return Err(Error::MalformedFrame);
        }

        let b0 = frame[0] as u16;
        let b1 = frame[1] as u16;
        let len = ((b0 << 8 | b1) & 0xfff) as usize;

        debug!("RX FF, length: {}, data {}", len, hex::encode(frame));

        if len <= MAX_SF_DL {
            return Err(Error::MalformedFrame);
        }

        if self.receiving {
            warn!("First Frame interrupts multi-frame reception, restarting");
        }
        self.reset();

        if len > MAX_MESSAGE_SIZE {
            // Best effort, the exchange fails either way
            let _ = send_flow_control(shims, config, fc_id, FlowStatus::Overflow);
            return Err(Error::DataTooLarge);
        }

        self.buf[..FF_DL].copy_from_slice(&frame[2..CAN_MAX_DLEN]);
        self.len = len;
        self.written = FF_DL;
        self.block_remaining = config.block_size;
        self.receiving = true;

        send_flow_control(shims, config, fc_id, FlowStatus::ContinueToSend)?;
        Ok(RecvStatus::Incomplete)
    }

    fn recv_consecutive_frame<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        config: &IsoTpConfig,
        fc_id: u32,
        frame: &[u8],
    ) -> Result<RecvStatus, Error> {
        if !self.receiving {
            return Err(Error::UnexpectedFrame);
        }

        let msg_idx = frame[0] & 0xf;
        if msg_idx != self.idx {
            self.reset();
            return Err(Error::OutOfOrder);
        }

        let remaining_len = self.len - self.written;
        let end_idx = std::cmp::min(remaining_len + 1, frame.len());
        let chunk = &frame[1..end_idx];

        self.buf[self.written..self.written + chunk.len()].copy_from_slice(chunk);
        self.written += chunk.len();
        self.idx = (self.idx + 1) & 0xf;

        debug!("RX CF, idx: {}, data {}", msg_idx, hex::encode(frame));

        if self.written >= self.len {
            self.receiving = false;
            return Ok(RecvStatus::Complete);
        }

        if config.block_size != 0 {
            self.block_remaining = self.block_remaining.saturating_sub(1);
            if self.block_remaining == 0 {
                self.block_remaining = config.block_size;
                send_flow_control(shims, config, fc_id, FlowStatus::ContinueToSend)?;
            }
        }

        Ok(RecvStatus::Incomplete)
    }

    /// Feed one CAN frame belonging to this message. `fc_id` is the arbitration id flow control is sent on.
    pub fn on_frame<S: Shims + ?Sized>(
        &mut self,
        shims: &S,
        config: &IsoTpConfig,
        fc_id: u32,
        frame: &[u8],
    ) -> Result<RecvStatus, Error> {
        if frame.is_empty() {
            return Err(Error::MalformedFrame);
        }

        match FrameType::from(frame[0] & FRAME_TYPE_MASK) {
            FrameType::Single => self.recv_single_frame(frame),
            FrameType::First => self.recv_first_frame(shims, config, fc_id, frame),
            FrameType::Consecutive => self.recv_consecutive_frame(shims, config, fc_id, frame),
            FrameType::FlowControl => Err(Error::UnexpectedFrame),
            FrameType::Unknown => Err(Error::UnknownFrameType),
        }
    }
}
