//! Capabilities injected by the caller: sending a CAN frame, logging, and scheduling a timeout.
//!
//! The core never touches a bus directly. Every operation that needs to put a frame on the wire
//! takes a `&impl Shims`, which is constructed once and shared by reference between handles.
//!
//! ```rust
//! use automotive_diag::shims::{init_shims, Shims};
//!
//! fn send_can(arbitration_id: u32, data: &[u8]) -> bool {
//!     println!("0x{:03x} {}", arbitration_id, hex::encode(data));
//!     true
//! }
//!
//! let shims = init_shims(None, send_can, None);
//! assert!(shims.send_frame(0x7df, &[0x02, 0x01, 0x0c]));
//! ```

use std::fmt;
use std::time::Duration;

use tracing::debug;

/// Sends one CAN frame. Returns `false` if the bus is unavailable.
pub type SendFrameFn = fn(arbitration_id: u32, data: &[u8]) -> bool;
pub type LogFn = fn(message: fmt::Arguments<'_>);
pub type TimeoutCallback = fn();
/// Registers `callback` to be called after `delay`. Returns `false` if the timer could not be armed.
pub type ScheduleTimeoutFn = fn(delay: Duration, callback: TimeoutCallback) -> bool;

/// The capability set the diagnostic core depends on.
pub trait Shims {
    /// Put a single frame of at most 8 bytes on the bus.
    fn send_frame(&self, arbitration_id: u32, data: &[u8]) -> bool;

    fn log(&self, message: fmt::Arguments<'_>) {
        debug!("{}", message);
    }

    /// Arm a timer. The core does not call this; timeout policy is owned by the caller's poll loop.
    fn schedule_timeout(&self, _delay: Duration, _callback: TimeoutCallback) -> bool {
        false
    }
}

/// [`Shims`] built from plain function pointers. Holds no mutable state.
#[derive(Copy, Clone)]
pub struct ShimBundle {
    send_can_message: SendFrameFn,
    log: Option<LogFn>,
    set_timer: Option<ScheduleTimeoutFn>,
}

/// Build a [`ShimBundle`]. Without a log function, messages go to `tracing` at debug level.
pub fn init_shims(
    log: Option<LogFn>,
    send_can_message: SendFrameFn,
    set_timer: Option<ScheduleTimeoutFn>,
) -> ShimBundle {
    ShimBundle {
        send_can_message,
        log,
        set_timer,
    }
}

impl Shims for ShimBundle {
    fn send_frame(&self, arbitration_id: u32, data: &[u8]) -> bool {
        (self.send_can_message)(arbitration_id, data)
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        match self.log {
            Some(log) => log(message),
            None => debug!("{}", message),
        }
    }

    fn schedule_timeout(&self, delay: Duration, callback: TimeoutCallback) -> bool {
        match self.set_timer {
            Some(set_timer) => set_timer(delay, callback),
            None => false,
        }
    }
}

impl fmt::Debug for ShimBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimBundle")
            .field("log", &self.log.is_some())
            .field("set_timer", &self.set_timer.is_some())
            .finish()
    }
}
