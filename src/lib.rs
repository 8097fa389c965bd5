//! # The Automotive Diagnostics Crate
//! Request/response core for vehicle diagnostics: UDS (ISO 14229) and OBD-II (SAE J1979) over ISO-TP (ISO 15765-2).
//!
//! The crate never touches a bus. The caller supplies a send function through [`shims::init_shims`], reads frames
//! from its own bus driver and feeds them to every live [`uds::DiagnosticRequestHandle`]. Nothing blocks and
//! nothing allocates, so the same code runs in a desktop tool and on a microcontroller.
//!
//! ## Poll Loop Example
//!
//! ```rust
//! use automotive_diag::obd2::{decode, request_pid, PidRequestType};
//! use automotive_diag::shims::init_shims;
//!
//! fn send_can(id: u32, data: &[u8]) -> bool {
//!     println!("TX 0x{:03x} {}", id, hex::encode(data));
//!     true
//! }
//!
//! // Stand-in for the bus driver
//! fn read_frame() -> Option<(u32, Vec<u8>)> {
//!     Some((0x7e8, vec![0x03, 0x41, 0x0d, 0x32]))
//! }
//!
//! let shims = init_shims(None, send_can, None);
//! let mut handle = request_pid(&shims, PidRequestType::Standard, 0x7df, 0x0d).unwrap();
//!
//! while !handle.completed() {
//!     let Some((id, data)) = read_frame() else { break };
//!     handle.receive_frame(&shims, id, &data);
//! }
//!
//! println!("Vehicle speed: {:?}", decode(handle.response(), 0x0d).unwrap());
//! ```
//!
//! ## DTC Example
//!
//! ```rust
//! use automotive_diag::obd2::{decode_dtcs, request_dtcs};
//! use automotive_diag::shims::init_shims;
//!
//! fn send_can(_id: u32, _data: &[u8]) -> bool { true }
//!
//! let shims = init_shims(None, send_can, None);
//! let mut handle = request_dtcs(&shims, 0x7e0).unwrap();
//! let response = handle.receive_frame(&shims, 0x7e8, &[0x05, 0x43, 0x01, 0x23, 0x84, 0x56]);
//!
//! for dtc in decode_dtcs(&response).unwrap() {
//!     println!("{}", dtc);
//! }
//! ```

pub mod bitfield;
pub mod can;
mod error;
pub mod isotp;
pub mod obd2;
pub mod shims;
pub mod uds;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
