//! Byte-stream link to a BLE radio controller.
//!
//! Provides a unified interface over the ways a host reaches the radio:
//! - Serial tty (UART or USB CDC), configured raw via termios
//! - Unix domain socket bridges (pty relays, firmware simulators)
//!
//! This is the lowest layer of gaprpc. Everything else builds on top of
//! the [`LinkStream`] type provided here.

pub mod addr;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod socket;

pub use addr::LinkAddr;
pub use error::{Result, TransportError};
pub use traits::LinkStream;

#[cfg(unix)]
pub use serial::{LinkConfig, SerialPort};
