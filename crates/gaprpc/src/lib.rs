//! Call BLE GAP operations on a remote radio controller.
//!
//! The controller runs connectivity firmware and is reached over a serial
//! link. gaprpc encodes each call, sends it, waits for the reply and
//! delivers the controller's events, one call in flight at a time.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream link (serial tty, Unix socket bridge)
//! - [`frame`]: Length-prefixed packet framing
//! - [`codec`]: Operation, event and advertising data encode/decode
//! - [`session`]: Serialized calls, events, security contexts (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use gaprpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gaprpc_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use gaprpc_codec::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use gaprpc_session::*;
}
