use std::time::Duration;

use gaprpc_codec::{CodecError, Status};

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The parameters could not be encoded; nothing was sent.
    #[error("encode error: {0}")]
    Encode(CodecError),

    /// The response body was malformed or answered a different opcode.
    #[error("decode error: {0}")]
    Decode(CodecError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gaprpc_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] gaprpc_frame::FrameError),

    /// No response arrived within the configured bound.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The controller answered with a non-success status.
    #[error("{name} failed: {status}")]
    Firmware { name: &'static str, status: Status },

    /// A security context already exists for this connection.
    #[error("security context already exists for connection {0:#06x}")]
    SecurityContextConflict(u16),

    /// No security context exists for this connection.
    #[error("no security context for connection {0:#06x}")]
    SecurityContextNotFound(u16),

    /// A LESC key was out of range or not on the curve.
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    /// The session was closed or its link went down.
    #[error("session closed")]
    SessionClosed,

    /// Invalid session configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O outside the link, e.g. reading a config file or spawning threads.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout(_))
    }

    /// Controller status, for `Firmware` errors.
    pub fn status(&self) -> Option<Status> {
        match self {
            RpcError::Firmware { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
