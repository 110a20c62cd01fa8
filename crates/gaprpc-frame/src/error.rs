/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A length prefix of zero: the frame has no packet type byte.
    #[error("empty frame (zero length prefix)")]
    EmptyFrame,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when the error only reflects an expired read/write timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err) if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            )
        )
    }
}

impl From<gaprpc_transport::TransportError> for FrameError {
    fn from(err: gaprpc_transport::TransportError) -> Self {
        match err {
            gaprpc_transport::TransportError::Io(io) => FrameError::Io(io),
            gaprpc_transport::TransportError::Open { source, .. }
            | gaprpc_transport::TransportError::Configure { source, .. }
            | gaprpc_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
