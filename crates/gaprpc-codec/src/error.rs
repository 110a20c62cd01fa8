/// Errors raised while encoding a request or decoding a response/event.
///
/// Encode-side variants mean the call must not be issued; decode-side
/// variants mean the bytes from the controller were malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The buffer ended before a field was complete.
    #[error("truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A required field was not supplied.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field holds a value outside its enumeration or bit layout.
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: u32 },

    /// A numeric field does not fit its wire range.
    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// A variable-length field exceeds its wire maximum.
    #[error("{field} too long ({len} bytes, max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The response echoes a different opcode than the pending command.
    #[error("response opcode mismatch: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedOpcode { expected: u8, actual: u8 },

    /// The event id is not one this codec knows.
    #[error("unknown event id {0:#06x}")]
    UnknownEvent(u16),

    /// Bytes left over after a complete decode.
    #[error("{0} trailing bytes after decode")]
    TrailingBytes(usize),

    /// A text field is not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// An address string could not be parsed.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
