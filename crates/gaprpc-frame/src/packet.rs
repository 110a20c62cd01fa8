//! Packet types carried in the first byte after the length prefix.

/// Host → controller call.
pub const COMMAND: u8 = 0;

/// Controller → host reply to the outstanding command.
pub const RESPONSE: u8 = 1;

/// Controller → host unsolicited notification.
pub const EVENT: u8 = 2;

/// Kind of a serialization packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    Command,
    Response,
    Event,
    /// Any other type byte; kept so the receiver can log and drop it.
    Unknown(u8),
}

impl PacketType {
    /// Wire value of this packet type.
    pub fn as_u8(self) -> u8 {
        match self {
            PacketType::Command => COMMAND,
            PacketType::Response => RESPONSE,
            PacketType::Event => EVENT,
            PacketType::Unknown(raw) => raw,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Command => "COMMAND",
            PacketType::Response => "RESPONSE",
            PacketType::Event => "EVENT",
            PacketType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for PacketType {
    fn from(raw: u8) -> Self {
        match raw {
            COMMAND => PacketType::Command,
            RESPONSE => PacketType::Response,
            EVENT => PacketType::Event,
            other => PacketType::Unknown(other),
        }
    }
}
