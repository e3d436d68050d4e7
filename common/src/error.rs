use thiserror::Error;

/// Every way a received frame can be refused. Each variant maps onto the
/// status byte of the `#E?` acknowledgment sent back to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame")]
    Framing,
    #[error("checksum mismatch (received {received:?}, computed {computed})")]
    Checksum { received: Option<u16>, computed: u8 },
    #[error("unknown command byte {0:#04x}")]
    InvalidCommand(u8),
    #[error("value out of range")]
    ValueOutOfRange,
}

impl ProtocolError {
    pub fn status(self) -> AckStatus {
        match self {
            Self::Framing => AckStatus::Framing,
            Self::Checksum { .. } => AckStatus::Checksum,
            Self::InvalidCommand(_) => AckStatus::InvalidCommand,
            Self::ValueOutOfRange => AckStatus::OutOfRange,
        }
    }
}

/// Status byte carried by an acknowledgment frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Ok,
    Framing,
    Checksum,
    InvalidCommand,
    OutOfRange,
}

impl AckStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Ok => b'o',
            Self::Framing => b'f',
            Self::Checksum => b's',
            Self::InvalidCommand => b'i',
            Self::OutOfRange => b'v',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'o' => Some(Self::Ok),
            b'f' => Some(Self::Framing),
            b's' => Some(Self::Checksum),
            b'i' => Some(Self::InvalidCommand),
            b'v' => Some(Self::OutOfRange),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Framing => "FRAMING_ERROR",
            Self::Checksum => "CHECKSUM_ERROR",
            Self::InvalidCommand => "INVALID_COMMAND",
            Self::OutOfRange => "VALUE_OUT_OF_RANGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor bus read failed: {0}")]
    Bus(String),
    #[error("implausible reading {0}")]
    Implausible(i32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read node config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid node config: {0}")]
    Parse(#[from] serde_json::Error),
}
