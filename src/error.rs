/// Errors raised while encoding, framing or decoding inverter messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Computed checksum differs from the one carried by the frame.
    #[error("checksum mismatch (calculated {calculated:#04x}, got {declared:#04x})")]
    ChecksumMismatch { calculated: u8, declared: u8 },

    /// Wrong start/end marker, wrong separator or truncated frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("serial number mismatch ({0} != {1})")]
    SerialMismatch(u32, u32),

    /// The payload layout depends on the type, so unknown types are fatal.
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    #[error("invalid value `{value}` for field {field}")]
    InvalidFieldValue { field: &'static str, value: String },

    #[error("request payload too large ({0} bytes, max 255)")]
    PayloadTooLarge(usize),

    #[error("information reply payload is {actual} bytes, expected {expected}")]
    PayloadLength { expected: usize, actual: usize },

    #[error("none of the messages contained an information reply")]
    NoInformationReply,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
