use crate::prelude::*;
use crate::error::Result;

use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const MESSAGE_START: u8 = 0x68;
pub const MESSAGE_END: u8 = 0x16;
pub const MESSAGE_SEND_SEP: u8 = 0x40;
pub const MESSAGE_RECV_SEP: u8 = 0x41;
// a run of these where a start marker should be closes the current burst
pub const MESSAGE_STREAM_END: u8 = 0xFF;

// The length byte only counts the payload. Everything else between the
// markers is "header": length, separator, type, serial twice, checksum.
pub const MESSAGE_HEADER_SIZE: usize = 3 + 2 * 4 + 1;

pub const INFORMATION_REQUEST_PAYLOAD: [u8; 2] = [0x01, 0x00];

// {{{ MessageType
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MessageType {
    InformationRequest = 0x30,
    InformationReply = 0xB0,
    ErrorString = 0xB1,
    String = 0xF0, // seems to be pure text
}
// }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReplyFrame {
    pub message_type: u8,
    pub serial_number: u32,
    pub payload: Vec<u8>,
}

impl ReplyFrame {
    pub fn kind(&self) -> Result<MessageType> {
        MessageType::try_from(self.message_type)
            .map_err(|_| ProtocolError::UnknownMessageType(self.message_type))
    }
}

pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

pub struct TcpFrameFactory;
impl TcpFrameFactory {
    pub fn build_request(serial_number: u32, message_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        Self::build(MESSAGE_SEND_SEP, serial_number, message_type, payload)
    }

    /// Same layout as a request but with the receive separator, i.e. what
    /// the inverter sends back.
    pub fn build_reply(serial_number: u32, message_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        Self::build(MESSAGE_RECV_SEP, serial_number, message_type, payload)
    }

    fn build(separator: u8, serial_number: u32, message_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let data_length =
            u8::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge(payload.len()))?;

        let serial = serial_number.to_le_bytes();

        let mut r = Vec::with_capacity(payload.len() + MESSAGE_HEADER_SIZE + 2);
        r.push(MESSAGE_START);
        r.push(data_length);
        r.push(separator);
        r.push(message_type);
        r.extend_from_slice(&serial);
        r.extend_from_slice(&serial);
        r.extend_from_slice(payload);

        // checksum covers everything after the start marker
        r.push(checksum(&r[1..]));
        r.push(MESSAGE_END);

        Ok(r)
    }
}

/// Builds the message the inverter answers with its raw statistics.
pub fn create_information_request(serial_number: u32) -> Result<Vec<u8>> {
    TcpFrameFactory::build_request(
        serial_number,
        MessageType::InformationRequest.into(),
        &INFORMATION_REQUEST_PAYLOAD,
    )
}

pub struct Parser;
impl Parser {
    /// Decodes one frame body: everything between the start and end markers,
    /// from the length byte up to and including the checksum.
    pub fn parse(input: &[u8]) -> Result<ReplyFrame> {
        trace!("parsing frame {:02x?}", input);

        if input.len() < MESSAGE_HEADER_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "frame body is {} bytes, need at least {}",
                input.len(),
                MESSAGE_HEADER_SIZE
            )));
        }

        let (body, declared) = input.split_at(input.len() - 1);
        let declared = declared[0];
        let calculated = checksum(body);
        if calculated != declared {
            return Err(ProtocolError::ChecksumMismatch { calculated, declared });
        }

        let length = body[0];
        if body[1] != MESSAGE_RECV_SEP {
            return Err(ProtocolError::MalformedFrame(format!(
                "invalid receive separator {:#04x}",
                body[1]
            )));
        }

        let message_type = body[2];
        debug!(
            "message type {:02x}, length {}, checksum {:02x}",
            message_type, length, calculated
        );

        let serial0 = u32::from_le_bytes([body[3], body[4], body[5], body[6]]);
        let serial1 = u32::from_le_bytes([body[7], body[8], body[9], body[10]]);
        if serial0 != serial1 {
            return Err(ProtocolError::SerialMismatch(serial0, serial1));
        }

        Ok(ReplyFrame {
            message_type,
            serial_number: serial0,
            payload: body[11..].to_vec(),
        })
    }
}
