#![allow(dead_code)]

pub use omnik_tcp::prelude::*;
pub use omnik_tcp::omnik::information::PAYLOAD_SIZE;
pub use omnik_tcp::omnik::packet::{MessageType, TcpFrameFactory, MESSAGE_STREAM_END};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;
impl Factory {
    pub const SERIAL: u32 = 123456789;

    pub fn set_u16(payload: &mut [u8], offset: usize, value: u16) {
        payload[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn set_u32(payload: &mut [u8], offset: usize, value: u32) {
        payload[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn set_text(payload: &mut [u8], offset: usize, text: &str) {
        payload[offset..offset + 16].fill(0);
        payload[offset..offset + text.len()].copy_from_slice(text.as_bytes());
    }

    // A capture-shaped reply from a single string inverter on a sunny day.
    pub fn information_payload() -> Vec<u8> {
        let mut p = vec![0u8; PAYLOAD_SIZE];

        p[0..3].copy_from_slice(&[0x81, 0x02, 0x01]);
        Self::set_text(&mut p, 3, "NLDN2020123A4567");
        Self::set_u16(&mut p, 19, 432);

        for (i, v) in [1876, 1901, 65535].iter().enumerate() {
            Self::set_u16(&mut p, 21 + i * 2, *v);
        }
        for (i, v) in [15, 14, 65535].iter().enumerate() {
            Self::set_u16(&mut p, 27 + i * 2, *v);
        }
        for (i, v) in [23, 65535, 65535].iter().enumerate() {
            Self::set_u16(&mut p, 33 + i * 2, *v);
        }
        for (i, v) in [2305, 65535, 65535].iter().enumerate() {
            Self::set_u16(&mut p, 39 + i * 2, *v);
        }
        for (i, (f, w)) in [(5001, 530), (65535, 65535), (65535, 65535)].iter().enumerate() {
            Self::set_u16(&mut p, 45 + i * 4, *f);
            Self::set_u16(&mut p, 47 + i * 4, *w);
        }

        Self::set_u16(&mut p, 57, 1234);
        Self::set_u32(&mut p, 59, 100156);
        Self::set_u32(&mut p, 63, 9874);
        Self::set_u16(&mut p, 67, 1);
        Self::set_u16(&mut p, 73, 65535);
        Self::set_text(&mut p, 85, "V5.27Build262");
        Self::set_text(&mut p, 105, "V4.13Build253");

        p
    }

    pub fn information_reply() -> InformationReply {
        InformationReply {
            serial_number: "NLDN2020123A4567".to_string(),
            temperature: Some(43.2),
            dc_input_voltage: [Some(187.6), Some(190.1), None],
            dc_input_current: [Some(1.5), Some(1.4), None],
            ac_output_current: [Some(2.3), None, None],
            ac_output_voltage: [Some(230.5), None, None],
            ac_output_frequency: [Some(50.01), None, None],
            ac_output_power: [Some(530), None, None],
            solar_energy_today: 12.34,
            solar_energy_total: 10015.6,
            solar_hours_total: 9874,
            inverter_active: true,
            firmware: "V5.27Build262".to_string(),
            firmware_slave: "V4.13Build253".to_string(),
        }
    }

    pub fn reply_frame(serial_number: u32, message_type: MessageType, payload: &[u8]) -> Vec<u8> {
        TcpFrameFactory::build_reply(serial_number, message_type.into(), payload).unwrap()
    }

    pub fn information_frame() -> Vec<u8> {
        Self::reply_frame(Self::SERIAL, MessageType::InformationReply, &Self::information_payload())
    }

    pub fn text_frame(text: &str) -> Vec<u8> {
        Self::reply_frame(Self::SERIAL, MessageType::String, text.as_bytes())
    }

    /// Strips the start and end markers, leaving what `Parser::parse` takes.
    pub fn body(frame: &[u8]) -> &[u8] {
        &frame[1..frame.len() - 1]
    }

    /// Concatenates frames and closes the burst the way the inverter does.
    pub fn burst(frames: &[Vec<u8>]) -> Vec<u8> {
        let mut r: Vec<u8> = frames.concat();
        r.extend_from_slice(&[MESSAGE_STREAM_END; 4]);
        r
    }
}
