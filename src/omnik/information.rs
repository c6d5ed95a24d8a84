use crate::prelude::*;
use crate::error::Result;

use nom::number::complete::{be_u16, be_u32};
use serde::Serialize;

pub const PAYLOAD_SIZE: usize = 125;

const UINT16_MAX: u32 = u16::MAX as u32;
// reported as temperature while the inverter is offline
const TEMPERATURE_OFFLINE: u32 = 65326;

// {{{ FieldRule
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Width {
    U16,
    U32,
}

impl Width {
    fn size(self) -> usize {
        match self {
            Width::U16 => 2,
            Width::U32 => 4,
        }
    }
}

/// Where a numeric field lives in the payload and how its raw value becomes
/// a measurement. Arrays repeat the field `count` times, `stride` bytes apart.
#[derive(Clone, Copy, Debug)]
struct FieldRule {
    name: &'static str,
    offset: usize,
    width: Width,
    divisor: f64,
    sentinel: Option<u32>,
    count: usize,
    stride: usize,
}

impl FieldRule {
    const fn u16(name: &'static str, offset: usize) -> Self {
        Self {
            name,
            offset,
            width: Width::U16,
            divisor: 1.0,
            sentinel: None,
            count: 1,
            stride: 2,
        }
    }

    const fn u32(name: &'static str, offset: usize) -> Self {
        Self {
            width: Width::U32,
            stride: 4,
            ..Self::u16(name, offset)
        }
    }

    const fn div(self, divisor: f64) -> Self {
        Self { divisor, ..self }
    }

    const fn sentinel(self, sentinel: u32) -> Self {
        Self {
            sentinel: Some(sentinel),
            ..self
        }
    }

    const fn repeat(self, count: usize, stride: usize) -> Self {
        Self {
            count,
            stride,
            ..self
        }
    }

    fn raw_at(&self, payload: &[u8], index: usize) -> Result<u32> {
        let offset = self.offset + index * self.stride;
        let input = payload
            .get(offset..offset + self.width.size())
            .ok_or_else(|| {
                ProtocolError::MalformedFrame(format!(
                    "{} at offset {} runs past the {} byte payload",
                    self.name,
                    offset,
                    payload.len()
                ))
            })?;

        let parsed = match self.width {
            Width::U16 => be_u16::<_, nom::error::Error<&[u8]>>(input).map(|(_, v)| u32::from(v)),
            Width::U32 => be_u32::<_, nom::error::Error<&[u8]>>(input).map(|(_, v)| v),
        };

        parsed.map_err(|e| ProtocolError::MalformedFrame(format!("{}: {}", self.name, e)))
    }

    fn raw(&self, payload: &[u8]) -> Result<u32> {
        self.raw_at(payload, 0)
    }

    fn checked_raw_at(&self, payload: &[u8], index: usize) -> Result<Option<u32>> {
        let raw = self.raw_at(payload, index)?;
        Ok(if Some(raw) == self.sentinel { None } else { Some(raw) })
    }

    fn value(&self, payload: &[u8]) -> Result<Option<f64>> {
        Ok(self
            .checked_raw_at(payload, 0)?
            .map(|raw| raw as f64 / self.divisor))
    }

    fn values(&self, payload: &[u8]) -> Result<[Option<f64>; 3]> {
        debug_assert_eq!(self.count, 3);
        let mut r = [None; 3];
        for (i, v) in r.iter_mut().enumerate() {
            *v = self
                .checked_raw_at(payload, i)?
                .map(|raw| raw as f64 / self.divisor);
        }
        Ok(r)
    }

    fn raw_values(&self, payload: &[u8]) -> Result<[Option<u16>; 3]> {
        debug_assert_eq!(self.count, 3);
        let mut r = [None; 3];
        for (i, v) in r.iter_mut().enumerate() {
            // u16 rule, the value always fits
            *v = self.checked_raw_at(payload, i)?.map(|raw| raw as u16);
        }
        Ok(r)
    }
}

#[derive(Clone, Copy, Debug)]
struct TextField {
    name: &'static str,
    offset: usize,
    len: usize,
}

impl TextField {
    fn decode(&self, payload: &[u8]) -> Result<String> {
        let bytes = &payload[self.offset..self.offset + self.len];
        // fixed width, NUL padded
        let bytes = bytes.split(|b| *b == 0).next().unwrap_or_default();

        std::str::from_utf8(bytes)
            .map(|s| s.trim().to_string())
            .map_err(|_| ProtocolError::InvalidFieldValue {
                field: self.name,
                value: format!("{:02x?}", bytes),
            })
    }
}

/// Bytes with no known meaning. Anything other than `expected` is logged in
/// case other inverter models put something interesting there.
#[derive(Clone, Copy, Debug)]
struct Padding {
    name: &'static str,
    offset: usize,
    expected: &'static [u8],
}

impl Padding {
    fn check(&self, payload: &[u8]) {
        let actual = &payload[self.offset..self.offset + self.expected.len()];
        if actual != self.expected {
            warn!("Unexpected {} `{:02x?}`", self.name, actual);
        }
    }
}
// }}}

// {{{ layout
mod layout {
    use super::*;

    pub(super) const SERIAL_NUMBER: TextField = TextField { name: "serial_number", offset: 3, len: 16 };
    pub(super) const TEMPERATURE: FieldRule =
        FieldRule::u16("temperature", 19).div(10.0).sentinel(TEMPERATURE_OFFLINE);
    pub(super) const DC_INPUT_VOLTAGE: FieldRule =
        FieldRule::u16("dc_input_voltage", 21).div(10.0).sentinel(UINT16_MAX).repeat(3, 2);
    pub(super) const DC_INPUT_CURRENT: FieldRule =
        FieldRule::u16("dc_input_current", 27).div(10.0).sentinel(UINT16_MAX).repeat(3, 2);
    pub(super) const AC_OUTPUT_CURRENT: FieldRule =
        FieldRule::u16("ac_output_current", 33).div(10.0).sentinel(UINT16_MAX).repeat(3, 2);
    pub(super) const AC_OUTPUT_VOLTAGE: FieldRule =
        FieldRule::u16("ac_output_voltage", 39).div(10.0).sentinel(UINT16_MAX).repeat(3, 2);
    // ac_output is three {frequency, power} pairs
    pub(super) const AC_OUTPUT_FREQUENCY: FieldRule =
        FieldRule::u16("ac_output_frequency", 45).div(100.0).sentinel(UINT16_MAX).repeat(3, 4);
    pub(super) const AC_OUTPUT_POWER: FieldRule =
        FieldRule::u16("ac_output_power", 47).sentinel(UINT16_MAX).repeat(3, 4);
    pub(super) const SOLAR_ENERGY_TODAY: FieldRule = FieldRule::u16("solar_energy_today", 57).div(100.0);
    pub(super) const SOLAR_ENERGY_TOTAL: FieldRule = FieldRule::u32("solar_energy_total", 59).div(10.0);
    pub(super) const SOLAR_HOURS_TOTAL: FieldRule = FieldRule::u32("solar_hours_total", 63);
    pub(super) const INVERTER_ACTIVE: FieldRule = FieldRule::u16("inverter_active", 67);
    pub(super) const UNKNOWN0: FieldRule = FieldRule::u16("unknown0", 73);
    pub(super) const FIRMWARE: TextField = TextField { name: "firmware", offset: 85, len: 16 };
    pub(super) const FIRMWARE_SLAVE: TextField = TextField { name: "firmware_slave", offset: 105, len: 16 };

    pub(super) const PADDING: [Padding; 5] = [
        Padding { name: "padding0", offset: 0, expected: &[0x81, 0x02, 0x01] },
        Padding { name: "padding1", offset: 69, expected: &[0; 4] },
        Padding { name: "padding2", offset: 75, expected: &[0; 10] },
        Padding { name: "padding3", offset: 101, expected: &[0; 4] },
        Padding { name: "padding4", offset: 121, expected: &[0; 4] },
    ];
}
// }}}

// {{{ InformationReply
#[derive(PartialEq, Clone, Debug, Serialize)]
pub struct InformationReply {
    pub serial_number: String,
    pub temperature: Option<f64>,
    pub dc_input_voltage: [Option<f64>; 3],
    pub dc_input_current: [Option<f64>; 3],
    pub ac_output_current: [Option<f64>; 3],
    pub ac_output_voltage: [Option<f64>; 3],
    pub ac_output_frequency: [Option<f64>; 3],
    pub ac_output_power: [Option<u16>; 3],
    pub solar_energy_today: f64,
    pub solar_energy_total: f64,
    pub solar_hours_total: u32,
    pub inverter_active: bool,
    pub firmware: String,
    pub firmware_slave: String,
}

impl InformationReply {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        use layout::*;

        if payload.len() != PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadLength {
                expected: PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }

        Self::check_diagnostics(payload)?;

        Ok(Self {
            serial_number: SERIAL_NUMBER.decode(payload)?,
            temperature: TEMPERATURE.value(payload)?,
            dc_input_voltage: DC_INPUT_VOLTAGE.values(payload)?,
            dc_input_current: DC_INPUT_CURRENT.values(payload)?,
            ac_output_current: AC_OUTPUT_CURRENT.values(payload)?,
            ac_output_voltage: AC_OUTPUT_VOLTAGE.values(payload)?,
            ac_output_frequency: AC_OUTPUT_FREQUENCY.values(payload)?,
            ac_output_power: AC_OUTPUT_POWER.raw_values(payload)?,
            solar_energy_today: Self::required(SOLAR_ENERGY_TODAY, payload)?,
            solar_energy_total: Self::required(SOLAR_ENERGY_TOTAL, payload)?,
            solar_hours_total: SOLAR_HOURS_TOTAL.raw(payload)?,
            inverter_active: Self::flag(INVERTER_ACTIVE, payload)?,
            firmware: FIRMWARE.decode(payload)?,
            firmware_slave: FIRMWARE_SLAVE.decode(payload)?,
        })
    }

    fn required(rule: FieldRule, payload: &[u8]) -> Result<f64> {
        Ok(rule.raw(payload)? as f64 / rule.divisor)
    }

    fn flag(rule: FieldRule, payload: &[u8]) -> Result<bool> {
        match rule.raw(payload)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidFieldValue {
                field: rule.name,
                value: other.to_string(),
            }),
        }
    }

    fn check_diagnostics(payload: &[u8]) -> Result<()> {
        let unknown0 = layout::UNKNOWN0.raw(payload)?;
        if unknown0 != 0 && unknown0 != UINT16_MAX {
            warn!("Unexpected unknown0 `{}`", unknown0);
        }

        for padding in &layout::PADDING {
            padding.check(payload);
        }

        Ok(())
    }
}
// }}}
