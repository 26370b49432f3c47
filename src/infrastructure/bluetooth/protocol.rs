//! Coyote Protocol
//!
//! Bit-exact codecs for the 3-byte characteristic payloads of the Coyote
//! e-stim unit, plus the GATT identifiers of the reference device.
//!
//! Every payload is a 24-bit word written most-significant byte first, after
//! which byte 0 and byte 2 are exchanged. The exchange is a quirk of this
//! device, not a framing rule.
//!
//! Fields wider than their slot are truncated by masking. This is lossy on
//! purpose: the device has only ever been observed receiving masked values,
//! so out-of-range input wraps rather than raising an error.

use crate::domain::models::{ActuatorPattern, PowerLevels};

/// Coyote control service.
pub const COYOTE_SERVICE_UUID: &str = "955a180b-0fe2-f5aa-a094-84b8d4f3e8ad";

/// Battery service.
pub const BATTERY_SERVICE_UUID: &str = "955a180a-0fe2-f5aa-a094-84b8d4f3e8ad";

/// Payload length shared by the power, pattern and config characteristics.
pub const PAYLOAD_LEN: usize = 3;

pub type Payload = [u8; PAYLOAD_LEN];

/// Characteristics consumed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// read: max power and power step
    Config,
    /// read/write/notify: current power of both channels
    Power,
    /// write: channel A waveform
    PatternA,
    /// write: channel B waveform
    PatternB,
    /// read/notify: battery percentage (1 byte)
    Battery,
}

impl Characteristic {
    pub fn uuid(&self) -> &'static str {
        match self {
            Self::Config => "955a1507-0fe2-f5aa-a094-84b8d4f3e8ad",
            Self::Power => "955a1504-0fe2-f5aa-a094-84b8d4f3e8ad",
            Self::PatternA => "955a1506-0fe2-f5aa-a094-84b8d4f3e8ad",
            Self::PatternB => "955a1505-0fe2-f5aa-a094-84b8d4f3e8ad",
            Self::Battery => "955a1500-0fe2-f5aa-a094-84b8d4f3e8ad",
        }
    }

    pub fn service_uuid(&self) -> &'static str {
        match self {
            Self::Battery => BATTERY_SERVICE_UUID,
            _ => COYOTE_SERVICE_UUID,
        }
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Power => "power",
            Self::PatternA => "pattern A",
            Self::PatternB => "pattern B",
            Self::Battery => "battery",
        };
        f.write_str(name)
    }
}

/// Config register contents. Battery level lives on its own characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRegister {
    pub max_power: u16,
    pub power_step: u8,
}

const POWER_MASK: u32 = 0x7FF; // 11 bits
const AMPLITUDE_MASK: u32 = 0x1F; // 5 bits
const PULSE_MASK: u32 = 0x3FF; // 10 bits
const DUTY_MASK: u32 = 0x1F; // 5 bits
const MAX_POWER_MASK: u32 = 0x7FF; // 11 bits
const POWER_STEP_MASK: u32 = 0xFF; // 8 bits

/// Exchange byte 0 and byte 2.
fn swap_outer(mut bytes: Payload) -> Payload {
    bytes.swap(0, 2);
    bytes
}

fn word_to_payload(word: u32) -> Payload {
    swap_outer([(word >> 16) as u8, (word >> 8) as u8, word as u8])
}

fn payload_to_word(payload: Payload) -> u32 {
    let [b0, b1, b2] = swap_outer(payload);
    (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2)
}

/// Encode power levels.
///
/// ```text
/// 23-22 : reserved (0)
/// 21-11 : power B
/// 10-0  : power A
/// ```
pub fn encode_power(power: PowerLevels) -> Payload {
    let word =
        ((u32::from(power.power_b) & POWER_MASK) << 11) | (u32::from(power.power_a) & POWER_MASK);
    word_to_payload(word)
}

pub fn decode_power(payload: Payload) -> PowerLevels {
    let word = payload_to_word(payload);
    PowerLevels {
        power_a: (word & POWER_MASK) as u16,
        power_b: ((word >> 11) & POWER_MASK) as u16,
    }
}

/// Encode a channel waveform.
///
/// ```text
/// 23-20 : reserved (0)
/// 19-15 : amplitude
/// 14-5  : pulse duration
/// 4-0   : duty cycle
/// ```
pub fn encode_pattern(pattern: ActuatorPattern) -> Payload {
    let word = ((u32::from(pattern.amplitude) & AMPLITUDE_MASK) << 15)
        | ((u32::from(pattern.pulse_duration) & PULSE_MASK) << 5)
        | (u32::from(pattern.duty_cycle) & DUTY_MASK);
    word_to_payload(word)
}

pub fn decode_pattern(payload: Payload) -> ActuatorPattern {
    let word = payload_to_word(payload);
    ActuatorPattern {
        duty_cycle: (word & DUTY_MASK) as u8,
        pulse_duration: ((word >> 5) & PULSE_MASK) as u16,
        amplitude: ((word >> 15) & AMPLITUDE_MASK) as u8,
    }
}

/// Decode the config register.
///
/// ```text
/// 23-19 : reserved
/// 18-8  : max power
/// 7-0   : power step
/// ```
pub fn decode_config(payload: Payload) -> ConfigRegister {
    let word = payload_to_word(payload);
    ConfigRegister {
        max_power: ((word >> 8) & MAX_POWER_MASK) as u16,
        power_step: (word & POWER_STEP_MASK) as u8,
    }
}

/// Inverse of [`decode_config`], for fixtures and simulated devices.
pub fn encode_config(config: ConfigRegister) -> Payload {
    let word = ((u32::from(config.max_power) & MAX_POWER_MASK) << 8)
        | (u32::from(config.power_step) & POWER_STEP_MASK);
    word_to_payload(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_layout() {
        // word = B << 11 | A = 0b00_00000000011_00000000101
        let bytes = encode_power(PowerLevels::new(5, 3));
        let word = (3u32 << 11) | 5;
        assert_eq!(
            bytes,
            [word as u8, (word >> 8) as u8, (word >> 16) as u8]
        );
        assert_eq!(decode_power(bytes), PowerLevels::new(5, 3));
    }

    #[test]
    fn test_power_full_scale() {
        let bytes = encode_power(PowerLevels::new(2047, 2047));
        assert_eq!(bytes, [0xFF, 0xFF, 0x3F]);
        assert_eq!(decode_power(bytes), PowerLevels::new(2047, 2047));
    }

    #[test]
    fn test_power_masks_overflow() {
        assert_eq!(encode_power(PowerLevels::new(2048, 0)), [0, 0, 0]);
        // A overflow must not leak into B
        let decoded = decode_power(encode_power(PowerLevels::new(2049, 7)));
        assert_eq!(decoded, PowerLevels::new(1, 7));
    }

    #[test]
    fn test_decode_power_ignores_reserved_bits() {
        assert_eq!(decode_power([0x00, 0x00, 0xC0]), PowerLevels::ZERO);
    }

    #[test]
    fn test_pattern_layout() {
        let pattern = ActuatorPattern::new(1, 9, 20);
        let word = (20u32 << 15) | (9 << 5) | 1;
        let bytes = encode_pattern(pattern);
        assert_eq!(
            bytes,
            [word as u8, (word >> 8) as u8, (word >> 16) as u8]
        );
        assert_eq!(decode_pattern(bytes), pattern);
    }

    #[test]
    fn test_pattern_masks_each_field() {
        let decoded = decode_pattern(encode_pattern(ActuatorPattern::new(33, 1025, 32)));
        assert_eq!(decoded, ActuatorPattern::new(1, 1, 0));
    }

    #[test]
    fn test_pattern_reserved_bits_zero() {
        let bytes = encode_pattern(ActuatorPattern::new(31, 1023, 31));
        assert_eq!(bytes[2] & 0xF0, 0);
    }

    #[test]
    fn test_config_decode() {
        // pre-swap bytes: [max_power >> 8, max_power & 0xFF, step]
        let max_power = 2000u16;
        let wire = [7, (max_power & 0xFF) as u8, (max_power >> 8) as u8];
        let config = decode_config(wire);
        assert_eq!(config.max_power, 2000);
        assert_eq!(config.power_step, 7);
        assert_eq!(encode_config(config), wire);
    }

    #[test]
    fn test_config_reserved_bits_masked() {
        let config = decode_config([0x07, 0xFF, 0xFF]);
        assert_eq!(config.max_power, 0x7FF);
        assert_eq!(config.power_step, 7);
    }

    #[test]
    fn test_characteristic_services() {
        assert_eq!(Characteristic::Battery.service_uuid(), BATTERY_SERVICE_UUID);
        assert_eq!(Characteristic::PatternA.service_uuid(), COYOTE_SERVICE_UUID);
        assert_ne!(Characteristic::PatternA.uuid(), Characteristic::PatternB.uuid());
    }
}
