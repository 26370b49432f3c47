//! Property tests for the Coyote payload codecs.

use coyote_sync::infrastructure::bluetooth::protocol::{
    decode_config, decode_pattern, decode_power, encode_config, encode_pattern, encode_power,
    ConfigRegister,
};
use coyote_sync::{ActuatorPattern, PowerLevels};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_power_round_trips_in_range(a in 0u16..=2047, b in 0u16..=2047) {
        let power = PowerLevels::new(a, b);
        prop_assert_eq!(decode_power(encode_power(power)), power);
    }

    #[test]
    fn prop_power_masks_to_eleven_bits(a: u16, b: u16) {
        let decoded = decode_power(encode_power(PowerLevels::new(a, b)));
        prop_assert_eq!(decoded, PowerLevels::new(a & 0x7FF, b & 0x7FF));
    }

    #[test]
    fn prop_power_reserved_bits_stay_zero(a: u16, b: u16) {
        let bytes = encode_power(PowerLevels::new(a, b));
        // byte 2 carries the top of the word after the swap
        prop_assert_eq!(bytes[2] & 0xC0, 0);
    }

    #[test]
    fn prop_pattern_round_trips_in_range(
        duty_cycle in 0u8..=31,
        pulse_duration in 0u16..=1023,
        amplitude in 0u8..=31,
    ) {
        let pattern = ActuatorPattern::new(duty_cycle, pulse_duration, amplitude);
        prop_assert_eq!(decode_pattern(encode_pattern(pattern)), pattern);
    }

    #[test]
    fn prop_pattern_fields_do_not_bleed(duty_cycle: u8, pulse_duration: u16, amplitude: u8) {
        let decoded = decode_pattern(encode_pattern(ActuatorPattern::new(
            duty_cycle,
            pulse_duration,
            amplitude,
        )));
        prop_assert_eq!(decoded.duty_cycle, duty_cycle & 0x1F);
        prop_assert_eq!(decoded.pulse_duration, pulse_duration & 0x3FF);
        prop_assert_eq!(decoded.amplitude, amplitude & 0x1F);
    }

    #[test]
    fn prop_config_round_trips(max_power in 0u16..=2047, power_step: u8) {
        let config = ConfigRegister { max_power, power_step };
        prop_assert_eq!(decode_config(encode_config(config)), config);
    }
}

#[test]
fn power_overflow_wraps_to_zero() {
    assert_eq!(encode_power(PowerLevels::new(2048, 0)), [0, 0, 0]);
    assert_eq!(
        decode_power(encode_power(PowerLevels::new(2048, 0))),
        PowerLevels::ZERO
    );
}
