use serde::{Deserialize, Serialize};

/// Output power for both channels, in device units.
///
/// Valid values lie in `[0, max_power]` and are multiples of `power_step`
/// (both taken from [`DeviceConfig`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevels {
    pub power_a: u16,
    pub power_b: u16,
}

impl PowerLevels {
    pub const ZERO: Self = Self {
        power_a: 0,
        power_b: 0,
    };

    pub fn new(power_a: u16, power_b: u16) -> Self {
        Self { power_a, power_b }
    }
}

/// Per-channel waveform the device replays until it is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorPattern {
    /// 0 (spiky) ..= 31 (smooth)
    pub duty_cycle: u8,
    /// Pulse duration in milliseconds, 0 ..= 1023
    pub pulse_duration: u16,
    /// 0 ..= 31
    pub amplitude: u8,
}

impl ActuatorPattern {
    pub fn new(duty_cycle: u8, pulse_duration: u16, amplitude: u8) -> Self {
        Self {
            duty_cycle,
            pulse_duration,
            amplitude,
        }
    }
}

/// Patterns for channel A and channel B.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternPair {
    pub a: ActuatorPattern,
    pub b: ActuatorPattern,
}

/// Read-only device properties obtained at connect time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub max_power: u16,
    pub power_step: u8,
    /// Percent, refreshed by notification.
    pub battery_level: u8,
}

/// Snapshot of everything the session knows about the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub config: DeviceConfig,
    pub power: PowerLevels,
    pub patterns: PatternPair,
}

/// A timestamped position from the loaded haptic script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HapticCommand {
    /// Milliseconds from the start of the media.
    pub time: u64,
    /// 0 ..= 100
    pub position: u8,
}

impl HapticCommand {
    pub fn new(time: u64, position: u8) -> Self {
        Self { time, position }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Ready,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Events pushed from the device session to its observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    BatteryLevel(u8),
    PowerChanged(PowerLevels),
    TransportFailure(String),
}
