//! Drives a Coyote BLE e-stim unit in sync with media playback.
//!
//! The [`domain`] layer turns a haptic script and a timeline position into
//! channel patterns; the [`infrastructure`] layer encodes them for the device
//! and keeps it fed.

pub mod domain;
pub mod infrastructure;

pub use domain::interpolation::{interpolate, FadePolicy, Frame, InterpolationPolicy};
pub use domain::models::{
    ActuatorPattern, DeviceConfig, DeviceState, HapticCommand, PatternPair, PowerLevels,
    SessionEvent, SessionStatus,
};
pub use domain::playback::{CommandSink, HapticOutput, PlaybackDriver, TimelineClock};
pub use domain::sequence::{CommandSequence, PlaybackCursor, SequenceError};
pub use infrastructure::bluetooth::{DeviceSession, GattTransport, SessionError, TransportError};
pub use infrastructure::frame_loop::PlaybackController;
