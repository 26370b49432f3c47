//! Interpolation Engine
//!
//! Turns the command sequence and a timeline position into a pattern pair.
//! Pure: the caller supplies the cursor, nothing is remembered between calls.

use crate::domain::models::{ActuatorPattern, HapticCommand, PatternPair};

/// Position assumed before the first command and after the last one.
pub const IDLE_POSITION: u8 = 99;
/// Centre of the 0..=100 position domain.
pub const MID_ZONE: f64 = 50.0;
/// Half-width of the band where both channels are driven.
pub const DEAD_ZONE: f64 = 25.0;
/// Position span that maps onto the full amplitude range.
const AMPLITUDE_SPAN: f64 = 50.0;

pub const PULSE_DURATION: u16 = 9;
pub const DUTY_CYCLE: u8 = 1;

/// Highest amplitude the pattern field can carry.
pub const MAX_PATTERN_AMPLITUDE: f64 = 31.0;

/// Damping near long gaps between commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadePolicy {
    pub enabled: bool,
    /// Gaps longer than this (ms) get faded edges.
    pub pause_duration_ms: f64,
    /// Length (ms) of the fade on each side of a command.
    pub fade_duration_ms: f64,
}

impl Default for FadePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            pause_duration_ms: 2500.0,
            fade_duration_ms: 300.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolationPolicy {
    /// Amplitude a fully driven channel reaches (0..=31).
    pub max_amplitude: f64,
    pub fade: FadePolicy,
}

impl Default for InterpolationPolicy {
    fn default() -> Self {
        Self {
            max_amplitude: 20.0,
            fade: FadePolicy::default(),
        }
    }
}

/// Everything computed for one timeline position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub offset_time: i64,
    pub position: f64,
    pub filter_amp: f64,
    pub amplitude_a: f64,
    pub amplitude_b: f64,
    pub patterns: PatternPair,
}

/// The two commands surrounding the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub current_time: f64,
    pub current_position: f64,
    pub next_time: f64,
    pub next_position: f64,
    /// No command follows `current`; `next` is only the idle stand-in.
    pub open_ended: bool,
}

impl Bracket {
    /// Resolve the bracket for `cursor` (index of the last command reached).
    ///
    /// Before the first command the synthetic `(0, 99)` stands in for
    /// `current`. Past the last command `next` becomes `(offset_time, 99)`, so
    /// the position settles on the idle value.
    pub fn resolve(commands: &[HapticCommand], cursor: Option<usize>, offset_time: i64) -> Self {
        let (current_time, current_position) = match cursor.and_then(|i| commands.get(i)) {
            Some(command) => (command.time as f64, f64::from(command.position)),
            None => (0.0, f64::from(IDLE_POSITION)),
        };

        let next_index = cursor.map_or(0, |i| i + 1);
        let (next_time, next_position, open_ended) = match commands.get(next_index) {
            Some(command) => (command.time as f64, f64::from(command.position), false),
            None => (offset_time as f64, f64::from(IDLE_POSITION), true),
        };

        Self {
            current_time,
            current_position,
            next_time,
            next_position,
            open_ended,
        }
    }

    /// Progress from `current` to `next`, clamped to `[0, 1]`.
    pub fn fraction(&self, offset_time: f64) -> f64 {
        let span = self.next_time - self.current_time;
        if span == 0.0 {
            return 0.0;
        }
        ((offset_time - self.current_time) / span).clamp(0.0, 1.0)
    }

    pub fn position_at(&self, offset_time: f64) -> f64 {
        let t = self.fraction(offset_time);
        self.current_position + (self.next_position - self.current_position) * t
    }

    /// Time to the nearer edge of the bracket. At the very start only the
    /// distance to the next command counts, which ramps output in. Past the
    /// last command only the time since it counts.
    pub fn distance_time(&self, offset_time: f64) -> f64 {
        if self.open_ended {
            return offset_time - self.current_time;
        }
        let to_next = self.next_time - offset_time;
        if self.current_time == 0.0 {
            to_next
        } else {
            (offset_time - self.current_time).min(to_next)
        }
    }

    pub fn gap(&self) -> f64 {
        self.next_time - self.current_time
    }
}

/// Differential drive: channel A rises above the centre, channel B below it.
pub fn channel_amplitudes(position: f64, max_amplitude: f64) -> (f64, f64) {
    let a = (position + DEAD_ZONE - MID_ZONE) / AMPLITUDE_SPAN * max_amplitude;
    let b = (MID_ZONE - position + DEAD_ZONE) / AMPLITUDE_SPAN * max_amplitude;
    (clamp_amplitude(a, max_amplitude), clamp_amplitude(b, max_amplitude))
}

fn clamp_amplitude(value: f64, max_amplitude: f64) -> f64 {
    value.max(0.0).min(max_amplitude)
}

/// Amplitude multiplier for a bracket `gap` ms wide, `distance_time` ms from
/// its nearer edge.
pub fn fade_factor(policy: &FadePolicy, gap: f64, distance_time: f64) -> f64 {
    if !policy.enabled || gap <= policy.pause_duration_ms || policy.fade_duration_ms <= 0.0 {
        return 1.0;
    }
    ((policy.fade_duration_ms - distance_time) / policy.fade_duration_ms).clamp(0.0, 1.0)
}

/// Amplitude multiplier `elapsed` ms after the last command: full output for
/// `pause_duration`, then a linear ramp to zero over `fade_duration`.
pub fn tail_fade_factor(policy: &FadePolicy, elapsed: f64) -> f64 {
    if !policy.enabled {
        return 1.0;
    }
    let faded = elapsed - policy.pause_duration_ms;
    if faded <= 0.0 {
        return 1.0;
    }
    if policy.fade_duration_ms <= 0.0 {
        return 0.0;
    }
    ((policy.fade_duration_ms - faded) / policy.fade_duration_ms).clamp(0.0, 1.0)
}

fn pattern(amplitude: f64) -> ActuatorPattern {
    ActuatorPattern {
        duty_cycle: DUTY_CYCLE,
        pulse_duration: PULSE_DURATION,
        // Fractional amplitudes truncate toward zero.
        amplitude: amplitude.clamp(0.0, MAX_PATTERN_AMPLITUDE) as u8,
    }
}

/// Compute the frame for `offset_time` given the cursor into `commands`.
pub fn interpolate(
    commands: &[HapticCommand],
    cursor: Option<usize>,
    offset_time: i64,
    policy: &InterpolationPolicy,
) -> Frame {
    let bracket = Bracket::resolve(commands, cursor, offset_time);
    let now = offset_time as f64;

    let position = bracket.position_at(now);
    let (raw_a, raw_b) = channel_amplitudes(position, policy.max_amplitude);
    let filter_amp = if bracket.open_ended {
        tail_fade_factor(&policy.fade, bracket.distance_time(now))
    } else {
        fade_factor(&policy.fade, bracket.gap(), bracket.distance_time(now))
    };

    let amplitude_a = raw_a * filter_amp;
    let amplitude_b = raw_b * filter_amp;

    Frame {
        offset_time,
        position,
        filter_amp,
        amplitude_a,
        amplitude_b,
        patterns: PatternPair {
            a: pattern(amplitude_a),
            b: pattern(amplitude_b),
        },
    }
}
