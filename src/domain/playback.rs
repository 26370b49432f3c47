//! Playback Driver
//!
//! Per-frame step that samples the timeline, walks the cursor, forwards the
//! reached command to external sinks and drives the actuator outputs.

use crate::domain::interpolation::{self, Frame, InterpolationPolicy};
use crate::domain::models::{ActuatorPattern, HapticCommand};
use crate::domain::sequence::{CommandSequence, PlaybackCursor};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Two-channel pattern output (the BLE actuator).
#[async_trait]
pub trait HapticOutput: Send + Sync {
    async fn write_pattern_a(&self, pattern: ActuatorPattern) -> anyhow::Result<()>;
    async fn write_pattern_b(&self, pattern: ActuatorPattern) -> anyhow::Result<()>;
    /// Halt output immediately.
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Any other device fed with raw commands.
#[async_trait]
pub trait CommandSink: Send + Sync {
    fn name(&self) -> &str;
    /// Whether this sink can handle `command`.
    fn accepts(&self, command: &HapticCommand) -> bool;
    async fn deliver(&self, command: HapticCommand) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Source of "current timeline position" samples, in milliseconds.
pub trait TimelineClock: Send + Sync {
    fn position_ms(&self) -> i64;
}

impl<F> TimelineClock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn position_ms(&self) -> i64 {
        self()
    }
}

/// Timeline that advances with wall-clock time from its creation.
pub struct WallClockTimeline {
    origin: Instant,
    start_ms: i64,
}

impl WallClockTimeline {
    pub fn starting_at(start_ms: i64) -> Self {
        Self {
            origin: Instant::now(),
            start_ms,
        }
    }
}

impl TimelineClock for WallClockTimeline {
    fn position_ms(&self) -> i64 {
        self.start_ms + self.origin.elapsed().as_millis() as i64
    }
}

pub struct PlaybackDriver {
    sequence: Option<CommandSequence>,
    cursor: PlaybackCursor,
    policy: InterpolationPolicy,
    offset_millis: i64,
    output: Option<Arc<dyn HapticOutput>>,
    sinks: Vec<Arc<dyn CommandSink>>,
}

impl PlaybackDriver {
    pub fn new(policy: InterpolationPolicy, offset_millis: i64) -> Self {
        Self {
            sequence: None,
            cursor: PlaybackCursor::default(),
            policy,
            offset_millis,
            output: None,
            sinks: Vec::new(),
        }
    }

    /// Replace the loaded script and start over from its beginning.
    pub fn load(&mut self, sequence: CommandSequence) {
        info!("Loaded {} haptic commands", sequence.len());
        self.sequence = Some(sequence);
        self.cursor.reset();
    }

    /// Install a flat placeholder script if nothing has been loaded.
    pub fn on_media_loaded(&mut self, duration_ms: u64) {
        if self.sequence.as_ref().map_or(true, CommandSequence::is_empty) {
            debug!("No haptics loaded, using placeholder for {} ms", duration_ms);
            self.load(CommandSequence::placeholder(duration_ms));
        }
    }

    pub fn sequence(&self) -> Option<&CommandSequence> {
        self.sequence.as_ref()
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn is_paused(&self) -> bool {
        self.cursor.is_paused()
    }

    pub fn set_output(&mut self, output: Option<Arc<dyn HapticOutput>>) {
        self.output = output;
    }

    pub fn add_sink(&mut self, sink: Arc<dyn CommandSink>) {
        self.sinks.push(sink);
    }

    pub fn remove_sink(&mut self, name: &str) {
        self.sinks.retain(|sink| sink.name() != name);
    }

    pub fn set_offset_millis(&mut self, offset_millis: i64) {
        self.offset_millis = offset_millis;
    }

    pub fn set_policy(&mut self, policy: InterpolationPolicy) {
        self.policy = policy;
    }

    /// Returns `true` if playback was paused before.
    pub fn on_play(&mut self) -> bool {
        let changed = self.cursor.set_paused(false);
        if changed {
            info!("Playback started");
        }
        changed
    }

    /// Pause and stop every output. A second pause does nothing.
    pub async fn on_pause(&mut self) -> anyhow::Result<()> {
        if !self.cursor.set_paused(true) {
            return Ok(());
        }
        info!("Playback paused, stopping outputs");

        for sink in &self.sinks {
            if let Err(e) = sink.stop().await {
                warn!("Failed to stop {}: {}", sink.name(), e);
            }
        }
        if let Some(output) = &self.output {
            output.stop().await?;
        }
        Ok(())
    }

    /// One frame. Returns the computed frame when the actuator was driven.
    ///
    /// Sink failures are logged and skipped; an actuator write failure is
    /// returned after the remaining work of the frame is done.
    pub async fn tick(&mut self, timeline_ms: i64) -> anyhow::Result<Option<Frame>> {
        if self.cursor.is_paused() {
            return Ok(None);
        }
        let Some(sequence) = self.sequence.as_ref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let offset_time = timeline_ms + self.offset_millis;
        let index = self.cursor.advance(sequence, offset_time);

        if let Some(command) = index.and_then(|i| sequence.get(i)).copied() {
            for sink in self.sinks.iter().filter(|s| s.accepts(&command)) {
                if let Err(e) = sink.deliver(command).await {
                    warn!("Failed to deliver command to {}: {}", sink.name(), e);
                }
            }
        }

        let Some(output) = &self.output else {
            return Ok(None);
        };

        let frame = interpolation::interpolate(sequence.commands(), index, offset_time, &self.policy);
        trace!(
            "t={} idx={:?} pos={:.1} A={:.2} B={:.2} fade={:.2}",
            offset_time,
            index,
            frame.position,
            frame.amplitude_a,
            frame.amplitude_b,
            frame.filter_amp
        );

        let a = output.write_pattern_a(frame.patterns.a).await;
        let b = output.write_pattern_b(frame.patterns.b).await;
        a.and(b)?;
        Ok(Some(frame))
    }
}
