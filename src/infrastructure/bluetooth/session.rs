//! Device Session
//!
//! Binds the protocol codecs to a [`GattTransport`] and keeps the device fed.
//!
//! The Coyote has no pattern memory: a waveform only plays while it keeps
//! being written. Pattern writes therefore land in a latest-value cell that a
//! periodic task re-sends for both channels, instead of going straight to the
//! transport at frame rate.

use crate::domain::models::{
    ActuatorPattern, DeviceConfig, DeviceState, PatternPair, PowerLevels, SessionEvent,
    SessionStatus,
};
use crate::domain::playback::HapticOutput;
use crate::infrastructure::bluetooth::protocol::{self, Characteristic, Payload, PAYLOAD_LEN};
use crate::infrastructure::bluetooth::transport::{GattTransport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Re-send period observed to keep the reference device playing.
pub const DEFAULT_RETRANSMIT_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session is {0}, writes need a ready session")]
    NotReady(SessionStatus),
    #[error("{characteristic} payload has {actual} bytes, expected {expected}")]
    InvalidPayload {
        characteristic: Characteristic,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub retransmit_period: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retransmit_period: DEFAULT_RETRANSMIT_PERIOD,
        }
    }
}

/// Live connection to one Coyote.
pub struct DeviceSession {
    transport: Arc<dyn GattTransport>,
    config: SessionConfig,
    event_sender: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
    state: Arc<watch::Sender<DeviceState>>,
    // Shared with the retransmit task; latest value wins.
    patterns: watch::Sender<PatternPair>,
    // Serializes transport writes so they never overlap.
    write_gate: Arc<Mutex<()>>,
    // Held for a whole connect attempt.
    connect_gate: Mutex<()>,
    retransmit: Mutex<Option<JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceSession {
    pub fn new(
        transport: Arc<dyn GattTransport>,
        config: SessionConfig,
        event_sender: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Disconnected);
        let (state, _) = watch::channel(DeviceState::default());
        let (patterns, _) = watch::channel(PatternPair::default());
        Self {
            transport,
            config,
            event_sender,
            status,
            state: Arc::new(state),
            patterns,
            write_gate: Arc::new(Mutex::new(())),
            connect_gate: Mutex::new(()),
            retransmit: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Latest known device state, with the patterns last handed to the session.
    pub fn state(&self) -> DeviceState {
        DeviceState {
            patterns: *self.patterns.borrow(),
            ..*self.state.borrow()
        }
    }

    /// Read the initial device state and subscribe to its notifications.
    ///
    /// Calling this on a ready session returns the current state unchanged.
    /// Concurrent calls wait for the attempt in progress and share its result.
    pub async fn connect(&self) -> Result<DeviceState, SessionError> {
        let _gate = self.connect_gate.lock().await;
        if self.status() == SessionStatus::Ready {
            return Ok(self.state());
        }

        self.set_status(SessionStatus::Connecting);
        match self.initialize().await {
            Ok(state) => {
                self.set_status(SessionStatus::Ready);
                info!(
                    "Connected to Coyote (max power {}, step {}, battery {}%)",
                    state.config.max_power, state.config.power_step, state.config.battery_level
                );
                Ok(state)
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                self.abort_listeners().await;
                self.set_status(SessionStatus::Disconnected);
                Err(e)
            }
        }
    }

    async fn initialize(&self) -> Result<DeviceState, SessionError> {
        debug!("Reading config characteristic...");
        let register = protocol::decode_config(self.read_payload(Characteristic::Config).await?);

        debug!("Reading power levels...");
        let power = protocol::decode_power(self.read_payload(Characteristic::Power).await?);

        debug!("Reading patterns...");
        let a = protocol::decode_pattern(self.read_payload(Characteristic::PatternA).await?);
        let b = protocol::decode_pattern(self.read_payload(Characteristic::PatternB).await?);

        debug!("Reading battery level...");
        let battery = self.transport.read(Characteristic::Battery).await?;
        let battery_level = *battery.first().ok_or(SessionError::InvalidPayload {
            characteristic: Characteristic::Battery,
            expected: 1,
            actual: 0,
        })?;

        let state = DeviceState {
            config: DeviceConfig {
                max_power: register.max_power,
                power_step: register.power_step,
                battery_level,
            },
            power,
            patterns: PatternPair { a, b },
        };
        self.state.send_replace(state);
        self.patterns.send_replace(state.patterns);

        self.spawn_listeners().await?;
        Ok(state)
    }

    async fn spawn_listeners(&self) -> Result<(), SessionError> {
        debug!("Subscribing to power and battery notifications...");
        let power_rx = self.transport.subscribe(Characteristic::Power).await?;
        let battery_rx = self.transport.subscribe(Characteristic::Battery).await?;

        let mut listeners = self.listeners.lock().await;
        listeners.push(tokio::spawn(listen_power(
            power_rx,
            self.state.clone(),
            self.event_sender.clone(),
        )));
        listeners.push(tokio::spawn(listen_battery(
            battery_rx,
            self.state.clone(),
            self.event_sender.clone(),
        )));
        Ok(())
    }

    /// Cancel the timer and listeners. Nothing is written to the device.
    pub async fn disconnect(&self) {
        self.cancel_retransmit().await;
        self.abort_listeners().await;
        self.set_status(SessionStatus::Disconnected);
    }

    /// Write power levels; transport failures are returned as-is, never retried.
    pub async fn write_power(&self, power: PowerLevels) -> Result<(), SessionError> {
        self.ensure_ready()?;
        let _gate = self.write_gate.lock().await;
        self.transport
            .write(Characteristic::Power, &protocol::encode_power(power))
            .await?;
        Ok(())
    }

    /// Replace channel A's pattern. It reaches the device on the next timer tick.
    pub async fn write_pattern_a(&self, pattern: ActuatorPattern) -> Result<(), SessionError> {
        self.ensure_ready()?;
        self.patterns.send_modify(|p| p.a = pattern);
        self.ensure_retransmit().await;
        Ok(())
    }

    /// Replace channel B's pattern. It reaches the device on the next timer tick.
    pub async fn write_pattern_b(&self, pattern: ActuatorPattern) -> Result<(), SessionError> {
        self.ensure_ready()?;
        self.patterns.send_modify(|p| p.b = pattern);
        self.ensure_retransmit().await;
        Ok(())
    }

    /// Cancel the retransmit timer, then zero the power of both channels.
    ///
    /// No tick fires once this returns, even if the zero-power write fails.
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.cancel_retransmit().await;
        self.write_power(PowerLevels::ZERO).await
    }

    pub async fn is_retransmitting(&self) -> bool {
        self.retransmit
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn ensure_retransmit(&self) {
        let mut slot = self.retransmit.lock().await;
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        debug!(
            "Starting retransmit timer ({} ms)",
            self.config.retransmit_period.as_millis()
        );
        *slot = Some(tokio::spawn(retransmit_loop(
            self.transport.clone(),
            self.patterns.subscribe(),
            self.write_gate.clone(),
            self.event_sender.clone(),
            self.config.retransmit_period,
        )));
    }

    async fn cancel_retransmit(&self) {
        if let Some(handle) = self.retransmit.lock().await.take() {
            handle.abort();
            // Wait for the task to be dropped so no tick can outlive this call.
            let _ = handle.await;
            debug!("Retransmit timer stopped");
        }
    }

    async fn abort_listeners(&self) {
        for handle in self.listeners.lock().await.drain(..) {
            handle.abort();
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.status() {
            SessionStatus::Ready => Ok(()),
            status => Err(SessionError::NotReady(status)),
        }
    }

    fn set_status(&self, status: SessionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!("Session {} -> {}", previous, status);
            let _ = self.event_sender.send(SessionEvent::StatusChanged(status));
        }
    }

    async fn read_payload(&self, characteristic: Characteristic) -> Result<Payload, SessionError> {
        let value = self.transport.read(characteristic).await?;
        to_payload(characteristic, &value)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(handle) = self.retransmit.get_mut().take() {
            handle.abort();
        }
        for handle in self.listeners.get_mut().drain(..) {
            handle.abort();
        }
    }
}

#[async_trait]
impl HapticOutput for DeviceSession {
    async fn write_pattern_a(&self, pattern: ActuatorPattern) -> anyhow::Result<()> {
        Ok(DeviceSession::write_pattern_a(self, pattern).await?)
    }

    async fn write_pattern_b(&self, pattern: ActuatorPattern) -> anyhow::Result<()> {
        Ok(DeviceSession::write_pattern_b(self, pattern).await?)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(DeviceSession::stop(self).await?)
    }
}

fn to_payload(characteristic: Characteristic, value: &[u8]) -> Result<Payload, SessionError> {
    value.try_into().map_err(|_| SessionError::InvalidPayload {
        characteristic,
        expected: PAYLOAD_LEN,
        actual: value.len(),
    })
}

async fn retransmit_loop(
    transport: Arc<dyn GattTransport>,
    patterns: watch::Receiver<PatternPair>,
    write_gate: Arc<Mutex<()>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let pair = *patterns.borrow();

        let _gate = write_gate.lock().await;
        for (characteristic, pattern) in [
            (Characteristic::PatternA, pair.a),
            (Characteristic::PatternB, pair.b),
        ] {
            if let Err(e) = transport
                .write(characteristic, &protocol::encode_pattern(pattern))
                .await
            {
                // Keep ticking: the next write may succeed.
                warn!("Retransmit of {} failed: {}", characteristic, e);
                let _ = events.send(SessionEvent::TransportFailure(e.to_string()));
            }
        }
    }
}

async fn listen_power(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<watch::Sender<DeviceState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    while let Some(value) = rx.recv().await {
        match to_payload(Characteristic::Power, &value) {
            Ok(payload) => {
                let power = protocol::decode_power(payload);
                debug!("Power changed: A={} B={}", power.power_a, power.power_b);
                state.send_modify(|s| s.power = power);
                let _ = events.send(SessionEvent::PowerChanged(power));
            }
            Err(e) => warn!("Ignoring power notification: {}", e),
        }
    }
    debug!("Power notifications closed");
}

async fn listen_battery(
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<watch::Sender<DeviceState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    while let Some(value) = rx.recv().await {
        let Some(&level) = value.first() else {
            warn!("Ignoring empty battery notification");
            continue;
        };
        debug!("Battery level: {}%", level);
        state.send_modify(|s| s.config.battery_level = level);
        let _ = events.send(SessionEvent::BatteryLevel(level));
    }
    debug!("Battery notifications closed");
}
