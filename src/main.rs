use anyhow::Context;
use coyote_sync::domain::playback::WallClockTimeline;
use coyote_sync::domain::settings::SettingsService;
use coyote_sync::infrastructure::bluetooth::loopback::{LoopbackDevice, LoopbackTransport};
use coyote_sync::infrastructure::bluetooth::protocol::{self, Characteristic};
use coyote_sync::infrastructure::logging;
use coyote_sync::{CommandSequence, DeviceSession, PlaybackController, PlaybackDriver, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Opening of a typical stroke script.
const DEMO_SCRIPT: &[(u64, u8)] = &[
    (367, 20),
    (667, 80),
    (1101, 20),
    (1535, 80),
    (1902, 20),
    (2269, 80),
    (2569, 20),
    (3036, 80),
    (3403, 20),
    (3670, 80),
    (4137, 20),
    (4505, 80),
    (4838, 20),
    (5472, 30),
    (5706, 50),
    (5873, 30),
    (6206, 30),
    (6840, 40),
    (7307, 30),
    (9500, 0),
];

const DEMO_DURATION: Duration = Duration::from_secs(4);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = match std::env::args().nth(1) {
        Some(path) => SettingsService::from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path))?,
        None => SettingsService::new(),
    };
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Coyote sync demo against a loopback device");

    let transport = Arc::new(LoopbackTransport::new(LoopbackDevice::default()));
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::TransportFailure(reason) => warn!("Device: {}", reason),
                other => info!("Device event: {:?}", other),
            }
        }
    });

    let session = Arc::new(DeviceSession::new(
        transport.clone(),
        settings.session_config(),
        event_tx,
    ));
    let state = session.connect().await?;
    let step = u16::from(state.config.power_step.max(1));
    let power = (state.config.max_power / 10 / step) * step;
    session
        .write_power(coyote_sync::PowerLevels::new(power, power))
        .await?;

    let mut driver = PlaybackDriver::new(settings.interpolation_policy(), settings.offset_millis);
    driver.load(CommandSequence::from_pairs(DEMO_SCRIPT)?);
    driver.set_output(Some(session.clone()));

    let clock = Arc::new(WallClockTimeline::starting_at(0));
    let mut controller = PlaybackController::new(driver, clock, settings.frame_period());

    controller.play().await;
    tokio::time::sleep(DEMO_DURATION).await;
    controller.pause().await?;

    let pattern_writes = transport.writes_to(Characteristic::PatternA).await;
    info!("Sent {} pattern frames per channel", pattern_writes.len());
    if let Some(last) = pattern_writes.last() {
        let payload: protocol::Payload = last.as_slice().try_into()?;
        info!("Last channel A pattern: {:?}", protocol::decode_pattern(payload));
    }

    session.disconnect().await;
    Ok(())
}
